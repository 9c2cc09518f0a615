//! Internal link grammar.
//!
//! Format: `{document_id}[@{page_index}]`
//! - document_id: opaque document key (may not be empty)
//! - page_index: 0-based page, rendered 1-based in display text
//!
//! Parsing splits on the first `@` only.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FolioError;
use crate::tab::Tab;

/// A parsed reference to a document and optionally a page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InternalLink {
    pub document_id: String,
    pub page: Option<u32>,
}

impl InternalLink {
    pub fn new(document_id: impl Into<String>, page: Option<u32>) -> Self {
        Self {
            document_id: document_id.into(),
            page,
        }
    }

    pub fn parse(s: &str) -> Result<Self, FolioError> {
        let (document_id, page) = match s.split_once('@') {
            Some((id, page)) => {
                let page: u32 = page.trim().parse().map_err(|e| {
                    FolioError::InvalidInput(format!("Invalid page in link '{}': {}", s, e))
                })?;
                (id, Some(page))
            }
            None => (s, None),
        };

        if document_id.is_empty() {
            return Err(FolioError::InvalidInput(format!(
                "Link has no document id: '{}'",
                s
            )));
        }

        Ok(Self {
            document_id: document_id.to_string(),
            page,
        })
    }
}

impl FromStr for InternalLink {
    type Err = FolioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for InternalLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.page {
            Some(page) => write!(f, "{}@{}", self.document_id, page),
            None => write!(f, "{}", self.document_id),
        }
    }
}

/// A link ready for insertion into a note: the machine-readable internal
/// string plus its display text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub internal: String,
    pub text: String,
}

impl Link {
    /// Build the link for a tab, optionally pointing at a 0-based page.
    pub fn for_tab(tab: &Tab, page: Option<u32>) -> Self {
        Self::for_document(&tab.document_id, page)
    }

    pub fn for_document(document_id: &str, page: Option<u32>) -> Self {
        let internal = InternalLink::new(document_id, page).to_string();
        let text = match page {
            Some(page) => format!("{} (page {})", document_id, page + 1),
            None => document_id.to_string(),
        };
        Self { internal, text }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_page() {
        let link = InternalLink::parse("d1@2").unwrap();
        assert_eq!(link.document_id, "d1");
        assert_eq!(link.page, Some(2));
    }

    #[test]
    fn test_parse_without_page() {
        let link: InternalLink = "assets/dummy.pdf".parse().unwrap();
        assert_eq!(link.document_id, "assets/dummy.pdf");
        assert_eq!(link.page, None);
    }

    #[test]
    fn test_parse_splits_on_first_at() {
        let err = InternalLink::parse("d1@2@3").unwrap_err();
        assert!(matches!(err, FolioError::InvalidInput(_)));
    }

    #[test]
    fn test_parse_rejects_empty_id_and_bad_page() {
        assert!(InternalLink::parse("").is_err());
        assert!(InternalLink::parse("@4").is_err());
        assert!(InternalLink::parse("d1@four").is_err());
    }

    #[test]
    fn test_display_matches_grammar() {
        assert_eq!(InternalLink::new("d1", Some(0)).to_string(), "d1@0");
        assert_eq!(InternalLink::new("d1", None).to_string(), "d1");
    }

    #[test]
    fn test_link_for_tab_with_page() {
        let tab = Tab::new("d1", "Doc One");
        let link = Link::for_tab(&tab, Some(2));
        assert_eq!(link.internal, "d1@2");
        assert_eq!(link.text, "d1 (page 3)");
    }

    #[test]
    fn test_link_for_first_page_keeps_page() {
        let link = Link::for_document("d1", Some(0));
        assert_eq!(link.internal, "d1@0");
        assert_eq!(link.text, "d1 (page 1)");
    }

    #[test]
    fn test_link_for_document_only() {
        let link = Link::for_document("d1", None);
        assert_eq!(link.internal, "d1");
        assert_eq!(link.text, "d1");
    }
}
