//! Note linking between the rich-text editor and the viewer.
//!
//! Links are inserted as anchors carrying the internal link in a data
//! attribute; clicks on such anchors are routed back to the lifecycle
//! manager.

use std::collections::HashMap;
use std::sync::Arc;

use folio_types::Link;
use tracing::debug;

use crate::error::ViewerError;
use crate::lifecycle::ViewerLifecycleManager;
use crate::service::LINK_CURRENT_PAGE;

/// Attribute holding the internal link on inserted anchors.
pub const INTERNAL_LINK_ATTR: &str = "data-internal-link";

/// Non-collapsed editor selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorSelection {
    /// Inner HTML of the selected node
    pub html: String,
}

/// The rich-text editor surface.
pub trait EditorService: Send + Sync {
    /// Current selection, `None` when collapsed.
    fn selection(&self) -> Option<EditorSelection>;

    fn insert_content(&self, html: &str) -> Result<(), ViewerError>;
}

/// Element the user clicked in the editor.
#[derive(Debug, Clone, Default)]
pub struct ClickTarget {
    pub attributes: HashMap<String, String>,
}

impl ClickTarget {
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn internal_link(&self) -> Option<&str> {
        self.attributes.get(INTERNAL_LINK_ATTR).map(String::as_str)
    }
}

/// Render the anchor for `link` around `inner_html`.
fn anchor(link: &Link, inner_html: &str) -> String {
    format!(
        "<a {}=\"{}\" href=\"#\">{}</a>",
        INTERNAL_LINK_ATTR,
        html_escape::encode_double_quoted_attribute(&link.internal),
        inner_html
    )
}

/// Couples the editor to the viewer lifecycle.
pub struct NoteLinker {
    lifecycle: Arc<ViewerLifecycleManager>,
    editor: Arc<dyn EditorService>,
}

impl NoteLinker {
    pub fn new(lifecycle: Arc<ViewerLifecycleManager>, editor: Arc<dyn EditorService>) -> Self {
        Self { lifecycle, editor }
    }

    /// Insert a link to the active document. Returns `None` with no tab open.
    pub async fn link_to_current_document(&self) -> Result<Option<Link>, ViewerError> {
        let Some(tab) = self.lifecycle.current_tab().await else {
            return Ok(None);
        };
        let link = self.lifecycle.get_link_for(&tab, None);
        self.insert_link(&link)?;
        Ok(Some(link))
    }

    /// Insert a link to the page in view of the active document.
    pub async fn link_to_current_page(&self) -> Result<Option<Link>, ViewerError> {
        let Some(tab) = self.lifecycle.current_tab().await else {
            return Ok(None);
        };
        let page = self
            .lifecycle
            .current_page()
            .await
            .ok_or(ViewerError::NoActiveViewer)?;
        let link = self.lifecycle.get_link_for(&tab, Some(page));
        self.insert_link(&link)?;
        Ok(Some(link))
    }

    /// Wrap the current selection in an anchor for `link`, or insert the
    /// link's display text when nothing is selected.
    pub fn insert_link(&self, link: &Link) -> Result<(), ViewerError> {
        let html = match self.editor.selection() {
            Some(selection) if !selection.html.is_empty() => anchor(link, &selection.html),
            _ => anchor(link, &html_escape::encode_text(&link.text)),
        };
        debug!(internal = %link.internal, "Inserting note link");
        self.editor.insert_content(&html)
    }

    /// Follow the link on a clicked anchor. Returns false for other elements.
    pub async fn handle_editor_click(&self, target: &ClickTarget) -> Result<bool, ViewerError> {
        match target.internal_link() {
            Some(link) => {
                debug!(link, "Clicked internal link");
                self.lifecycle.open_internal_link(link).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Dispatch a custom viewer toolbar item. Returns false for unknown ids.
    pub async fn handle_toolbar_action(&self, item_id: &str) -> Result<bool, ViewerError> {
        if item_id == LINK_CURRENT_PAGE {
            self.link_to_current_page().await?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
