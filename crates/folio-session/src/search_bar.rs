//! Search bar state.
//!
//! Input is disabled until an index is installed. Repeating the previous
//! query returns the previous results without querying again.

use std::sync::{Arc, Mutex};

use tracing::debug;

use folio_search::{QueryService, SearchResult};
use folio_types::InternalLink;
use folio_viewer::ViewerLifecycleManager;

use crate::error::SessionError;

struct LastQuery {
    input: String,
    results: Vec<SearchResult>,
}

pub struct SearchBar {
    query: Arc<QueryService>,
    lifecycle: Arc<ViewerLifecycleManager>,
    last: Mutex<Option<LastQuery>>,
}

impl SearchBar {
    pub fn new(query: Arc<QueryService>, lifecycle: Arc<ViewerLifecycleManager>) -> Self {
        Self {
            query,
            lifecycle,
            last: Mutex::new(None),
        }
    }

    /// Whether input is accepted.
    pub fn is_enabled(&self) -> bool {
        self.query.is_ready()
    }

    /// Search for `input`. Returns nothing while disabled.
    pub fn search(&self, input: &str) -> Result<Vec<SearchResult>, SessionError> {
        if !self.is_enabled() {
            return Ok(Vec::new());
        }

        if let Ok(last) = self.last.lock() {
            if let Some(last) = last.as_ref().filter(|last| last.input == input) {
                debug!(input, "Query unchanged");
                return Ok(last.results.clone());
            }
        }

        let results = self.query.search(input)?;
        if let Ok(mut last) = self.last.lock() {
            *last = Some(LastQuery {
                input: input.to_string(),
                results: results.clone(),
            });
        }
        Ok(results)
    }

    /// Forget the previous query, e.g. after the index was rebuilt.
    pub fn reset(&self) {
        if let Ok(mut last) = self.last.lock() {
            *last = None;
        }
    }

    /// Show a result: open or focus its document, scroll to its page and
    /// highlight its region.
    pub async fn open_result(&self, result: &SearchResult) -> Result<(), SessionError> {
        let link = InternalLink::new(result.document_id.clone(), Some(result.page_index));
        self.lifecycle.open_internal_link(&link.to_string()).await?;
        self.lifecycle
            .highlight_region(result.page_index, result.bounding_box)
            .await;
        Ok(())
    }
}
