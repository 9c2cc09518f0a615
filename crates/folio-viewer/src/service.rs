//! Collaborator interfaces of the PDF engine.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use folio_types::BoundingBox;

use crate::error::ViewerError;

/// Toolbar item id that links the current page into the notes.
pub const LINK_CURRENT_PAGE: &str = "link-current-page";

/// A custom toolbar entry passed to the viewer on load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolbarItem {
    pub id: String,
    pub title: String,
}

/// Toolbar customisation handed to every load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolbarConfig {
    pub items: Vec<ToolbarItem>,
}

impl Default for ToolbarConfig {
    fn default() -> Self {
        Self {
            items: vec![ToolbarItem {
                id: LINK_CURRENT_PAGE.to_string(),
                title: "Link this page in the notes".to_string(),
            }],
        }
    }
}

/// Everything the viewer needs to display a document.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub document_id: String,
    pub content: Vec<u8>,
    pub annotation_state: Option<Vec<u8>>,
    pub toolbar: ToolbarConfig,
}

/// One line of text laid out on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub bounding_box: BoundingBox,
}

impl TextLine {
    pub fn new(text: impl Into<String>, bounding_box: BoundingBox) -> Self {
        Self {
            text: text.into(),
            bounding_box,
        }
    }
}

/// Callback fired by the viewer when the user saves annotations.
pub type AnnotationSavedListener = Arc<dyn Fn() + Send + Sync>;

/// Handle to an event registration. Dropping it unregisters the listener.
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A subscription with nothing to release.
    pub fn noop() -> Self {
        Self { release: None }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

/// A document displayed by the viewer.
#[async_trait]
pub trait ViewerInstance: Send + Sync {
    fn total_page_count(&self) -> u32;

    /// 0-based index of the page in view.
    fn current_page_index(&self) -> u32;

    async fn text_lines_for_page(&self, page_index: u32) -> Result<Vec<TextLine>, ViewerError>;

    async fn export_annotation_state(&self) -> Result<Vec<u8>, ViewerError>;

    async fn scroll_to_page(&self, page_index: u32) -> Result<(), ViewerError>;

    async fn highlight_region(
        &self,
        page_index: u32,
        region: BoundingBox,
    ) -> Result<(), ViewerError>;

    fn subscribe_annotation_saved(&self, listener: AnnotationSavedListener) -> Subscription;
}

/// The PDF engine.
#[async_trait]
pub trait ViewerService: Send + Sync {
    async fn load(&self, request: LoadRequest) -> Result<Arc<dyn ViewerInstance>, ViewerError>;

    async fn unload(&self, instance: Arc<dyn ViewerInstance>) -> Result<(), ViewerError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_subscription_releases_on_drop() {
        let released = Arc::new(AtomicBool::new(false));
        let flag = released.clone();
        let subscription = Subscription::new(move || flag.store(true, Ordering::SeqCst));

        assert!(!released.load(Ordering::SeqCst));
        drop(subscription);
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn test_default_toolbar_has_link_item() {
        let toolbar = ToolbarConfig::default();
        assert_eq!(toolbar.items.len(), 1);
        assert_eq!(toolbar.items[0].id, LINK_CURRENT_PAGE);
    }
}
