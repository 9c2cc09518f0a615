//! Mock viewer and editor for testing.
//!
//! [`MockViewer`] records every call, counts live instances and serves page
//! text configured per document. Documents without configured pages have
//! two pages of one line each.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use folio_types::BoundingBox;

use crate::editor::{EditorSelection, EditorService};
use crate::error::ViewerError;
use crate::service::{
    AnnotationSavedListener, LoadRequest, Subscription, TextLine, ViewerInstance, ViewerService,
};

#[derive(Default)]
struct Shared {
    pages: Mutex<HashMap<String, Vec<Vec<String>>>>,
    failing: Mutex<HashSet<String>>,
    loaded: Mutex<Vec<String>>,
    last_request: Mutex<Option<LoadRequest>>,
    scrolls: Mutex<Vec<(String, u32)>>,
    highlights: Mutex<Vec<(String, u32, BoundingBox)>>,
    listeners: Mutex<HashMap<u64, AnnotationSavedListener>>,
    export: Mutex<Vec<u8>>,
    next_listener: AtomicU64,
    load_delay_ms: AtomicU64,
    live: AtomicUsize,
    max_live: AtomicUsize,
    unloads: AtomicUsize,
    fail_unload: AtomicBool,
    fail_export: AtomicBool,
}

/// Scriptable stand-in for the PDF engine.
#[derive(Clone, Default)]
pub struct MockViewer {
    shared: Arc<Shared>,
}

impl MockViewer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the text lines of each page of `document_id`.
    pub fn set_pages(&self, document_id: &str, pages: Vec<Vec<String>>) {
        if let Ok(mut map) = self.shared.pages.lock() {
            map.insert(document_id.to_string(), pages);
        }
    }

    /// Make every load of `document_id` fail.
    pub fn fail_document(&self, document_id: &str) {
        if let Ok(mut failing) = self.shared.failing.lock() {
            failing.insert(document_id.to_string());
        }
    }

    pub fn set_load_delay_ms(&self, ms: u64) {
        self.shared.load_delay_ms.store(ms, Ordering::SeqCst);
    }

    pub fn set_fail_unload(&self, fail: bool) {
        self.shared.fail_unload.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_export(&self, fail: bool) {
        self.shared.fail_export.store(fail, Ordering::SeqCst);
    }

    /// Blob returned by `export_annotation_state`.
    pub fn set_annotation_export(&self, state: Vec<u8>) {
        if let Ok(mut export) = self.shared.export.lock() {
            *export = state;
        }
    }

    /// Fire the "annotation saved" event on every registered listener.
    pub fn trigger_save(&self) {
        let listeners: Vec<AnnotationSavedListener> = match self.shared.listeners.lock() {
            Ok(map) => map.values().cloned().collect(),
            Err(_) => return,
        };
        for listener in listeners {
            listener();
        }
    }

    /// Documents loaded so far, in load order.
    pub fn loaded_documents(&self) -> Vec<String> {
        self.shared.loaded.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn last_request(&self) -> Option<LoadRequest> {
        self.shared.last_request.lock().ok().and_then(|r| r.clone())
    }

    pub fn scroll_calls(&self) -> Vec<(String, u32)> {
        self.shared.scrolls.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn highlight_calls(&self) -> Vec<(String, u32, BoundingBox)> {
        self.shared.highlights.lock().map(|h| h.clone()).unwrap_or_default()
    }

    pub fn listener_count(&self) -> usize {
        self.shared.listeners.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn live_instances(&self) -> usize {
        self.shared.live.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously live instances observed.
    pub fn max_live_instances(&self) -> usize {
        self.shared.max_live.load(Ordering::SeqCst)
    }

    pub fn unload_count(&self) -> usize {
        self.shared.unloads.load(Ordering::SeqCst)
    }

    fn pages_for(&self, document_id: &str) -> Vec<Vec<String>> {
        self.shared
            .pages
            .lock()
            .ok()
            .and_then(|map| map.get(document_id).cloned())
            .unwrap_or_else(|| {
                (1..=2)
                    .map(|page| vec![format!("{} page {}", document_id, page)])
                    .collect()
            })
    }
}

#[async_trait]
impl ViewerService for MockViewer {
    async fn load(&self, request: LoadRequest) -> Result<Arc<dyn ViewerInstance>, ViewerError> {
        let delay = self.shared.load_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let failing = self
            .shared
            .failing
            .lock()
            .map(|f| f.contains(&request.document_id))
            .unwrap_or(false);
        if failing {
            return Err(ViewerError::LoadFailure("corrupt PDF".to_string()));
        }

        let live = self.shared.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.max_live.fetch_max(live, Ordering::SeqCst);
        if let Ok(mut loaded) = self.shared.loaded.lock() {
            loaded.push(request.document_id.clone());
        }

        let instance = MockViewerInstance {
            document_id: request.document_id.clone(),
            pages: self.pages_for(&request.document_id),
            current_page: AtomicU32::new(0),
            shared: self.shared.clone(),
        };
        if let Ok(mut last) = self.shared.last_request.lock() {
            *last = Some(request);
        }
        Ok(Arc::new(instance))
    }

    async fn unload(&self, _instance: Arc<dyn ViewerInstance>) -> Result<(), ViewerError> {
        self.shared.live.fetch_sub(1, Ordering::SeqCst);
        self.shared.unloads.fetch_add(1, Ordering::SeqCst);
        if self.shared.fail_unload.load(Ordering::SeqCst) {
            return Err(ViewerError::Operation("teardown reported an error".to_string()));
        }
        Ok(())
    }
}

/// Instance produced by [`MockViewer`].
pub struct MockViewerInstance {
    document_id: String,
    pages: Vec<Vec<String>>,
    current_page: AtomicU32,
    shared: Arc<Shared>,
}

#[async_trait]
impl ViewerInstance for MockViewerInstance {
    fn total_page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn current_page_index(&self) -> u32 {
        self.current_page.load(Ordering::SeqCst)
    }

    async fn text_lines_for_page(&self, page_index: u32) -> Result<Vec<TextLine>, ViewerError> {
        let lines = self
            .pages
            .get(page_index as usize)
            .ok_or_else(|| ViewerError::Extraction(format!("no page {}", page_index)))?;
        Ok(lines
            .iter()
            .enumerate()
            .map(|(i, text)| {
                TextLine::new(
                    text.clone(),
                    BoundingBox::new(36.0, 72.0 + 14.0 * i as f32, 480.0, 12.0),
                )
            })
            .collect())
    }

    async fn export_annotation_state(&self) -> Result<Vec<u8>, ViewerError> {
        if self.shared.fail_export.load(Ordering::SeqCst) {
            return Err(ViewerError::Operation("export failed".to_string()));
        }
        self.shared
            .export
            .lock()
            .map(|e| e.clone())
            .map_err(|e| ViewerError::Operation(e.to_string()))
    }

    async fn scroll_to_page(&self, page_index: u32) -> Result<(), ViewerError> {
        self.current_page.store(page_index, Ordering::SeqCst);
        if let Ok(mut scrolls) = self.shared.scrolls.lock() {
            scrolls.push((self.document_id.clone(), page_index));
        }
        Ok(())
    }

    async fn highlight_region(
        &self,
        page_index: u32,
        region: BoundingBox,
    ) -> Result<(), ViewerError> {
        if let Ok(mut highlights) = self.shared.highlights.lock() {
            highlights.push((self.document_id.clone(), page_index, region));
        }
        Ok(())
    }

    fn subscribe_annotation_saved(&self, listener: AnnotationSavedListener) -> Subscription {
        let id = self.shared.next_listener.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut listeners) = self.shared.listeners.lock() {
            listeners.insert(id, listener);
        }
        let shared = self.shared.clone();
        Subscription::new(move || {
            if let Ok(mut listeners) = shared.listeners.lock() {
                listeners.remove(&id);
            }
        })
    }
}

/// Editor that records inserted markup.
#[derive(Default)]
pub struct MockEditor {
    selection: Mutex<Option<String>>,
    inserted: Mutex<Vec<String>>,
}

impl MockEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select `html`; `None` collapses the selection.
    pub fn select(&self, html: Option<&str>) {
        if let Ok(mut selection) = self.selection.lock() {
            *selection = html.map(str::to_string);
        }
    }

    pub fn inserted(&self) -> Vec<String> {
        self.inserted.lock().map(|i| i.clone()).unwrap_or_default()
    }
}

impl EditorService for MockEditor {
    fn selection(&self) -> Option<EditorSelection> {
        self.selection
            .lock()
            .ok()
            .and_then(|s| s.clone())
            .map(|html| EditorSelection { html })
    }

    fn insert_content(&self, html: &str) -> Result<(), ViewerError> {
        self.inserted
            .lock()
            .map_err(|e| ViewerError::Operation(e.to_string()))?
            .push(html.to_string());
        Ok(())
    }
}
