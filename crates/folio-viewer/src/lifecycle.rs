//! Viewer lifecycle manager.
//!
//! Owns the ordered tab list, the active position and the single live viewer
//! instance. Every transition runs under one async mutex, so concurrent
//! open/focus requests queue in arrival order and each runs to completion.
//! The request that acquires the lock last determines the displayed document.
//!
//! Transition: `Unloading` (if a viewer is live) → `Loading` → `Active`,
//! falling back to `Empty` when the load fails.

use std::sync::{Arc, Mutex as StdMutex, Weak};

use tokio::runtime::Handle;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use folio_storage::Storage;
use folio_types::{BoundingBox, DocumentPatch, InternalLink, Link, Tab, TextFragment};

use crate::error::ViewerError;
use crate::service::{
    AnnotationSavedListener, LoadRequest, Subscription, ToolbarConfig, ViewerInstance,
    ViewerService,
};

/// Lifecycle state of the viewer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewerState {
    #[default]
    Empty,
    Loading,
    Active,
    Unloading,
}

/// Tab list and active position, captured for later restoration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabSnapshot {
    pub tabs: Vec<Tab>,
    pub active: Option<usize>,
}

struct LoadedViewer {
    document_id: String,
    instance: Arc<dyn ViewerInstance>,
    // Dropped before unload to release the save listener
    subscription: Subscription,
}

#[derive(Default)]
struct Inner {
    tabs: Vec<Tab>,
    active: Option<usize>,
    loaded: Option<LoadedViewer>,
}

type PendingSaves = Arc<StdMutex<Vec<JoinHandle<()>>>>;

/// Serializes viewer loads and routes viewer saves back to the store.
pub struct ViewerLifecycleManager {
    viewer: Arc<dyn ViewerService>,
    storage: Arc<Storage>,
    toolbar: ToolbarConfig,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<ViewerState>,
    pending_saves: PendingSaves,
}

impl ViewerLifecycleManager {
    pub fn new(viewer: Arc<dyn ViewerService>, storage: Arc<Storage>) -> Self {
        let (state_tx, _) = watch::channel(ViewerState::Empty);
        Self {
            viewer,
            storage,
            toolbar: ToolbarConfig::default(),
            inner: Mutex::new(Inner::default()),
            state_tx,
            pending_saves: Arc::new(StdMutex::new(Vec::new())),
        }
    }

    pub fn with_toolbar(mut self, toolbar: ToolbarConfig) -> Self {
        self.toolbar = toolbar;
        self
    }

    pub fn state(&self) -> ViewerState {
        *self.state_tx.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ViewerState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: ViewerState) {
        self.state_tx.send_replace(state);
    }

    pub async fn tabs(&self) -> Vec<Tab> {
        self.inner.lock().await.tabs.clone()
    }

    pub async fn active_index(&self) -> Option<usize> {
        self.inner.lock().await.active
    }

    pub async fn current_tab(&self) -> Option<Tab> {
        let inner = self.inner.lock().await;
        inner.active.and_then(|i| inner.tabs.get(i).cloned())
    }

    /// Page in view of the live instance.
    pub async fn current_page(&self) -> Option<u32> {
        let inner = self.inner.lock().await;
        inner.loaded.as_ref().map(|l| l.instance.current_page_index())
    }

    /// Build the link for `tab`, optionally pointing at a 0-based page.
    pub fn get_link_for(&self, tab: &Tab, page: Option<u32>) -> Link {
        Link::for_tab(tab, page)
    }

    /// Append a tab for `document_id`, make it active and load it.
    ///
    /// Returns the new tab's index.
    pub async fn open_new_tab(&self, document_id: &str) -> Result<usize, ViewerError> {
        let mut inner = self.inner.lock().await;
        self.open_locked(&mut inner, document_id).await
    }

    /// Make the tab at `index` active and reload it.
    pub async fn focus_tab(&self, index: usize) -> Result<(), ViewerError> {
        let mut inner = self.inner.lock().await;
        self.focus_locked(&mut inner, index).await
    }

    /// Reload the active tab's document.
    pub async fn reload_pdf(&self) -> Result<(), ViewerError> {
        let mut inner = self.inner.lock().await;
        let document_id = match inner.active.and_then(|i| inner.tabs.get(i)) {
            Some(tab) => tab.document_id.clone(),
            None => return Err(ViewerError::NoActiveViewer),
        };
        self.reload_locked(&mut inner, &document_id).await
    }

    /// Follow an internal link: focus or open its document, then scroll to
    /// its page if it names one.
    pub async fn open_internal_link(&self, link: &str) -> Result<(), ViewerError> {
        let link = InternalLink::parse(link)?;
        let mut inner = self.inner.lock().await;

        let existing = inner
            .tabs
            .iter()
            .position(|tab| tab.document_id == link.document_id);
        match existing {
            Some(index) => self.focus_locked(&mut inner, index).await?,
            None => {
                if self.storage.get_document_meta(&link.document_id)?.is_none() {
                    return Err(ViewerError::UnknownDocument(link.document_id));
                }
                self.open_locked(&mut inner, &link.document_id).await?;
            }
        }

        if let Some(page) = link.page {
            self.scroll_locked(&inner, page).await;
        }
        Ok(())
    }

    /// Scroll the live instance to `page_index`. Best-effort.
    pub async fn scroll_to_page(&self, page_index: u32) {
        let inner = self.inner.lock().await;
        self.scroll_locked(&inner, page_index).await;
    }

    /// Highlight a region of the live instance. Best-effort.
    pub async fn highlight_region(&self, page_index: u32, region: BoundingBox) {
        let inner = self.inner.lock().await;
        if let Some(loaded) = inner.loaded.as_ref() {
            if let Err(e) = loaded.instance.highlight_region(page_index, region).await {
                warn!(document_id = %loaded.document_id, page_index, error = %e, "Highlight failed");
            }
        }
    }

    pub async fn snapshot_tabs(&self) -> TabSnapshot {
        let inner = self.inner.lock().await;
        TabSnapshot {
            tabs: inner.tabs.clone(),
            active: inner.active,
        }
    }

    /// Replace the tab list and load the snapshot's active tab.
    ///
    /// Nothing is reloaded when that document is already live. With no
    /// active tab the live instance is unloaded.
    pub async fn restore_tabs(&self, snapshot: TabSnapshot) -> Result<(), ViewerError> {
        let mut inner = self.inner.lock().await;
        let active = snapshot.active.filter(|i| *i < snapshot.tabs.len());
        inner.tabs = snapshot.tabs;
        inner.active = active;

        match active.map(|i| inner.tabs[i].document_id.clone()) {
            Some(document_id) => {
                let live = inner.loaded.as_ref().map(|l| l.document_id.as_str());
                if live == Some(document_id.as_str()) && self.state() == ViewerState::Active {
                    return Ok(());
                }
                self.reload_locked(&mut inner, &document_id).await
            }
            None => {
                self.unload_locked(&mut inner).await;
                self.set_state(ViewerState::Empty);
                Ok(())
            }
        }
    }

    /// Load `document_id` (focusing its tab or opening one) and extract
    /// every page's text lines as fragment candidates.
    ///
    /// Pages without text yield a single empty placeholder fragment, as does
    /// a document with no pages at all. The manager stays locked for the
    /// whole extraction.
    pub async fn extract_document_text(
        &self,
        document_id: &str,
    ) -> Result<Vec<TextFragment>, ViewerError> {
        let mut inner = self.inner.lock().await;
        let existing = inner
            .tabs
            .iter()
            .position(|tab| tab.document_id == document_id);
        match existing {
            Some(index) => self.focus_locked(&mut inner, index).await?,
            None => {
                self.open_locked(&mut inner, document_id).await?;
            }
        }

        let instance = inner
            .loaded
            .as_ref()
            .map(|l| l.instance.clone())
            .ok_or(ViewerError::NoActiveViewer)?;

        let page_count = instance.total_page_count();
        let mut fragments = Vec::new();
        for page_index in 0..page_count {
            let lines = instance
                .text_lines_for_page(page_index)
                .await
                .map_err(|e| ViewerError::Extraction(format!("{} page {}: {}", document_id, page_index, e)))?;

            if lines.is_empty() {
                fragments.push(TextFragment::empty_page(document_id, page_index));
            } else {
                fragments.extend(lines.into_iter().map(|line| {
                    TextFragment::new(document_id, page_index, line.text, line.bounding_box)
                }));
            }
        }

        if fragments.is_empty() {
            // A document without pages still needs a marker to count as extracted
            fragments.push(TextFragment::empty_page(document_id, 0));
        }

        debug!(document_id, page_count, fragments = fragments.len(), "Extracted document text");
        Ok(fragments)
    }

    /// Wait for every in-flight annotation save to finish.
    pub async fn flush_pending_saves(&self) {
        let handles: Vec<JoinHandle<()>> = match self.pending_saves.lock() {
            Ok(mut pending) => pending.drain(..).collect(),
            Err(_) => return,
        };
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Annotation save task failed");
            }
        }
    }

    /// Unload the live instance, if any.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        self.unload_locked(&mut inner).await;
        self.set_state(ViewerState::Empty);
    }

    async fn open_locked(&self, inner: &mut Inner, document_id: &str) -> Result<usize, ViewerError> {
        let meta = self
            .storage
            .get_document_meta(document_id)?
            .ok_or_else(|| ViewerError::DocumentNotFound(document_id.to_string()))?;

        inner.tabs.push(Tab::new(document_id, meta.title));
        let index = inner.tabs.len() - 1;
        inner.active = Some(index);
        info!(document_id, index, "Opened tab");

        self.reload_locked(inner, document_id).await?;
        Ok(index)
    }

    async fn focus_locked(&self, inner: &mut Inner, index: usize) -> Result<(), ViewerError> {
        let document_id = match inner.tabs.get(index) {
            Some(tab) => tab.document_id.clone(),
            None => {
                return Err(ViewerError::InvalidTabIndex {
                    index,
                    len: inner.tabs.len(),
                })
            }
        };
        inner.active = Some(index);
        self.reload_locked(inner, &document_id).await
    }

    async fn unload_locked(&self, inner: &mut Inner) {
        if let Some(loaded) = inner.loaded.take() {
            self.set_state(ViewerState::Unloading);
            let LoadedViewer {
                document_id,
                instance,
                subscription,
            } = loaded;
            drop(subscription);
            if let Err(e) = self.viewer.unload(instance).await {
                warn!(document_id = %document_id, error = %e, "Viewer unload failed");
            }
        }
    }

    async fn reload_locked(&self, inner: &mut Inner, document_id: &str) -> Result<(), ViewerError> {
        self.unload_locked(inner).await;

        let record = match self.storage.get_document(document_id) {
            Ok(Some(record)) => record,
            Ok(None) => {
                self.set_state(ViewerState::Empty);
                return Err(ViewerError::DocumentNotFound(document_id.to_string()));
            }
            Err(e) => {
                self.set_state(ViewerState::Empty);
                return Err(e.into());
            }
        };

        self.set_state(ViewerState::Loading);
        let request = LoadRequest {
            document_id: record.id.clone(),
            content: record.content,
            annotation_state: record.annotation_state,
            toolbar: self.toolbar.clone(),
        };
        let instance = match self.viewer.load(request).await {
            Ok(instance) => instance,
            Err(e) => {
                warn!(document_id, error = %e, "Viewer load failed");
                self.set_state(ViewerState::Empty);
                return Err(ViewerError::LoadFailure(format!("{}: {}", document_id, e)));
            }
        };

        let subscription =
            instance.subscribe_annotation_saved(self.save_listener(document_id, &instance));
        inner.loaded = Some(LoadedViewer {
            document_id: document_id.to_string(),
            instance,
            subscription,
        });
        self.set_state(ViewerState::Active);
        debug!(document_id, "Viewer active");
        Ok(())
    }

    async fn scroll_locked(&self, inner: &Inner, page_index: u32) {
        match inner.loaded.as_ref() {
            Some(loaded) => {
                if let Err(e) = loaded.instance.scroll_to_page(page_index).await {
                    warn!(document_id = %loaded.document_id, page_index, error = %e, "Scroll failed");
                }
            }
            None => debug!(page_index, "Scroll skipped, no viewer loaded"),
        }
    }

    /// Listener persisting the exported annotation state on every save.
    ///
    /// Runs as a detached task; failures are logged only.
    fn save_listener(
        &self,
        document_id: &str,
        instance: &Arc<dyn ViewerInstance>,
    ) -> AnnotationSavedListener {
        let instance: Weak<dyn ViewerInstance> = Arc::downgrade(instance);
        let storage = self.storage.clone();
        let pending = self.pending_saves.clone();
        let document_id = document_id.to_string();
        let runtime = Handle::try_current().ok();

        Arc::new(move || {
            let (Some(instance), Some(runtime)) = (instance.upgrade(), runtime.as_ref()) else {
                warn!(document_id = %document_id, "Annotation save dropped, viewer gone");
                return;
            };
            let storage = storage.clone();
            let document_id = document_id.clone();

            let handle = runtime.spawn(async move {
                let state = match instance.export_annotation_state().await {
                    Ok(state) => state,
                    Err(e) => {
                        warn!(document_id = %document_id, error = %e, "Annotation export failed");
                        return;
                    }
                };
                let patch = DocumentPatch::new().annotation_state(state);
                match storage.update_document(&document_id, &patch) {
                    Ok(()) => debug!(document_id = %document_id, "Annotation state saved"),
                    Err(e) => warn!(document_id = %document_id, error = %e, "Annotation save failed"),
                }
            });

            if let Ok(mut pending) = pending.lock() {
                pending.retain(|h| !h.is_finished());
                pending.push(handle);
            }
        })
    }
}
