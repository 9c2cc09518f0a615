//! Viewer lifecycle management for folio.
//!
//! The PDF engine and the rich-text editor are opaque collaborators behind
//! the [`ViewerService`], [`ViewerInstance`] and [`EditorService`] traits.
//! [`ViewerLifecycleManager`] owns the tab list and the single live viewer
//! instance; [`NoteLinker`] couples it to the editor through internal links.

pub mod editor;
pub mod error;
pub mod lifecycle;
pub mod mock;
pub mod service;

pub use editor::{ClickTarget, EditorSelection, EditorService, NoteLinker, INTERNAL_LINK_ATTR};
pub use error::ViewerError;
pub use lifecycle::{TabSnapshot, ViewerLifecycleManager, ViewerState};
pub use service::{
    AnnotationSavedListener, LoadRequest, Subscription, TextLine, ToolbarConfig, ToolbarItem,
    ViewerInstance, ViewerService, LINK_CURRENT_PAGE,
};
