//! # folio-types
//!
//! Shared domain types for the Folio note/PDF workspace.
//!
//! This crate defines the data structures passed between the store, the
//! sync coordinator, the viewer lifecycle manager and the indexing pipeline:
//! - Documents: PDF binaries plus their mutable annotation state
//! - Fragments: extracted text runs tied to a page and a bounding box
//! - Tabs and internal links: in-session navigation state
//! - Change log entries: the replication unit exchanged with peers
//! - Settings: layered configuration
//!
//! ## Usage
//!
//! ```rust
//! use folio_types::InternalLink;
//!
//! let link: InternalLink = "d1@2".parse().unwrap();
//! assert_eq!(link.document_id, "d1");
//! assert_eq!(link.page, Some(2));
//! ```

pub mod change;
pub mod config;
pub mod document;
pub mod error;
pub mod link;
pub mod sync;
pub mod tab;

pub use change::{ChangeEntry, ChangeKind, RemoteChange};
pub use config::{SeedEntry, Settings};
pub use document::{BoundingBox, DocumentField, DocumentPatch, DocumentRecord, TextFragment};
pub use error::FolioError;
pub use link::{InternalLink, Link};
pub use sync::SyncStatus;
pub use tab::Tab;
