//! Indexing pipeline for extracted PDF text.
//!
//! Documents without fragments are opened one at a time through the viewer
//! lifecycle manager, their pages' text lines are extracted, and the new
//! fragments are persisted in a single batch. The search index is then
//! rebuilt over every persisted fragment and installed in the query service.
//!
//! ## Key Components
//!
//! - [`IndexingPipeline`]: Runs extraction and index builds, one run at a time
//! - [`IndexingReport`]: Counters describing one run
//! - [`IndexingError`]: Error types for indexing operations

pub mod error;
pub mod pipeline;
pub mod report;

pub use error::IndexingError;
pub use pipeline::IndexingPipeline;
pub use report::IndexingReport;
