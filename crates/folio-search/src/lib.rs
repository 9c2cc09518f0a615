//! # folio-search
//!
//! Full-text search over extracted PDF text using Tantivy.
//!
//! The index is a disposable in-RAM cache rebuilt from persisted fragments.
//! Every hit is resolved back through the store, so a fragment or document
//! deleted after the build never reaches the caller.
//!
//! ## Features
//! - Two indexed fields per fragment: document title and fragment text
//! - BM25 scoring with deterministic tie-breaking
//! - Lenient query parsing, so user input never fails a search

pub mod document;
pub mod error;
pub mod index;
pub mod schema;
pub mod searcher;

pub use document::fragment_to_doc;
pub use error::SearchError;
pub use index::{IndexHit, SearchIndex};
pub use schema::{build_fragment_schema, FragmentSchema};
pub use searcher::{QueryService, SearchResult, DEFAULT_SEARCH_LIMIT};
