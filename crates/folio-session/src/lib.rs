//! Session wiring for folio.
//!
//! A [`Session`] owns one store, one viewer lifecycle manager, one query
//! service and, when an endpoint is configured, one sync coordinator. It is
//! constructed by an ordered startup pipeline:
//!
//! 1. Open the store (fatal on failure)
//! 2. Connect sync (failure logged, the store stays usable)
//! 3. Seed an empty store
//! 4. Run the indexing pipeline (failure recorded, retryable)

pub mod error;
pub mod search_bar;
pub mod seed;
pub mod session;

pub use error::SessionError;
pub use search_bar::SearchBar;
pub use seed::{reseed, seed_store};
pub use session::{Session, StartupReport};
