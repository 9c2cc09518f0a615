//! folio command-line library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations over a local store

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands};
pub use commands::{
    compact, init_logging, load_settings, run_search, run_seed, show_fragments, show_link,
    show_stats,
};
