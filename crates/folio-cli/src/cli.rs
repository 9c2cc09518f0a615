//! CLI argument parsing for folio.
//!
//! CLI flags override all other config sources.

use clap::{Parser, Subcommand};

/// folio
///
/// Administration and search over a local PDF document store.
#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/folio/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Override database path
    #[arg(long, global = true)]
    pub db_path: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Populate an empty store from the configured seed list
    Seed {
        /// Clear every document first
        #[arg(long)]
        reset: bool,
    },

    /// Show database statistics
    Stats,

    /// Trigger RocksDB compaction
    Compact,

    /// Search extracted text
    Search {
        query: String,

        /// Maximum results (default from config)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Resolve an internal link such as `doc.pdf@2`
    Link { link: String },

    /// List the extracted fragments of a document
    Fragments { document_id: String },
}
