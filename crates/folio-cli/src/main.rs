//! folio
//!
//! Administration and search over a local folio document store.
//!
//! # Usage
//!
//! ```bash
//! folio seed [--reset]
//! folio stats
//! folio compact
//! folio search <QUERY> [--limit N]
//! folio link <INTERNAL_LINK>
//! folio fragments <DOCUMENT_ID>
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/folio/config.toml)
//! 3. Environment variables (FOLIO_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use folio_cli::{
    compact, init_logging, load_settings, run_search, run_seed, show_fragments, show_link,
    show_stats, Cli, Commands,
};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(
        cli.config.as_deref(),
        cli.db_path.as_deref(),
        cli.log_level.as_deref(),
    )?;
    init_logging(&settings.log_level)?;

    match cli.command {
        Commands::Seed { reset } => run_seed(&settings, reset),
        Commands::Stats => show_stats(&settings),
        Commands::Compact => compact(&settings),
        Commands::Search { query, limit } => run_search(&settings, &query, limit),
        Commands::Link { link } => show_link(&settings, &link),
        Commands::Fragments { document_id } => show_fragments(&settings, &document_id),
    }
}
