//! Command implementations for folio.
//!
//! Every command opens the configured store directly; none of them needs a
//! PDF engine, so search runs against fragments persisted by earlier
//! indexing runs.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use folio_search::{QueryService, SearchIndex, SearchResult};
use folio_session::{reseed, seed_store};
use folio_storage::Storage;
use folio_types::{InternalLink, Link, Settings};

/// Load settings and apply CLI overrides (highest precedence).
pub fn load_settings(
    config_path: Option<&str>,
    db_path_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;
    if let Some(db_path) = db_path_override {
        settings.db_path = db_path.to_string();
    }
    if let Some(log_level) = log_level_override {
        settings.log_level = log_level.to_string();
    }
    Ok(settings)
}

/// Install the global tracing subscriber. `RUST_LOG` wins over `log_level`.
pub fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

fn open_storage(settings: &Settings) -> Result<Arc<Storage>> {
    let db_path = settings.expanded_db_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    info!(path = ?db_path, "Opening storage");
    let storage = Storage::open(&db_path).context("Failed to open storage")?;
    Ok(Arc::new(storage))
}

/// Open the store for inspection without taking its lock.
fn open_storage_read_only(settings: &Settings) -> Result<Arc<Storage>> {
    let db_path = settings.expanded_db_path();
    info!(path = ?db_path, "Opening storage read-only");
    let storage = Storage::open_read_only(&db_path).context("Failed to open storage")?;
    Ok(Arc::new(storage))
}

/// Seed the store; with `reset`, clear it first.
pub fn run_seed(settings: &Settings, reset: bool) -> Result<()> {
    let storage = open_storage(settings)?;
    let assets_dir = settings.expanded_assets_dir();
    let added = if reset {
        reseed(&storage, &settings.seed, &assets_dir).context("Failed to reseed store")?
    } else {
        seed_store(&storage, &settings.seed, &assets_dir).context("Failed to seed store")?
    };

    if added == 0 {
        println!("Store already populated, nothing seeded");
    } else {
        println!("Seeded {} documents from {:?}", added, assets_dir);
    }
    storage.flush().context("Failed to flush storage")?;
    Ok(())
}

pub fn show_stats(settings: &Settings) -> Result<()> {
    let storage = open_storage(settings)?;
    let stats = storage.get_stats().context("Failed to read stats")?;

    println!("Database: {:?}", settings.expanded_db_path());
    println!("Replica:  {}", storage.replica_id());
    println!("Documents:       {}", stats.document_count);
    println!("Fragments:       {}", stats.fragment_count);
    println!("Pending changes: {}", stats.pending_changes);
    println!("Log head:        {}", stats.log_head);
    println!("Disk usage:      {} bytes", stats.disk_usage_bytes);
    Ok(())
}

pub fn compact(settings: &Settings) -> Result<()> {
    let storage = open_storage(settings)?;
    storage.compact().context("Compaction failed")?;
    println!("Compaction complete");
    Ok(())
}

/// Build an index over persisted fragments and run `query` against it.
pub fn search_store(storage: &Arc<Storage>, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
    let titles: HashMap<String, String> = storage
        .list_documents()?
        .into_iter()
        .map(|meta| (meta.id, meta.title))
        .collect();
    let index = SearchIndex::build(&storage.all_fragments()?, &titles)
        .context("Failed to build search index")?;

    let service = QueryService::new(storage.clone());
    service.install(index);
    Ok(service.search_with_limit(query, limit)?)
}

pub fn run_search(settings: &Settings, query: &str, limit: Option<usize>) -> Result<()> {
    let storage = open_storage_read_only(settings)?;
    let results = search_store(&storage, query, limit.unwrap_or(settings.search_limit))?;

    if results.is_empty() {
        println!("No results for {:?}", query);
        return Ok(());
    }
    for result in &results {
        let link = Link::for_document(&result.document_id, Some(result.page_index));
        println!(
            "{:>8.3}  {}  [{}]  {}",
            result.relevance_score, result.title, link.internal, result.text
        );
    }
    println!("{} results", results.len());
    Ok(())
}

/// Parse an internal link and report what it points at.
pub fn show_link(settings: &Settings, raw: &str) -> Result<()> {
    let link = InternalLink::parse(raw).context("Invalid internal link")?;
    let storage = open_storage_read_only(settings)?;
    let display = Link::for_document(&link.document_id, link.page);

    println!("Document: {}", link.document_id);
    match link.page {
        Some(page) => println!("Page:     {} (index {})", page + 1, page),
        None => println!("Page:     -"),
    }
    println!("Text:     {}", display.text);
    match storage.get_document_meta(&link.document_id)? {
        Some(meta) => println!("Title:    {} ({})", meta.title, meta.filename),
        None => println!("Title:    unknown document"),
    }
    Ok(())
}

pub fn show_fragments(settings: &Settings, document_id: &str) -> Result<()> {
    let storage = open_storage_read_only(settings)?;
    let fragments = storage
        .fragments_for_document(document_id)
        .context("Failed to read fragments")?;

    if fragments.is_empty() {
        println!("No fragments for {} (not indexed yet?)", document_id);
        return Ok(());
    }
    for fragment in &fragments {
        let b = fragment.bounding_box;
        println!(
            "p{:<4} [{:.1}, {:.1}, {:.1}, {:.1}]  {}",
            fragment.page_index, b.left, b.top, b.width, b.height, fragment.text
        );
    }
    println!("{} fragments", fragments.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_types::{BoundingBox, DocumentRecord, TextFragment};
    use tempfile::TempDir;

    fn settings_for(dir: &TempDir) -> Settings {
        Settings {
            db_path: dir.path().join("db").to_string_lossy().to_string(),
            assets_dir: dir.path().join("assets").to_string_lossy().to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_search_store_uses_persisted_fragments() {
        let dir = TempDir::new().unwrap();
        let storage = open_storage(&settings_for(&dir)).unwrap();
        storage
            .bulk_add_documents(&[DocumentRecord::new("d1", "d1.pdf", "Doc One", b"%PDF".to_vec())])
            .unwrap();
        storage
            .bulk_upsert_fragments(vec![TextFragment::new(
                "d1",
                0,
                "hello world",
                BoundingBox::default(),
            )])
            .unwrap();

        let results = search_store(&storage, "hello", 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document_id, "d1");
        assert_eq!(results[0].page_index, 0);
    }

    #[test]
    fn test_seed_reads_assets_dir() {
        let dir = TempDir::new().unwrap();
        let settings = settings_for(&dir);
        std::fs::create_dir_all(settings.expanded_assets_dir()).unwrap();
        std::fs::write(settings.expanded_assets_dir().join("dummy.pdf"), b"%PDF").unwrap();

        run_seed(&settings, false).unwrap();

        let storage = open_storage(&settings).unwrap();
        assert_eq!(storage.document_count().unwrap(), 1);
    }

    #[test]
    fn test_inspection_reads_store_held_open() {
        let dir = TempDir::new().unwrap();
        let settings = settings_for(&dir);
        let writer = open_storage(&settings).unwrap();
        writer
            .bulk_add_documents(&[DocumentRecord::new("d1", "d1.pdf", "Doc One", b"%PDF".to_vec())])
            .unwrap();
        writer.flush().unwrap();

        show_fragments(&settings, "d1").unwrap();
        show_link(&settings, "d1@0").unwrap();
    }

    #[test]
    fn test_inspection_of_missing_store_fails() {
        let dir = TempDir::new().unwrap();
        assert!(show_fragments(&settings_for(&dir), "d1").is_err());
    }

    #[test]
    fn test_show_link_rejects_malformed_link() {
        let dir = TempDir::new().unwrap();
        assert!(show_link(&settings_for(&dir), "d1@x").is_err());
    }
}
