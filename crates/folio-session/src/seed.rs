//! First-run seeding from a fixed list of bundled PDFs.
//!
//! Each entry becomes a document whose id is its filename, with content
//! read from the assets directory.

use std::path::Path;

use tracing::{info, warn};

use folio_storage::Storage;
use folio_types::{DocumentRecord, SeedEntry};

use crate::error::SessionError;

fn load_records(entries: &[SeedEntry], assets_dir: &Path) -> Result<Vec<DocumentRecord>, SessionError> {
    entries
        .iter()
        .map(|entry| {
            let path = assets_dir.join(&entry.filename);
            let content = std::fs::read(&path).map_err(|e| SessionError::Seed {
                filename: entry.filename.clone(),
                reason: e.to_string(),
            })?;
            Ok(DocumentRecord::new(
                entry.filename.clone(),
                entry.filename.clone(),
                entry.title.clone(),
                content,
            ))
        })
        .collect()
}

/// Populate `storage` from `entries` if it holds no documents.
///
/// Every seed file is read before anything is written, so a missing file
/// leaves the store untouched. Returns the number of documents added.
pub fn seed_store(
    storage: &Storage,
    entries: &[SeedEntry],
    assets_dir: &Path,
) -> Result<usize, SessionError> {
    if !storage.is_empty()? {
        return Ok(0);
    }
    if entries.is_empty() {
        warn!("Store is empty and no seed entries are configured");
        return Ok(0);
    }

    let records = load_records(entries, assets_dir)?;
    storage.bulk_add_documents(&records)?;
    info!(count = records.len(), "Seeded document store");
    Ok(records.len())
}

/// Clear every document and seed again.
///
/// Fragments of the cleared documents go with them, so the next indexing
/// run extracts the seeded documents from scratch.
pub fn reseed(
    storage: &Storage,
    entries: &[SeedEntry],
    assets_dir: &Path,
) -> Result<usize, SessionError> {
    // Read first so a bad seed list does not wipe the store
    let records = load_records(entries, assets_dir)?;
    let cleared = storage.clear_documents()?;
    storage.bulk_add_documents(&records)?;
    info!(cleared, seeded = records.len(), "Reseeded document store");
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_types::{BoundingBox, TextFragment};
    use tempfile::TempDir;

    fn assets(files: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for file in files {
            std::fs::write(dir.path().join(file), format!("%PDF {}", file)).unwrap();
        }
        dir
    }

    fn entries() -> Vec<SeedEntry> {
        vec![
            SeedEntry::new("d1.pdf", "Doc One"),
            SeedEntry::new("d2.pdf", "Doc Two"),
        ]
    }

    #[test]
    fn test_seed_empty_store() {
        let db = TempDir::new().unwrap();
        let assets = assets(&["d1.pdf", "d2.pdf"]);
        let storage = Storage::open(db.path()).unwrap();

        let added = seed_store(&storage, &entries(), assets.path()).unwrap();

        assert_eq!(added, 2);
        let record = storage.get_document("d1.pdf").unwrap().unwrap();
        assert_eq!(record.title, "Doc One");
        assert_eq!(record.content, b"%PDF d1.pdf".to_vec());
        assert!(record.annotation_state.is_none());
    }

    #[test]
    fn test_seed_skips_populated_store() {
        let db = TempDir::new().unwrap();
        let assets = assets(&["d1.pdf", "d2.pdf"]);
        let storage = Storage::open(db.path()).unwrap();
        seed_store(&storage, &entries(), assets.path()).unwrap();

        assert_eq!(seed_store(&storage, &entries(), assets.path()).unwrap(), 0);
        assert_eq!(storage.document_count().unwrap(), 2);
    }

    #[test]
    fn test_missing_seed_file_writes_nothing() {
        let db = TempDir::new().unwrap();
        let assets = assets(&["d1.pdf"]);
        let storage = Storage::open(db.path()).unwrap();

        let err = seed_store(&storage, &entries(), assets.path()).unwrap_err();

        assert!(matches!(err, SessionError::Seed { ref filename, .. } if filename == "d2.pdf"));
        assert!(storage.is_empty().unwrap());
    }

    #[test]
    fn test_reseed_replaces_documents_and_fragments() {
        let db = TempDir::new().unwrap();
        let assets = assets(&["d1.pdf", "d2.pdf", "other.pdf"]);
        let storage = Storage::open(db.path()).unwrap();
        seed_store(&storage, &entries(), assets.path()).unwrap();
        storage
            .bulk_upsert_fragments(vec![TextFragment::new(
                "d1.pdf",
                0,
                "text",
                BoundingBox::default(),
            )])
            .unwrap();

        let added = reseed(&storage, &[SeedEntry::new("other.pdf", "Other")], assets.path()).unwrap();

        assert_eq!(added, 1);
        assert!(storage.get_document("d1.pdf").unwrap().is_none());
        assert!(storage.get_document("other.pdf").unwrap().is_some());
        assert!(storage.all_fragments().unwrap().is_empty());
    }
}
