//! Query service resolving index hits to document pages.
//!
//! Hits are resolved through the store after ranking. A hit whose fragment
//! or document has since been deleted is dropped, never surfaced as an error.

use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::{debug, info};

use folio_storage::Storage;
use folio_types::BoundingBox;

use crate::error::SearchError;
use crate::index::{IndexHit, SearchIndex};

/// Default maximum number of results per query.
pub const DEFAULT_SEARCH_LIMIT: usize = 50;

/// A resolved search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub title: String,
    pub document_id: String,
    /// 0-based
    pub page_index: u32,
    pub bounding_box: BoundingBox,
    pub text: String,
    /// BM25 score
    pub relevance_score: f32,
}

/// Executes searches against the most recently installed index.
pub struct QueryService {
    storage: Arc<Storage>,
    index: RwLock<Option<Arc<SearchIndex>>>,
    limit: usize,
}

impl QueryService {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            index: RwLock::new(None),
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Replace the active index.
    pub fn install(&self, index: SearchIndex) {
        let num_docs = index.num_docs();
        if let Ok(mut slot) = self.index.write() {
            *slot = Some(Arc::new(index));
            info!(num_docs, "Search index installed");
        }
    }

    /// Whether an index has been installed.
    pub fn is_ready(&self) -> bool {
        self.index.read().map(|slot| slot.is_some()).unwrap_or(false)
    }

    pub fn indexed_fragments(&self) -> u64 {
        self.current().map(|index| index.num_docs()).unwrap_or(0)
    }

    fn current(&self) -> Option<Arc<SearchIndex>> {
        self.index.read().ok().and_then(|slot| slot.clone())
    }

    /// Search with the configured limit.
    pub fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        self.search_with_limit(query, self.limit)
    }

    /// Search and resolve up to `limit` hits.
    ///
    /// Ordered by descending score, then ascending document id and page.
    /// An empty or whitespace-only query returns nothing without touching
    /// the index.
    pub fn search_with_limit(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let index = self.current().ok_or(SearchError::NotReady)?;

        let hits = index.query(query, limit)?;
        let mut results = Vec::with_capacity(hits.len());
        let mut stale = 0usize;
        for hit in hits {
            match self.resolve(&hit) {
                Ok(result) => results.push(result),
                Err(SearchError::StaleReference(reference)) => {
                    debug!(reference = %reference, "Dropping stale search hit");
                    stale += 1;
                }
                Err(e) => return Err(e),
            }
        }

        results.sort_by(|a, b| {
            b.relevance_score
                .total_cmp(&a.relevance_score)
                .then_with(|| a.document_id.cmp(&b.document_id))
                .then_with(|| a.page_index.cmp(&b.page_index))
        });
        results.truncate(limit);

        info!(query, results = results.len(), stale, "Search complete");
        Ok(results)
    }

    fn resolve(&self, hit: &IndexHit) -> Result<SearchResult, SearchError> {
        let fragment = self
            .storage
            .get_fragment(&hit.fragment_id)?
            .ok_or_else(|| SearchError::StaleReference(hit.fragment_id.clone()))?;
        let meta = self
            .storage
            .get_document_meta(&fragment.document_id)?
            .ok_or_else(|| SearchError::StaleReference(fragment.document_id.clone()))?;

        Ok(SearchResult {
            title: meta.title,
            document_id: fragment.document_id,
            page_index: fragment.page_index,
            bounding_box: fragment.bounding_box,
            text: fragment.text,
            relevance_score: hit.score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_types::{DocumentRecord, TextFragment};
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Arc<Storage>) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(temp_dir.path()).unwrap());
        storage
            .bulk_add_documents(&[
                DocumentRecord::new("d1", "d1.pdf", "Doc One", b"%PDF".to_vec()),
                DocumentRecord::new("d2", "d2.pdf", "Doc Two", b"%PDF".to_vec()),
            ])
            .unwrap();
        (temp_dir, storage)
    }

    fn build(storage: &Storage) -> SearchIndex {
        let titles: HashMap<String, String> = storage
            .list_documents()
            .unwrap()
            .into_iter()
            .map(|meta| (meta.id, meta.title))
            .collect();
        SearchIndex::build(&storage.all_fragments().unwrap(), &titles).unwrap()
    }

    fn bbox() -> BoundingBox {
        BoundingBox::new(10.0, 20.0, 200.0, 12.0)
    }

    #[test]
    fn test_search_resolves_page() {
        let (_temp, storage) = setup();
        storage
            .bulk_upsert_fragments(vec![
                TextFragment::new("d1", 0, "hello world", bbox()),
                TextFragment::new("d1", 1, "something else", bbox()),
            ])
            .unwrap();
        let service = QueryService::new(storage.clone());
        service.install(build(&storage));

        let results = service.search("hello").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document_id, "d1");
        assert_eq!(results[0].page_index, 0);
        assert_eq!(results[0].title, "Doc One");
        assert_eq!(results[0].bounding_box, bbox());
    }

    #[test]
    fn test_empty_query_without_index() {
        let (_temp, storage) = setup();
        let service = QueryService::new(storage);

        assert!(!service.is_ready());
        assert!(service.search("").unwrap().is_empty());
        assert!(service.search(" \t ").unwrap().is_empty());
        assert!(matches!(service.search("hello"), Err(SearchError::NotReady)));
    }

    #[test]
    fn test_stale_hits_dropped() {
        let (_temp, storage) = setup();
        storage
            .bulk_upsert_fragments(vec![
                TextFragment::new("d1", 0, "shared term", bbox()),
                TextFragment::new("d2", 0, "shared term", bbox()),
            ])
            .unwrap();
        let service = QueryService::new(storage.clone());
        service.install(build(&storage));

        storage.delete_document("d2").unwrap();

        let results = service.search("shared").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document_id, "d1");
    }

    #[test]
    fn test_ties_ordered_by_document_then_page() {
        let (_temp, storage) = setup();
        storage
            .bulk_upsert_fragments(vec![
                TextFragment::new("d2", 0, "alpha", bbox()),
                TextFragment::new("d1", 3, "alpha", bbox()),
                TextFragment::new("d1", 1, "alpha", bbox()),
            ])
            .unwrap();
        let service = QueryService::new(storage.clone());
        service.install(build(&storage));

        let results = service.search("alpha").unwrap();
        let order: Vec<(&str, u32)> = results
            .iter()
            .map(|r| (r.document_id.as_str(), r.page_index))
            .collect();
        assert_eq!(order, vec![("d1", 1), ("d1", 3), ("d2", 0)]);
    }

    #[test]
    fn test_limit_keeps_lowest_document_and_page_among_ties() {
        let (_temp, storage) = setup();
        storage
            .bulk_upsert_fragments(vec![
                TextFragment::new("d2", 0, "alpha", bbox()),
                TextFragment::new("d2", 4, "alpha", bbox()),
                TextFragment::new("d1", 3, "alpha", bbox()),
                TextFragment::new("d1", 1, "alpha", bbox()),
            ])
            .unwrap();
        let service = QueryService::new(storage.clone());
        service.install(build(&storage));

        for limit in 1..=3 {
            let results = service.search_with_limit("alpha", limit).unwrap();
            let order: Vec<(&str, u32)> = results
                .iter()
                .map(|r| (r.document_id.as_str(), r.page_index))
                .collect();
            let expected = [("d1", 1), ("d1", 3), ("d2", 0)];
            assert_eq!(order, expected[..limit].to_vec());
        }
    }

    #[test]
    fn test_limit() {
        let (_temp, storage) = setup();
        let fragments = (0..5)
            .map(|page| TextFragment::new("d1", page, "repeated", bbox()))
            .collect();
        storage.bulk_upsert_fragments(fragments).unwrap();
        let service = QueryService::new(storage.clone()).with_limit(2);
        service.install(build(&storage));

        assert_eq!(service.search("repeated").unwrap().len(), 2);
        assert_eq!(service.indexed_fragments(), 5);
    }
}
