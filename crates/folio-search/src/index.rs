//! In-RAM Tantivy index over text fragments.
//!
//! Built once from a fragment set and then read-only; a rebuild replaces the
//! whole index.

use std::collections::HashMap;

use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, Value};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument};
use tracing::{debug, info};

use folio_types::TextFragment;

use crate::document::fragment_to_doc;
use crate::error::SearchError;
use crate::schema::{build_fragment_schema, FragmentSchema};

/// Memory budget for the build writer (50MB)
const WRITER_MEMORY_BYTES: usize = 50 * 1024 * 1024;

/// A raw index hit before store resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub fragment_id: String,
    pub document_id: String,
    pub score: f32,
}

/// Read-only fragment index.
pub struct SearchIndex {
    schema: FragmentSchema,
    reader: IndexReader,
    query_parser: QueryParser,
    num_docs: u64,
}

impl SearchIndex {
    /// Build an index over `fragments`, titling each by its document.
    ///
    /// Fragments with empty text, without an id, or whose document has no
    /// entry in `titles` are not indexed.
    pub fn build(
        fragments: &[TextFragment],
        titles: &HashMap<String, String>,
    ) -> Result<Self, SearchError> {
        let schema = build_fragment_schema();
        let index = Index::create_in_ram(schema.schema().clone());

        let mut writer: IndexWriter = index.writer_with_num_threads(1, WRITER_MEMORY_BYTES)?;
        let mut skipped = 0usize;
        for fragment in fragments {
            if fragment.text.trim().is_empty() {
                continue;
            }
            let doc = titles
                .get(&fragment.document_id)
                .and_then(|title| fragment_to_doc(&schema, fragment, title));
            match doc {
                Some(doc) => {
                    writer.add_document(doc)?;
                }
                None => skipped += 1,
            }
        }
        writer.commit()?;

        let reader: IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        let num_docs = reader.searcher().num_docs();
        let query_parser = QueryParser::for_index(&index, vec![schema.title, schema.text]);

        if skipped > 0 {
            debug!(skipped, "Skipped fragments without id or document");
        }
        info!(num_docs, "Built search index");

        Ok(Self {
            schema,
            reader,
            query_parser,
            num_docs,
        })
    }

    /// An index with no documents.
    pub fn empty() -> Result<Self, SearchError> {
        Self::build(&[], &HashMap::new())
    }

    pub fn num_docs(&self) -> u64 {
        self.num_docs
    }

    /// Run `query` and return the best `limit` hits by descending score,
    /// plus every further hit scoring equal to the last of them.
    ///
    /// Tied hits at the cut are all returned so the caller can order them
    /// by document and page before truncating. Parsing is lenient:
    /// malformed syntax degrades to whatever terms parse.
    pub fn query(&self, query: &str, limit: usize) -> Result<Vec<IndexHit>, SearchError> {
        if query.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let (parsed, errors) = self.query_parser.parse_query_lenient(query);
        if !errors.is_empty() {
            debug!(query, errors = errors.len(), "Query parsed leniently");
        }

        let searcher = self.reader.searcher();
        let mut fetch = limit;
        let mut top_docs = loop {
            let top_docs = searcher.search(&parsed, &TopDocs::with_limit(fetch))?;
            let exhausted = top_docs.len() < fetch;
            // Ties with the last kept hit may run past the fetched window
            if exhausted || top_docs[fetch - 1].0 < top_docs[limit - 1].0 {
                break top_docs;
            }
            fetch = fetch.saturating_mul(2);
        };
        if let Some(&(cutoff, _)) = top_docs.get(limit - 1) {
            top_docs.retain(|(score, _)| *score >= cutoff);
        }

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            let stored = |field: Field| {
                doc.get_first(field)
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
            };
            if let (Some(fragment_id), Some(document_id)) = (
                stored(self.schema.fragment_id),
                stored(self.schema.document_id),
            ) {
                hits.push(IndexHit {
                    fragment_id,
                    document_id,
                    score,
                });
            }
        }
        Ok(hits)
    }
}
