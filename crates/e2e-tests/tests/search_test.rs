//! E2E tests for the indexing pipeline and the query service.
//!
//! Extraction runs through the mock viewer, results come back through
//! the query service.

use e2e_tests::TestHarness;
use pretty_assertions::assert_eq;

use folio_search::SearchError;
use folio_types::BoundingBox;

fn lines(pages: &[&[&str]]) -> Vec<Vec<String>> {
    pages
        .iter()
        .map(|page| page.iter().map(|line| line.to_string()).collect())
        .collect()
}

#[tokio::test]
async fn test_search_finds_extracted_line() {
    let harness = TestHarness::with_documents(&[("d1", "Doc One")]);
    harness.viewer.set_pages("d1", lines(&[&["hello world"]]));

    harness.pipeline.run().await.unwrap();
    let results = harness.query.search("hello").unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].document_id, "d1");
    assert_eq!(results[0].page_index, 0);
    assert_eq!(results[0].title, "Doc One");
    assert_eq!(results[0].text, "hello world");
    assert_eq!(results[0].bounding_box, BoundingBox::new(36.0, 72.0, 480.0, 12.0));
    assert!(results[0].relevance_score > 0.0);
}

#[tokio::test]
async fn test_empty_query_returns_nothing_in_any_state() {
    let harness = TestHarness::with_documents(&[("d1", "Doc One")]);

    assert!(harness.query.search("").unwrap().is_empty());
    assert!(matches!(harness.query.search("page"), Err(SearchError::NotReady)));

    harness.pipeline.run().await.unwrap();
    assert!(harness.query.search("").unwrap().is_empty());
    assert!(!harness.query.search("page").unwrap().is_empty());
}

#[tokio::test]
async fn test_results_ranked_by_relevance() {
    let harness = TestHarness::with_documents(&[("d1", "Doc One"), ("d2", "Doc Two")]);
    harness
        .viewer
        .set_pages("d1", lines(&[&["rust borrow checker"], &["unrelated text"]]));
    harness
        .viewer
        .set_pages("d2", lines(&[&["rust rust rust"], &["more rust"]]));

    harness.pipeline.run().await.unwrap();
    let results = harness.query.search("rust").unwrap();

    assert_eq!(results.len(), 3);
    assert!(results
        .windows(2)
        .all(|pair| pair[0].relevance_score >= pair[1].relevance_score));
}

#[tokio::test]
async fn test_title_matches_every_line_of_document() {
    let harness = TestHarness::with_documents(&[("d1", "Quarterly Report"), ("d2", "Notes")]);

    harness.pipeline.run().await.unwrap();
    let results = harness.query.search("quarterly").unwrap();

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.document_id == "d1"));
}

#[tokio::test]
async fn test_pipeline_is_idempotent() {
    let harness = TestHarness::with_documents(&[("d1", "Doc One"), ("d2", "Doc Two")]);
    harness
        .viewer
        .set_pages("d2", lines(&[&["first"], &[], &["third", "page"]]));

    let first = harness.pipeline.run().await.unwrap();
    let fragments = harness.storage.all_fragments().unwrap();
    let loads = harness.viewer.loaded_documents().len();

    let second = harness.pipeline.run().await.unwrap();

    assert_eq!(first.extracted, 2);
    assert_eq!(second.extracted, 0);
    assert_eq!(second.fragments_created, 0);
    assert_eq!(harness.storage.all_fragments().unwrap(), fragments);
    assert_eq!(harness.viewer.loaded_documents().len(), loads);

    // Every page of an indexed document has at least one fragment
    let pages: Vec<u32> = harness
        .storage
        .fragments_for_document("d2")
        .unwrap()
        .iter()
        .map(|f| f.page_index)
        .collect();
    assert_eq!(pages, vec![0, 1, 2, 2]);
}

#[tokio::test]
async fn test_failed_extraction_leaves_document_unindexed() {
    let harness = TestHarness::with_documents(&[("d1", "Doc One"), ("d2", "Doc Two")]);
    harness.viewer.fail_document("d1");

    let report = harness.pipeline.run().await.unwrap();

    assert_eq!(report.failed, vec!["d1".to_string()]);
    assert!(harness.storage.fragments_for_document("d1").unwrap().is_empty());
    assert!(harness.query.search("d1").unwrap().is_empty());
    assert_eq!(harness.query.search("d2").unwrap().len(), 2);
}

#[tokio::test]
async fn test_deleted_document_hits_are_dropped() {
    let harness = TestHarness::with_documents(&[("d1", "Doc One"), ("d2", "Doc Two")]);
    harness.pipeline.run().await.unwrap();
    assert_eq!(harness.query.search("page").unwrap().len(), 4);

    // The installed index still holds d1 until the next run
    harness.storage.delete_document("d1").unwrap();
    let results = harness.query.search("page").unwrap();

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.document_id == "d2"));
}

#[tokio::test]
async fn test_open_result_restores_prior_tab_after_indexing() {
    let harness = TestHarness::with_documents(&[("d1", "Doc One"), ("d2", "Doc Two")]);
    harness.lifecycle.open_new_tab("d2").await.unwrap();

    harness.pipeline.run().await.unwrap();

    assert_eq!(harness.lifecycle.current_tab().await.unwrap().document_id, "d2");
    assert_eq!(harness.viewer.max_live_instances(), 1);

    let hit = harness.query.search("d1").unwrap().remove(0);
    let link = folio_types::InternalLink::new(hit.document_id.clone(), Some(hit.page_index));
    harness.lifecycle.open_internal_link(&link.to_string()).await.unwrap();
    assert_eq!(harness.lifecycle.current_tab().await.unwrap().document_id, "d1");
}
