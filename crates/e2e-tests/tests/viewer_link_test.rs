//! E2E tests for internal links and the viewer lifecycle.
//!
//! Verifies that links resolve to the right tab and page, that a
//! link without a page never scrolls, and that concurrent opens never
//! leave two live viewer instances.

use std::sync::Arc;

use e2e_tests::TestHarness;
use pretty_assertions::assert_eq;

use folio_types::{Link, Tab};
use folio_viewer::mock::MockEditor;
use folio_viewer::{ClickTarget, NoteLinker, ViewerError, ViewerState, INTERNAL_LINK_ATTR};

#[tokio::test]
async fn test_link_for_tab_page() {
    let harness = TestHarness::new();
    let tab = Tab::new("d1", "d1");

    let link = harness.lifecycle.get_link_for(&tab, Some(2));

    assert_eq!(
        link,
        Link {
            internal: "d1@2".to_string(),
            text: "d1 (page 3)".to_string(),
        }
    );
}

#[tokio::test]
async fn test_link_with_page_focuses_document_and_scrolls_once() {
    for page in [0u32, 1, 5] {
        let harness = TestHarness::with_documents(&[("d1", "Doc One"), ("d2", "Doc Two")]);
        harness.lifecycle.open_new_tab("d1").await.unwrap();

        harness
            .lifecycle
            .open_internal_link(&format!("d2@{}", page))
            .await
            .unwrap();

        let tab = harness.lifecycle.current_tab().await.unwrap();
        assert_eq!(tab.document_id, "d2");
        assert_eq!(harness.viewer.scroll_calls(), vec![("d2".to_string(), page)]);
    }
}

#[tokio::test]
async fn test_link_without_page_never_scrolls() {
    let harness = TestHarness::with_documents(&[("d1", "Doc One"), ("d2", "Doc Two")]);

    harness.lifecycle.open_internal_link("d2").await.unwrap();
    harness.lifecycle.open_internal_link("d1").await.unwrap();
    harness.lifecycle.open_internal_link("d2").await.unwrap();

    assert!(harness.viewer.scroll_calls().is_empty());
    // Existing tabs are reused
    assert_eq!(harness.lifecycle.tabs().await.len(), 2);
    assert_eq!(harness.lifecycle.current_tab().await.unwrap().document_id, "d2");
}

#[tokio::test]
async fn test_link_to_unknown_document_fails() {
    let harness = TestHarness::with_documents(&[("d1", "Doc One")]);

    let err = harness.lifecycle.open_internal_link("missing@1").await.unwrap_err();

    assert!(matches!(err, ViewerError::UnknownDocument(ref id) if id == "missing"));
    assert!(harness.lifecycle.tabs().await.is_empty());
    assert_eq!(harness.viewer.live_instances(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_opens_keep_one_live_instance() {
    let harness = TestHarness::with_documents(&[("d1", "Doc One"), ("d2", "Doc Two"), ("d3", "Doc Three")]);
    harness.viewer.set_load_delay_ms(10);

    let mut handles = Vec::new();
    for (i, id) in ["d1", "d2", "d3", "d1", "d2", "d3"].into_iter().enumerate() {
        let lifecycle = harness.lifecycle.clone();
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                lifecycle.open_new_tab(id).await.map(|_| ())
            } else {
                lifecycle.open_internal_link(&format!("{}@1", id)).await
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(harness.viewer.max_live_instances(), 1);
    assert_eq!(harness.viewer.live_instances(), 1);
    assert_eq!(harness.lifecycle.state(), ViewerState::Active);

    // The live instance shows the active tab
    let active = harness.lifecycle.current_tab().await.unwrap();
    assert_eq!(
        harness.viewer.loaded_documents().last().cloned(),
        Some(active.document_id)
    );
}

#[tokio::test]
async fn test_note_link_round_trip() {
    let harness = TestHarness::with_documents(&[("d1", "Doc One"), ("d2", "Doc Two")]);
    let editor = Arc::new(MockEditor::new());
    let linker = NoteLinker::new(harness.lifecycle.clone(), editor.clone());

    harness.lifecycle.open_new_tab("d1").await.unwrap();
    harness.lifecycle.scroll_to_page(1).await;
    editor.select(Some("see here"));
    let link = linker.link_to_current_page().await.unwrap().unwrap();

    assert_eq!(link.internal, "d1@1");
    assert_eq!(
        editor.inserted(),
        vec![r##"<a data-internal-link="d1@1" href="#">see here</a>"##.to_string()]
    );

    // Move away, then follow the inserted link back
    harness.lifecycle.open_new_tab("d2").await.unwrap();
    let target = ClickTarget::default().with_attribute(INTERNAL_LINK_ATTR, link.internal.as_str());
    assert!(linker.handle_editor_click(&target).await.unwrap());

    assert_eq!(harness.lifecycle.current_tab().await.unwrap().document_id, "d1");
    assert_eq!(harness.lifecycle.tabs().await.len(), 2);
    assert_eq!(
        harness.viewer.scroll_calls().last().cloned(),
        Some(("d1".to_string(), 1))
    );
}

#[tokio::test]
async fn test_annotation_save_persists_to_store() {
    let harness = TestHarness::with_documents(&[("d1", "Doc One")]);
    harness.lifecycle.open_new_tab("d1").await.unwrap();

    harness.viewer.set_annotation_export(b"<xfdf>note</xfdf>".to_vec());
    harness.viewer.trigger_save();
    harness.lifecycle.flush_pending_saves().await;

    let record = harness.storage.get_document("d1").unwrap().unwrap();
    assert_eq!(record.annotation_state, Some(b"<xfdf>note</xfdf>".to_vec()));

    // Reloading hands the saved annotations back to the viewer
    harness.lifecycle.reload_pdf().await.unwrap();
    let request = harness.viewer.last_request().unwrap();
    assert_eq!(request.annotation_state, Some(b"<xfdf>note</xfdf>".to_vec()));
}
