//! E2E test for a full session: seed, sync, index, search and link.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use folio_session::Session;
use folio_sync::{MockSyncChannel, SyncChannel};
use folio_types::{SeedEntry, Settings, SyncStatus};
use folio_viewer::mock::{MockEditor, MockViewer};
use folio_viewer::{ClickTarget, INTERNAL_LINK_ATTR};

fn settings(db: &TempDir, assets: &TempDir) -> Settings {
    for file in ["guide.pdf", "manual.pdf"] {
        std::fs::write(assets.path().join(file), b"%PDF-1.4").unwrap();
    }
    Settings {
        db_path: db.path().join("db").to_string_lossy().to_string(),
        assets_dir: assets.path().to_string_lossy().to_string(),
        sync_endpoint: Some("wss://sync.example/folio".to_string()),
        seed: vec![
            SeedEntry::new("guide.pdf", "User Guide"),
            SeedEntry::new("manual.pdf", "Service Manual"),
        ],
        ..Default::default()
    }
}

#[tokio::test]
async fn test_session_search_and_link_flow() {
    let db = TempDir::new().unwrap();
    let assets = TempDir::new().unwrap();
    let viewer = Arc::new(MockViewer::new());
    viewer.set_pages(
        "manual.pdf",
        vec![
            vec!["Safety notes".to_string()],
            vec!["Replace the drive belt".to_string()],
        ],
    );
    let channel: Arc<dyn SyncChannel> = Arc::new(MockSyncChannel::new());

    let (session, report) = Session::start(settings(&db, &assets), viewer.clone(), Some(channel))
        .await
        .unwrap();

    assert_eq!(report.seeded, 2);
    assert!(matches!(report.sync, Some(Ok(_))));
    assert_eq!(report.indexing.unwrap().unwrap().extracted, 2);

    let bar = session.search_bar();
    let results = bar.search("belt").unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].title, "Service Manual");
    assert_eq!(results[0].page_index, 1);

    bar.open_result(&results[0]).await.unwrap();
    assert_eq!(
        session.lifecycle().current_tab().await.unwrap().document_id,
        "manual.pdf"
    );

    let editor = Arc::new(MockEditor::new());
    let linker = session.note_linker(editor.clone());
    let link = linker.link_to_current_page().await.unwrap().unwrap();
    assert_eq!(link.internal, "manual.pdf@1");
    assert_eq!(link.text, "manual.pdf (page 2)");
    assert_eq!(editor.inserted().len(), 1);

    session.lifecycle().open_new_tab("guide.pdf").await.unwrap();
    let target = ClickTarget::default().with_attribute(INTERNAL_LINK_ATTR, link.internal.as_str());
    assert!(linker.handle_editor_click(&target).await.unwrap());
    assert_eq!(
        session.lifecycle().current_tab().await.unwrap().document_id,
        "manual.pdf"
    );

    session.shutdown().await.unwrap();
    assert_eq!(session.sync().unwrap().status(), SyncStatus::Disconnected);
    assert_eq!(viewer.live_instances(), 0);
}

#[tokio::test]
async fn test_restart_keeps_store_and_fragments() {
    let db = TempDir::new().unwrap();
    let assets = TempDir::new().unwrap();
    let settings = settings(&db, &assets);

    {
        let (session, _) = Session::start(settings.clone(), Arc::new(MockViewer::new()), None)
            .await
            .unwrap();
        session.shutdown().await.unwrap();
    }

    let viewer = Arc::new(MockViewer::new());
    let (session, report) = Session::start(settings, viewer.clone(), None).await.unwrap();

    assert_eq!(report.seeded, 0);
    let indexing = report.indexing.unwrap().unwrap();
    assert_eq!(indexing.already_indexed, 2);
    assert_eq!(indexing.extracted, 0);
    assert!(viewer.loaded_documents().is_empty());
    assert!(!session.search_bar().search("page").unwrap().is_empty());
}
