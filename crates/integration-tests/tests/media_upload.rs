use std::collections::HashSet;
use std::sync::Arc;

use integration_tests::{board, image_part};
use nb_core::error::AppError;
use nb_core::models::{NewPost, UnsupportedPolicy, ViewCountMode};
use nb_core::PostService;
use nb_db_sqlite::SqlitePostRepo;
use nb_storage_local::LocalAttachmentStore;

fn draft() -> NewPost {
    NewPost {
        title: "T".to_string(),
        body: "B".to_string(),
        creator_id: "admin".to_string(),
    }
}

#[tokio::test]
async fn failed_ingestion_rolls_back_the_post() {
    let scratch = tempfile::tempdir().unwrap();
    let not_a_dir = scratch.path().join("uploads");
    std::fs::write(&not_a_dir, b"occupied").unwrap();

    let repo = SqlitePostRepo::new("sqlite::memory:", 1).await.unwrap();
    let store = LocalAttachmentStore::new(not_a_dir, UnsupportedPolicy::SkipPart);
    let service = PostService::new(Box::new(repo), Box::new(store), ViewCountMode::Durable);

    let err = service
        .create_post(draft(), vec![image_part("a.jpg", "image/jpeg", b"x")])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Storage(_)));
    assert!(service.list_posts().await.unwrap().is_empty());
}

#[tokio::test]
async fn stop_field_policy_end_to_end() {
    let uploads = tempfile::tempdir().unwrap();
    let repo = SqlitePostRepo::new("sqlite::memory:", 1).await.unwrap();
    let store = LocalAttachmentStore::new(uploads.path().to_path_buf(), UnsupportedPolicy::StopField);
    let service = PostService::new(Box::new(repo), Box::new(store), ViewCountMode::Durable);

    let parts = vec![
        image_part("1.jpg", "image/jpeg", b"1"),
        image_part("2.bmp", "image/bmp", b"2"),
        image_part("3.png", "image/png", b"3"),
    ];
    let id = service.create_post(draft(), parts).await.unwrap();

    let names: Vec<String> = service
        .view_post(id)
        .await
        .unwrap()
        .attachments
        .into_iter()
        .map(|f| f.original_name)
        .collect();
    assert_eq!(names, ["1.jpg"]);
}

#[tokio::test]
async fn concurrent_creates_never_share_a_stored_path() {
    let board = board(ViewCountMode::Durable).await;
    let service = Arc::new(board.service);

    let mut handles = Vec::new();
    for _ in 0..6 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            let parts = (0..10)
                .map(|i| image_part(&format!("{}.gif", i), "image/gif", b"GIF89a"))
                .collect();
            service.create_post(draft(), parts).await.unwrap()
        }));
    }

    let mut paths = HashSet::new();
    for handle in handles {
        let id = handle.await.unwrap();
        for file in service.view_post(id).await.unwrap().attachments {
            assert!(paths.insert(file.stored_path));
        }
    }
    assert_eq!(paths.len(), 60);
    drop(board.uploads);
}
