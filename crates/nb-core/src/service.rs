//! # PostService
//!
//! Orchestrates the repository and the attachment store. Every multi-step
//! operation runs inside one `PostTx`; an early return drops it uncommitted,
//! which rolls the whole operation back.

use std::path::PathBuf;

use crate::error::{AppError, Result};
use crate::models::{
    Attachment, NewAttachment, NewPost, Post, PostSummary, UpdatePost, UploadPart, ViewCountMode,
};
use crate::traits::{AttachmentStore, PostRepo, PostTx};

pub struct PostService {
    repo: Box<dyn PostRepo>,
    store: Box<dyn AttachmentStore>,
    view_count: ViewCountMode,
}

impl PostService {
    pub fn new(
        repo: Box<dyn PostRepo>,
        store: Box<dyn AttachmentStore>,
        view_count: ViewCountMode,
    ) -> Self {
        Self { repo, store, view_count }
    }

    pub async fn list_posts(&self) -> Result<Vec<PostSummary>> {
        self.repo.list_posts().await
    }

    /// Inserts the post, ingests its files and records them, all or nothing.
    pub async fn create_post(&self, post: NewPost, parts: Vec<UploadPart>) -> Result<i64> {
        let mut tx = self.repo.begin().await?;
        let post_id = tx.insert_post(&post).await?;

        let files = self.store.ingest(post_id, parts).await?;
        if let Err(e) = Self::record_files(tx.as_mut(), &files).await {
            self.store.discard(&stored_paths(&files)).await;
            return Err(e);
        }

        log::info!("created post {} with {} attachment(s)", post_id, files.len());
        Ok(post_id)
    }

    async fn record_files(tx: &mut dyn PostTx, files: &[NewAttachment]) -> Result<()> {
        if !files.is_empty() {
            tx.insert_attachments(files).await?;
        }
        tx.commit().await
    }

    /// Counts the view, then fetches the post with its attachments.
    ///
    /// The counter update runs first so the transaction holds the write lock
    /// before it reads; the returned `view_count` already includes this view.
    pub async fn view_post(&self, id: i64) -> Result<Post> {
        let mut tx = self.repo.begin().await?;
        let counted = match tx.increment_view_count(id).await {
            Ok(true) => true,
            Ok(false) => return Err(AppError::post_not_found(id)),
            Err(e) => {
                self.view_count_failed(id, e)?;
                false
            }
        };

        let mut post = tx.find_post(id).await?.ok_or_else(|| AppError::post_not_found(id))?;
        post.attachments = tx.find_attachments(id).await?;

        if counted {
            if let Err(e) = tx.commit().await {
                self.view_count_failed(id, e)?;
                post.view_count -= 1;
            }
        }
        Ok(post)
    }

    fn view_count_failed(&self, id: i64, e: AppError) -> Result<()> {
        match self.view_count {
            ViewCountMode::Durable => Err(e),
            ViewCountMode::BestEffort => {
                log::warn!("view count of post {} not saved: {}", id, e);
                Ok(())
            }
        }
    }

    /// Last writer wins; there is no version check.
    pub async fn update_post(&self, update: UpdatePost) -> Result<()> {
        if self.repo.update_post(&update).await? {
            Ok(())
        } else {
            Err(AppError::post_not_found(update.id))
        }
    }

    /// Deletes the attachment rows and the post, then the stored files.
    pub async fn delete_post(&self, id: i64) -> Result<()> {
        let mut tx = self.repo.begin().await?;
        let paths = tx.delete_attachments(id).await?;
        if !tx.delete_post(id).await? {
            return Err(AppError::post_not_found(id));
        }
        tx.commit().await?;

        self.store.discard(&paths).await;
        Ok(())
    }

    /// Looks up an attachment of a post and where its bytes live.
    pub async fn attachment(&self, post_id: i64, id: i64) -> Result<(Attachment, PathBuf)> {
        let file = self
            .repo
            .find_attachment(id, post_id)
            .await?
            .ok_or_else(|| AppError::attachment_not_found(id))?;
        let location = self.store.resolve(&file.stored_path)?;
        Ok((file, location))
    }
}

fn stored_paths(files: &[NewAttachment]) -> Vec<String> {
    files.iter().map(|f| f.stored_path.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{MockAttachmentStore, MockPostRepo, MockPostTx};
    use chrono::Utc;

    fn draft() -> NewPost {
        NewPost {
            title: "T".to_string(),
            body: "B".to_string(),
            creator_id: "admin".to_string(),
        }
    }

    fn stored_post(id: i64, view_count: i64) -> Post {
        Post {
            id,
            title: "T".to_string(),
            body: "B".to_string(),
            view_count,
            creator_id: "admin".to_string(),
            created_at: Utc::now(),
            updater_id: None,
            updated_at: None,
            attachments: Vec::new(),
        }
    }

    fn repo_with(tx: MockPostTx) -> MockPostRepo {
        let mut repo = MockPostRepo::new();
        repo.expect_begin()
            .times(1)
            .return_once(move || Ok(Box::new(tx) as Box<dyn PostTx>));
        repo
    }

    fn jpeg_descriptor(post_id: i64) -> NewAttachment {
        NewAttachment {
            post_id,
            original_name: "a.jpg".to_string(),
            stored_path: "20260101/abc.jpg".to_string(),
            size_bytes: 3,
            content_type: "image/jpeg".to_string(),
        }
    }

    #[tokio::test]
    async fn create_without_files_skips_attachment_insert() {
        let mut tx = MockPostTx::new();
        tx.expect_insert_post().times(1).returning(|_| Ok(7));
        tx.expect_insert_attachments().times(0);
        tx.expect_commit().times(1).returning(|| Ok(()));

        let mut store = MockAttachmentStore::new();
        store
            .expect_ingest()
            .withf(|post_id, parts| *post_id == 7 && parts.is_empty())
            .times(1)
            .returning(|_, _| Ok(Vec::new()));

        let service = PostService::new(Box::new(repo_with(tx)), Box::new(store), ViewCountMode::Durable);
        let id = service.create_post(draft(), Vec::new()).await.unwrap();
        assert_eq!(id, 7);
    }

    #[tokio::test]
    async fn create_records_ingested_files_under_new_id() {
        let mut tx = MockPostTx::new();
        tx.expect_insert_post().times(1).returning(|_| Ok(3));
        tx.expect_insert_attachments()
            .withf(|files| files.len() == 1 && files[0].post_id == 3)
            .times(1)
            .returning(|_| Ok(()));
        tx.expect_commit().times(1).returning(|| Ok(()));

        let mut store = MockAttachmentStore::new();
        store
            .expect_ingest()
            .times(1)
            .returning(|post_id, _| Ok(vec![jpeg_descriptor(post_id)]));
        store.expect_discard().times(0);

        let service = PostService::new(Box::new(repo_with(tx)), Box::new(store), ViewCountMode::Durable);
        assert_eq!(service.create_post(draft(), Vec::new()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn failed_attachment_insert_discards_files_and_skips_commit() {
        let mut tx = MockPostTx::new();
        tx.expect_insert_post().returning(|_| Ok(3));
        tx.expect_insert_attachments()
            .returning(|_| Err(AppError::Repository("disk full".to_string())));
        tx.expect_commit().times(0);

        let mut store = MockAttachmentStore::new();
        store
            .expect_ingest()
            .returning(|post_id, _| Ok(vec![jpeg_descriptor(post_id)]));
        store
            .expect_discard()
            .withf(|paths| paths.len() == 1 && paths[0] == "20260101/abc.jpg")
            .times(1)
            .return_const(());

        let service = PostService::new(Box::new(repo_with(tx)), Box::new(store), ViewCountMode::Durable);
        let err = service.create_post(draft(), Vec::new()).await.unwrap_err();
        assert!(matches!(err, AppError::Repository(_)));
    }

    #[tokio::test]
    async fn failed_ingestion_leaves_post_uncommitted() {
        let mut tx = MockPostTx::new();
        tx.expect_insert_post().returning(|_| Ok(3));
        tx.expect_commit().times(0);

        let mut store = MockAttachmentStore::new();
        store
            .expect_ingest()
            .returning(|_, _| Err(AppError::Storage("read-only filesystem".to_string())));

        let service = PostService::new(Box::new(repo_with(tx)), Box::new(store), ViewCountMode::Durable);
        let err = service.create_post(draft(), Vec::new()).await.unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
    }

    #[tokio::test]
    async fn view_counts_once_and_returns_stored_value() {
        let mut tx = MockPostTx::new();
        tx.expect_increment_view_count().withf(|id| *id == 9).times(1).returning(|_| Ok(true));
        tx.expect_find_post().returning(|id| Ok(Some(stored_post(id, 5))));
        tx.expect_find_attachments().returning(|_| Ok(Vec::new()));
        tx.expect_commit().times(1).returning(|| Ok(()));

        let service = PostService::new(
            Box::new(repo_with(tx)),
            Box::new(MockAttachmentStore::new()),
            ViewCountMode::Durable,
        );
        let post = service.view_post(9).await.unwrap();
        assert_eq!(post.view_count, 5);
    }

    #[tokio::test]
    async fn view_of_missing_post_is_not_found_without_mutation() {
        let mut tx = MockPostTx::new();
        tx.expect_increment_view_count().times(1).returning(|_| Ok(false));
        tx.expect_find_post().times(0);
        tx.expect_commit().times(0);

        let service = PostService::new(
            Box::new(repo_with(tx)),
            Box::new(MockAttachmentStore::new()),
            ViewCountMode::Durable,
        );
        let err = service.view_post(404).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_, ref id) if id == "404"));
    }

    #[tokio::test]
    async fn best_effort_view_survives_counter_failure() {
        let mut tx = MockPostTx::new();
        tx.expect_increment_view_count()
            .returning(|_| Err(AppError::Repository("database is locked".to_string())));
        tx.expect_find_post().returning(|id| Ok(Some(stored_post(id, 0))));
        tx.expect_find_attachments().returning(|_| Ok(Vec::new()));
        tx.expect_commit().times(0);

        let service = PostService::new(
            Box::new(repo_with(tx)),
            Box::new(MockAttachmentStore::new()),
            ViewCountMode::BestEffort,
        );
        assert_eq!(service.view_post(1).await.unwrap().view_count, 0);
    }

    #[tokio::test]
    async fn best_effort_view_survives_commit_failure() {
        let mut tx = MockPostTx::new();
        tx.expect_increment_view_count().returning(|_| Ok(true));
        tx.expect_find_post().returning(|id| Ok(Some(stored_post(id, 3))));
        tx.expect_find_attachments().returning(|_| Ok(Vec::new()));
        tx.expect_commit()
            .times(1)
            .returning(|| Err(AppError::Repository("disk I/O error".to_string())));

        let service = PostService::new(
            Box::new(repo_with(tx)),
            Box::new(MockAttachmentStore::new()),
            ViewCountMode::BestEffort,
        );
        assert_eq!(service.view_post(1).await.unwrap().view_count, 2);
    }

    #[tokio::test]
    async fn durable_view_fails_on_counter_failure() {
        let mut tx = MockPostTx::new();
        tx.expect_increment_view_count()
            .returning(|_| Err(AppError::Repository("database is locked".to_string())));
        tx.expect_find_post().times(0);
        tx.expect_commit().times(0);

        let service = PostService::new(
            Box::new(repo_with(tx)),
            Box::new(MockAttachmentStore::new()),
            ViewCountMode::Durable,
        );
        assert!(service.view_post(1).await.is_err());
    }

    #[tokio::test]
    async fn update_of_missing_post_is_not_found() {
        let mut repo = MockPostRepo::new();
        repo.expect_update_post().returning(|_| Ok(false));

        let service = PostService::new(Box::new(repo), Box::new(MockAttachmentStore::new()), ViewCountMode::Durable);
        let update = UpdatePost {
            id: 12,
            title: "t".to_string(),
            body: "b".to_string(),
            updater_id: "admin".to_string(),
        };
        assert!(matches!(service.update_post(update).await, Err(AppError::NotFound(_, _))));
    }

    #[tokio::test]
    async fn delete_discards_files_after_commit() {
        let mut tx = MockPostTx::new();
        tx.expect_delete_attachments()
            .times(1)
            .returning(|_| Ok(vec!["20260101/x.png".to_string()]));
        tx.expect_delete_post().times(1).returning(|_| Ok(true));
        tx.expect_commit().times(1).returning(|| Ok(()));

        let mut store = MockAttachmentStore::new();
        store
            .expect_discard()
            .withf(|paths| paths.len() == 1 && paths[0] == "20260101/x.png")
            .times(1)
            .return_const(());

        let service = PostService::new(Box::new(repo_with(tx)), Box::new(store), ViewCountMode::Durable);
        service.delete_post(5).await.unwrap();
    }

    #[tokio::test]
    async fn delete_of_missing_post_rolls_back_and_keeps_files() {
        let mut tx = MockPostTx::new();
        tx.expect_delete_attachments().returning(|_| Ok(Vec::new()));
        tx.expect_delete_post().returning(|_| Ok(false));
        tx.expect_commit().times(0);

        let mut store = MockAttachmentStore::new();
        store.expect_discard().times(0);

        let service = PostService::new(Box::new(repo_with(tx)), Box::new(store), ViewCountMode::Durable);
        assert!(matches!(service.delete_post(5).await, Err(AppError::NotFound(_, _))));
    }

    #[tokio::test]
    async fn attachment_of_another_post_is_not_found() {
        let mut repo = MockPostRepo::new();
        repo.expect_find_attachment().returning(|_, _| Ok(None));

        let service = PostService::new(Box::new(repo), Box::new(MockAttachmentStore::new()), ViewCountMode::Durable);
        assert!(matches!(service.attachment(1, 2).await, Err(AppError::NotFound(_, _))));
    }
}
