//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Attachment, NewAttachment, NewPost, Post, PostSummary, UpdatePost, UploadPart};

/// Data persistence contract for posts and their attachments.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PostRepo: Send + Sync {
    /// Opens a unit of work. Dropping it without `commit` rolls back.
    async fn begin(&self) -> Result<Box<dyn PostTx>>;

    /// All posts, newest id first.
    async fn list_posts(&self) -> Result<Vec<PostSummary>>;

    /// Overwrites the mutable fields. Returns `false` when no row matched.
    async fn update_post(&self, update: &UpdatePost) -> Result<bool>;

    async fn find_attachment(&self, id: i64, post_id: i64) -> Result<Option<Attachment>>;
}

/// Statements that must share one transaction.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PostTx: Send {
    /// Inserts with `view_count = 0` and returns the new id.
    async fn insert_post(&mut self, post: &NewPost) -> Result<i64>;

    async fn find_post(&mut self, id: i64) -> Result<Option<Post>>;

    /// Attachments of a post, in insertion order.
    async fn find_attachments(&mut self, post_id: i64) -> Result<Vec<Attachment>>;

    async fn insert_attachments(&mut self, files: &[NewAttachment]) -> Result<()>;

    /// Returns `false` when no row matched.
    async fn increment_view_count(&mut self, id: i64) -> Result<bool>;

    /// Removes the attachment rows of a post and returns their stored paths.
    async fn delete_attachments(&mut self, post_id: i64) -> Result<Vec<String>>;

    /// Returns `false` when no row matched.
    async fn delete_post(&mut self, id: i64) -> Result<bool>;

    async fn commit(&mut self) -> Result<()>;
}

/// Attachment storage contract for uploads and downloads.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Validates, names and writes the parts. Returns one descriptor per
    /// accepted part, in arrival order. No parts is not an error.
    async fn ingest(&self, post_id: i64, parts: Vec<UploadPart>) -> Result<Vec<NewAttachment>>;

    /// Removes stored files. Best effort: failures are only logged.
    async fn discard(&self, stored_paths: &[String]);

    /// Location on disk of a stored file.
    fn resolve(&self, stored_path: &str) -> Result<PathBuf>;
}
