//! # nb-db-sqlite Implementation
//!
//! This module implements the data mapping between the SQLite relational model
//! and the `nb-core` domain models.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use nb_core::error::{AppError, Result};
use nb_core::models::{Attachment, NewAttachment, NewPost, Post, PostSummary, UpdatePost};
use nb_core::traits::{PostRepo, PostTx};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, Transaction};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed repository. Every unit of work that writes issues its first
/// write before any read, so a deferred transaction never has to upgrade a
/// read lock (that upgrade fails with `SQLITE_BUSY` without waiting).
#[derive(Clone)]
pub struct SqlitePostRepo {
    pool: SqlitePool,
}

impl SqlitePostRepo {
    /// Connects (creating the file if needed) and runs the embedded migrations.
    ///
    /// An in-memory database lives as long as its connection, so `sqlite::memory:`
    /// gets a single connection that is never recycled. A file database runs in
    /// WAL mode and waits up to `BUSY_TIMEOUT` for the write lock.
    pub async fn new(url: &str, max_connections: u32) -> Result<Self> {
        let in_memory = url.contains(":memory:");
        let mut options = SqliteConnectOptions::from_str(url)
            .map_err(db_err)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { max_connections.max(1) })
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(db_err)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| AppError::Repository(format!("migration failed: {}", e)))?;

        log::info!("connected to {}", url);
        Ok(Self { pool })
    }
}

fn db_err(e: sqlx::Error) -> AppError {
    log::error!("db error: {:?}", e);
    AppError::Repository(e.to_string())
}

fn map_post(row: &SqliteRow) -> std::result::Result<Post, sqlx::Error> {
    Ok(Post {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        view_count: row.try_get("view_count")?,
        creator_id: row.try_get("creator_id")?,
        created_at: row.try_get("created_at")?,
        updater_id: row.try_get("updater_id")?,
        updated_at: row.try_get("updated_at")?,
        attachments: Vec::new(),
    })
}

fn map_attachment(row: &SqliteRow) -> std::result::Result<Attachment, sqlx::Error> {
    Ok(Attachment {
        id: row.try_get("id")?,
        post_id: row.try_get("post_id")?,
        original_name: row.try_get("original_name")?,
        stored_path: row.try_get("stored_path")?,
        size_bytes: row.try_get("size_bytes")?,
        content_type: row.try_get("content_type")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl PostRepo for SqlitePostRepo {
    async fn begin(&self) -> Result<Box<dyn PostTx>> {
        let tx = self.pool.begin().await.map_err(db_err)?;
        Ok(Box::new(SqlitePostTx { tx: Some(tx) }))
    }

    async fn list_posts(&self) -> Result<Vec<PostSummary>> {
        let rows = sqlx::query("SELECT id, title, view_count, created_at FROM posts ORDER BY id DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter()
            .map(|row| -> std::result::Result<PostSummary, sqlx::Error> {
                Ok(PostSummary {
                    id: row.try_get("id")?,
                    title: row.try_get("title")?,
                    view_count: row.try_get("view_count")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect::<std::result::Result<_, _>>()
            .map_err(db_err)
    }

    async fn update_post(&self, update: &UpdatePost) -> Result<bool> {
        let done = sqlx::query("UPDATE posts SET title = ?, body = ?, updater_id = ?, updated_at = ? WHERE id = ?")
            .bind(&update.title)
            .bind(&update.body)
            .bind(&update.updater_id)
            .bind(Utc::now())
            .bind(update.id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(done.rows_affected() > 0)
    }

    async fn find_attachment(&self, id: i64, post_id: i64) -> Result<Option<Attachment>> {
        let row = sqlx::query("SELECT * FROM attachments WHERE id = ? AND post_id = ?")
            .bind(id)
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(map_attachment).transpose().map_err(db_err)
    }
}

/// One open SQLite transaction. Dropped without `commit`, sqlx rolls it back.
pub struct SqlitePostTx {
    tx: Option<Transaction<'static, Sqlite>>,
}

impl SqlitePostTx {
    fn open(&mut self) -> Result<&mut Transaction<'static, Sqlite>> {
        self.tx
            .as_mut()
            .ok_or_else(|| AppError::Internal("transaction already committed".to_string()))
    }
}

#[async_trait]
impl PostTx for SqlitePostTx {
    async fn insert_post(&mut self, post: &NewPost) -> Result<i64> {
        let tx = self.open()?;
        let done = sqlx::query("INSERT INTO posts (title, body, view_count, creator_id, created_at) VALUES (?, ?, 0, ?, ?)")
            .bind(&post.title)
            .bind(&post.body)
            .bind(&post.creator_id)
            .bind(Utc::now())
            .execute(&mut **tx)
            .await
            .map_err(db_err)?;
        Ok(done.last_insert_rowid())
    }

    async fn find_post(&mut self, id: i64) -> Result<Option<Post>> {
        let tx = self.open()?;
        let row = sqlx::query("SELECT * FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(db_err)?;
        row.as_ref().map(map_post).transpose().map_err(db_err)
    }

    async fn find_attachments(&mut self, post_id: i64) -> Result<Vec<Attachment>> {
        let tx = self.open()?;
        let rows = sqlx::query("SELECT * FROM attachments WHERE post_id = ? ORDER BY id ASC")
            .bind(post_id)
            .fetch_all(&mut **tx)
            .await
            .map_err(db_err)?;
        rows.iter()
            .map(map_attachment)
            .collect::<std::result::Result<_, _>>()
            .map_err(db_err)
    }

    async fn insert_attachments(&mut self, files: &[NewAttachment]) -> Result<()> {
        let tx = self.open()?;
        let created_at = Utc::now();
        for file in files {
            sqlx::query("INSERT INTO attachments (post_id, original_name, stored_path, size_bytes, content_type, created_at) VALUES (?, ?, ?, ?, ?, ?)")
                .bind(file.post_id)
                .bind(&file.original_name)
                .bind(&file.stored_path)
                .bind(file.size_bytes)
                .bind(&file.content_type)
                .bind(created_at)
                .execute(&mut **tx)
                .await
                .map_err(db_err)?;
        }
        Ok(())
    }

    async fn increment_view_count(&mut self, id: i64) -> Result<bool> {
        let tx = self.open()?;
        let done = sqlx::query("UPDATE posts SET view_count = view_count + 1 WHERE id = ?")
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(db_err)?;
        Ok(done.rows_affected() > 0)
    }

    async fn delete_attachments(&mut self, post_id: i64) -> Result<Vec<String>> {
        let tx = self.open()?;
        let rows = sqlx::query("DELETE FROM attachments WHERE post_id = ? RETURNING stored_path")
            .bind(post_id)
            .fetch_all(&mut **tx)
            .await
            .map_err(db_err)?;
        rows.iter()
            .map(|row| row.try_get("stored_path"))
            .collect::<std::result::Result<_, _>>()
            .map_err(db_err)
    }

    async fn delete_post(&mut self, id: i64) -> Result<bool> {
        let tx = self.open()?;
        let done = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(db_err)?;
        Ok(done.rows_affected() > 0)
    }

    async fn commit(&mut self) -> Result<()> {
        match self.tx.take() {
            Some(tx) => tx.commit().await.map_err(db_err),
            None => Err(AppError::Internal("transaction already committed".to_string())),
        }
    }
}
