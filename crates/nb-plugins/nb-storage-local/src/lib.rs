//! # nb-storage-local
//! noticeboard/crates/nb-plugins/nb-storage-local/src/lib.rs
//! Local filesystem implementation of `AttachmentStore`.
//! Features: day-partitioned directories, UUIDv7 file names, all-or-nothing ingestion.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::Local;
use nb_core::error::{AppError, Result};
use nb_core::models::{ImageKind, NewAttachment, UnsupportedPolicy, UploadPart};
use nb_core::traits::AttachmentStore;
use tokio::fs;
use uuid::Uuid;

pub struct LocalAttachmentStore {
    /// Root directory for all uploads (e.g., "./data/uploads")
    root_path: PathBuf,
    on_unsupported: UnsupportedPolicy,
}

impl LocalAttachmentStore {
    pub fn new(root: PathBuf, on_unsupported: UnsupportedPolicy) -> Self {
        Self { root_path: root, on_unsupported }
    }

    /// Today's partition, e.g. "20261018".
    fn date_dir() -> String {
        Local::now().format("%Y%m%d").to_string()
    }

    /// A name no other call in this process can produce: UUIDv7 keeps a
    /// per-process counter next to the millisecond timestamp.
    fn stored_name(kind: ImageKind) -> String {
        format!("{}.{}", Uuid::now_v7().simple(), kind.extension())
    }
}

#[async_trait]
impl AttachmentStore for LocalAttachmentStore {
    async fn ingest(&self, post_id: i64, parts: Vec<UploadPart>) -> Result<Vec<NewAttachment>> {
        if parts.is_empty() {
            return Ok(Vec::new());
        }

        // 1. Ensure today's directory exists
        let date_dir = Self::date_dir();
        let target_dir = self.root_path.join(&date_dir);
        fs::create_dir_all(&target_dir)
            .await
            .map_err(|e| AppError::Storage(format!("cannot create {}: {}", target_dir.display(), e)))?;

        let mut stopped_fields: HashSet<String> = HashSet::new();
        let mut saved: Vec<NewAttachment> = Vec::new();

        for part in parts {
            // Empty file inputs still arrive as parts
            if part.data.is_empty() || stopped_fields.contains(&part.field) {
                continue;
            }

            // 2. The extension comes from the declared type, never the client file name
            let kind = match ImageKind::from_content_type(part.content_type.as_deref()) {
                Some(kind) => kind,
                None => {
                    let rejected = AppError::UnsupportedMediaType(
                        part.content_type.clone().unwrap_or_else(|| "<none>".to_string()),
                    );
                    log::warn!("skipping upload {:?} of post {}: {}", part.file_name, post_id, rejected);
                    if self.on_unsupported == UnsupportedPolicy::StopField {
                        stopped_fields.insert(part.field);
                    }
                    continue;
                }
            };

            // 3. Write under a fresh name
            let name = Self::stored_name(kind);
            let stored_path = format!("{}/{}", date_dir, name);
            if let Err(e) = fs::write(target_dir.join(&name), &part.data).await {
                let written: Vec<String> = saved.into_iter().map(|f| f.stored_path).collect();
                self.discard(&written).await;
                return Err(AppError::Storage(format!("cannot write {}: {}", stored_path, e)));
            }

            saved.push(NewAttachment {
                post_id,
                size_bytes: part.size_bytes(),
                original_name: part.file_name,
                stored_path,
                content_type: kind.essence().to_string(),
            });
        }

        Ok(saved)
    }

    async fn discard(&self, stored_paths: &[String]) {
        for stored_path in stored_paths {
            let location = match self.resolve(stored_path) {
                Ok(location) => location,
                Err(e) => {
                    log::warn!("not removing {}: {}", stored_path, e);
                    continue;
                }
            };
            if let Err(e) = fs::remove_file(&location).await {
                log::warn!("failed to remove {}: {}", location.display(), e);
            }
        }
    }

    fn resolve(&self, stored_path: &str) -> Result<PathBuf> {
        let relative = Path::new(stored_path);
        let plain = !stored_path.is_empty()
            && relative.components().all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            return Err(AppError::NotFound("File".to_string(), stored_path.to_string()));
        }
        Ok(self.root_path.join(relative))
    }
}
