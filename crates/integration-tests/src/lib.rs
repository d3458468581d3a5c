//! Shared wiring for the end-to-end tests: a real SQLite repository (in
//! memory, or a pooled file) and a local attachment store in a temporary
//! directory.

use nb_core::models::{UnsupportedPolicy, UploadPart, ViewCountMode};
use nb_core::PostService;
use nb_db_sqlite::SqlitePostRepo;
use nb_storage_local::LocalAttachmentStore;
use tempfile::TempDir;

/// Keeps the upload directory alive for as long as the service is used.
pub struct Board {
    pub service: PostService,
    pub uploads: TempDir,
}

pub async fn board(view_count: ViewCountMode) -> Board {
    let uploads = tempfile::tempdir().expect("temp upload dir");
    let repo = SqlitePostRepo::new("sqlite::memory:", 1).await.expect("in-memory database");
    assemble(repo, uploads, view_count)
}

/// Same as `board`, but backed by a database file shared by `max_connections`
/// pooled connections, as the binary runs it. The file sits next to the
/// upload date directories.
pub async fn file_board(view_count: ViewCountMode, max_connections: u32) -> Board {
    let uploads = tempfile::tempdir().expect("temp upload dir");
    let url = format!("sqlite://{}", uploads.path().join("board.db").display());
    let repo = SqlitePostRepo::new(&url, max_connections).await.expect("file database");
    assemble(repo, uploads, view_count)
}

fn assemble(repo: SqlitePostRepo, uploads: TempDir, view_count: ViewCountMode) -> Board {
    let store = LocalAttachmentStore::new(uploads.path().to_path_buf(), UnsupportedPolicy::SkipPart);
    Board {
        service: PostService::new(Box::new(repo), Box::new(store), view_count),
        uploads,
    }
}

pub fn image_part(name: &str, content_type: &str, data: &[u8]) -> UploadPart {
    UploadPart {
        field: "files".to_string(),
        file_name: name.to_string(),
        content_type: Some(content_type.to_string()),
        data: data.to_vec(),
    }
}

pub fn today() -> String {
    chrono::Local::now().format("%Y%m%d").to_string()
}
