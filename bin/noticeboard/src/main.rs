//! # Noticeboard Binary
//!
//! The entry point that assembles the application based on compile-time features.

use actix_web::{web, App, HttpServer};
use configs::Settings;
use nb_api::{middleware, AppState};
use nb_core::PostService;

// Feature-gated imports: each plugin is compiled in only when selected
#[cfg(feature = "db-sqlite")]
use nb_db_sqlite::SqlitePostRepo;

#[cfg(feature = "storage-local")]
use nb_storage_local::LocalAttachmentStore;

#[cfg(not(all(feature = "db-sqlite", feature = "storage-local")))]
compile_error!("noticeboard needs a repository plugin (db-sqlite) and a storage plugin (storage-local)");

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let settings = Settings::load()?;

    // 1. Initialize Database Implementation
    #[cfg(feature = "db-sqlite")]
    let repo = SqlitePostRepo::new(&settings.database.url, settings.database.max_connections).await?;

    // 2. Initialize Storage Implementation
    #[cfg(feature = "storage-local")]
    let store = LocalAttachmentStore::new(settings.storage.root.clone(), settings.storage.on_unsupported);

    // 3. Wire the service explicitly and share it with every worker
    let state = web::Data::new(AppState {
        posts: PostService::new(Box::new(repo), Box::new(store), settings.board.view_count),
        author_id: settings.board.author_id.clone(),
        max_upload_bytes: settings.storage.max_upload_bytes,
    });

    let (host, port) = settings.bind_addr();
    log::info!("noticeboard starting on http://{}:{}", host, port);
    log::info!("attachments stored under {}", settings.storage.root.display());

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(middleware::security_headers())
            .wrap(middleware::cors_policy())
            .wrap(middleware::standard_middleware())
            .configure(nb_api::configure_routes)
    })
    .bind((host, port))?
    .run()
    .await?;

    Ok(())
}
