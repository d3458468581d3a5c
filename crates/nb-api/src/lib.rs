//! # nb-api
//!
//! The web routing and request-validation layer for the noticeboard.

pub mod error;
pub mod forms;
pub mod handlers;
pub mod middleware;

pub use error::ApiError;
pub use handlers::AppState;

use actix_web::web;

/// Limit for urlencoded and JSON bodies; multipart uploads have their own.
const TEXT_BODY_LIMIT: usize = 256 * 1024;

/// Configures the HTML pages and the JSON API.
///
/// # Developer Note
/// `/board/write` is registered before `/board/{id}` so it is not taken for an id.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::FormConfig::default().limit(TEXT_BODY_LIMIT))
        .app_data(web::JsonConfig::default().limit(TEXT_BODY_LIMIT))
        .route("/", web::get().to(handlers::index))
        .service(
            web::scope("/board")
                .route("", web::get().to(handlers::board_list))
                .route("", web::post().to(handlers::create_post))
                .route("/write", web::get().to(handlers::write_form))
                .route("/{id}", web::get().to(handlers::view_post))
                .route("/{id}/update", web::post().to(handlers::update_post))
                .route("/{id}/delete", web::post().to(handlers::delete_post))
                .route("/{post_id}/files/{id}", web::get().to(handlers::download_file)),
        )
        .service(
            web::scope("/api/board")
                .route("", web::get().to(handlers::api_list))
                .route("", web::post().to(handlers::api_create))
                .route("/{id}", web::get().to(handlers::api_view))
                .route("/{id}", web::put().to(handlers::api_update))
                .route("/{id}", web::delete().to(handlers::api_delete)),
        );
}
