//! # nb-api Handlers
//!
//! This module coordinates the flow between HTTP requests and `PostService`.

use actix_files::NamedFile;
use actix_multipart::Multipart;
use actix_web::http::header::{
    self, Charset, ContentDisposition, DispositionParam, DispositionType, ExtendedValue,
};
use actix_web::{web, HttpResponse, Responder};
use askama::Template;
use nb_core::error::AppError;
use nb_core::PostService;
use nb_ui::{DetailTemplate, ListTemplate, WriteTemplate};
use serde::Serialize;

use crate::error::ApiError;
use crate::forms::{self, PostForm};

/// State shared across all Actix-web workers.
pub struct AppState {
    pub posts: PostService,
    /// Recorded as creator/updater; never taken from the request
    pub author_id: String,
    pub max_upload_bytes: usize,
}

#[derive(Serialize)]
pub struct Created {
    pub id: i64,
}

fn see_other(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, location))
        .finish()
}

fn html(template: impl Template) -> Result<HttpResponse, ApiError> {
    let body = template
        .render()
        .map_err(|e| AppError::Internal(format!("template rendering failed: {}", e)))?;
    Ok(HttpResponse::Ok().content_type("text/html; charset=utf-8").body(body))
}

pub async fn index() -> impl Responder {
    see_other("/board")
}

/// Renders the board list.
pub async fn board_list(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let posts = data.posts.list_posts().await?;
    html(ListTemplate { posts: &posts, title: "Noticeboard" })
}

pub async fn write_form() -> Result<HttpResponse, ApiError> {
    html(WriteTemplate { title: "Write - Noticeboard" })
}

/// Creates a post from a multipart form with any number of image files.
pub async fn create_post(data: web::Data<AppState>, payload: Multipart) -> Result<HttpResponse, ApiError> {
    let upload = forms::read_multipart(payload, data.max_upload_bytes).await?;
    let draft = upload.form.into_new_post(&data.author_id)?;
    data.posts.create_post(draft, upload.parts).await?;
    Ok(see_other("/board"))
}

/// Renders one post. Counts as a view.
pub async fn view_post(data: web::Data<AppState>, path: web::Path<i64>) -> Result<HttpResponse, ApiError> {
    let post = data.posts.view_post(path.into_inner()).await?;
    let body_html = render_body(&post.body);
    let title = format!("{} - Noticeboard", post.title);
    html(DetailTemplate { post: &post, body_html: &body_html, title: &title })
}

pub async fn update_post(
    data: web::Data<AppState>,
    path: web::Path<i64>,
    form: web::Form<PostForm>,
) -> Result<HttpResponse, ApiError> {
    let update = form.into_inner().into_update(path.into_inner(), &data.author_id)?;
    data.posts.update_post(update).await?;
    Ok(see_other("/board"))
}

pub async fn delete_post(data: web::Data<AppState>, path: web::Path<i64>) -> Result<HttpResponse, ApiError> {
    data.posts.delete_post(path.into_inner()).await?;
    Ok(see_other("/board"))
}

/// Streams a stored attachment under its original name.
pub async fn download_file(
    data: web::Data<AppState>,
    path: web::Path<(i64, i64)>,
) -> Result<NamedFile, ApiError> {
    let (post_id, file_id) = path.into_inner();
    let (file, location) = data.posts.attachment(post_id, file_id).await?;

    let named = NamedFile::open_async(&location).await.map_err(|e| {
        log::warn!("attachment {} is missing at {}: {}", file.id, location.display(), e);
        AppError::NotFound("File".to_string(), file.stored_path.clone())
    })?;

    Ok(named
        .set_content_type(mime::APPLICATION_OCTET_STREAM)
        .set_content_disposition(attachment_disposition(&file.original_name)))
}

/// `attachment; filename="..."`, plus a percent-encoded UTF-8 `filename*`
/// when the name is not plain printable ASCII. The quoted `filename` then
/// carries `_` in place of every other character.
fn attachment_disposition(name: &str) -> ContentDisposition {
    let fallback: String = name
        .chars()
        .map(|c| if c == ' ' || c.is_ascii_graphic() { c } else { '_' })
        .collect();

    let encoded = fallback != name;
    let mut parameters = vec![DispositionParam::Filename(fallback)];
    if encoded {
        parameters.push(DispositionParam::FilenameExt(ExtendedValue {
            charset: Charset::Ext("UTF-8".to_string()),
            language_tag: None,
            value: name.as_bytes().to_vec(),
        }));
    }

    ContentDisposition { disposition: DispositionType::Attachment, parameters }
}

// ── REST API ─────────────────────────────────────────────────────────────────

pub async fn api_list(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(data.posts.list_posts().await?))
}

/// JSON create. Attachments are only accepted through the multipart form.
pub async fn api_create(data: web::Data<AppState>, body: web::Json<PostForm>) -> Result<HttpResponse, ApiError> {
    let draft = body.into_inner().into_new_post(&data.author_id)?;
    let id = data.posts.create_post(draft, Vec::new()).await?;
    Ok(HttpResponse::Created()
        .insert_header((header::LOCATION, format!("/api/board/{}", id)))
        .json(Created { id }))
}

pub async fn api_view(data: web::Data<AppState>, path: web::Path<i64>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(data.posts.view_post(path.into_inner()).await?))
}

pub async fn api_update(
    data: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<PostForm>,
) -> Result<HttpResponse, ApiError> {
    let update = body.into_inner().into_update(path.into_inner(), &data.author_id)?;
    data.posts.update_post(update).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn api_delete(data: web::Data<AppState>, path: web::Path<i64>) -> Result<HttpResponse, ApiError> {
    data.posts.delete_post(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Escapes the body and keeps its line breaks.
pub fn render_body(raw: &str) -> String {
    html_escape::encode_safe(raw)
        .lines()
        .collect::<Vec<_>>()
        .join("<br />")
}
