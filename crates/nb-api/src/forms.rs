//! # Request records
//!
//! Raw request input is turned into validated, fully-populated records here,
//! before anything reaches `PostService`.

use std::collections::HashMap;

use actix_multipart::Multipart;
use futures_util::TryStreamExt as _;
use nb_core::error::AppError;
use nb_core::models::{NewPost, UpdatePost, UploadPart};
use serde::Deserialize;

/// Title and body as submitted by a form or a JSON body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
}

impl PostForm {
    fn checked(self) -> Result<(String, String), AppError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::ValidationError("title is required".to_string()));
        }
        if self.body.trim().is_empty() {
            return Err(AppError::ValidationError("body is required".to_string()));
        }
        Ok((title, self.body))
    }

    pub fn into_new_post(self, author_id: &str) -> Result<NewPost, AppError> {
        let (title, body) = self.checked()?;
        Ok(NewPost { title, body, creator_id: author_id.to_string() })
    }

    pub fn into_update(self, id: i64, author_id: &str) -> Result<UpdatePost, AppError> {
        let (title, body) = self.checked()?;
        Ok(UpdatePost { id, title, body, updater_id: author_id.to_string() })
    }
}

/// A multipart submission split into text fields and file parts.
#[derive(Debug, Default)]
pub struct MultipartPost {
    pub form: PostForm,
    pub parts: Vec<UploadPart>,
}

/// Reads the whole multipart body. Parts with a filename are uploads, the
/// rest are text fields. The body as a whole may not exceed `max_bytes`.
pub async fn read_multipart(mut payload: Multipart, max_bytes: usize) -> Result<MultipartPost, AppError> {
    let mut text: HashMap<String, String> = HashMap::new();
    let mut parts = Vec::new();
    let mut total = 0usize;

    while let Some(mut field) = payload.try_next().await.map_err(multipart_err)? {
        let (name, file_name) = {
            let disposition = field.content_disposition();
            (
                disposition.get_name().unwrap_or_default().to_string(),
                disposition.get_filename().map(str::to_string),
            )
        };
        let content_type = field.content_type().map(|m| m.to_string());

        let mut data = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(multipart_err)? {
            total += chunk.len();
            if total > max_bytes {
                return Err(AppError::ValidationError(format!("upload exceeds {} bytes", max_bytes)));
            }
            data.extend_from_slice(&chunk);
        }

        match file_name {
            Some(file_name) => parts.push(UploadPart { field: name, file_name, content_type, data }),
            None => {
                let value = String::from_utf8(data)
                    .map_err(|_| AppError::ValidationError(format!("field {} is not UTF-8", name)))?;
                text.insert(name, value);
            }
        }
    }

    let form = PostForm {
        title: text.remove("title").unwrap_or_default(),
        body: text.remove("body").unwrap_or_default(),
    };
    Ok(MultipartPost { form, parts })
}

fn multipart_err(e: actix_multipart::MultipartError) -> AppError {
    AppError::ValidationError(format!("invalid multipart body: {}", e))
}
