//! # ApiError
//!
//! Maps each `AppError` kind to its own HTTP status.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use nb_core::error::AppError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
#[error(transparent)]
pub struct ApiError(#[from] pub AppError);

#[derive(Serialize)]
struct ApiErrBody {
    error: String,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self.0 {
            AppError::NotFound(_, _) => StatusCode::NOT_FOUND,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::Storage(_) | AppError::Repository(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("request failed: {}", self.0);
        } else {
            log::debug!("request rejected: {}", self.0);
        }
        HttpResponse::build(status).json(ApiErrBody { error: self.to_string() })
    }
}
