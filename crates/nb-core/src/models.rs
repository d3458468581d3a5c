//! # Domain Models
//!
//! These structs represent the core entities of the noticeboard.
//! Ids are SQLite row ids, assigned by the repository.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A board entry together with its attachments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub view_count: i64,
    pub creator_id: String,
    pub created_at: DateTime<Utc>,
    pub updater_id: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Populated only by the view operation
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// One row of the board listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostSummary {
    pub id: i64,
    pub title: String,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
}

/// A stored file owned by exactly one Post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: i64,
    pub post_id: i64,
    /// Client-supplied name, shown and sent back on download only
    pub original_name: String,
    /// `YYYYMMDD/<token>.<ext>`, relative to the store root
    pub stored_path: String,
    pub size_bytes: i64,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
}

/// Attachment descriptor produced by ingestion, before it has a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttachment {
    pub post_id: i64,
    pub original_name: String,
    pub stored_path: String,
    pub size_bytes: i64,
    pub content_type: String,
}

/// Validated input for creating a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub title: String,
    pub body: String,
    pub creator_id: String,
}

/// Validated input for overwriting a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePost {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub updater_id: String,
}

/// One uploaded file part as the transport extracted it.
#[derive(Debug, Clone)]
pub struct UploadPart {
    /// Form field name the part was sent under
    pub field: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl UploadPart {
    pub fn size_bytes(&self) -> i64 {
        self.data.len() as i64
    }
}

/// The image types accepted as attachments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
}

impl ImageKind {
    /// Picks the kind from a declared content type. Parameters are ignored,
    /// anything unparsable or outside the three image types yields `None`.
    pub fn from_content_type(declared: Option<&str>) -> Option<Self> {
        let parsed: mime::Mime = declared?.trim().parse().ok()?;
        match parsed.essence_str().to_ascii_lowercase().as_str() {
            "image/jpeg" => Some(ImageKind::Jpeg),
            "image/png" => Some(ImageKind::Png),
            "image/gif" => Some(ImageKind::Gif),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
            ImageKind::Gif => "gif",
        }
    }

    pub fn essence(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
            ImageKind::Gif => "image/gif",
        }
    }
}

/// What ingestion does after a part with an unsupported content type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnsupportedPolicy {
    /// Skip that part only.
    #[default]
    SkipPart,
    /// Skip that part and every later part of the same form field.
    StopField,
}

/// Whether a view must persist its counter increment before returning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewCountMode {
    #[default]
    Durable,
    BestEffort,
}
