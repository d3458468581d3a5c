//! # configs
//!
//! Layered settings: built-in defaults, then an optional `noticeboard.toml`,
//! then `NOTICEBOARD__SECTION__KEY` environment variables (a `.env` file is
//! loaded first when present).

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use nb_core::models::{UnsupportedPolicy, ViewCountMode};
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "noticeboard.toml";
const ENV_PREFIX: &str = "NOTICEBOARD";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub storage: StorageSettings,
    pub board: BoardSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// e.g. "sqlite:noticeboard.db" or "sqlite::memory:"
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    pub root: PathBuf,
    /// Upper bound for one multipart request body
    pub max_upload_bytes: usize,
    pub on_unsupported: UnsupportedPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BoardSettings {
    /// Recorded as creator/updater of every post
    pub author_id: String,
    pub view_count: ViewCountMode,
}

impl Settings {
    /// Loads `.env`, then `noticeboard.toml` from the working directory if it exists.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            log::debug!("loaded environment from {}", path.display());
        }
        Self::from_file(Path::new(DEFAULT_CONFIG_FILE))
    }

    /// Defaults, overlaid by `path` (optional) and the environment.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080_i64)?
            .set_default("database.url", "sqlite:noticeboard.db")?
            .set_default("database.max_connections", 5_i64)?
            .set_default("storage.root", "./data/uploads")?
            .set_default("storage.max_upload_bytes", 10_i64 * 1024 * 1024)?
            .set_default("storage.on_unsupported", "skip_part")?
            .set_default("board.author_id", "admin")?
            .set_default("board.view_count", "durable")?
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn bind_addr(&self) -> (String, u16) {
        (self.server.host.clone(), self.server.port)
    }
}
