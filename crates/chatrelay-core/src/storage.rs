//! Sled-backed document storage shared by the history, settings and access-log stores.
//! One `Storage` per database path, opened at startup and cloned into each store.

use std::path::Path;

const DEFAULT_STORAGE_PATH: &str = "./data/chatrelay";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sled: {0}")]
    Sled(#[from] sled::Error),
    #[error("document encoding: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed id: {0}")]
    InvalidId(String),
    #[error("not found: {0}")]
    NotFound(String),
}

/// Handle to one sled database. Cloning is cheap (sled `Db` is reference counted).
#[derive(Clone)]
pub struct Storage {
    db: sled::Db,
}

impl Storage {
    /// Open the database at the given path (default `./data/chatrelay`).
    pub fn open(path: Option<impl AsRef<Path>>) -> Result<Self, StoreError> {
        let p = path
            .map(|x| x.as_ref().to_path_buf())
            .unwrap_or_else(|| Path::new(DEFAULT_STORAGE_PATH).to_path_buf());
        if let Some(parent) = p.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = sled::open(&p)?;
        tracing::debug!(path = %p.display(), "storage opened");
        Ok(Self { db })
    }

    /// In-memory database that is discarded on drop.
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    pub fn tree(&self, name: &str) -> Result<sled::Tree, StoreError> {
        Ok(self.db.open_tree(name)?)
    }

    pub async fn flush(&self) -> Result<usize, StoreError> {
        Ok(self.db.flush_async().await?)
    }
}
