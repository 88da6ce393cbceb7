//! Handoff of finalized recordings to storage

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Save-path selection and file writing, supplied by the host application.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Ask where to save a recording. `None` means the user cancelled.
    async fn request_save_path(&self, suggested_name: &str) -> Option<PathBuf>;

    async fn write_bytes(&self, path: &Path, data: &[u8]) -> io::Result<()>;
}

/// `<prefix>-<unix epoch millis>.<extension>`
pub fn default_file_name(prefix: &str, extension: &str, now: DateTime<Utc>) -> String {
    format!("{}-{}.{}", prefix, now.timestamp_millis(), extension)
}

/// Saves every recording under the suggested name inside one directory.
#[derive(Debug, Clone)]
pub struct DirectoryPersistence {
    directory: PathBuf,
}

impl DirectoryPersistence {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

#[async_trait]
impl Persistence for DirectoryPersistence {
    async fn request_save_path(&self, suggested_name: &str) -> Option<PathBuf> {
        Some(self.directory.join(suggested_name))
    }

    async fn write_bytes(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, data).await?;
        log::info!("Wrote {} bytes to {}", data.len(), path.display());
        Ok(())
    }
}
