//! Stream output directory
//!
//! The transcoder writes its playlist and segments into a single flat
//! directory. It is emptied before every session attempt so a stale playlist
//! from a previous stream is never mistaken for a fresh one.

use crate::utils::error::{BridgeError, BridgeResult};
use std::path::{Path, PathBuf};

/// Directory owned by the session manager for transcoder output
#[derive(Debug, Clone)]
pub struct OutputDirectory {
    path: PathBuf,
}

impl OutputDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Full path of a file inside the directory
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Ensure the directory exists and holds no entries
    pub async fn clean(&self) -> BridgeResult<()> {
        let mut entries = match tokio::fs::read_dir(&self.path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tokio::fs::create_dir_all(&self.path)
                    .await
                    .map_err(|e| BridgeError::file_system(&self.path, e))?;
                tracing::debug!("Created output directory {:?}", self.path);
                return Ok(());
            }
            Err(e) => return Err(BridgeError::file_system(&self.path, e)),
        };

        let mut removed = 0usize;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| BridgeError::file_system(&self.path, e))?
        {
            let entry_path = entry.path();
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| BridgeError::file_system(&entry_path, e))?;

            let result = if file_type.is_dir() {
                tokio::fs::remove_dir_all(&entry_path).await
            } else {
                tokio::fs::remove_file(&entry_path).await
            };
            result.map_err(|e| BridgeError::file_system(&entry_path, e))?;
            removed += 1;
        }

        tracing::debug!("Cleaned output directory {:?} ({} entries removed)", self.path, removed);
        Ok(())
    }
}
