//! Refresh token persistence
//!
//! The token lives in a plain-text file as a single
//! `RING_2FA_REFRESH_TOKEN=<value>` line. Rotation is a first-occurrence text
//! substitution of the old value, which keeps any surrounding content intact.

use crate::utils::error::{BridgeError, BridgeResult};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Key of the stored credential line
pub const REFRESH_TOKEN_KEY: &str = "RING_2FA_REFRESH_TOKEN";

/// What a rotation did to storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationOutcome {
    /// No previous value was supplied, nothing to replace
    Skipped,
    /// The old value was replaced with the new one
    Rotated,
    /// The old value was not present in storage; storage left untouched
    OldValueMissing,
}

/// Single source of truth for the refresh credential
pub struct CredentialStore {
    path: PathBuf,
    /// Latest known value; the lock also serializes read-modify-write cycles
    current: Mutex<Option<String>>,
}

impl CredentialStore {
    /// Create a store backed by the given file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            current: Mutex::new(None),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Latest value loaded or written by this store
    pub async fn current(&self) -> Option<String> {
        self.current.lock().await.clone()
    }

    /// Read the stored token, writing `initial_value` if none is stored yet
    pub async fn load_or_initialize(&self, initial_value: &str) -> BridgeResult<String> {
        let mut current = self.current.lock().await;

        let existing = self.read_contents().await?;
        if let Some(token) = existing.as_deref().and_then(parse_token) {
            tracing::debug!("Loaded refresh token from {:?}", self.path);
            *current = Some(token.clone());
            return Ok(token);
        }

        let initial_value = initial_value.trim();
        if initial_value.is_empty() {
            return Err(BridgeError::Credential(format!(
                "no refresh token stored in {:?} and none configured",
                self.path
            )));
        }

        let line = format!("{}={}\n", REFRESH_TOKEN_KEY, initial_value);
        let contents = match existing {
            Some(mut text) => {
                if !text.is_empty() && !text.ends_with('\n') {
                    text.push('\n');
                }
                text.push_str(&line);
                text
            }
            None => line,
        };
        self.write_contents(contents).await?;

        tracing::info!("Initialized refresh token in {:?}", self.path);
        *current = Some(initial_value.to_string());
        Ok(initial_value.to_string())
    }

    /// Replace the first occurrence of `old_value` with `new_value` in storage
    pub async fn rotate(
        &self,
        old_value: Option<&str>,
        new_value: &str,
    ) -> BridgeResult<RotationOutcome> {
        let old_value = match old_value {
            Some(value) if !value.is_empty() => value,
            _ => {
                tracing::debug!("Refresh token issued without a predecessor, storage unchanged");
                return Ok(RotationOutcome::Skipped);
            }
        };

        let mut current = self.current.lock().await;

        let contents = self.read_contents().await?.ok_or_else(|| {
            BridgeError::Credential(format!("credential file {:?} is missing", self.path))
        })?;

        if !contents.contains(old_value) {
            tracing::warn!(
                "Previous refresh token not found in {:?}, storage left unchanged",
                self.path
            );
            return Ok(RotationOutcome::OldValueMissing);
        }

        self.write_contents(contents.replacen(old_value, new_value, 1))
            .await?;

        tracing::info!("Rotated refresh token in {:?}", self.path);
        *current = Some(new_value.to_string());
        Ok(RotationOutcome::Rotated)
    }

    async fn read_contents(&self) -> BridgeResult<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BridgeError::Credential(format!(
                "failed to read {:?}: {}",
                self.path, e
            ))),
        }
    }

    /// Write through a sibling temp file so readers see either the old or
    /// the new contents, never a partial file
    async fn write_contents(&self, contents: String) -> BridgeResult<()> {
        let path = self.path.clone();
        let result = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            let mut file = tempfile::NamedTempFile::new_in(&dir)?;
            file.write_all(contents.as_bytes())?;
            file.as_file().sync_all()?;
            file.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| BridgeError::Credential(format!("credential write task failed: {}", e)))?;

        result.map_err(|e| {
            BridgeError::Credential(format!("failed to write {:?}: {}", self.path, e))
        })
    }
}

/// Extract the token value from file contents
fn parse_token(contents: &str) -> Option<String> {
    contents.lines().find_map(|line| {
        let value = line
            .trim()
            .strip_prefix(REFRESH_TOKEN_KEY)?
            .trim_start()
            .strip_prefix('=')?
            .trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    })
}
