// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Encrypted on-disk secure store.
//!
//! One file per key, sealed with [`TokenCipher`] using the key name as
//! associated data. Writes go to a unique temp file and are renamed into
//! place, so readers only ever see complete values.

use super::SecureStore;
use crate::error::{AuthError, Result};
use crate::services::cipher::TokenCipher;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

const SEALED_EXT: &str = "sealed";

pub struct EncryptedFileStore {
    dir: PathBuf,
    cipher: TokenCipher,
    /// Distinguishes temp files of concurrent writers.
    write_seq: AtomicU64,
}

impl EncryptedFileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub async fn open(dir: impl Into<PathBuf>, cipher: TokenCipher) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            AuthError::Storage(format!("Failed to create store dir {}: {}", dir.display(), e))
        })?;

        tracing::debug!(dir = %dir.display(), "Opened encrypted token store");

        Ok(Self {
            dir,
            cipher,
            write_seq: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(AuthError::Storage(format!("Invalid store key: {:?}", key)));
        }
        Ok(self.dir.join(format!("{}.{}", key, SEALED_EXT)))
    }
}

#[async_trait]
impl SecureStore for EncryptedFileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        let sealed = match tokio::fs::read_to_string(&path).await {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AuthError::Storage(format!("Read {} failed: {}", key, e))),
        };

        self.cipher.open(&sealed, key.as_bytes()).map(Some)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let sealed = self.cipher.seal(value, key.as_bytes())?;

        let seq = self.write_seq.fetch_add(1, Ordering::Relaxed);
        let tmp = self
            .dir
            .join(format!(".{}.{}.{}.tmp", key, std::process::id(), seq));

        tokio::fs::write(&tmp, sealed.as_bytes())
            .await
            .map_err(|e| AuthError::Storage(format!("Write {} failed: {}", key, e)))?;

        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(AuthError::Storage(format!("Commit {} failed: {}", key, e)));
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AuthError::Storage(format!("Delete {} failed: {}", key, e))),
        }
    }
}
