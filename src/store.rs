//! Storage of the single MIDNAM document
//!
//! Saves copy the current file to a timestamped backup next to it before
//! overwriting. Backup and write run under one in-process lock.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tokio::sync::Mutex;

use crate::error::{Result, ServiceError, StorageOperation};
use crate::libxml2::LibXml2Wrapper;

/// Backup suffix timestamp, local time with second resolution
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// What a successful save did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    /// Where the previous document was copied, `None` when there was none
    pub backup: Option<PathBuf>,
}

#[derive(Debug)]
pub struct DocumentStore {
    path: PathBuf,
    save_lock: Mutex<()>,
    libxml: LibXml2Wrapper,
}

impl DocumentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            save_lock: Mutex::new(()),
            libxml: LibXml2Wrapper::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<path>.backup.<timestamp>` for the given instant
    pub fn backup_path_for(&self, timestamp: DateTime<Local>) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".backup.");
        name.push(timestamp.format(BACKUP_TIMESTAMP_FORMAT).to_string());
        PathBuf::from(name)
    }

    /// Read the stored document verbatim
    pub async fn load(&self) -> Result<Vec<u8>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                tracing::debug!(path = %self.path.display(), bytes = bytes.len(), "Loaded document");
                Ok(bytes)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(ServiceError::NotFound {
                path: self.path.clone(),
            }),
            Err(e) => Err(ServiceError::storage(StorageOperation::Read, &self.path, e)),
        }
    }

    /// Back up the current document, then replace it with `xml`
    pub async fn save(&self, xml: &str) -> Result<SaveOutcome> {
        self.save_at(xml, Local::now()).await
    }

    /// [`DocumentStore::save`] with an explicit backup timestamp
    pub async fn save_at(&self, xml: &str, timestamp: DateTime<Local>) -> Result<SaveOutcome> {
        if xml.is_empty() {
            return Err(ServiceError::BadRequest);
        }

        if let Err(e) = self.libxml.check_well_formed(xml.as_bytes()) {
            return Err(ServiceError::InvalidInput {
                details: e.to_string(),
            });
        }

        let _guard = self.save_lock.lock().await;

        let exists = tokio::fs::try_exists(&self.path)
            .await
            .map_err(|e| ServiceError::storage(StorageOperation::Backup, &self.path, e))?;

        let backup = if exists {
            let backup_path = self.backup_path_for(timestamp);
            tokio::fs::copy(&self.path, &backup_path)
                .await
                .map_err(|e| ServiceError::storage(StorageOperation::Backup, &backup_path, e))?;
            tracing::info!(backup = %backup_path.display(), "Backed up previous document");
            Some(backup_path)
        } else {
            None
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ServiceError::storage(StorageOperation::Write, parent, e))?;
        }

        tokio::fs::write(&self.path, xml)
            .await
            .map_err(|e| ServiceError::storage(StorageOperation::Write, &self.path, e))?;

        tracing::info!(path = %self.path.display(), bytes = xml.len(), "Saved document");

        Ok(SaveOutcome { backup })
    }
}
