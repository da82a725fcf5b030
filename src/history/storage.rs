//! Durable storage port for the image history

use parking_lot::Mutex;
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

/// Key-value style persistence for the serialized history
pub trait HistoryStorage: Send + Sync {
    /// Previously saved payload, `None` when nothing was saved yet
    fn load(&self) -> Result<Option<String>>;

    /// Overwrite the saved payload
    fn save(&self, payload: &str) -> Result<()>;
}

/// History kept in a single JSON file
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl HistoryStorage for FileStorage {
    fn load(&self) -> Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Persistence(format!(
                "Failed to read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn save(&self, payload: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Persistence(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        // Written to a sibling temp file, then renamed over the target
        let temp = self.temp_path();
        std::fs::write(&temp, payload)
            .and_then(|_| std::fs::rename(&temp, &self.path))
            .map_err(|e| {
                AppError::Persistence(format!("Failed to write {}: {}", self.path.display(), e))
            })
    }
}

/// In-process storage, lost on restart
#[derive(Debug, Default)]
pub struct MemoryStorage {
    payload: Mutex<Option<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing payload
    pub fn with_payload(payload: impl Into<String>) -> Self {
        Self {
            payload: Mutex::new(Some(payload.into())),
        }
    }

    pub fn payload(&self) -> Option<String> {
        self.payload.lock().clone()
    }
}

impl HistoryStorage for MemoryStorage {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.payload.lock().clone())
    }

    fn save(&self, payload: &str) -> Result<()> {
        *self.payload.lock() = Some(payload.to_string());
        Ok(())
    }
}
