//! In-memory image history mirrored to durable storage

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::history::record::HistoryRecord;
use crate::history::storage::HistoryStorage;

/// Per-record footprint used when nothing else is configured
pub const DEFAULT_RECORD_SIZE_MB: f64 = 0.5;

/// Summary of the stored history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryStats {
    pub total_images: usize,
    pub total_size_estimate_mb: f64,
    pub oldest_image: Option<DateTime<Utc>>,
    pub newest_image: Option<DateTime<Utc>>,
}

/// Newest-first collection of generated images.
///
/// Every mutation rewrites the whole collection through the storage port. Storage
/// failures are logged and never returned to the caller.
pub struct HistoryStore {
    records: RwLock<Vec<HistoryRecord>>,
    storage: Arc<dyn HistoryStorage>,
    record_size_mb: f64,
}

impl HistoryStore {
    /// Load whatever the storage holds; a missing or corrupt payload yields an empty history
    pub fn load(storage: Arc<dyn HistoryStorage>) -> Self {
        let records = match storage.load() {
            Ok(Some(payload)) => match serde_json::from_str::<Vec<HistoryRecord>>(&payload) {
                Ok(records) => {
                    let records = dedupe_ids(records);
                    info!(count = records.len(), "Loaded image history");
                    records
                }
                Err(e) => {
                    error!(error = %e, "Failed to parse image history, starting empty");
                    Vec::new()
                }
            },
            Ok(None) => {
                debug!("No saved image history");
                Vec::new()
            }
            Err(e) => {
                error!(error = %e, "Failed to load image history, starting empty");
                Vec::new()
            }
        };

        Self {
            records: RwLock::new(records),
            storage,
            record_size_mb: DEFAULT_RECORD_SIZE_MB,
        }
    }

    /// Override the per-record size used by [`HistoryStore::stats`]
    pub fn with_record_size_mb(mut self, record_size_mb: f64) -> Self {
        self.record_size_mb = record_size_mb;
        self
    }

    /// Insert at the head. A record whose id is already present is skipped.
    pub fn add(&self, record: HistoryRecord) -> bool {
        let mut records = self.records.write();
        if records.iter().any(|r| r.id == record.id) {
            warn!(id = %record.id, "Skipping history record with duplicate id");
            return false;
        }

        debug!(id = %record.id, "Adding image to history");
        records.insert(0, record);
        self.persist(&records);
        true
    }

    /// Delete the record with `id`. Returns whether anything was removed.
    pub fn remove(&self, id: &str) -> bool {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|r| r.id != id);

        let removed = records.len() != before;
        if removed {
            debug!(id = %id, "Removed image from history");
        }
        self.persist(&records);
        removed
    }

    pub fn clear(&self) {
        let mut records = self.records.write();
        info!(count = records.len(), "Clearing image history");
        records.clear();
        self.persist(&records);
    }

    pub fn get(&self, id: &str) -> Option<HistoryRecord> {
        self.records.read().iter().find(|r| r.id == id).cloned()
    }

    /// Snapshot of all records, newest first
    pub fn list(&self) -> Vec<HistoryRecord> {
        self.records.read().clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn stats(&self) -> HistoryStats {
        let records = self.records.read();

        HistoryStats {
            total_images: records.len(),
            total_size_estimate_mb: records.len() as f64 * self.record_size_mb,
            oldest_image: records
                .iter()
                .min_by_key(|r| r.timestamp)
                .and_then(HistoryRecord::created_at),
            newest_image: records
                .iter()
                .max_by_key(|r| r.timestamp)
                .and_then(HistoryRecord::created_at),
        }
    }

    fn persist(&self, records: &[HistoryRecord]) {
        let payload = match serde_json::to_string(records) {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, "Failed to serialize image history");
                return;
            }
        };

        if let Err(e) = self.storage.save(&payload) {
            error!(error = %e, "Failed to save image history");
        }
    }
}

/// Keep the first (newest) record for each id
fn dedupe_ids(records: Vec<HistoryRecord>) -> Vec<HistoryRecord> {
    let total = records.len();
    let mut seen = HashSet::with_capacity(total);
    let unique: Vec<HistoryRecord> = records
        .into_iter()
        .filter(|r| seen.insert(r.id.clone()))
        .collect();

    if unique.len() != total {
        warn!(
            dropped = total - unique.len(),
            "Dropped history records with duplicate ids"
        );
    }
    unique
}
