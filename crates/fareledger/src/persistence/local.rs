use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::warn;

use super::GatewayError;
use crate::tracking::record::{TripId, TripRecord};

/// Append-only, newest-first collection of trip records.
///
/// Serves as the durable copy written before any remote attempt and as
/// the read fallback when the remote history endpoint is unreachable.
/// File-backed when a path is configured, purely in-memory otherwise.
pub struct LocalTripCache {
    records: Mutex<Vec<TripRecord>>,
    path: Option<PathBuf>,
}

impl LocalTripCache {
    pub fn in_memory() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            path: None,
        }
    }

    /// Open (or create) a file-backed cache. An unreadable or corrupt
    /// file is an error at startup; a missing file is an empty cache.
    pub fn at_path(path: PathBuf) -> Result<Self, GatewayError> {
        let records = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice::<Vec<TripRecord>>(&bytes)
                .map_err(|err| GatewayError::CacheLoad(err.to_string()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(GatewayError::CacheLoad(err.to_string())),
        };

        Ok(Self {
            records: Mutex::new(records),
            path: Some(path),
        })
    }

    /// Prepend a record (newest first) and flush.
    pub fn insert(&self, record: TripRecord) {
        let mut guard = self.records.lock().expect("trip cache mutex poisoned");
        guard.insert(0, record);
        self.flush(&guard);
    }

    /// Swap the record committed under a provisional local id for its
    /// remote-id twin, so one trip never appears under two ids.
    pub fn replace(&self, local_id: &TripId, record: TripRecord) {
        let mut guard = self.records.lock().expect("trip cache mutex poisoned");
        match guard.iter_mut().find(|existing| existing.id == *local_id) {
            Some(existing) => *existing = record,
            None => guard.insert(0, record),
        }
        self.flush(&guard);
    }

    pub fn newest_first(&self, limit: usize) -> Vec<TripRecord> {
        let guard = self.records.lock().expect("trip cache mutex poisoned");
        guard.iter().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("trip cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write-through for the file-backed mode. A failed flush is logged
    /// and the in-memory copy stays authoritative; persistence failures
    /// never escalate past a warning here.
    fn flush(&self, records: &[TripRecord]) {
        let Some(path) = &self.path else {
            return;
        };

        let payload = match serde_json::to_vec_pretty(records) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "trip cache serialization failed");
                return;
            }
        };

        if let Err(err) = fs::write(path, payload) {
            warn!(path = %path.display(), error = %err, "trip cache flush failed");
        }
    }
}
