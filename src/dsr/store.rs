use std::collections::HashMap;

use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use super::model::DsrRequest;
use crate::error::StorageError;

/// Persistence for DSRs.
///
/// Writes after creation go through [`compare_and_swap`](Self::compare_and_swap)
/// so two concurrent transitions of the same request cannot both land.
pub trait DsrStore: Send + Sync {
    /// Allocates the next request-number sequence value. Never repeats.
    fn next_sequence(&self) -> Result<u64, StorageError>;

    /// Stores a new request.
    fn insert(&self, request: DsrRequest) -> Result<(), StorageError>;

    /// Fetches one request.
    fn get(&self, id: Uuid) -> Result<Option<DsrRequest>, StorageError>;

    /// Every request, newest first.
    fn list(&self) -> Result<Vec<DsrRequest>, StorageError>;

    /// Replaces the stored request only if its version is still
    /// `expected_version`; otherwise fails with
    /// [`StorageError::VersionConflict`].
    fn compare_and_swap(&self, expected_version: u64, updated: DsrRequest) -> Result<(), StorageError>;
}

/// In-memory [`DsrStore`].
#[derive(Debug, Default)]
pub struct MemoryDsrStore {
    sequence: Mutex<u64>,
    requests: RwLock<HashMap<Uuid, DsrRequest>>,
}

impl MemoryDsrStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DsrStore for MemoryDsrStore {
    fn next_sequence(&self) -> Result<u64, StorageError> {
        let mut seq = self.sequence.lock();
        *seq += 1;
        Ok(*seq)
    }

    fn insert(&self, request: DsrRequest) -> Result<(), StorageError> {
        let mut requests = self.requests.write();
        if requests.contains_key(&request.id) {
            return Err(StorageError::Backend(format!("duplicate request id '{}'", request.id)));
        }
        requests.insert(request.id, request);
        Ok(())
    }

    fn get(&self, id: Uuid) -> Result<Option<DsrRequest>, StorageError> {
        Ok(self.requests.read().get(&id).cloned())
    }

    fn list(&self) -> Result<Vec<DsrRequest>, StorageError> {
        let mut all: Vec<DsrRequest> = self.requests.read().values().cloned().collect();
        all.sort_by(|a, b| {
            b.requested_at
                .cmp(&a.requested_at)
                .then_with(|| b.request_number.cmp(&a.request_number))
        });
        Ok(all)
    }

    fn compare_and_swap(&self, expected_version: u64, updated: DsrRequest) -> Result<(), StorageError> {
        let mut requests = self.requests.write();
        let Some(stored) = requests.get_mut(&updated.id) else {
            return Err(StorageError::Backend(format!("request '{}' does not exist", updated.id)));
        };
        if stored.version != expected_version {
            return Err(StorageError::VersionConflict {
                id: updated.id.to_string(),
                expected: expected_version,
                found: stored.version,
            });
        }
        *stored = updated;
        Ok(())
    }
}
