//! Interfaces to the external record stores, with in-memory implementations.
//!
//! Contacts, opportunities, activities, NCRs, documents and suppliers are
//! plain JSON records owned by an external CRUD service. The compliance
//! façade is its only caller.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::StorageError;
use crate::rbac::RecordKind;

/// Equality filter over top-level record fields.
pub type Filter = Map<String, Value>;

/// Minimal CRUD interface of the external record store.
pub trait RecordStore: Send + Sync {
    /// Fetches one record.
    fn get(&self, kind: RecordKind, id: &str) -> Result<Option<Value>, StorageError>;

    /// Lists records matching every field in `filter`, newest first.
    fn list(&self, kind: RecordKind, filter: &Filter) -> Result<Vec<Value>, StorageError>;

    /// Inserts a record and returns it with its assigned id.
    fn create(&self, kind: RecordKind, payload: Value, actor_id: &str) -> Result<Value, StorageError>;

    /// Merges `payload` into an existing record. `None` when absent.
    fn update(&self, kind: RecordKind, id: &str, payload: Value) -> Result<Option<Value>, StorageError>;

    /// Deletes a record. `false` when absent.
    fn delete(&self, kind: RecordKind, id: &str) -> Result<bool, StorageError>;
}

/// In-memory [`RecordStore`].
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<RecordKind, Vec<Value>>>,
}

fn record_id(record: &Value) -> Option<&str> {
    record.get("id").and_then(Value::as_str)
}

fn matches(record: &Value, filter: &Filter) -> bool {
    filter.iter().all(|(k, v)| record.get(k) == Some(v))
}

impl MemoryRecordStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records of a kind.
    pub fn count(&self, kind: RecordKind) -> usize {
        self.records.read().get(&kind).map_or(0, Vec::len)
    }
}

impl RecordStore for MemoryRecordStore {
    fn get(&self, kind: RecordKind, id: &str) -> Result<Option<Value>, StorageError> {
        let records = self.records.read();
        Ok(records
            .get(&kind)
            .and_then(|rs| rs.iter().find(|r| record_id(r) == Some(id)))
            .cloned())
    }

    fn list(&self, kind: RecordKind, filter: &Filter) -> Result<Vec<Value>, StorageError> {
        let records = self.records.read();
        Ok(records
            .get(&kind)
            .map(|rs| rs.iter().rev().filter(|r| matches(r, filter)).cloned().collect())
            .unwrap_or_default())
    }

    fn create(&self, kind: RecordKind, payload: Value, actor_id: &str) -> Result<Value, StorageError> {
        let Value::Object(mut map) = payload else {
            return Err(StorageError::Backend(format!("{} payload must be an object", kind)));
        };
        let now = Utc::now().to_rfc3339();
        map.entry("id")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        map.insert("created_by".into(), Value::String(actor_id.to_string()));
        map.insert("created_at".into(), Value::String(now.clone()));
        map.insert("updated_at".into(), Value::String(now));
        let record = Value::Object(map);

        let mut records = self.records.write();
        let bucket = records.entry(kind).or_default();
        if let Some(id) = record_id(&record) {
            if bucket.iter().any(|r| record_id(r) == Some(id)) {
                return Err(StorageError::Backend(format!("duplicate {} id '{}'", kind, id)));
            }
        }
        bucket.push(record.clone());
        Ok(record)
    }

    fn update(&self, kind: RecordKind, id: &str, payload: Value) -> Result<Option<Value>, StorageError> {
        let Value::Object(changes) = payload else {
            return Err(StorageError::Backend(format!("{} payload must be an object", kind)));
        };
        let mut records = self.records.write();
        let Some(record) = records
            .get_mut(&kind)
            .and_then(|rs| rs.iter_mut().find(|r| record_id(r) == Some(id)))
        else {
            return Ok(None);
        };
        if let Some(map) = record.as_object_mut() {
            for (k, v) in changes {
                if k != "id" {
                    map.insert(k, v);
                }
            }
            map.insert("updated_at".into(), Value::String(Utc::now().to_rfc3339()));
        }
        Ok(Some(record.clone()))
    }

    fn delete(&self, kind: RecordKind, id: &str) -> Result<bool, StorageError> {
        let mut records = self.records.write();
        let Some(bucket) = records.get_mut(&kind) else {
            return Ok(false);
        };
        let before = bucket.len();
        bucket.retain(|r| record_id(r) != Some(id));
        Ok(bucket.len() != before)
    }
}

/// A request to anonymize or erase a contact, raised by a completed
/// deletion DSR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErasureJob {
    /// The deletion request that authorized this job
    pub dsr_id: Uuid,
    /// Contact to anonymize
    pub contact_id: String,
    /// When the job was raised
    pub requested_at: DateTime<Utc>,
}

/// Queue consumed by the external anonymization worker.
pub trait ErasureQueue: Send + Sync {
    /// Enqueues a job. Enqueueing the same DSR twice is a no-op that returns
    /// `false`.
    fn enqueue(&self, job: ErasureJob) -> Result<bool, StorageError>;
}

/// In-memory [`ErasureQueue`].
#[derive(Debug, Default)]
pub struct MemoryErasureQueue {
    jobs: Mutex<Vec<ErasureJob>>,
}

impl MemoryErasureQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of queued jobs, oldest first.
    pub fn jobs(&self) -> Vec<ErasureJob> {
        self.jobs.lock().clone()
    }
}

impl ErasureQueue for MemoryErasureQueue {
    fn enqueue(&self, job: ErasureJob) -> Result<bool, StorageError> {
        let mut jobs = self.jobs.lock();
        if jobs.iter().any(|j| j.dsr_id == job.dsr_id) {
            return Ok(false);
        }
        jobs.push(job);
        Ok(true)
    }
}
