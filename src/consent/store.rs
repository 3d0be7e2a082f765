use parking_lot::Mutex;
use uuid::Uuid;

use super::{ConsentDraft, ConsentRecord};
use crate::error::StorageError;

/// Result of an append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Appended {
    /// A new record was written
    Inserted(ConsentRecord),
    /// A DSR-linked record for the same contact and purpose already existed;
    /// nothing was written
    Existing(ConsentRecord),
}

impl Appended {
    /// The new or pre-existing record.
    pub fn record(&self) -> &ConsentRecord {
        match self {
            Appended::Inserted(r) | Appended::Existing(r) => r,
        }
    }

    /// Consumes into the record.
    pub fn into_record(self) -> ConsentRecord {
        match self {
            Appended::Inserted(r) | Appended::Existing(r) => r,
        }
    }

    /// True when this call wrote a record.
    pub fn is_new(&self) -> bool {
        matches!(self, Appended::Inserted(_))
    }
}

/// Persistence for consent records.
///
/// Implementations must assign `sequence` values that strictly increase in
/// append order, and must make the DSR uniqueness check and the insert one
/// atomic step (a unique index on `(contact_id, purpose, dsr_id)`).
pub trait ConsentStore: Send + Sync {
    /// Appends a record. Drafts carrying a `dsr_id` are written at most once
    /// per (contact, purpose, dsr).
    fn append(&self, draft: ConsentDraft) -> Result<Appended, StorageError>;

    /// All records for a contact, ordered by `sequence`.
    fn for_contact(&self, contact_id: &str) -> Result<Vec<ConsentRecord>, StorageError>;

    /// Hard-deletes every record for a contact; returns how many were removed.
    fn erase_contact(&self, contact_id: &str) -> Result<usize, StorageError>;
}

#[derive(Debug, Default)]
struct Inner {
    last_sequence: u64,
    records: Vec<ConsentRecord>,
}

/// In-memory [`ConsentStore`].
#[derive(Debug, Default)]
pub struct MemoryConsentStore {
    inner: Mutex<Inner>,
}

impl MemoryConsentStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total records across all contacts.
    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    /// True if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().records.is_empty()
    }
}

impl ConsentStore for MemoryConsentStore {
    fn append(&self, draft: ConsentDraft) -> Result<Appended, StorageError> {
        let mut inner = self.inner.lock();

        if let Some(dsr_id) = draft.dsr_id {
            if let Some(existing) = inner.records.iter().find(|r| {
                r.dsr_id == Some(dsr_id)
                    && r.contact_id == draft.contact_id
                    && r.purpose == draft.purpose
            }) {
                return Ok(Appended::Existing(existing.clone()));
            }
        }

        inner.last_sequence += 1;
        let record = ConsentRecord::from_draft(draft, Uuid::new_v4(), inner.last_sequence);
        inner.records.push(record.clone());
        Ok(Appended::Inserted(record))
    }

    fn for_contact(&self, contact_id: &str) -> Result<Vec<ConsentRecord>, StorageError> {
        // Records are pushed in sequence order, so a filter preserves it.
        Ok(self
            .inner
            .lock()
            .records
            .iter()
            .filter(|r| r.contact_id == contact_id)
            .cloned()
            .collect())
    }

    fn erase_contact(&self, contact_id: &str) -> Result<usize, StorageError> {
        let mut inner = self.inner.lock();
        let before = inner.records.len();
        inner.records.retain(|r| r.contact_id != contact_id);
        Ok(before - inner.records.len())
    }
}
