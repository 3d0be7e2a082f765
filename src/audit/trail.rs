//! In-memory audit sink.

use parking_lot::Mutex;

use super::{AuditEntry, AuditError, AuditSink};

/// Records entries in memory, in append order.
///
/// # Example
///
/// ```
/// use compliance_core::audit::{AuditEntry, AuditOutcome, AuditSink, AuditTrail};
/// use compliance_core::rbac::{Action, Resource};
///
/// let trail = AuditTrail::new();
/// trail
///     .append(&AuditEntry::new("u-1", Action::Create, Resource::Dsr, "d-1", AuditOutcome::Success))
///     .unwrap();
///
/// assert_eq!(trail.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct AuditTrail {
    entries: Mutex<Vec<AuditEntry>>,
}

impl AuditTrail {
    /// Creates an empty trail.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all entries, oldest first.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl AuditSink for AuditTrail {
    fn append(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        self.entries.lock().push(entry.clone());
        Ok(())
    }
}
