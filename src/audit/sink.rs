//! Audit destinations.

use std::sync::Arc;

use super::AuditEntry;

/// Failure to persist an audit entry.
///
/// Callers log and swallow this: an audit outage degrades the audit log,
/// never the business operation that produced the entry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("audit append failed: {0}")]
pub struct AuditError(pub String);

/// Append-only destination for audit entries.
pub trait AuditSink: Send + Sync {
    /// Appends one entry. Entries are write-once.
    fn append(&self, entry: &AuditEntry) -> Result<(), AuditError>;
}

/// Emits entries as structured events on the `compliance_audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn append(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        tracing::info!(
            target: "compliance_audit",
            audit_id = %entry.id,
            actor_id = %entry.actor_id,
            action = %entry.action,
            resource_type = %entry.resource_type,
            resource_id = %entry.resource_id,
            outcome = %entry.outcome,
            request_id = ?entry.request_id,
            timestamp = %entry.timestamp.to_rfc3339(),
            "audit entry"
        );
        Ok(())
    }
}

/// Appends to several sinks; fails if any of them fails, after trying all.
#[derive(Default, Clone)]
pub struct FanoutAuditSink {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl FanoutAuditSink {
    /// Creates an empty fan-out.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a destination.
    pub fn with(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl AuditSink for FanoutAuditSink {
    fn append(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        let failures: Vec<String> = self
            .sinks
            .iter()
            .filter_map(|s| s.append(entry).err())
            .map(|e| e.0)
            .collect();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(AuditError(failures.join("; ")))
        }
    }
}
