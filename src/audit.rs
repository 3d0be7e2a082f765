//! Write-once audit log for regulated state changes.
//!
//! - `AuditEntry`: who did what to which contact, consent or DSR record
//! - `AuditSink`: append-only destination for entries
//! - `AuditTrail`: in-memory sink
//! - `TracingAuditSink`: sink that emits entries as structured `tracing` events
//!
//! Entries hold identifiers only: no field values, no personal data.
//! This layer never reads entries back; reporting consumes them elsewhere.

mod event;
mod sink;
mod trail;

pub use event::{AuditEntry, AuditOutcome};
pub use sink::{AuditError, AuditSink, FanoutAuditSink, TracingAuditSink};
pub use trail::AuditTrail;
