//! Audit entry schema.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::rbac::{Action, Resource};

/// Outcome recorded for an audited operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    /// State changed
    Success,
    /// Idempotent replay; nothing changed
    Unchanged,
    /// Refused by the authorization engine
    Denied,
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditOutcome::Success => write!(f, "success"),
            AuditOutcome::Unchanged => write!(f, "unchanged"),
            AuditOutcome::Denied => write!(f, "denied"),
        }
    }
}

/// One audit log line.
///
/// # Example
///
/// ```
/// use compliance_core::audit::{AuditEntry, AuditOutcome};
/// use compliance_core::rbac::{Action, Resource};
///
/// let entry = AuditEntry::new("u-1", Action::Withdraw, Resource::Consent, "c-9", AuditOutcome::Success)
///     .with_request_id("req-7");
///
/// assert_eq!(entry.actor_id, "u-1");
/// assert_eq!(entry.request_id.as_deref(), Some("req-7"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Entry identifier
    pub id: Uuid,
    /// Principal that performed the action
    pub actor_id: String,
    /// What was done
    pub action: Action,
    /// Kind of record touched
    pub resource_type: Resource,
    /// Identifier of the record touched
    pub resource_id: String,
    /// When the entry was produced
    pub timestamp: DateTime<Utc>,
    /// Result of the operation
    pub outcome: AuditOutcome,
    /// Correlation id of the originating request
    pub request_id: Option<String>,
}

impl AuditEntry {
    /// Creates an entry stamped with the current time.
    pub fn new(
        actor_id: impl Into<String>,
        action: Action,
        resource_type: Resource,
        resource_id: impl Into<String>,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor_id: actor_id.into(),
            action,
            resource_type,
            resource_id: resource_id.into(),
            timestamp: Utc::now(),
            outcome,
            request_id: None,
        }
    }

    /// Attaches the request correlation id.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

impl fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AuditEntry[{} {}:{} id={} by={} outcome={}",
            self.timestamp.to_rfc3339(),
            self.resource_type,
            self.action,
            self.resource_id,
            self.actor_id,
            self.outcome
        )?;
        if let Some(request_id) = &self.request_id {
            write!(f, " request_id={}", request_id)?;
        }
        write!(f, "]")
    }
}
