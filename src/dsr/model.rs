use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::consent::Purpose;
use crate::error::{Error, Result};

/// Statutory right being exercised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DsrType {
    /// Copy of personal data
    Access,
    /// Correction of personal data
    Rectify,
    /// Erasure of personal data
    Delete,
    /// Restriction of processing
    Restrict,
    /// Withdrawal of consent for one purpose
    WithdrawConsent,
}

impl fmt::Display for DsrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DsrType::Access => "access",
            DsrType::Rectify => "rectify",
            DsrType::Delete => "delete",
            DsrType::Restrict => "restrict",
            DsrType::WithdrawConsent => "withdraw_consent",
        })
    }
}

/// Workflow status, derived from [`DsrState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DsrStatus {
    /// Submitted, not yet picked up
    Pending,
    /// Assigned and being worked
    InProgress,
    /// Fulfilled (terminal)
    Completed,
    /// Refused (terminal)
    Rejected,
}

impl DsrStatus {
    /// Terminal statuses have no outgoing transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DsrStatus::Completed | DsrStatus::Rejected)
    }
}

impl fmt::Display for DsrStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DsrStatus::Pending => "pending",
            DsrStatus::InProgress => "in_progress",
            DsrStatus::Completed => "completed",
            DsrStatus::Rejected => "rejected",
        })
    }
}

/// Workflow state together with the data that only exists in that state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DsrState {
    /// Initial state
    Pending,
    /// Assigned
    InProgress {
        /// Assignee principal id
        assigned_to: String,
    },
    /// Fulfilled
    Completed {
        /// Assignee principal id
        assigned_to: String,
        /// Principal who verified fulfilment
        verified_by: String,
        /// Completion time
        completed_at: DateTime<Utc>,
        /// Consent purposes withdrawn on completion, fixed when the request completes
        withdrawn: BTreeSet<Purpose>,
        /// Set once withdrawals and erasure have been carried out
        effects_applied: bool,
    },
    /// Refused
    Rejected {
        /// Assignee principal id
        assigned_to: String,
        /// Why the request was refused
        reason: String,
        /// Rejection time
        rejected_at: DateTime<Utc>,
    },
}

impl DsrState {
    /// The status tag.
    pub fn status(&self) -> DsrStatus {
        match self {
            DsrState::Pending => DsrStatus::Pending,
            DsrState::InProgress { .. } => DsrStatus::InProgress,
            DsrState::Completed { .. } => DsrStatus::Completed,
            DsrState::Rejected { .. } => DsrStatus::Rejected,
        }
    }

    /// Assignee, once assigned.
    pub fn assigned_to(&self) -> Option<&str> {
        match self {
            DsrState::Pending => None,
            DsrState::InProgress { assigned_to }
            | DsrState::Completed { assigned_to, .. }
            | DsrState::Rejected { assigned_to, .. } => Some(assigned_to),
        }
    }
}

/// A data-subject request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DsrRequest {
    /// Internal identifier
    pub id: Uuid,
    /// Human-readable number, e.g. `DSR-2026-000042`; immutable
    pub request_number: String,
    /// Contact the request concerns
    pub contact_id: String,
    /// Right being exercised
    #[serde(rename = "type")]
    pub request_type: DsrType,
    /// Workflow state
    #[serde(flatten)]
    pub state: DsrState,
    /// Free-text description from the data subject
    pub description: Option<String>,
    /// Handler notes; names the purpose for `withdraw_consent`
    pub notes: Option<String>,
    /// Submission time
    pub requested_at: DateTime<Utc>,
    /// Last state change
    pub updated_at: DateTime<Utc>,
    /// Optimistic-concurrency version, bumped on every write
    pub version: u64,
}

impl DsrRequest {
    /// Current status.
    pub fn status(&self) -> DsrStatus {
        self.state.status()
    }

    /// Assignee, once assigned.
    pub fn assigned_to(&self) -> Option<&str> {
        self.state.assigned_to()
    }

    /// Verifier, once completed.
    pub fn verified_by(&self) -> Option<&str> {
        match &self.state {
            DsrState::Completed { verified_by, .. } => Some(verified_by),
            _ => None,
        }
    }

    /// Completion time, once completed.
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            DsrState::Completed { completed_at, .. } => Some(*completed_at),
            _ => None,
        }
    }

    /// True once a completed request's consent withdrawals and erasure
    /// hand-off have been carried out. Until then the request does not
    /// authorize anything downstream.
    pub fn is_fulfilled(&self) -> bool {
        matches!(
            self.state,
            DsrState::Completed {
                effects_applied: true,
                ..
            }
        )
    }

    /// Purpose named in the notes of a `withdraw_consent` request.
    pub fn withdrawal_purpose(&self) -> Option<Purpose> {
        match self.request_type {
            DsrType::WithdrawConsent => self.notes.as_deref().and_then(|n| n.parse().ok()),
            _ => None,
        }
    }
}

/// Submission payload as received from a caller.
#[derive(Debug, Clone, Deserialize)]
pub struct DsrSubmission {
    /// Contact the request concerns
    pub contact_id: String,
    /// Right being exercised; required
    #[serde(rename = "type", default)]
    pub request_type: Option<DsrType>,
    /// Free-text description
    #[serde(default)]
    pub description: Option<String>,
    /// Notes; must name a purpose for `withdraw_consent`
    #[serde(default)]
    pub notes: Option<String>,
}

/// A validated submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDsr {
    /// Contact the request concerns
    pub contact_id: String,
    /// Right being exercised
    pub request_type: DsrType,
    /// Free-text description
    pub description: Option<String>,
    /// Notes
    pub notes: Option<String>,
}

impl DsrSubmission {
    /// Checks required fields.
    pub fn validate(self) -> Result<NewDsr> {
        if self.contact_id.trim().is_empty() {
            return Err(Error::validation("contact_id is required"));
        }
        let Some(request_type) = self.request_type else {
            return Err(Error::validation("request type is required"));
        };
        if request_type == DsrType::WithdrawConsent {
            let named = self.notes.as_deref().unwrap_or_default();
            named.parse::<Purpose>().map_err(|e| {
                Error::validation(format!("withdraw_consent notes must name a purpose: {}", e))
            })?;
        }
        Ok(NewDsr {
            contact_id: self.contact_id,
            request_type,
            description: self.description,
            notes: self.notes,
        })
    }
}
