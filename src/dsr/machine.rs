use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::model::{DsrRequest, DsrState, DsrStatus};
use crate::config::DsrPolicy;
use crate::error::{Error, Result};
use crate::principal::{Principal, Role};

/// A requested state change.
#[derive(Debug, Clone)]
pub enum Transition {
    /// `pending -> in_progress`, assigning the request
    Start {
        /// Principal taking the request
        assignee: Principal,
    },
    /// `in_progress -> completed`
    Complete {
        /// Principal verifying fulfilment
        verifier: Principal,
    },
    /// `in_progress -> rejected`
    Reject {
        /// Non-blank reason for refusal
        reason: String,
    },
}

impl Transition {
    /// Status this transition leads to.
    pub fn target(&self) -> DsrStatus {
        match self {
            Transition::Start { .. } => DsrStatus::InProgress,
            Transition::Complete { .. } => DsrStatus::Completed,
            Transition::Reject { .. } => DsrStatus::Rejected,
        }
    }
}

/// Which guard refused a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionGuard {
    /// The edge does not exist in the state machine
    NotPermittedFromState,
    /// Assignee role is not ADMIN, QA or MANAGER
    AssigneeRoleNotEligible,
    /// Verifier role is not ADMIN, QA or MANAGER
    VerifierRoleNotEligible,
    /// Rejection reason was blank
    EmptyRejectionReason,
    /// Verifier is the assignee on a request type that needs two people
    DualControlRequired,
}

impl fmt::Display for TransitionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransitionGuard::NotPermittedFromState => "transition not permitted from this state",
            TransitionGuard::AssigneeRoleNotEligible => "assignee role not eligible",
            TransitionGuard::VerifierRoleNotEligible => "verifier role not eligible",
            TransitionGuard::EmptyRejectionReason => "rejection reason is required",
            TransitionGuard::DualControlRequired => "verifier must differ from assignee",
        })
    }
}

/// Result of evaluating a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Already in the target status; nothing to write
    Unchanged,
    /// Move to this state
    Advanced(DsrState),
}

fn handles_requests(role: Role) -> bool {
    match role {
        Role::Admin | Role::Qa | Role::Manager => true,
        Role::Agent | Role::Viewer => false,
    }
}

/// Evaluates `transition` against `current` without touching storage.
///
/// Asking for the status the request is already in returns
/// [`Step::Unchanged`] without re-checking guards, so retries are safe.
pub fn next_state(
    current: &DsrRequest,
    transition: &Transition,
    policy: &DsrPolicy,
    now: DateTime<Utc>,
) -> Result<Step> {
    let from = current.status();
    let to = transition.target();
    if from == to {
        return Ok(Step::Unchanged);
    }

    let refuse = |guard| Error::InvalidTransition { from, to, guard };

    match (&current.state, transition) {
        (DsrState::Pending, Transition::Start { assignee }) => {
            if !handles_requests(assignee.role) {
                return Err(refuse(TransitionGuard::AssigneeRoleNotEligible));
            }
            Ok(Step::Advanced(DsrState::InProgress {
                assigned_to: assignee.id.clone(),
            }))
        }
        (DsrState::InProgress { assigned_to }, Transition::Complete { verifier }) => {
            if !handles_requests(verifier.role) {
                return Err(refuse(TransitionGuard::VerifierRoleNotEligible));
            }
            if policy.requires_dual_control(current.request_type) && verifier.id == *assigned_to {
                return Err(refuse(TransitionGuard::DualControlRequired));
            }
            Ok(Step::Advanced(DsrState::Completed {
                assigned_to: assigned_to.clone(),
                verified_by: verifier.id.clone(),
                completed_at: now,
                withdrawn: BTreeSet::new(),
                effects_applied: false,
            }))
        }
        (DsrState::InProgress { assigned_to }, Transition::Reject { reason }) => {
            if reason.trim().is_empty() {
                return Err(refuse(TransitionGuard::EmptyRejectionReason));
            }
            Ok(Step::Advanced(DsrState::Rejected {
                assigned_to: assigned_to.clone(),
                reason: reason.trim().to_string(),
                rejected_at: now,
            }))
        }
        _ => Err(refuse(TransitionGuard::NotPermittedFromState)),
    }
}
