use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Datelike, Utc};
use uuid::Uuid;

use super::machine::{next_state, Step, Transition};
use super::model::{DsrRequest, DsrState, DsrType, NewDsr};
use super::store::DsrStore;
use crate::config::DsrPolicy;
use crate::consent::{ConsentLedger, ErasureAuthority, Purpose};
use crate::error::{Error, Result, StorageError};
use crate::principal::Principal;
use crate::rbac::Resource;
use crate::store::{ErasureJob, ErasureQueue};

/// Attempts before a transition gives up on a contended request.
const MAX_CAS_ATTEMPTS: usize = 3;

/// Result of a transition call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    /// Request as stored after the call
    pub request: DsrRequest,
    /// False when the request was already in the target status
    pub changed: bool,
}

/// Drives DSRs through their lifecycle.
#[derive(Clone)]
pub struct DsrWorkflow {
    store: Arc<dyn DsrStore>,
    ledger: ConsentLedger,
    erasure: Arc<dyn ErasureQueue>,
    policy: DsrPolicy,
}

impl DsrWorkflow {
    /// Creates a workflow.
    pub fn new(
        store: Arc<dyn DsrStore>,
        ledger: ConsentLedger,
        erasure: Arc<dyn ErasureQueue>,
        policy: DsrPolicy,
    ) -> Self {
        Self {
            store,
            ledger,
            erasure,
            policy,
        }
    }

    /// Active policy.
    pub fn policy(&self) -> &DsrPolicy {
        &self.policy
    }

    /// Registers a new request in `pending`.
    pub fn submit(&self, new: NewDsr, actor: &Principal) -> Result<DsrRequest> {
        let now = Utc::now();
        let sequence = self.store.next_sequence()?;
        let request = DsrRequest {
            id: Uuid::new_v4(),
            request_number: format!(
                "{}-{}-{:06}",
                self.policy.request_number_prefix,
                now.year(),
                sequence
            ),
            contact_id: new.contact_id,
            request_type: new.request_type,
            state: DsrState::Pending,
            description: new.description,
            notes: new.notes,
            requested_at: now,
            updated_at: now,
            version: 1,
        };
        self.store.insert(request.clone())?;

        tracing::info!(
            dsr = %request.request_number,
            request_type = %request.request_type,
            actor = %actor.id,
            "data-subject request submitted"
        );
        Ok(request)
    }

    /// Fetches one request.
    pub fn get(&self, id: Uuid) -> Result<DsrRequest> {
        self.store
            .get(id)?
            .ok_or_else(|| Error::not_found(Resource::Dsr, id.to_string()))
    }

    /// Every request, newest first.
    pub fn list(&self) -> Result<Vec<DsrRequest>> {
        Ok(self.store.list()?)
    }

    /// `pending -> in_progress`.
    pub fn start(&self, id: Uuid, assignee: &Principal) -> Result<TransitionOutcome> {
        self.transition(
            id,
            Transition::Start {
                assignee: assignee.clone(),
            },
        )
    }

    /// `in_progress -> completed`, then carries out the request's effects.
    ///
    /// A replay on an already completed request finishes any effects an
    /// earlier call left pending.
    pub fn complete(&self, id: Uuid, verifier: &Principal) -> Result<TransitionOutcome> {
        let outcome = self.transition(
            id,
            Transition::Complete {
                verifier: verifier.clone(),
            },
        )?;
        let request = self.finish_completion(outcome.request)?;
        Ok(TransitionOutcome {
            request,
            changed: outcome.changed,
        })
    }

    /// `in_progress -> rejected`.
    pub fn reject(&self, id: Uuid, reason: &str) -> Result<TransitionOutcome> {
        self.transition(
            id,
            Transition::Reject {
                reason: reason.to_string(),
            },
        )
    }

    /// Applies a transition with optimistic concurrency.
    ///
    /// A writer that loses the compare-and-swap reloads and re-evaluates, so
    /// it either observes the winner's state as unchanged or fails with the
    /// guard that now applies. Moving to `completed` fixes the consent
    /// purposes to withdraw but does not apply them; see
    /// [`finish_completion`](Self::finish_completion).
    pub fn transition(&self, id: Uuid, transition: Transition) -> Result<TransitionOutcome> {
        let mut last_conflict = None;

        for _ in 0..MAX_CAS_ATTEMPTS {
            let current = self.get(id)?;
            let state = match next_state(&current, &transition, &self.policy, Utc::now())? {
                Step::Unchanged => {
                    tracing::debug!(dsr = %current.request_number, status = %current.status(), "transition replayed");
                    return Ok(TransitionOutcome {
                        request: current,
                        changed: false,
                    });
                }
                Step::Advanced(state) => self.with_withdrawals(&current, state)?,
            };

            let mut updated = current.clone();
            updated.state = state;
            updated.version = current.version + 1;
            updated.updated_at = Utc::now();

            match self.store.compare_and_swap(current.version, updated.clone()) {
                Ok(()) => {
                    tracing::info!(
                        dsr = %updated.request_number,
                        from = %current.status(),
                        to = %updated.status(),
                        "data-subject request transitioned"
                    );
                    return Ok(TransitionOutcome {
                        request: updated,
                        changed: true,
                    });
                }
                Err(conflict @ StorageError::VersionConflict { .. }) => {
                    tracing::debug!(dsr = %current.request_number, error = %conflict, "lost transition race, reloading");
                    last_conflict = Some(conflict);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_conflict
            .map(Error::from)
            .unwrap_or_else(|| Error::Storage(StorageError::Backend("transition retries exhausted".into()))))
    }

    /// Issues the authority to hard-delete consent evidence for the contact
    /// of a completed deletion request.
    pub fn erasure_authority(&self, id: Uuid) -> Result<ErasureAuthority> {
        let request = self.get(id)?;
        if request.request_type != DsrType::Delete || !request.is_fulfilled() {
            return Err(Error::validation(format!(
                "{} is not a completed deletion request",
                request.request_number
            )));
        }
        Ok(ErasureAuthority::new(request.contact_id, request.id))
    }

    /// Most recent fulfilled deletion request for a contact, if any.
    pub fn completed_deletion_for(&self, contact_id: &str) -> Result<Option<DsrRequest>> {
        Ok(self.store.list()?.into_iter().find(|r| {
            r.contact_id == contact_id && r.request_type == DsrType::Delete && r.is_fulfilled()
        }))
    }

    /// Carries out the effects of a completed request and records that they
    /// ran. Returns other requests unchanged.
    ///
    /// Withdrawals are unique per request and the erasure queue is idempotent
    /// per request, so a retry after a partial failure repeats nothing.
    pub fn finish_completion(&self, request: DsrRequest) -> Result<DsrRequest> {
        let withdrawn = match &request.state {
            DsrState::Completed {
                withdrawn,
                effects_applied: false,
                ..
            } => withdrawn.clone(),
            _ => return Ok(request),
        };
        self.apply_completion(&request, &withdrawn)?;

        let mut current = request;
        let mut last_conflict = None;
        for _ in 0..MAX_CAS_ATTEMPTS {
            let mut updated = current.clone();
            if let DsrState::Completed { effects_applied, .. } = &mut updated.state {
                *effects_applied = true;
            }
            updated.version = current.version + 1;
            updated.updated_at = Utc::now();

            match self.store.compare_and_swap(current.version, updated.clone()) {
                Ok(()) => {
                    tracing::info!(dsr = %updated.request_number, "completion effects applied");
                    return Ok(updated);
                }
                Err(conflict @ StorageError::VersionConflict { .. }) => {
                    current = self.get(current.id)?;
                    if current.is_fulfilled() {
                        return Ok(current);
                    }
                    last_conflict = Some(conflict);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_conflict
            .map(Error::from)
            .unwrap_or_else(|| Error::Storage(StorageError::Backend("completion retries exhausted".into()))))
    }

    /// Fixes the purposes a completing request withdraws.
    fn with_withdrawals(&self, current: &DsrRequest, mut state: DsrState) -> Result<DsrState> {
        if let DsrState::Completed { withdrawn, .. } = &mut state {
            match current.request_type {
                DsrType::Delete => {
                    *withdrawn = self.ledger.purposes_on_record(&current.contact_id)?;
                }
                DsrType::WithdrawConsent => {
                    let Some(purpose) = current.withdrawal_purpose() else {
                        return Err(Error::validation(format!(
                            "{} does not name a consent purpose",
                            current.request_number
                        )));
                    };
                    withdrawn.insert(purpose);
                }
                DsrType::Access | DsrType::Rectify | DsrType::Restrict => {}
            }
        }
        Ok(state)
    }

    fn apply_completion(&self, request: &DsrRequest, withdrawn: &BTreeSet<Purpose>) -> Result<()> {
        let actor = request.verified_by().unwrap_or_default();
        for purpose in withdrawn {
            self.ledger.withdraw_for_request(
                &request.contact_id,
                *purpose,
                request.id,
                &request.request_number,
                actor,
            )?;
        }
        if request.request_type == DsrType::Delete {
            let queued = self.erasure.enqueue(ErasureJob {
                dsr_id: request.id,
                contact_id: request.contact_id.clone(),
                requested_at: Utc::now(),
            })?;
            if queued {
                tracing::info!(dsr = %request.request_number, "erasure job queued");
            }
        }
        Ok(())
    }
}
