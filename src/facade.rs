//! The single entry point for callers.
//!
//! Every operation runs the same sequence: resolve the session, authorize
//! the (resource, action) pair, execute against the collaborators, redact
//! reads, and append an audit entry when a contact, consent record or DSR
//! changed. Denials on those resources are audited too.
//!
//! Audit appends are best effort: a failing sink is logged at `warn` and
//! the operation still succeeds.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::audit::{AuditEntry, AuditOutcome, AuditSink};
use crate::config::ComplianceConfig;
use crate::consent::{ConsentLedger, ConsentRecord, ConsentState, ConsentStore, Purpose};
use crate::context::Ctx;
use crate::dsr::{DsrRequest, DsrStore, DsrSubmission, DsrWorkflow, Transition, TransitionOutcome};
use crate::error::{ConfigError, Error, Result};
use crate::gate::{AccessGate, RequestMeta};
use crate::principal::PrincipalStore;
use crate::rbac::{Action, RbacEngine, RecordKind, Resource};
use crate::secret::Secret;
use crate::session::{SessionToken, SessionVerifier};
use crate::store::{ErasureQueue, Filter, RecordStore};

/// Resource id recorded for collection-level operations.
const ANY: &str = "*";

/// Source recorded for withdrawals that do not name one.
const DEFAULT_WITHDRAWAL_SOURCE: &str = "manual";

/// External systems the façade composes.
pub struct Collaborators {
    /// Account store
    pub principals: Arc<dyn PrincipalStore>,
    /// CRUD store for contacts and business records
    pub records: Arc<dyn RecordStore>,
    /// Consent persistence
    pub consent: Arc<dyn ConsentStore>,
    /// DSR persistence
    pub dsr: Arc<dyn DsrStore>,
    /// Queue read by the anonymization worker
    pub erasure: Arc<dyn ErasureQueue>,
    /// Audit destination
    pub audit: Arc<dyn AuditSink>,
}

/// Body of a consent grant or withdrawal.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsentInput {
    /// Contact the consent belongs to
    pub contact_id: String,
    /// Processing purpose
    pub purpose: Purpose,
    /// True for a grant
    pub granted: bool,
    /// Capture channel, e.g. `web_form`
    pub source: String,
}

/// Body of a consent withdrawal.
#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawalInput {
    /// Contact the consent belongs to
    pub contact_id: String,
    /// Processing purpose
    pub purpose: Purpose,
    /// Capture channel; `manual` when omitted
    #[serde(default)]
    pub source: Option<String>,
}

fn parse<T: DeserializeOwned>(payload: Value) -> Result<T> {
    serde_json::from_value(payload).map_err(|e| Error::validation(e.to_string()))
}

fn require_object(kind: RecordKind, payload: &Value) -> Result<()> {
    if payload.is_object() {
        Ok(())
    } else {
        Err(Error::validation(format!("{} payload must be a JSON object", kind)))
    }
}

/// Authorize-execute-audit front for RBAC, consent and DSR handling.
#[derive(Clone)]
pub struct ComplianceFacade {
    gate: AccessGate,
    principals: Arc<dyn PrincipalStore>,
    records: Arc<dyn RecordStore>,
    ledger: ConsentLedger,
    workflow: DsrWorkflow,
    audit: Arc<dyn AuditSink>,
}

impl ComplianceFacade {
    /// Wires the façade from configuration and collaborators.
    pub fn new(config: &ComplianceConfig, collaborators: Collaborators) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let table = config.permission_table()?;
        let verifier = SessionVerifier::new(&config.session, collaborators.principals.clone());
        let ledger = ConsentLedger::new(collaborators.consent);
        let workflow = DsrWorkflow::new(
            collaborators.dsr,
            ledger.clone(),
            collaborators.erasure,
            config.dsr.clone(),
        );

        tracing::info!(
            rules = table.len(),
            dual_control = config.dsr.dual_control,
            "compliance facade ready"
        );

        Ok(Self {
            gate: AccessGate::new(Arc::new(verifier), RbacEngine::new(table)),
            principals: collaborators.principals,
            records: collaborators.records,
            ledger,
            workflow,
            audit: collaborators.audit,
        })
    }

    /// The access gate, for callers that enforce permissions themselves.
    pub fn gate(&self) -> &AccessGate {
        &self.gate
    }

    // ---- session ----

    /// Exchanges e-mail and password for a session token.
    pub fn login(&self, request_id: &str, email: &str, password: &Secret<String>) -> Result<SessionToken> {
        let ctx = Ctx::new(request_id);
        match self.gate.verifier().login(email, password) {
            Ok(session) => {
                ctx.log().info(format_args!("session issued to {}", session.principal.id));
                Ok(session)
            }
            Err(e) => {
                ctx.log().debug(format_args!("login refused"));
                Err(e)
            }
        }
    }

    // ---- business records ----

    /// Lists records, newest first, with the caller's redactions applied.
    pub fn list_records(&self, meta: &RequestMeta, kind: RecordKind, filter: &Filter) -> Result<Vec<Value>> {
        let ctx = self.admit(meta, kind.resource(), Action::Read, ANY)?;
        let mut records = self.records.list(kind, filter)?;
        for record in &mut records {
            ctx.redact(record);
        }
        ctx.log().debug(format_args!("listed {} {} records", records.len(), kind));
        Ok(records)
    }

    /// Fetches one record with the caller's redactions applied.
    pub fn get_record(&self, meta: &RequestMeta, kind: RecordKind, id: &str) -> Result<Value> {
        let ctx = self.admit(meta, kind.resource(), Action::Read, id)?;
        let mut record = self
            .records
            .get(kind, id)?
            .ok_or_else(|| Error::not_found(kind.resource(), id))?;
        ctx.redact(&mut record);
        Ok(record)
    }

    /// Creates a record owned by the caller.
    pub fn create_record(&self, meta: &RequestMeta, kind: RecordKind, payload: Value) -> Result<Value> {
        let ctx = self.admit(meta, kind.resource(), Action::Create, ANY)?;
        require_object(kind, &payload)?;
        let created = self.records.create(kind, payload, &ctx.principal().id)?;

        let id = created.get("id").and_then(Value::as_str).unwrap_or(ANY);
        ctx.log().info(format_args!("created {} {}", kind, id));
        if kind.resource().is_regulated() {
            self.record(&ctx, id, AuditOutcome::Success);
        }
        Ok(created)
    }

    /// Merges `payload` into an existing record.
    pub fn update_record(&self, meta: &RequestMeta, kind: RecordKind, id: &str, payload: Value) -> Result<Value> {
        let ctx = self.admit(meta, kind.resource(), Action::Update, id)?;
        require_object(kind, &payload)?;
        let updated = self
            .records
            .update(kind, id, payload)?
            .ok_or_else(|| Error::not_found(kind.resource(), id))?;

        if kind.resource().is_regulated() {
            self.record(&ctx, id, AuditOutcome::Success);
        }
        Ok(updated)
    }

    /// Deletes a record.
    ///
    /// A contact can only be deleted once a `delete` DSR for it has been
    /// completed and its effects applied.
    pub fn delete_record(&self, meta: &RequestMeta, kind: RecordKind, id: &str) -> Result<()> {
        let ctx = self.admit(meta, kind.resource(), Action::Delete, id)?;
        if self.records.get(kind, id)?.is_none() {
            return Err(Error::not_found(kind.resource(), id));
        }
        if kind == RecordKind::Contact {
            let Some(dsr) = self.workflow.completed_deletion_for(id)? else {
                return Err(Error::validation(
                    "contact deletion requires a completed deletion request",
                ));
            };
            ctx.log().info(format_args!("deleting contact {} under {}", id, dsr.request_number));
        }
        if !self.records.delete(kind, id)? {
            return Err(Error::not_found(kind.resource(), id));
        }

        if kind.resource().is_regulated() {
            self.record(&ctx, id, AuditOutcome::Success);
        }
        Ok(())
    }

    /// Marks a controlled document approved by the caller.
    ///
    /// Approving an approved document returns it unchanged; obsolete
    /// documents cannot be approved.
    pub fn approve_document(&self, meta: &RequestMeta, id: &str) -> Result<Value> {
        let ctx = self.admit(meta, Resource::Document, Action::Approve, id)?;
        let document = self
            .records
            .get(RecordKind::Document, id)?
            .ok_or_else(|| Error::not_found(Resource::Document, id))?;

        match document.get("status").and_then(Value::as_str) {
            Some("approved") => return Ok(document),
            Some("obsolete") => {
                return Err(Error::validation("obsolete documents cannot be approved"));
            }
            _ => {}
        }

        let approval = json!({
            "status": "approved",
            "approved_by": ctx.principal().id,
            "approved_at": Utc::now().to_rfc3339(),
        });
        let approved = self
            .records
            .update(RecordKind::Document, id, approval)?
            .ok_or_else(|| Error::not_found(Resource::Document, id))?;
        ctx.log().info(format_args!("document {} approved", id));
        Ok(approved)
    }

    // ---- consent ----

    /// Consent records for a contact, oldest first.
    pub fn consent_history(&self, meta: &RequestMeta, contact_id: &str) -> Result<Vec<ConsentRecord>> {
        self.admit(meta, Resource::Consent, Action::Read, contact_id)?;
        self.ledger.history(contact_id)
    }

    /// Current consent for every purpose.
    pub fn consent_state(&self, meta: &RequestMeta, contact_id: &str) -> Result<BTreeMap<Purpose, ConsentState>> {
        self.admit(meta, Resource::Consent, Action::Read, contact_id)?;
        self.ledger.snapshot(contact_id)
    }

    /// Records a grant or withdrawal from a [`ConsentInput`] body.
    pub fn record_consent(&self, meta: &RequestMeta, payload: Value) -> Result<ConsentRecord> {
        let ctx = self.admit(meta, Resource::Consent, Action::Create, ANY)?;
        let input: ConsentInput = parse(payload)?;
        self.require_contact(&input.contact_id)?;

        let record = self.ledger.record_consent(
            &input.contact_id,
            input.purpose,
            input.granted,
            &input.source,
            &ctx.principal().id,
        )?;
        self.record(&ctx, &record.contact_id, AuditOutcome::Success);
        Ok(record)
    }

    /// Withdraws consent from a [`WithdrawalInput`] body.
    pub fn withdraw_consent(&self, meta: &RequestMeta, payload: Value) -> Result<ConsentRecord> {
        let ctx = self.admit(meta, Resource::Consent, Action::Withdraw, ANY)?;
        let input: WithdrawalInput = parse(payload)?;
        self.require_contact(&input.contact_id)?;

        let source = input.source.as_deref().unwrap_or(DEFAULT_WITHDRAWAL_SOURCE);
        let record = self
            .ledger
            .withdraw(&input.contact_id, input.purpose, source, &ctx.principal().id)?;
        self.record(&ctx, &record.contact_id, AuditOutcome::Success);
        Ok(record)
    }

    /// Hard-deletes consent evidence for the contact of a completed
    /// deletion request. Returns the number of records removed.
    pub fn erase_consent(&self, meta: &RequestMeta, dsr_id: Uuid) -> Result<usize> {
        let ctx = self.admit(meta, Resource::Consent, Action::Erase, &dsr_id.to_string())?;
        let authority = self.workflow.erasure_authority(dsr_id)?;
        let removed = self.ledger.erase_contact(&authority)?;
        self.record(&ctx, authority.contact_id(), AuditOutcome::Success);
        Ok(removed)
    }

    // ---- data-subject requests ----

    /// Every DSR, newest first.
    pub fn list_dsr(&self, meta: &RequestMeta) -> Result<Vec<DsrRequest>> {
        self.admit(meta, Resource::Dsr, Action::Read, ANY)?;
        self.workflow.list()
    }

    /// One DSR.
    pub fn get_dsr(&self, meta: &RequestMeta, id: Uuid) -> Result<DsrRequest> {
        self.admit(meta, Resource::Dsr, Action::Read, &id.to_string())?;
        self.workflow.get(id)
    }

    /// Registers a DSR from a [`DsrSubmission`] body.
    pub fn submit_dsr(&self, meta: &RequestMeta, payload: Value) -> Result<DsrRequest> {
        let ctx = self.admit(meta, Resource::Dsr, Action::Create, ANY)?;
        let new = parse::<DsrSubmission>(payload)?.validate()?;
        self.require_contact(&new.contact_id)?;

        let request = self.workflow.submit(new, ctx.principal())?;
        self.record(&ctx, &request.id.to_string(), AuditOutcome::Success);
        Ok(request)
    }

    /// Assigns a pending DSR. The caller is the assignee unless another
    /// principal is named.
    pub fn start_dsr(&self, meta: &RequestMeta, id: Uuid, assignee_id: Option<&str>) -> Result<DsrRequest> {
        let ctx = self.admit(meta, Resource::Dsr, Action::Transition, &id.to_string())?;
        let assignee = match assignee_id {
            None => ctx.principal().clone(),
            Some(other) => self
                .principals
                .find_by_id(other)?
                .ok_or_else(|| Error::validation(format!("unknown assignee '{}'", other)))?,
        };
        let outcome = self.workflow.start(id, &assignee)?;
        Ok(self.transitioned(&ctx, outcome))
    }

    /// Completes an in-progress DSR with the caller as verifier.
    ///
    /// The state change is audited as soon as it is stored. If applying its
    /// effects then fails, the error is returned and the request stays
    /// unfulfilled until a later `complete_dsr` finishes them.
    pub fn complete_dsr(&self, meta: &RequestMeta, id: Uuid) -> Result<DsrRequest> {
        let ctx = self.admit(meta, Resource::Dsr, Action::Transition, &id.to_string())?;
        let outcome = self.workflow.transition(
            id,
            Transition::Complete {
                verifier: ctx.principal().clone(),
            },
        )?;
        let request = self.transitioned(&ctx, outcome);
        self.workflow.finish_completion(request).inspect_err(|e| {
            ctx.log().warn(format_args!("completion effects for {} pending: {}", id, e));
        })
    }

    /// Rejects an in-progress DSR.
    pub fn reject_dsr(&self, meta: &RequestMeta, id: Uuid, reason: &str) -> Result<DsrRequest> {
        let ctx = self.admit(meta, Resource::Dsr, Action::Transition, &id.to_string())?;
        let outcome = self.workflow.reject(id, reason)?;
        Ok(self.transitioned(&ctx, outcome))
    }

    // ---- internals ----

    fn admit(&self, meta: &RequestMeta, resource: Resource, action: Action, resource_id: &str) -> Result<Ctx> {
        let ctx = self.gate.authenticate(meta)?;
        let denial = resource
            .is_regulated()
            .then(|| ctx.denial_entry(action, resource, resource_id));

        match self.gate.authorize(ctx, resource, action) {
            Err(Error::Forbidden) => {
                if let Some(entry) = denial {
                    self.append(&entry);
                }
                Err(Error::Forbidden)
            }
            other => other,
        }
    }

    fn require_contact(&self, contact_id: &str) -> Result<()> {
        match self.records.get(RecordKind::Contact, contact_id)? {
            Some(_) => Ok(()),
            None => Err(Error::not_found(Resource::Contact, contact_id)),
        }
    }

    fn transitioned(&self, ctx: &Ctx, outcome: TransitionOutcome) -> DsrRequest {
        let result = if outcome.changed {
            AuditOutcome::Success
        } else {
            AuditOutcome::Unchanged
        };
        self.record(ctx, &outcome.request.id.to_string(), result);
        outcome.request
    }

    fn record(&self, ctx: &Ctx, resource_id: &str, outcome: AuditOutcome) {
        self.append(&ctx.audit_entry(resource_id, outcome));
    }

    fn append(&self, entry: &AuditEntry) {
        if let Err(e) = self.audit.append(entry) {
            tracing::warn!(
                request_id = entry.request_id.as_deref(),
                audit_id = %entry.id,
                resource = %entry.resource_type,
                action = %entry.action,
                error = %e,
                "audit append failed; operation kept"
            );
        }
    }
}
