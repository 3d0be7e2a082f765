//! End-to-end flows through the compliance façade.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use common::{principal, second_qa, World};
use compliance_core::audit::{AuditEntry, AuditError, AuditOutcome, AuditSink};
use compliance_core::consent::{ConsentState, Purpose};
use compliance_core::dsr::{DsrStatus, TransitionGuard};
use compliance_core::rbac::{Action, RecordKind, Resource};
use compliance_core::store::{ErasureJob, ErasureQueue, Filter, MemoryErasureQueue, RecordStore};
use compliance_core::{DsrPolicy, Error, RequestMeta, Role, Secret, StorageError};
use serde_json::json;

#[test]
fn viewer_gets_redacted_email_admin_does_not() {
    let world = World::new();
    world.seed_contact("c-1", "jane.doe@example.com");

    let viewer_list = world
        .facade
        .list_records(&world.as_role(Role::Viewer), RecordKind::Contact, &Filter::new())
        .unwrap();
    assert_eq!(viewer_list[0]["email"], "ja***@example.com");
    assert_eq!(viewer_list[0]["name"], "Jane Doe");

    let admin_view = world
        .facade
        .get_record(&world.as_role(Role::Admin), RecordKind::Contact, "c-1")
        .unwrap();
    assert_eq!(admin_view["email"], "jane.doe@example.com");

    // The stored value is untouched
    let agent_view = world
        .facade
        .get_record(&world.as_role(Role::Agent), RecordKind::Contact, "c-1")
        .unwrap();
    assert_eq!(agent_view["email"], "jane.doe@example.com");
}

#[test]
fn session_failures_are_uniform() {
    let world = World::new();

    let missing = world
        .facade
        .list_dsr(&RequestMeta::new("req-none"))
        .unwrap_err();
    let garbage = world
        .facade
        .list_dsr(&RequestMeta::new("req-bad").with_credential("not.a.token"))
        .unwrap_err();

    assert!(matches!(missing, Error::Unauthenticated));
    assert!(matches!(garbage, Error::Unauthenticated));
    assert_eq!(missing.to_string(), garbage.to_string());
    assert!(world.trail.is_empty());
}

#[test]
fn removed_account_loses_its_session() {
    let world = World::new();
    let meta = world.as_role(Role::Manager);
    assert!(world.facade.list_dsr(&meta).is_ok());

    world.principals.remove("u-manager");
    assert!(matches!(
        world.facade.list_dsr(&meta),
        Err(Error::Unauthenticated)
    ));
}

#[test]
fn password_login_round_trip() {
    let world = World::new();
    let clerk = compliance_core::Principal::new("u-clerk", "clerk@example.com", Role::Agent);
    world.principals.insert(clerk, "Demo!234").unwrap();

    let session = world
        .facade
        .login("req-login", "Clerk@Example.com", &Secret::new("Demo!234".to_string()))
        .unwrap();
    assert_eq!(session.principal.id, "u-clerk");

    let meta = RequestMeta::new("req-2").with_credential(session.token.into_exposed());
    let created = world
        .facade
        .create_record(&meta, RecordKind::Activity, json!({"subject": "call back"}))
        .unwrap();
    assert_eq!(created["created_by"], "u-clerk");
}

#[test]
fn denials_on_regulated_resources_are_audited() {
    let world = World::new();
    world.seed_contact("c-1", "a@example.com");

    let err = world
        .facade
        .consent_history(&world.as_role(Role::Agent), "c-1")
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden));

    let err = world
        .facade
        .get_record(&world.as_role(Role::Qa), RecordKind::Contact, "c-1")
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden));

    let entries = world.trail.entries();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.outcome == AuditOutcome::Denied));
    assert_eq!(entries[0].actor_id, "u-agent");
    assert_eq!(entries[0].resource_type, Resource::Consent);
    assert_eq!(entries[1].resource_id, "c-1");
}

#[test]
fn unregulated_denials_are_not_audited() {
    let world = World::new();
    let err = world
        .facade
        .list_records(&world.as_role(Role::Agent), RecordKind::Ncr, &Filter::new())
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden));
    assert!(world.trail.is_empty());
}

#[test]
fn consent_grant_and_withdraw() {
    let world = World::new();
    world.seed_contact("c-1", "a@example.com");
    let qa = world.as_role(Role::Qa);

    world
        .facade
        .record_consent(
            &qa,
            json!({"contact_id": "c-1", "purpose": "marketing", "granted": true, "source": "web_form"}),
        )
        .unwrap();
    let withdrawal = world
        .facade
        .withdraw_consent(&qa, json!({"contact_id": "c-1", "purpose": "marketing"}))
        .unwrap();
    assert_eq!(withdrawal.source, "manual");
    assert_eq!(withdrawal.recorded_by, "u-qa");

    let state = world.facade.consent_state(&qa, "c-1").unwrap();
    assert_eq!(state[&Purpose::Marketing], ConsentState::Withdrawn);
    assert_eq!(state[&Purpose::Sales], ConsentState::Unknown);

    let history = world.facade.consent_history(&qa, "c-1").unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].granted);
    assert!(history[0].sequence < history[1].sequence);

    let entries = world.trail.entries();
    let actions: Vec<Action> = entries.iter().map(|e| e.action).collect();
    assert_eq!(actions, vec![Action::Create, Action::Withdraw]);
    assert!(entries.iter().all(|e| e.resource_id == "c-1"));
}

#[test]
fn consent_for_unknown_contact_is_not_found() {
    let world = World::new();
    let err = world
        .facade
        .record_consent(
            &world.as_role(Role::Admin),
            json!({"contact_id": "ghost", "purpose": "sales", "granted": true, "source": "web"}),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        Error::NotFound {
            resource: Resource::Contact,
            ..
        }
    ));
}

#[test]
fn unknown_purpose_is_a_validation_failure() {
    let world = World::new();
    world.seed_contact("c-1", "a@example.com");
    let err = world
        .facade
        .record_consent(
            &world.as_role(Role::Admin),
            json!({"contact_id": "c-1", "purpose": "telepathy", "granted": true, "source": "web"}),
        )
        .unwrap_err();
    assert!(matches!(err, Error::ValidationFailed(_)));
}

#[test]
fn delete_request_lifecycle() {
    let world = World::new();
    world.seed_contact("c-1", "jane.doe@example.com");
    let qa = world.as_role(Role::Qa);

    for purpose in ["marketing", "support"] {
        world
            .facade
            .record_consent(
                &qa,
                json!({"contact_id": "c-1", "purpose": purpose, "granted": true, "source": "web"}),
            )
            .unwrap();
    }

    let dsr = world
        .facade
        .submit_dsr(&qa, json!({"contact_id": "c-1", "type": "delete", "description": "erase me"}))
        .unwrap();
    assert_eq!(dsr.status(), DsrStatus::Pending);
    assert!(dsr.request_number.starts_with("DSR-"));

    let err = world.facade.complete_dsr(&qa, dsr.id).unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidTransition {
            from: DsrStatus::Pending,
            to: DsrStatus::Completed,
            guard: TransitionGuard::NotPermittedFromState,
        }
    ));

    let started = world.facade.start_dsr(&qa, dsr.id, None).unwrap();
    assert_eq!(started.assigned_to(), Some("u-qa"));

    let completed = world.facade.complete_dsr(&qa, dsr.id).unwrap();
    assert_eq!(completed.status(), DsrStatus::Completed);
    assert_eq!(completed.verified_by(), Some("u-qa"));
    assert!(completed.completed_at().is_some());

    let replay = world.facade.complete_dsr(&qa, dsr.id).unwrap();
    assert_eq!(replay, completed);

    let state = world.facade.consent_state(&qa, "c-1").unwrap();
    assert_eq!(state[&Purpose::Marketing], ConsentState::Withdrawn);
    assert_eq!(state[&Purpose::Support], ConsentState::Withdrawn);
    assert_eq!(state[&Purpose::Sales], ConsentState::Unknown);
    assert_eq!(world.consent.len(), 4);

    let jobs = world.erasure.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].dsr_id, dsr.id);
    assert_eq!(jobs[0].contact_id, "c-1");

    let dsr_outcomes: Vec<AuditOutcome> = world
        .trail
        .entries()
        .iter()
        .filter(|e| e.resource_type == Resource::Dsr)
        .map(|e| e.outcome)
        .collect();
    assert_eq!(
        dsr_outcomes,
        vec![
            AuditOutcome::Success,
            AuditOutcome::Success,
            AuditOutcome::Success,
            AuditOutcome::Unchanged,
        ]
    );
}

/// Erasure queue that times out while `down` is set.
#[derive(Default)]
struct FlakyQueue {
    down: AtomicBool,
    inner: MemoryErasureQueue,
}

impl ErasureQueue for FlakyQueue {
    fn enqueue(&self, job: ErasureJob) -> Result<bool, StorageError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(StorageError::Timeout { millis: 100 });
        }
        self.inner.enqueue(job)
    }
}

#[test]
fn failed_completion_is_audited_and_keeps_contact() {
    let queue = Arc::new(FlakyQueue::default());
    let world = World::with_erasure_queue(queue.clone());
    world.seed_contact("c-1", "a@example.com");
    let admin = world.as_role(Role::Admin);

    let dsr = world
        .facade
        .submit_dsr(&admin, json!({"contact_id": "c-1", "type": "delete"}))
        .unwrap();
    world.facade.start_dsr(&admin, dsr.id, None).unwrap();

    queue.down.store(true, Ordering::SeqCst);
    let err = world.facade.complete_dsr(&admin, dsr.id).unwrap_err();
    assert!(matches!(err, Error::Storage(StorageError::Timeout { .. })));

    let stored = world.facade.get_dsr(&admin, dsr.id).unwrap();
    assert_eq!(stored.status(), DsrStatus::Completed);
    assert!(!stored.is_fulfilled());
    let successes = world
        .trail
        .entries()
        .iter()
        .filter(|e| e.resource_type == Resource::Dsr && e.outcome == AuditOutcome::Success)
        .count();
    assert_eq!(successes, 3);

    let refused = world
        .facade
        .delete_record(&admin, RecordKind::Contact, "c-1")
        .unwrap_err();
    assert!(matches!(refused, Error::ValidationFailed(_)));
    assert!(matches!(
        world.facade.erase_consent(&admin, dsr.id),
        Err(Error::ValidationFailed(_))
    ));

    queue.down.store(false, Ordering::SeqCst);
    let finished = world.facade.complete_dsr(&admin, dsr.id).unwrap();
    assert!(finished.is_fulfilled());
    assert_eq!(queue.inner.jobs().len(), 1);
    world.facade.delete_record(&admin, RecordKind::Contact, "c-1").unwrap();
}

#[test]
fn consent_erasure_needs_admin_and_completed_delete() {
    let world = World::new();
    world.seed_contact("c-1", "a@example.com");
    let admin = world.as_role(Role::Admin);

    world
        .facade
        .record_consent(
            &admin,
            json!({"contact_id": "c-1", "purpose": "sales", "granted": true, "source": "web"}),
        )
        .unwrap();
    let dsr = world
        .facade
        .submit_dsr(&admin, json!({"contact_id": "c-1", "type": "delete"}))
        .unwrap();

    let early = world.facade.erase_consent(&admin, dsr.id).unwrap_err();
    assert!(matches!(early, Error::ValidationFailed(_)));

    world.facade.start_dsr(&admin, dsr.id, None).unwrap();
    world.facade.complete_dsr(&admin, dsr.id).unwrap();

    let qa = world.facade.erase_consent(&world.as_role(Role::Qa), dsr.id).unwrap_err();
    assert!(matches!(qa, Error::Forbidden));

    assert_eq!(world.facade.erase_consent(&admin, dsr.id).unwrap(), 2);
    assert!(world.facade.consent_history(&admin, "c-1").unwrap().is_empty());
}

#[test]
fn withdraw_consent_request_touches_one_purpose() {
    let world = World::new();
    world.seed_contact("c-1", "a@example.com");
    let manager = world.as_role(Role::Manager);

    for purpose in ["marketing", "analytics"] {
        world
            .facade
            .record_consent(
                &manager,
                json!({"contact_id": "c-1", "purpose": purpose, "granted": true, "source": "web"}),
            )
            .unwrap();
    }

    let dsr = world
        .facade
        .submit_dsr(
            &manager,
            json!({"contact_id": "c-1", "type": "withdraw_consent", "notes": "analytics"}),
        )
        .unwrap();
    world.facade.start_dsr(&manager, dsr.id, None).unwrap();
    world.facade.complete_dsr(&manager, dsr.id).unwrap();

    let state = world.facade.consent_state(&manager, "c-1").unwrap();
    assert_eq!(state[&Purpose::Analytics], ConsentState::Withdrawn);
    assert_eq!(state[&Purpose::Marketing], ConsentState::Granted);

    let last = world.facade.consent_history(&manager, "c-1").unwrap().pop().unwrap();
    assert_eq!(last.dsr_id, Some(dsr.id));
    assert_eq!(last.source, format!("dsr:{}", dsr.request_number));
    assert!(world.erasure.jobs().is_empty());
}

#[test]
fn submission_is_validated() {
    let world = World::new();
    world.seed_contact("c-1", "a@example.com");
    let qa = world.as_role(Role::Qa);

    let missing_type = world
        .facade
        .submit_dsr(&qa, json!({"contact_id": "c-1"}))
        .unwrap_err();
    assert!(matches!(missing_type, Error::ValidationFailed(_)));

    let unknown_type = world
        .facade
        .submit_dsr(&qa, json!({"contact_id": "c-1", "type": "forget_everything"}))
        .unwrap_err();
    assert!(matches!(unknown_type, Error::ValidationFailed(_)));

    let no_purpose = world
        .facade
        .submit_dsr(&qa, json!({"contact_id": "c-1", "type": "withdraw_consent"}))
        .unwrap_err();
    assert!(matches!(no_purpose, Error::ValidationFailed(_)));

    let unknown_contact = world
        .facade
        .submit_dsr(&qa, json!({"contact_id": "ghost", "type": "access"}))
        .unwrap_err();
    assert!(matches!(unknown_contact, Error::NotFound { .. }));

    assert!(world.facade.list_dsr(&qa).unwrap().is_empty());
}

#[test]
fn start_checks_named_assignee() {
    let world = World::new();
    world.seed_contact("c-1", "a@example.com");
    let admin = world.as_role(Role::Admin);
    let dsr = world
        .facade
        .submit_dsr(&admin, json!({"contact_id": "c-1", "type": "access"}))
        .unwrap();

    let agent = world.facade.start_dsr(&admin, dsr.id, Some("u-agent")).unwrap_err();
    assert!(matches!(
        agent,
        Error::InvalidTransition {
            guard: TransitionGuard::AssigneeRoleNotEligible,
            ..
        }
    ));

    let ghost = world.facade.start_dsr(&admin, dsr.id, Some("u-ghost")).unwrap_err();
    assert!(matches!(ghost, Error::ValidationFailed(_)));

    let started = world.facade.start_dsr(&admin, dsr.id, Some("u-manager")).unwrap();
    assert_eq!(started.assigned_to(), Some("u-manager"));
    assert_eq!(world.facade.get_dsr(&admin, dsr.id).unwrap(), started);
}

#[test]
fn rejection_needs_a_reason() {
    let world = World::new();
    world.seed_contact("c-1", "a@example.com");
    let qa = world.as_role(Role::Qa);
    let dsr = world
        .facade
        .submit_dsr(&qa, json!({"contact_id": "c-1", "type": "rectify"}))
        .unwrap();
    world.facade.start_dsr(&qa, dsr.id, None).unwrap();

    let blank = world.facade.reject_dsr(&qa, dsr.id, "  ").unwrap_err();
    assert!(matches!(
        blank,
        Error::InvalidTransition {
            guard: TransitionGuard::EmptyRejectionReason,
            ..
        }
    ));

    let rejected = world
        .facade
        .reject_dsr(&qa, dsr.id, "identity could not be verified")
        .unwrap();
    assert_eq!(rejected.status(), DsrStatus::Rejected);
}

#[test]
fn dual_control_requires_second_person() {
    let world = World::with_policy(DsrPolicy {
        dual_control: true,
        ..DsrPolicy::default()
    });
    world.seed_contact("c-1", "a@example.com");
    let qa = world.as_role(Role::Qa);

    let dsr = world
        .facade
        .submit_dsr(&qa, json!({"contact_id": "c-1", "type": "restrict"}))
        .unwrap();
    world.facade.start_dsr(&qa, dsr.id, None).unwrap();

    let same = world.facade.complete_dsr(&qa, dsr.id).unwrap_err();
    assert!(matches!(
        same,
        Error::InvalidTransition {
            guard: TransitionGuard::DualControlRequired,
            ..
        }
    ));

    let done = world.facade.complete_dsr(&world.meta(&second_qa()), dsr.id).unwrap();
    assert_eq!(done.assigned_to(), Some("u-qa"));
    assert_eq!(done.verified_by(), Some("u-qa-2"));
}

#[test]
fn viewer_cannot_touch_requests() {
    let world = World::new();
    let viewer = world.meta(&principal(Role::Viewer));
    assert!(matches!(world.facade.list_dsr(&viewer), Err(Error::Forbidden)));
    assert!(matches!(
        world.facade.submit_dsr(&viewer, json!({})),
        Err(Error::Forbidden)
    ));
}

struct BrokenSink;

impl AuditSink for BrokenSink {
    fn append(&self, _entry: &AuditEntry) -> Result<(), AuditError> {
        Err(AuditError("audit database unreachable".into()))
    }
}

#[test]
fn audit_failure_does_not_fail_the_operation() {
    let world = World::with_audit_sink(Arc::new(BrokenSink));
    world.seed_contact("c-1", "a@example.com");

    let record = world
        .facade
        .record_consent(
            &world.as_role(Role::Admin),
            json!({"contact_id": "c-1", "purpose": "support", "granted": true, "source": "phone"}),
        )
        .unwrap();
    assert!(record.granted);
    assert_eq!(world.consent.len(), 1);
}

#[test]
fn document_approval() {
    let world = World::new();
    world
        .records
        .create(
            RecordKind::Document,
            json!({"id": "doc-1", "title": "QM-001", "status": "review"}),
            "seed",
        )
        .unwrap();
    world
        .records
        .create(RecordKind::Document, json!({"id": "doc-2", "status": "obsolete"}), "seed")
        .unwrap();

    let agent = world
        .facade
        .approve_document(&world.as_role(Role::Agent), "doc-1")
        .unwrap_err();
    assert!(matches!(agent, Error::Forbidden));

    let qa = world.as_role(Role::Qa);
    let approved = world.facade.approve_document(&qa, "doc-1").unwrap();
    assert_eq!(approved["status"], "approved");
    assert_eq!(approved["approved_by"], "u-qa");

    assert!(matches!(
        world.facade.approve_document(&qa, "doc-2"),
        Err(Error::ValidationFailed(_))
    ));
    assert!(matches!(
        world.facade.approve_document(&qa, "doc-3"),
        Err(Error::NotFound { .. })
    ));
}

#[test]
fn contact_writes_are_audited() {
    let world = World::new();
    let agent = world.as_role(Role::Agent);

    let created = world
        .facade
        .create_record(&agent, RecordKind::Contact, json!({"email": "new@example.com"}))
        .unwrap();
    let id = created["id"].as_str().unwrap().to_string();
    world
        .facade
        .update_record(&agent, RecordKind::Contact, &id, json!({"phone": "+27 21 000 0000"}))
        .unwrap();

    let not_object = world
        .facade
        .create_record(&agent, RecordKind::Contact, json!("just a string"))
        .unwrap_err();
    assert!(matches!(not_object, Error::ValidationFailed(_)));

    let entries = world.trail.entries();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.resource_id == id && e.outcome == AuditOutcome::Success));
    assert_eq!(entries[1].action, Action::Update);
}
