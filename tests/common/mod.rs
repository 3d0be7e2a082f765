//! Shared wiring for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use compliance_core::audit::{AuditSink, AuditTrail};
use compliance_core::consent::MemoryConsentStore;
use compliance_core::dsr::MemoryDsrStore;
use compliance_core::rbac::RecordKind;
use compliance_core::store::{ErasureQueue, MemoryErasureQueue, MemoryRecordStore, RecordStore};
use compliance_core::{
    Collaborators, ComplianceConfig, ComplianceFacade, DsrPolicy, MemoryPrincipalStore, Principal,
    RequestMeta, Role,
};
use serde_json::json;

/// Hash placeholder for accounts that never log in with a password.
const NO_PASSWORD: &str = "$argon2id$unused";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn principal(role: Role) -> Principal {
    let id = format!("u-{}", role.as_str().to_ascii_lowercase());
    let email = format!("{}@example.com", role.as_str().to_ascii_lowercase());
    Principal::new(id, email, role)
}

/// A second QA account, for two-person checks.
pub fn second_qa() -> Principal {
    Principal::new("u-qa-2", "qa2@example.com", Role::Qa)
}

pub struct World {
    pub facade: ComplianceFacade,
    pub principals: Arc<MemoryPrincipalStore>,
    pub records: Arc<MemoryRecordStore>,
    pub consent: Arc<MemoryConsentStore>,
    pub erasure: Arc<MemoryErasureQueue>,
    pub trail: Arc<AuditTrail>,
}

impl World {
    pub fn new() -> Self {
        Self::build(DsrPolicy::default(), None, None)
    }

    pub fn with_policy(policy: DsrPolicy) -> Self {
        Self::build(policy, None, None)
    }

    pub fn with_audit_sink(sink: Arc<dyn AuditSink>) -> Self {
        Self::build(DsrPolicy::default(), Some(sink), None)
    }

    /// Wires `queue` in place of `erasure`, which then stays empty.
    pub fn with_erasure_queue(queue: Arc<dyn ErasureQueue>) -> Self {
        Self::build(DsrPolicy::default(), None, Some(queue))
    }

    fn build(
        policy: DsrPolicy,
        sink: Option<Arc<dyn AuditSink>>,
        queue: Option<Arc<dyn ErasureQueue>>,
    ) -> Self {
        init_tracing();

        let principals = Arc::new(MemoryPrincipalStore::new());
        for role in Role::ALL {
            principals.insert_hashed(principal(role), NO_PASSWORD);
        }
        principals.insert_hashed(second_qa(), NO_PASSWORD);

        let records = Arc::new(MemoryRecordStore::new());
        let consent = Arc::new(MemoryConsentStore::new());
        let erasure = Arc::new(MemoryErasureQueue::new());
        let trail = Arc::new(AuditTrail::new());

        let mut config = ComplianceConfig::with_secret("integration-test-secret");
        config.dsr = policy;

        let facade = ComplianceFacade::new(
            &config,
            Collaborators {
                principals: principals.clone(),
                records: records.clone(),
                consent: consent.clone(),
                dsr: Arc::new(MemoryDsrStore::new()),
                erasure: queue.unwrap_or_else(|| erasure.clone() as Arc<dyn ErasureQueue>),
                audit: sink.unwrap_or_else(|| trail.clone() as Arc<dyn AuditSink>),
            },
        )
        .expect("valid test configuration");

        Self {
            facade,
            principals,
            records,
            consent,
            erasure,
            trail,
        }
    }

    /// Request metadata carrying a fresh session for `who`.
    pub fn meta(&self, who: &Principal) -> RequestMeta {
        let session = self
            .facade
            .gate()
            .verifier()
            .issue(who)
            .expect("token signing");
        RequestMeta::new(format!("req-{}", who.id)).with_credential(session.token.into_exposed())
    }

    pub fn as_role(&self, role: Role) -> RequestMeta {
        self.meta(&principal(role))
    }

    pub fn seed_contact(&self, id: &str, email: &str) {
        self.records
            .create(
                RecordKind::Contact,
                json!({"id": id, "name": "Jane Doe", "email": email}),
                "seed",
            )
            .expect("seed contact");
    }
}
