use serde_json::Value;

use crate::audit::{AuditEntry, AuditOutcome};
use crate::capability::Grant;
use crate::error::{Error, Result};
use crate::logging::RequestLog;
use crate::principal::Principal;
use crate::rbac::{Action, Decision, Resource};
use crate::state::{Authed, Authorized, Unauthed};

/// Per-request execution context.
///
/// `Ctx<S>` is generic over its progress through the access gate:
/// - `Ctx<Unauthed>`: request id only
/// - `Ctx<Authed>`: resolved [`Principal`]
/// - `Ctx<Authorized>`: principal plus a [`Grant`] for one operation
///
/// Contexts are only built by [`AccessGate`](crate::gate::AccessGate), so
/// holding a `Ctx<Authorized>` proves both checks passed.
#[derive(Debug, Clone)]
pub struct Ctx<S = Authorized> {
    request_id: String,
    state: S,
}

impl<S> Ctx<S> {
    /// Correlation id of the request.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}

impl Ctx<Unauthed> {
    pub(crate) fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            state: Unauthed::new(),
        }
    }

    /// Request-scoped logger without a principal.
    pub fn log(&self) -> RequestLog<'_> {
        RequestLog::new(&self.request_id, None)
    }

    /// Attaches a verified principal.
    pub(crate) fn authenticate(self, principal: Principal) -> Ctx<Authed> {
        Ctx {
            request_id: self.request_id,
            state: Authed { principal },
        }
    }
}

impl Ctx<Authed> {
    /// The resolved principal.
    pub fn principal(&self) -> &Principal {
        &self.state.principal
    }

    /// Request-scoped logger.
    pub fn log(&self) -> RequestLog<'_> {
        RequestLog::new(&self.request_id, Some(&self.state.principal.id))
    }

    /// Applies an RBAC decision. A denial yields `Forbidden`.
    pub(crate) fn authorize(
        self,
        resource: Resource,
        action: Action,
        decision: Decision,
    ) -> Result<Ctx<Authorized>> {
        let grant = Grant::from_decision(resource, action, decision).ok_or(Error::Forbidden)?;
        Ok(Ctx {
            request_id: self.request_id,
            state: Authorized {
                principal: self.state.principal,
                grant,
            },
        })
    }

    /// Audit entry recording a denial of `action` on `resource_id`.
    pub fn denial_entry(&self, action: Action, resource: Resource, resource_id: &str) -> AuditEntry {
        AuditEntry::new(
            self.state.principal.id.clone(),
            action,
            resource,
            resource_id,
            AuditOutcome::Denied,
        )
        .with_request_id(self.request_id.clone())
    }
}

impl Ctx<Authorized> {
    /// The resolved principal.
    pub fn principal(&self) -> &Principal {
        &self.state.principal
    }

    /// Request-scoped logger.
    pub fn log(&self) -> RequestLog<'_> {
        RequestLog::new(&self.request_id, Some(&self.state.principal.id))
    }

    /// The grant this context was authorized with.
    pub fn grant(&self) -> &Grant {
        &self.state.grant
    }

    /// Masks the fields the grant redacts.
    pub fn redact(&self, value: &mut Value) {
        self.state.grant.redact(value);
    }

    /// Audit entry for the granted action on `resource_id`.
    pub fn audit_entry(&self, resource_id: &str, outcome: AuditOutcome) -> AuditEntry {
        let grant = &self.state.grant;
        AuditEntry::new(
            self.state.principal.id.clone(),
            grant.action(),
            grant.resource(),
            resource_id,
            outcome,
        )
        .with_request_id(self.request_id.clone())
    }
}
