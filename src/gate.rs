use std::sync::Arc;

use crate::context::Ctx;
use crate::error::Result;
use crate::rbac::{Action, RbacEngine, Resource};
use crate::secret::Secret;
use crate::session::SessionVerifier;
use crate::state::{Authed, Authorized};

/// Per-request input to the gate.
#[derive(Debug)]
pub struct RequestMeta {
    /// Correlation id, stamped on logs and audit entries
    pub request_id: String,
    /// Bearer credential as presented, if any
    pub credential: Option<Secret<String>>,
}

impl RequestMeta {
    /// Metadata for a request without a credential.
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            credential: None,
        }
    }

    /// Attaches a bearer credential.
    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(Secret::new(credential.into()));
        self
    }
}

/// The only way to obtain an authorized [`Ctx`].
///
/// Authentication and authorization are separate steps so callers can
/// record who was refused before surfacing `Forbidden`.
///
/// ```no_run
/// # use compliance_core::{AccessGate, RequestMeta};
/// # use compliance_core::rbac::{Action, Resource};
/// # fn example(gate: &AccessGate) -> compliance_core::Result<()> {
/// let meta = RequestMeta::new("req-1").with_credential("eyJhbGciOi...");
/// let ctx = gate.authenticate(&meta)?;
/// let ctx = gate.authorize(ctx, Resource::Contact, Action::Read)?;
/// ctx.log().info(format_args!("listing contacts"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AccessGate {
    verifier: Arc<SessionVerifier>,
    engine: RbacEngine,
}

impl AccessGate {
    /// Creates a gate.
    pub fn new(verifier: Arc<SessionVerifier>, engine: RbacEngine) -> Self {
        Self { verifier, engine }
    }

    /// Session verifier behind this gate.
    pub fn verifier(&self) -> &SessionVerifier {
        &self.verifier
    }

    /// Authorization engine behind this gate.
    pub fn engine(&self) -> &RbacEngine {
        &self.engine
    }

    /// Resolves the request's credential to a principal.
    pub fn authenticate(&self, meta: &RequestMeta) -> Result<Ctx<Authed>> {
        let ctx = Ctx::new(meta.request_id.clone());
        match self.verifier.resolve(meta.credential.as_ref()) {
            Ok(principal) => Ok(ctx.authenticate(principal)),
            Err(e) => {
                ctx.log().debug(format_args!("request not authenticated"));
                Err(e)
            }
        }
    }

    /// Checks the principal's permission for one operation.
    pub fn authorize(
        &self,
        ctx: Ctx<Authed>,
        resource: Resource,
        action: Action,
    ) -> Result<Ctx<Authorized>> {
        let decision = self.engine.authorize(ctx.principal(), resource, action);
        if !decision.allow {
            ctx.log().debug(format_args!(
                "{} denied {}:{}",
                ctx.principal().role,
                resource,
                action
            ));
        }
        ctx.authorize(resource, action, decision)
    }
}
