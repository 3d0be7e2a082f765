use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;

use super::{redact_value, Action, PermissionTable, Resource};
use crate::principal::Principal;

/// Outcome of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Whether the operation may proceed
    pub allow: bool,
    /// Fields to mask in the response; always empty on deny
    pub redact: BTreeSet<String>,
}

impl Decision {
    /// A terminal deny.
    pub fn deny() -> Self {
        Self {
            allow: false,
            redact: BTreeSet::new(),
        }
    }

    /// An allow with the given redactions.
    pub fn allow(redact: BTreeSet<String>) -> Self {
        Self {
            allow: true,
            redact,
        }
    }

    /// Applies this decision's redactions to a response value.
    pub fn redact_response(&self, value: &mut Value) {
        redact_value(value, &self.redact);
    }
}

/// Stateless authorization engine over a shared permission table.
#[derive(Debug, Clone)]
pub struct RbacEngine {
    table: Arc<PermissionTable>,
}

impl RbacEngine {
    /// Creates an engine over a loaded table.
    pub fn new(table: PermissionTable) -> Self {
        Self {
            table: Arc::new(table),
        }
    }

    /// Creates an engine sharing an existing table.
    pub fn from_shared(table: Arc<PermissionTable>) -> Self {
        Self { table }
    }

    /// The underlying table.
    pub fn table(&self) -> &PermissionTable {
        &self.table
    }

    /// Decides whether `principal` may perform `action` on `resource`.
    ///
    /// No rule means deny. When allowed, the redaction set is the rule's
    /// entry for the principal's role, or empty when the role has none.
    pub fn authorize(&self, principal: &Principal, resource: Resource, action: Action) -> Decision {
        let Some(rule) = self.table.rule(resource, action) else {
            tracing::debug!(%resource, %action, "no permission rule configured");
            return Decision::deny();
        };

        if !rule.allowed.contains(principal.role) {
            return Decision::deny();
        }

        let redact = rule
            .redacted_fields_for
            .get(&principal.role)
            .cloned()
            .unwrap_or_default();
        Decision::allow(redact)
    }
}

impl Default for RbacEngine {
    fn default() -> Self {
        Self::new(PermissionTable::default_table())
    }
}
