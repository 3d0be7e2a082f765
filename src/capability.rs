use std::collections::BTreeSet;

use serde_json::Value;

use crate::rbac::{redact_value, Action, Decision, Resource};

/// Proof that the RBAC engine allowed one (resource, action) pair.
///
/// Carries the fields that must be masked for the principal it was issued
/// to. It cannot be constructed outside this crate; the only source is an
/// allowing [`Decision`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    resource: Resource,
    action: Action,
    redact: BTreeSet<String>,
    // Private field prevents construction outside the crate
    _private: (),
}

impl Grant {
    /// Converts an allowing decision into a grant. `None` for a denial.
    pub(crate) fn from_decision(resource: Resource, action: Action, decision: Decision) -> Option<Self> {
        if !decision.allow {
            return None;
        }
        Some(Self {
            resource,
            action,
            redact: decision.redact,
            _private: (),
        })
    }

    /// Resource the grant covers.
    pub fn resource(&self) -> Resource {
        self.resource
    }

    /// Action the grant covers.
    pub fn action(&self) -> Action {
        self.action
    }

    /// Field names masked for this principal.
    pub fn redacted_fields(&self) -> &BTreeSet<String> {
        &self.redact
    }

    /// Masks redacted fields in an outgoing record or list of records.
    pub fn redact(&self, value: &mut Value) {
        if !self.redact.is_empty() {
            redact_value(value, &self.redact);
        }
    }
}
