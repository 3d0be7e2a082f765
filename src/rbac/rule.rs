use std::collections::{BTreeSet, HashMap};

use serde::Deserialize;

use super::{Action, Resource, RoleSet};
use crate::error::ConfigError;
use crate::principal::Role;

/// The single authorization rule for one (resource, action) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRule {
    /// Resource the rule governs
    pub resource: Resource,
    /// Action the rule governs
    pub action: Action,
    /// Roles allowed to perform the action
    pub allowed: RoleSet,
    /// Fields to redact in responses, per role; absent role means full visibility
    pub redacted_fields_for: HashMap<Role, BTreeSet<String>>,
}

impl PermissionRule {
    /// Creates a rule with no redactions.
    pub fn new(resource: Resource, action: Action, allowed: &[Role]) -> Self {
        Self {
            resource,
            action,
            allowed: RoleSet::of(allowed),
            redacted_fields_for: HashMap::new(),
        }
    }

    /// Adds fields that must be redacted for `role`.
    pub fn redact_for(mut self, role: Role, fields: &[&str]) -> Self {
        self.redacted_fields_for
            .entry(role)
            .or_default()
            .extend(fields.iter().map(|f| f.to_string()));
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for role in self.redacted_fields_for.keys() {
            if !self.allowed.contains(*role) {
                return Err(ConfigError::RedactionForDeniedRole {
                    resource: self.resource.to_string(),
                    action: self.action.to_string(),
                    role: role.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Immutable lookup table of permission rules.
///
/// Construction rejects a second rule for the same (resource, action), so
/// every exposed operation has exactly one discoverable rule.
#[derive(Debug, Clone)]
pub struct PermissionTable {
    rules: HashMap<(Resource, Action), PermissionRule>,
}

#[derive(Debug, Deserialize)]
struct RawTable {
    #[serde(default, rename = "rule")]
    rules: Vec<RawRule>,
}

#[derive(Debug, Deserialize)]
struct RawRule {
    resource: Resource,
    action: Action,
    roles: Vec<Role>,
    #[serde(default)]
    redact: HashMap<String, Vec<String>>,
}

impl PermissionTable {
    /// Builds a table, rejecting duplicate or inconsistent rules.
    pub fn from_rules(rules: impl IntoIterator<Item = PermissionRule>) -> Result<Self, ConfigError> {
        let mut table = HashMap::new();
        for rule in rules {
            rule.validate()?;
            let key = (rule.resource, rule.action);
            if table.contains_key(&key) {
                return Err(ConfigError::DuplicateRule {
                    resource: rule.resource.to_string(),
                    action: rule.action.to_string(),
                });
            }
            table.insert(key, rule);
        }
        Ok(Self { rules: table })
    }

    /// Parses a table from TOML.
    ///
    /// ```toml
    /// [[rule]]
    /// resource = "contact"
    /// action = "read"
    /// roles = ["ADMIN", "MANAGER", "AGENT", "VIEWER"]
    /// redact = { VIEWER = ["email"] }
    /// ```
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: RawTable = toml::from_str(input)?;
        let mut rules = Vec::with_capacity(raw.rules.len());
        for r in raw.rules {
            let mut rule = PermissionRule::new(r.resource, r.action, &r.roles);
            for (role_name, fields) in r.redact {
                let role: Role = role_name.parse().map_err(ConfigError::Invalid)?;
                rule.redacted_fields_for
                    .entry(role)
                    .or_default()
                    .extend(fields);
            }
            rules.push(rule);
        }
        Self::from_rules(rules)
    }

    /// The rule for a (resource, action) pair, if one is configured.
    pub fn rule(&self, resource: Resource, action: Action) -> Option<&PermissionRule> {
        self.rules.get(&(resource, action))
    }

    /// Number of configured rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when no rules are configured (everything is denied).
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The built-in table for the CRM/QMS application.
    pub fn default_table() -> Self {
        use Action::*;
        use Role::*;

        let crm_writers = [Admin, Manager, Agent];
        let quality = [Admin, Qa, Manager];
        let everyone = Role::ALL;

        let rules = vec![
            PermissionRule::new(Resource::Contact, Read, &[Admin, Manager, Agent, Viewer])
                .redact_for(Viewer, &["email"]),
            PermissionRule::new(Resource::Contact, Create, &crm_writers),
            PermissionRule::new(Resource::Contact, Update, &crm_writers),
            PermissionRule::new(Resource::Contact, Delete, &[Admin, Manager]),
            PermissionRule::new(Resource::Opportunity, Read, &everyone),
            PermissionRule::new(Resource::Opportunity, Create, &crm_writers),
            PermissionRule::new(Resource::Opportunity, Update, &crm_writers),
            PermissionRule::new(Resource::Activity, Read, &everyone),
            PermissionRule::new(Resource::Activity, Create, &crm_writers),
            PermissionRule::new(Resource::Activity, Update, &crm_writers),
            PermissionRule::new(Resource::Ncr, Read, &quality),
            PermissionRule::new(Resource::Ncr, Create, &quality),
            PermissionRule::new(Resource::Ncr, Update, &quality),
            PermissionRule::new(Resource::Document, Read, &everyone),
            PermissionRule::new(Resource::Document, Create, &quality),
            PermissionRule::new(Resource::Document, Update, &quality),
            PermissionRule::new(Resource::Document, Approve, &quality),
            PermissionRule::new(Resource::Supplier, Read, &quality),
            PermissionRule::new(Resource::Supplier, Create, &quality),
            PermissionRule::new(Resource::Supplier, Update, &quality),
            PermissionRule::new(Resource::Consent, Read, &quality),
            PermissionRule::new(Resource::Consent, Create, &quality),
            PermissionRule::new(Resource::Consent, Withdraw, &quality),
            PermissionRule::new(Resource::Consent, Erase, &[Admin]),
            PermissionRule::new(Resource::Dsr, Read, &quality),
            PermissionRule::new(Resource::Dsr, Create, &quality),
            PermissionRule::new(Resource::Dsr, Transition, &quality),
        ];

        match Self::from_rules(rules) {
            Ok(table) => table,
            Err(e) => {
                debug_assert!(false, "built-in permission table is invalid: {}", e);
                tracing::error!(
                    error = %e,
                    "built-in permission table is invalid; denying every request"
                );
                Self {
                    rules: HashMap::new(),
                }
            }
        }
    }
}

impl Default for PermissionTable {
    fn default() -> Self {
        Self::default_table()
    }
}
