//! Authenticated identities and the account store they are read from.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::secret::Secret;

/// Account role used for every authorization decision.
///
/// Roles are listed from most to least privileged, but no code compares them
/// by position: permissions are always looked up in the rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Full access, including consent erasure
    Admin,
    /// Quality assurance: NCRs, documents, suppliers, privacy requests
    Qa,
    /// Line management: CRM and quality records
    Manager,
    /// Sales/support agent: CRM records only
    Agent,
    /// Read-only access with redacted personal data
    Viewer,
}

impl Role {
    /// Every role, most privileged first.
    pub const ALL: [Role; 5] = [Role::Admin, Role::Qa, Role::Manager, Role::Agent, Role::Viewer];

    /// Canonical upper-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Qa => "QA",
            Role::Manager => "MANAGER",
            Role::Agent => "AGENT",
            Role::Viewer => "VIEWER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "QA" => Ok(Role::Qa),
            "MANAGER" => Ok(Role::Manager),
            "AGENT" => Ok(Role::Agent),
            "VIEWER" => Ok(Role::Viewer),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// The identity making a request. Immutable for the lifetime of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Stable account identifier
    pub id: String,
    /// Login e-mail
    pub email: String,
    /// Role used for authorization
    pub role: Role,
    /// Organisational department, if any
    pub department: Option<String>,
}

impl Principal {
    /// Creates a principal without a department.
    pub fn new(id: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            role,
            department: None,
        }
    }

    /// Sets the department.
    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }
}

/// An account as held by the principal store, including its credential.
#[derive(Debug)]
pub struct PrincipalRecord {
    /// Public identity
    pub principal: Principal,
    /// Argon2 PHC string
    pub password_hash: Secret<String>,
}

/// Read-only view of the external account store.
///
/// This layer consults accounts but never creates or modifies them.
pub trait PrincipalStore: Send + Sync {
    /// Looks up an account by id.
    fn find_by_id(&self, id: &str) -> Result<Option<Principal>, StorageError>;

    /// Looks up an account and its credential by login e-mail.
    fn find_credentials(&self, email: &str) -> Result<Option<PrincipalRecord>, StorageError>;
}

/// In-memory principal store, used by tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryPrincipalStore {
    accounts: RwLock<HashMap<String, (Principal, String)>>,
}

impl MemoryPrincipalStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an account whose password is already an Argon2 PHC string.
    pub fn insert_hashed(&self, principal: Principal, password_hash: impl Into<String>) {
        self.accounts
            .write()
            .insert(principal.id.clone(), (principal, password_hash.into()));
    }

    /// Adds an account, hashing the plain-text password.
    pub fn insert(&self, principal: Principal, password: &str) -> Result<(), StorageError> {
        let hash = crate::session::hash_password(password)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        self.insert_hashed(principal, hash);
        Ok(())
    }

    /// Removes an account. Sessions issued to it stop resolving.
    pub fn remove(&self, id: &str) -> bool {
        self.accounts.write().remove(id).is_some()
    }
}

impl PrincipalStore for MemoryPrincipalStore {
    fn find_by_id(&self, id: &str) -> Result<Option<Principal>, StorageError> {
        Ok(self.accounts.read().get(id).map(|(p, _)| p.clone()))
    }

    fn find_credentials(&self, email: &str) -> Result<Option<PrincipalRecord>, StorageError> {
        let accounts = self.accounts.read();
        Ok(accounts
            .values()
            .find(|(p, _)| p.email.eq_ignore_ascii_case(email))
            .map(|(p, hash)| PrincipalRecord {
                principal: p.clone(),
                password_hash: Secret::new(hash.clone()),
            }))
    }
}
