use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Every resource type the compliance layer gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    /// Login sessions
    Session,
    /// CRM contacts (personal data)
    Contact,
    /// Sales opportunities
    Opportunity,
    /// Calls, meetings and tasks
    Activity,
    /// Non-conformance reports
    Ncr,
    /// Controlled documents
    Document,
    /// Supplier register
    Supplier,
    /// Consent ledger
    Consent,
    /// Data-subject requests
    Dsr,
}

impl Resource {
    /// Every resource.
    pub const ALL: [Resource; 9] = [
        Resource::Session,
        Resource::Contact,
        Resource::Opportunity,
        Resource::Activity,
        Resource::Ncr,
        Resource::Document,
        Resource::Supplier,
        Resource::Consent,
        Resource::Dsr,
    ];

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Session => "session",
            Resource::Contact => "contact",
            Resource::Opportunity => "opportunity",
            Resource::Activity => "activity",
            Resource::Ncr => "ncr",
            Resource::Document => "document",
            Resource::Supplier => "supplier",
            Resource::Consent => "consent",
            Resource::Dsr => "dsr",
        }
    }

    /// Resources whose state changes are written to the audit log.
    pub fn is_regulated(&self) -> bool {
        matches!(self, Resource::Contact | Resource::Consent | Resource::Dsr)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "session" => Ok(Resource::Session),
            "contact" => Ok(Resource::Contact),
            "opportunity" => Ok(Resource::Opportunity),
            "activity" => Ok(Resource::Activity),
            "ncr" => Ok(Resource::Ncr),
            "document" => Ok(Resource::Document),
            "supplier" => Ok(Resource::Supplier),
            "consent" => Ok(Resource::Consent),
            "dsr" => Ok(Resource::Dsr),
            other => Err(format!("unknown resource '{}'", other)),
        }
    }
}

/// Records owned by the external CRUD store.
///
/// Consent records and DSRs are deliberately absent: they are only ever
/// changed through the ledger and the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// CRM contact
    Contact,
    /// Sales opportunity
    Opportunity,
    /// Activity
    Activity,
    /// Non-conformance report
    Ncr,
    /// Controlled document
    Document,
    /// Supplier
    Supplier,
}

impl RecordKind {
    /// All CRUD-owned kinds.
    pub const ALL: [RecordKind; 6] = [
        RecordKind::Contact,
        RecordKind::Opportunity,
        RecordKind::Activity,
        RecordKind::Ncr,
        RecordKind::Document,
        RecordKind::Supplier,
    ];

    /// The matching authorization resource.
    pub fn resource(&self) -> Resource {
        match self {
            RecordKind::Contact => Resource::Contact,
            RecordKind::Opportunity => Resource::Opportunity,
            RecordKind::Activity => Resource::Activity,
            RecordKind::Ncr => Resource::Ncr,
            RecordKind::Document => Resource::Document,
            RecordKind::Supplier => Resource::Supplier,
        }
    }
}

impl From<RecordKind> for Resource {
    fn from(kind: RecordKind) -> Self {
        kind.resource()
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.resource().fmt(f)
    }
}

/// Operations that can be authorized on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Get or list
    Read,
    /// Insert a new record / grant consent / submit a DSR
    Create,
    /// Modify an existing record
    Update,
    /// Remove a record
    Delete,
    /// Approve a controlled document
    Approve,
    /// Withdraw consent
    Withdraw,
    /// Move a DSR through its workflow
    Transition,
    /// Hard-delete consent evidence after a completed deletion request
    Erase,
}

impl Action {
    /// Every action.
    pub const ALL: [Action; 8] = [
        Action::Read,
        Action::Create,
        Action::Update,
        Action::Delete,
        Action::Approve,
        Action::Withdraw,
        Action::Transition,
        Action::Erase,
    ];

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Approve => "approve",
            Action::Withdraw => "withdraw",
            Action::Transition => "transition",
            Action::Erase => "erase",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Action::Read),
            "create" => Ok(Action::Create),
            "update" => Ok(Action::Update),
            "delete" => Ok(Action::Delete),
            "approve" => Ok(Action::Approve),
            "withdraw" => Ok(Action::Withdraw),
            "transition" => Ok(Action::Transition),
            "erase" => Ok(Action::Erase),
            other => Err(format!("unknown action '{}'", other)),
        }
    }
}
