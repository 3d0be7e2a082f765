use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Processing purposes a contact can consent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    /// Marketing communications
    Marketing,
    /// Sales follow-up
    Sales,
    /// Customer support
    Support,
    /// Usage analytics
    Analytics,
}

impl Purpose {
    /// All purposes.
    pub const ALL: [Purpose; 4] = [
        Purpose::Marketing,
        Purpose::Sales,
        Purpose::Support,
        Purpose::Analytics,
    ];

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Purpose::Marketing => "marketing",
            Purpose::Sales => "sales",
            Purpose::Support => "support",
            Purpose::Analytics => "analytics",
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Purpose {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "marketing" => Ok(Purpose::Marketing),
            "sales" => Ok(Purpose::Sales),
            "support" => Ok(Purpose::Support),
            "analytics" => Ok(Purpose::Analytics),
            other => Err(format!("unknown consent purpose '{}'", other)),
        }
    }
}

/// Current consent for a (contact, purpose) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentState {
    /// Latest record grants consent
    Granted,
    /// Latest record withdraws consent
    Withdrawn,
    /// No record exists
    Unknown,
}

impl ConsentState {
    /// True only for an explicit grant. `Unknown` never counts as consent.
    pub fn is_granted(&self) -> bool {
        matches!(self, ConsentState::Granted)
    }
}

/// A consent event waiting to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentDraft {
    /// Contact the consent belongs to
    pub contact_id: String,
    /// Purpose consented to or withdrawn
    pub purpose: Purpose,
    /// Grant (`true`) or withdrawal (`false`)
    pub granted: bool,
    /// Channel the consent was captured through
    pub source: String,
    /// Principal who recorded it
    pub recorded_by: String,
    /// Deletion/withdrawal request that caused this record, if any
    pub dsr_id: Option<Uuid>,
    /// Event time
    pub at: DateTime<Utc>,
}

/// One immutable consent event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRecord {
    /// Record identifier
    pub id: Uuid,
    /// Store-assigned, strictly increasing ordering key
    pub sequence: u64,
    /// Contact the consent belongs to
    pub contact_id: String,
    /// Purpose
    pub purpose: Purpose,
    /// Grant or withdrawal
    pub granted: bool,
    /// Set on grants
    pub granted_at: Option<DateTime<Utc>>,
    /// Set on withdrawals
    pub withdrawn_at: Option<DateTime<Utc>>,
    /// Capture channel
    pub source: String,
    /// Principal who recorded it
    pub recorded_by: String,
    /// Originating DSR, for withdrawals raised by the workflow
    pub dsr_id: Option<Uuid>,
}

impl ConsentRecord {
    /// Materializes a draft with its store-assigned identity.
    pub fn from_draft(draft: ConsentDraft, id: Uuid, sequence: u64) -> Self {
        let (granted_at, withdrawn_at) = if draft.granted {
            (Some(draft.at), None)
        } else {
            (None, Some(draft.at))
        };
        Self {
            id,
            sequence,
            contact_id: draft.contact_id,
            purpose: draft.purpose,
            granted: draft.granted,
            granted_at,
            withdrawn_at,
            source: draft.source,
            recorded_by: draft.recorded_by,
            dsr_id: draft.dsr_id,
        }
    }

    /// The timestamp of the event, whichever kind it is.
    pub fn event_time(&self) -> Option<DateTime<Utc>> {
        self.granted_at.or(self.withdrawn_at)
    }
}
