use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use super::{ConsentDraft, ConsentRecord, ConsentState, ConsentStore, Purpose};
use crate::error::{Error, Result};

/// Proof that a completed deletion request covers a contact.
///
/// Only the DSR workflow can mint one, and only for a `delete` request in
/// the `completed` state. Holding it is the sole way to hard-delete consent
/// evidence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErasureAuthority {
    contact_id: String,
    dsr_id: Uuid,
    // Private field prevents construction outside the crate
    _private: (),
}

impl ErasureAuthority {
    pub(crate) fn new(contact_id: String, dsr_id: Uuid) -> Self {
        Self {
            contact_id,
            dsr_id,
            _private: (),
        }
    }

    /// Contact whose data may be erased.
    pub fn contact_id(&self) -> &str {
        &self.contact_id
    }

    /// The completed deletion request.
    pub fn dsr_id(&self) -> Uuid {
        self.dsr_id
    }
}

/// Consent ledger over a [`ConsentStore`].
#[derive(Clone)]
pub struct ConsentLedger {
    store: Arc<dyn ConsentStore>,
}

fn require(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

impl ConsentLedger {
    /// Creates a ledger over a store.
    pub fn new(store: Arc<dyn ConsentStore>) -> Self {
        Self { store }
    }

    /// Appends a grant or withdrawal. Never overwrites earlier records.
    pub fn record_consent(
        &self,
        contact_id: &str,
        purpose: Purpose,
        granted: bool,
        source: &str,
        actor_id: &str,
    ) -> Result<ConsentRecord> {
        require(contact_id, "contact_id")?;
        require(source, "source")?;

        let appended = self.store.append(ConsentDraft {
            contact_id: contact_id.to_string(),
            purpose,
            granted,
            source: source.to_string(),
            recorded_by: actor_id.to_string(),
            dsr_id: None,
            at: Utc::now(),
        })?;
        let record = appended.into_record();

        tracing::info!(
            contact_id = %record.contact_id,
            purpose = %record.purpose,
            granted = record.granted,
            sequence = record.sequence,
            "consent recorded"
        );
        Ok(record)
    }

    /// Appends a withdrawal.
    pub fn withdraw(
        &self,
        contact_id: &str,
        purpose: Purpose,
        source: &str,
        actor_id: &str,
    ) -> Result<ConsentRecord> {
        self.record_consent(contact_id, purpose, false, source, actor_id)
    }

    /// Appends a withdrawal on behalf of a DSR.
    ///
    /// At most one such record exists per (contact, purpose, request); a
    /// replay returns `None` and writes nothing.
    pub(crate) fn withdraw_for_request(
        &self,
        contact_id: &str,
        purpose: Purpose,
        dsr_id: Uuid,
        request_number: &str,
        actor_id: &str,
    ) -> Result<Option<ConsentRecord>> {
        let appended = self.store.append(ConsentDraft {
            contact_id: contact_id.to_string(),
            purpose,
            granted: false,
            source: format!("dsr:{}", request_number),
            recorded_by: actor_id.to_string(),
            dsr_id: Some(dsr_id),
            at: Utc::now(),
        })?;

        if appended.is_new() {
            tracing::info!(
                contact_id,
                purpose = %purpose,
                dsr = request_number,
                "consent withdrawn by data-subject request"
            );
            Ok(Some(appended.into_record()))
        } else {
            Ok(None)
        }
    }

    /// Current consent for one purpose; `Unknown` when nothing was recorded.
    pub fn current_state(&self, contact_id: &str, purpose: Purpose) -> Result<ConsentState> {
        let latest = self
            .store
            .for_contact(contact_id)?
            .into_iter()
            .filter(|r| r.purpose == purpose)
            .max_by_key(|r| r.sequence);

        Ok(match latest {
            Some(r) if r.granted => ConsentState::Granted,
            Some(_) => ConsentState::Withdrawn,
            None => ConsentState::Unknown,
        })
    }

    /// Current consent for every purpose.
    pub fn snapshot(&self, contact_id: &str) -> Result<BTreeMap<Purpose, ConsentState>> {
        let records = self.history(contact_id)?;
        let mut states: BTreeMap<Purpose, ConsentState> = Purpose::ALL
            .iter()
            .map(|p| (*p, ConsentState::Unknown))
            .collect();
        for record in records {
            let state = if record.granted {
                ConsentState::Granted
            } else {
                ConsentState::Withdrawn
            };
            states.insert(record.purpose, state);
        }
        Ok(states)
    }

    /// Every record for a contact, oldest first. Re-querying unchanged data
    /// yields the same sequence.
    pub fn history(&self, contact_id: &str) -> Result<Vec<ConsentRecord>> {
        let mut records = self.store.for_contact(contact_id)?;
        records.sort_by_key(|r| r.sequence);
        Ok(records)
    }

    /// Purposes that have at least one record for the contact.
    pub fn purposes_on_record(&self, contact_id: &str) -> Result<BTreeSet<Purpose>> {
        Ok(self
            .store
            .for_contact(contact_id)?
            .into_iter()
            .map(|r| r.purpose)
            .collect())
    }

    /// Hard-deletes the contact's consent evidence.
    pub fn erase_contact(&self, authority: &ErasureAuthority) -> Result<usize> {
        let removed = self.store.erase_contact(authority.contact_id())?;
        tracing::warn!(
            contact_id = authority.contact_id(),
            dsr_id = %authority.dsr_id(),
            removed,
            "consent records erased"
        );
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consent::MemoryConsentStore;

    fn ledger() -> ConsentLedger {
        ConsentLedger::new(Arc::new(MemoryConsentStore::new()))
    }

    #[test]
    fn unknown_until_recorded() {
        let ledger = ledger();
        assert_eq!(
            ledger.current_state("c-1", Purpose::Marketing).unwrap(),
            ConsentState::Unknown
        );
    }

    #[test]
    fn latest_record_wins() {
        let ledger = ledger();
        ledger.record_consent("c-1", Purpose::Marketing, true, "web", "u").unwrap();
        ledger.withdraw("c-1", Purpose::Marketing, "email", "u").unwrap();
        assert_eq!(
            ledger.current_state("c-1", Purpose::Marketing).unwrap(),
            ConsentState::Withdrawn
        );

        ledger.record_consent("c-1", Purpose::Marketing, true, "phone", "u").unwrap();
        assert_eq!(
            ledger.current_state("c-1", Purpose::Marketing).unwrap(),
            ConsentState::Granted
        );
    }

    #[test]
    fn withdrawal_preserves_prior_grant() {
        let ledger = ledger();
        let grant = ledger.record_consent("c-1", Purpose::Sales, true, "web", "u").unwrap();
        ledger.withdraw("c-1", Purpose::Sales, "web", "u").unwrap();

        let history = ledger.history("c-1").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], grant);
        assert!(history[0].granted);
        assert!(!history[1].granted);
    }

    #[test]
    fn purposes_are_independent() {
        let ledger = ledger();
        ledger.record_consent("c-1", Purpose::Support, true, "web", "u").unwrap();
        ledger.withdraw("c-1", Purpose::Analytics, "web", "u").unwrap();

        let snapshot = ledger.snapshot("c-1").unwrap();
        assert_eq!(snapshot[&Purpose::Support], ConsentState::Granted);
        assert_eq!(snapshot[&Purpose::Analytics], ConsentState::Withdrawn);
        assert_eq!(snapshot[&Purpose::Marketing], ConsentState::Unknown);
        assert_eq!(snapshot.len(), 4);
    }

    #[test]
    fn blank_source_is_rejected() {
        let err = ledger()
            .record_consent("c-1", Purpose::Sales, true, "  ", "u")
            .unwrap_err();
        assert!(matches!(err, Error::ValidationFailed(_)));
    }

    #[test]
    fn request_withdrawals_are_written_once() {
        let ledger = ledger();
        let dsr = Uuid::new_v4();
        assert!(ledger
            .withdraw_for_request("c-1", Purpose::Sales, dsr, "DSR-2026-000001", "u")
            .unwrap()
            .is_some());
        assert!(ledger
            .withdraw_for_request("c-1", Purpose::Sales, dsr, "DSR-2026-000001", "u")
            .unwrap()
            .is_none());
        assert_eq!(ledger.history("c-1").unwrap().len(), 1);
        assert_eq!(ledger.history("c-1").unwrap()[0].source, "dsr:DSR-2026-000001");
    }

    #[test]
    fn erasure_needs_authority() {
        let ledger = ledger();
        ledger.record_consent("c-1", Purpose::Sales, true, "web", "u").unwrap();
        ledger.record_consent("c-2", Purpose::Sales, true, "web", "u").unwrap();

        let authority = ErasureAuthority::new("c-1".into(), Uuid::new_v4());
        assert_eq!(ledger.erase_contact(&authority).unwrap(), 1);
        assert!(ledger.history("c-1").unwrap().is_empty());
        assert_eq!(ledger.history("c-2").unwrap().len(), 1);
    }
}
