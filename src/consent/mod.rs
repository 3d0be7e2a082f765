//! Append-only consent ledger.
//!
//! Each grant or withdrawal appends a new [`ConsentRecord`]; nothing is
//! overwritten. The current state for a (contact, purpose) pair is the
//! `granted` flag of its latest record, where "latest" means the highest
//! store-assigned `sequence`, not the wall-clock timestamp.

mod ledger;
mod record;
mod store;

pub use ledger::{ConsentLedger, ErasureAuthority};
pub use record::{ConsentDraft, ConsentRecord, ConsentState, Purpose};
pub use store::{Appended, ConsentStore, MemoryConsentStore};
