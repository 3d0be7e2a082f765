//! Data-subject request workflow.
//!
//! ```text
//! pending --start--> in_progress --complete--> completed
//!                         |
//!                         +------reject------> rejected
//! ```
//!
//! All guards live in [`next_state`], a pure function from the current
//! request and a requested [`Transition`] to either the new state or a typed
//! failure. [`DsrWorkflow`] persists the result with compare-and-swap so two
//! racing transitions cannot both succeed. Completion side effects
//! (consent withdrawals, erasure jobs) run after the state is stored and are
//! marked done with a second write; a completed request whose effects have
//! not run yet is not [fulfilled](DsrRequest::is_fulfilled) and a replayed
//! `complete` finishes them.

mod machine;
mod model;
mod store;
mod workflow;

pub use machine::{next_state, Step, Transition, TransitionGuard};
pub use model::{DsrRequest, DsrState, DsrStatus, DsrSubmission, DsrType, NewDsr};
pub use store::{DsrStore, MemoryDsrStore};
pub use workflow::{DsrWorkflow, TransitionOutcome};
