//! Role-based authorization.
//!
//! A [`PermissionTable`] holds exactly one [`PermissionRule`] per
//! (resource, action) pair. It is built once at start-up and shared
//! read-only; [`RbacEngine::authorize`] is a pure lookup over it, so any
//! number of requests may evaluate it concurrently without locking.
//!
//! A missing rule means "deny all".

mod engine;
mod redact;
mod resource;
mod role_set;
mod rule;

pub use engine::{Decision, RbacEngine};
pub use redact::{mask_email, redact_value, FULL_MASK};
pub use resource::{Action, RecordKind, Resource};
pub use role_set::RoleSet;
pub use rule::{PermissionRule, PermissionTable};
