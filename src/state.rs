//! Type-state for request context progression.
//!
//! ```text
//! Ctx<Unauthed> --authenticate--> Ctx<Authed> --authorize--> Ctx<Authorized>
//! ```
//!
//! Each state holds exactly what has been proven so far and cannot be
//! constructed outside the crate.

use crate::capability::Grant;
use crate::principal::Principal;

/// No principal resolved yet.
#[derive(Debug, Clone)]
pub struct Unauthed {
    _private: (),
}

impl Unauthed {
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }
}

/// Principal resolved from a valid session, no permission checked yet.
#[derive(Debug, Clone)]
pub struct Authed {
    pub(crate) principal: Principal,
}

/// Principal plus a [`Grant`] for one (resource, action) pair.
#[derive(Debug, Clone)]
pub struct Authorized {
    pub(crate) principal: Principal,
    pub(crate) grant: Grant,
}
