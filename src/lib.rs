//! Access control and privacy compliance core for a CRM/QMS backend.
//!
//! This crate sits between request handlers and the record stores and
//! enforces:
//! - **Sessions**: signed, expiring bearer tokens resolved to a [`Principal`]
//! - **RBAC**: one [`PermissionRule`](rbac::PermissionRule) per
//!   (resource, action), with per-role field redaction
//! - **Consent**: an append-only [`ConsentLedger`](consent::ConsentLedger)
//! - **Data-subject requests**: a guarded state machine with idempotent,
//!   race-safe transitions ([`DsrWorkflow`](dsr::DsrWorkflow))
//! - **Audit**: an entry for every change to a contact, consent record or DSR
//!
//! # Core Types
//!
//! - [`ComplianceFacade`]: the only entry point handlers should call
//! - [`AccessGate`]: session verification followed by authorization
//! - [`Ctx`]: per-request context whose type proves which checks passed
//! - [`Secret<T>`]: wrapper that redacts credentials in logs and output
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use compliance_core::audit::AuditTrail;
//! use compliance_core::consent::MemoryConsentStore;
//! use compliance_core::dsr::MemoryDsrStore;
//! use compliance_core::rbac::RecordKind;
//! use compliance_core::store::{Filter, MemoryErasureQueue, MemoryRecordStore};
//! use compliance_core::{
//!     Collaborators, ComplianceConfig, ComplianceFacade, MemoryPrincipalStore, Principal,
//!     RequestMeta, Role, Secret,
//! };
//!
//! let principals = Arc::new(MemoryPrincipalStore::new());
//! principals
//!     .insert(Principal::new("u-1", "viewer@example.com", Role::Viewer), "Demo!234")
//!     .unwrap();
//!
//! let facade = ComplianceFacade::new(
//!     &ComplianceConfig::with_secret("doc-secret"),
//!     Collaborators {
//!         principals,
//!         records: Arc::new(MemoryRecordStore::new()),
//!         consent: Arc::new(MemoryConsentStore::new()),
//!         dsr: Arc::new(MemoryDsrStore::new()),
//!         erasure: Arc::new(MemoryErasureQueue::new()),
//!         audit: Arc::new(AuditTrail::new()),
//!     },
//! )
//! .unwrap();
//!
//! let session = facade
//!     .login("req-0", "viewer@example.com", &Secret::new("Demo!234".to_string()))
//!     .unwrap();
//! let meta = RequestMeta::new("req-1").with_credential(session.token.into_exposed());
//!
//! let contacts = facade
//!     .list_records(&meta, RecordKind::Contact, &Filter::new())
//!     .unwrap();
//! assert!(contacts.is_empty());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod audit;
pub mod config;
pub mod consent;
pub mod dsr;
pub mod rbac;
pub mod store;

mod capability;
mod context;
mod error;
mod facade;
mod gate;
mod logging;
mod principal;
mod secret;
mod session;
mod state;

pub use capability::Grant;
pub use config::{ComplianceConfig, DsrPolicy, SessionConfig};
pub use context::Ctx;
pub use error::{ConfigError, Error, Result, StorageError};
pub use facade::{Collaborators, ComplianceFacade, ConsentInput, WithdrawalInput};
pub use gate::{AccessGate, RequestMeta};
pub use logging::RequestLog;
pub use principal::{MemoryPrincipalStore, Principal, PrincipalRecord, PrincipalStore, Role};
pub use secret::Secret;
pub use session::{SessionToken, SessionVerifier};
pub use state::{Authed, Authorized, Unauthed};
