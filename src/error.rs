use crate::dsr::{DsrStatus, TransitionGuard};
use crate::rbac::Resource;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers of the compliance layer.
///
/// Every variant is terminal for the request; nothing in this crate retries
/// on its own. `Unauthenticated` and `Forbidden` carry no detail so callers
/// cannot learn which credential check or permission rule failed.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing, malformed, expired or otherwise unusable session credential.
    #[error("authentication required")]
    Unauthenticated,

    /// Authenticated principal lacks permission for the operation.
    #[error("insufficient permissions")]
    Forbidden,

    /// A DSR state-machine guard was violated. No state was mutated.
    #[error("invalid transition from {from} to {to}: {guard}")]
    InvalidTransition {
        /// Status the request was in when the transition was attempted
        from: DsrStatus,
        /// Status the caller asked for
        to: DsrStatus,
        /// Which guard rejected the transition
        guard: TransitionGuard,
    },

    /// Referenced record does not exist.
    #[error("{resource} '{id}' not found")]
    NotFound {
        /// Kind of record that was looked up
        resource: Resource,
        /// Identifier that was looked up
        id: String,
    },

    /// Payload was malformed or missing required fields.
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// Failure reported by an external store.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl Error {
    /// Creates a `NotFound` error.
    pub fn not_found(resource: Resource, id: impl Into<String>) -> Self {
        Error::NotFound {
            resource,
            id: id.into(),
        }
    }

    /// Creates a `ValidationFailed` error.
    pub fn validation(message: impl Into<String>) -> Self {
        Error::ValidationFailed(message.into())
    }

    /// Returns true when the caller may safely retry the same call.
    ///
    /// Only transient storage failures qualify. DSR transitions are
    /// idempotent, so a retried transition never repeats its side effects.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Storage(e) if e.is_transient())
    }

    /// Short machine-readable code, suitable for an HTTP error body.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Unauthenticated => "unauthenticated",
            Error::Forbidden => "forbidden",
            Error::InvalidTransition { .. } => "invalid_transition",
            Error::NotFound { .. } => "not_found",
            Error::ValidationFailed(_) => "validation_failed",
            Error::Storage(e) if e.is_transient() => "unavailable",
            Error::Storage(_) => "storage_error",
        }
    }
}

/// Failures reported by the external stores this layer consumes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// Backend could not be reached.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Backend did not answer in time.
    #[error("storage timed out after {millis}ms")]
    Timeout {
        /// Time waited before giving up
        millis: u64,
    },

    /// Compare-and-swap lost against a concurrent writer.
    #[error("version conflict on '{id}': expected {expected}, found {found}")]
    VersionConflict {
        /// Record identifier
        id: String,
        /// Version the writer based its change on
        expected: u64,
        /// Version currently stored
        found: u64,
    },

    /// Any other backend failure.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Transient failures may succeed when retried unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Unavailable(_) | StorageError::Timeout { .. })
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML could not be parsed or did not match the expected shape.
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Configuration file could not be read.
    #[error("cannot read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// Two rules were configured for the same resource and action.
    #[error("duplicate permission rule for {resource}:{action}")]
    DuplicateRule {
        /// Resource named by both rules
        resource: String,
        /// Action named by both rules
        action: String,
    },

    /// A rule lists a redaction for a role it does not allow.
    #[error("rule {resource}:{action} redacts fields for {role}, which it does not allow")]
    RedactionForDeniedRole {
        /// Resource of the offending rule
        resource: String,
        /// Action of the offending rule
        action: String,
        /// Role that has redactions but no access
        role: String,
    },

    /// A value was recognised syntactically but is not acceptable.
    #[error("invalid configuration value: {0}")]
    Invalid(String),

    /// Session signing secret is empty.
    #[error("session secret must not be empty")]
    MissingSecret,
}
