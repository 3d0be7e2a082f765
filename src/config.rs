//! Process-level configuration loaded from TOML.
//!
//! ```toml
//! permissions_path = "permissions.toml"   # optional, built-in table otherwise
//!
//! [session]
//! secret = "change-me"                    # or COMPLIANCE_SESSION_SECRET
//! ttl_seconds = 28800
//! issuer = "crm-qms"
//!
//! [dsr]
//! dual_control = true
//! request_number_prefix = "DSR"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::dsr::DsrType;
use crate::error::ConfigError;
use crate::rbac::PermissionTable;
use crate::secret::Secret;

/// Environment variable that overrides `session.secret`.
pub const SESSION_SECRET_ENV: &str = "COMPLIANCE_SESSION_SECRET";

/// Longest accepted session lifetime (one year).
pub const MAX_TTL_SECONDS: u64 = 366 * 24 * 60 * 60;

fn default_ttl_seconds() -> u64 {
    8 * 60 * 60
}

fn default_issuer() -> String {
    "compliance-core".to_string()
}

fn default_prefix() -> String {
    "DSR".to_string()
}

/// Session token settings.
#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    /// HS256 signing secret
    #[serde(default = "empty_secret")]
    pub secret: Secret<String>,
    /// Token lifetime
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
    /// Expected `iss` claim
    #[serde(default = "default_issuer")]
    pub issuer: String,
}

fn empty_secret() -> Secret<String> {
    Secret::new(String::new())
}

impl SessionConfig {
    /// Settings with the given secret and defaults elsewhere.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: Secret::new(secret.into()),
            ttl_seconds: default_ttl_seconds(),
            issuer: default_issuer(),
        }
    }
}

/// DSR workflow policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DsrPolicy {
    /// Require a verifier other than the assignee for `delete` and
    /// `restrict` requests
    pub dual_control: bool,
    /// Prefix of generated request numbers
    pub request_number_prefix: String,
}

impl Default for DsrPolicy {
    fn default() -> Self {
        Self {
            dual_control: false,
            request_number_prefix: default_prefix(),
        }
    }
}

impl DsrPolicy {
    /// Whether completing a request of this type needs two people.
    pub fn requires_dual_control(&self, request_type: DsrType) -> bool {
        self.dual_control && matches!(request_type, DsrType::Delete | DsrType::Restrict)
    }
}

/// Top-level configuration.
#[derive(Debug, Deserialize)]
pub struct ComplianceConfig {
    /// Session token settings
    pub session: SessionConfig,
    /// DSR workflow policy
    #[serde(default)]
    pub dsr: DsrPolicy,
    /// Permission table file; the built-in table is used when absent
    #[serde(default)]
    pub permissions_path: Option<PathBuf>,
}

impl ComplianceConfig {
    /// Configuration with the given session secret and defaults elsewhere.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            session: SessionConfig::new(secret),
            dsr: DsrPolicy::default(),
            permissions_path: None,
        }
    }

    /// Parses and validates TOML, applying the environment override.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let mut config: ComplianceConfig = toml::from_str(input)?;
        if let Ok(secret) = std::env::var(SESSION_SECRET_ENV) {
            if !secret.trim().is_empty() {
                tracing::debug!("session secret taken from {}", SESSION_SECRET_ENV);
                config.session.secret = Secret::new(secret);
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    /// Checks values that parse but cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.secret.is_blank() {
            return Err(ConfigError::MissingSecret);
        }
        if self.session.ttl_seconds == 0 || self.session.ttl_seconds > MAX_TTL_SECONDS {
            return Err(ConfigError::Invalid(format!(
                "session.ttl_seconds must be between 1 and {}",
                MAX_TTL_SECONDS
            )));
        }
        if self.session.issuer.trim().is_empty() {
            return Err(ConfigError::Invalid("session.issuer must not be empty".into()));
        }
        if self.dsr.request_number_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("dsr.request_number_prefix must not be empty".into()));
        }
        Ok(())
    }

    /// Loads the permission table named by `permissions_path`, or the
    /// built-in table.
    pub fn permission_table(&self) -> Result<PermissionTable, ConfigError> {
        match &self.permissions_path {
            Some(path) => PermissionTable::from_toml_str(&fs::read_to_string(path)?),
            None => Ok(PermissionTable::default_table()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_sections() {
        let config = ComplianceConfig::from_toml_str(
            r#"
            [session]
            secret = "test-secret"
            "#,
        )
        .unwrap();

        assert_eq!(config.session.ttl_seconds, 28_800);
        assert_eq!(config.dsr, DsrPolicy::default());
        assert!(config.permissions_path.is_none());
        assert!(!config.permission_table().unwrap().is_empty());
    }

    #[test]
    fn dsr_policy_is_read() {
        let config = ComplianceConfig::from_toml_str(
            r#"
            [session]
            secret = "test-secret"
            issuer = "crm"

            [dsr]
            dual_control = true
            request_number_prefix = "PRIV"
            "#,
        )
        .unwrap();

        assert!(config.dsr.dual_control);
        assert_eq!(config.dsr.request_number_prefix, "PRIV");
        assert!(config.dsr.requires_dual_control(DsrType::Restrict));
        assert!(!config.dsr.requires_dual_control(DsrType::Access));
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let err = ComplianceConfig::from_toml_str(
            r#"
            [session]
            secret = "s"
            ttl_seconds = 0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = ComplianceConfig::from_toml_str("[session\nsecret=").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn secret_never_appears_in_debug() {
        let config = ComplianceConfig::with_secret("hunter2");
        assert!(!format!("{:?}", config).contains("hunter2"));
    }
}
