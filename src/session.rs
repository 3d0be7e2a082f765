//! Session tokens and password login.
//!
//! A session credential is an HS256 JWT carrying `{sub, iat, exp, iss}`.
//! Every failure mode of [`SessionVerifier::resolve`] and
//! [`SessionVerifier::login`] collapses into [`Error::Unauthenticated`]; the
//! specific reason is logged at `debug` and never returned.

#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::{SessionConfig, MAX_TTL_SECONDS};
use crate::error::{Error, Result};
use crate::principal::{Principal, PrincipalStore};
use crate::secret::Secret;

/// Hashes a password into an Argon2 PHC string.
pub(crate) fn hash_password(password: &str) -> std::result::Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash is not a valid PHC string");
            false
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
    iss: String,
}

/// A freshly issued session.
#[derive(Debug)]
pub struct SessionToken {
    /// Bearer credential
    pub token: Secret<String>,
    /// Expiry instant
    pub expires_at: DateTime<Utc>,
    /// Principal the token was issued to
    pub principal: Principal,
}

/// Issues and verifies session tokens.
pub struct SessionVerifier {
    principals: Arc<dyn PrincipalStore>,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
    issuer: String,
    /// Verified against when the e-mail is unknown, so both refusals cost
    /// one Argon2 verification
    decoy_hash: Option<Secret<String>>,
    #[cfg(test)]
    password_checks: AtomicUsize,
}

impl SessionVerifier {
    /// Creates a verifier from session settings.
    pub fn new(config: &SessionConfig, principals: Arc<dyn PrincipalStore>) -> Self {
        let secret = config.secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);

        let decoy_hash = match hash_password("decoy-password") {
            Ok(hash) => Some(Secret::new(hash)),
            Err(e) => {
                tracing::error!(error = %e, "failed to prepare decoy password hash");
                None
            }
        };

        Self {
            principals,
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl: Duration::seconds(config.ttl_seconds.min(MAX_TTL_SECONDS) as i64),
            issuer: config.issuer.clone(),
            decoy_hash,
            #[cfg(test)]
            password_checks: AtomicUsize::new(0),
        }
    }

    /// Signs a token for `principal`.
    pub fn issue(&self, principal: &Principal) -> Result<SessionToken> {
        let now = Utc::now();
        let expires_at = now + self.ttl;
        let claims = Claims {
            sub: principal.id.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.issuer.clone(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|e| {
            tracing::warn!(error = %e, "failed to sign session token");
            Error::Unauthenticated
        })?;

        Ok(SessionToken {
            token: Secret::new(token),
            expires_at: Utc
                .timestamp_opt(claims.exp, 0)
                .single()
                .unwrap_or(expires_at),
            principal: principal.clone(),
        })
    }

    /// Exchanges e-mail and password for a session.
    ///
    /// Unknown e-mail and wrong password fail identically.
    pub fn login(&self, email: &str, password: &Secret<String>) -> Result<SessionToken> {
        let Some(record) = self.principals.find_credentials(email.trim())? else {
            if let Some(decoy) = &self.decoy_hash {
                self.check_password(password, decoy);
            }
            tracing::debug!(reason = "unknown account", "login refused");
            return Err(Error::Unauthenticated);
        };
        if !self.check_password(password, &record.password_hash) {
            tracing::debug!(principal_id = %record.principal.id, reason = "password mismatch", "login refused");
            return Err(Error::Unauthenticated);
        }

        tracing::info!(principal_id = %record.principal.id, role = %record.principal.role, "login succeeded");
        self.issue(&record.principal)
    }

    fn check_password(&self, password: &Secret<String>, hash: &Secret<String>) -> bool {
        #[cfg(test)]
        self.password_checks.fetch_add(1, Ordering::SeqCst);
        verify_password(password.expose_secret(), hash.expose_secret())
    }

    /// Resolves a bearer credential to the current principal.
    ///
    /// The principal is re-read from the store on every call, so a removed
    /// account or changed role takes effect immediately.
    pub fn resolve(&self, credential: Option<&Secret<String>>) -> Result<Principal> {
        let Some(credential) = credential else {
            tracing::debug!(reason = "missing credential", "session refused");
            return Err(Error::Unauthenticated);
        };
        let token = credential.expose_secret().trim();
        let token = token.strip_prefix("Bearer ").unwrap_or(token);
        if token.is_empty() {
            tracing::debug!(reason = "empty credential", "session refused");
            return Err(Error::Unauthenticated);
        }

        let claims = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| {
                tracing::debug!(reason = %e, "session refused");
                Error::Unauthenticated
            })?
            .claims;

        match self.principals.find_by_id(&claims.sub)? {
            Some(principal) => Ok(principal),
            None => {
                tracing::debug!(reason = "subject no longer exists", "session refused");
                Err(Error::Unauthenticated)
            }
        }
    }
}
