use std::fmt;

use serde::{Deserialize, Deserializer};

/// Wrapper that keeps credentials out of logs and error messages.
///
/// Session tokens, passwords, password hashes and signing secrets all travel
/// through the crate as `Secret<T>`. `Debug` and `Display` print
/// `[REDACTED]`; the value is reachable only through
/// [`expose_secret`](Self::expose_secret).
///
/// # Examples
///
/// ```
/// use compliance_core::Secret;
///
/// let token = Secret::new("eyJhbGciOi...".to_string());
/// assert_eq!(format!("{:?}", token), "[REDACTED]");
/// assert_eq!(token.expose_secret(), "eyJhbGciOi...");
/// ```
// Deliberately not Clone/Copy/Default: duplicating a credential must be an
// explicit `expose_secret()` call.
pub struct Secret<T> {
    inner: T,
}

impl<T> Secret<T> {
    /// Wraps a sensitive value.
    pub fn new(value: T) -> Self {
        Self { inner: value }
    }

    /// Borrows the wrapped value. Never log the result.
    pub fn expose_secret(&self) -> &T {
        &self.inner
    }

    /// Unwraps the value, consuming the wrapper.
    pub fn into_exposed(self) -> T {
        self.inner
    }
}

impl Secret<String> {
    /// True when the wrapped string is empty or whitespace.
    pub fn is_blank(&self) -> bool {
        self.inner.trim().is_empty()
    }
}

impl<T> From<T> for Secret<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Secret<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        T::deserialize(deserializer).map(Secret::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_and_display_are_redacted() {
        let password = Secret::new("Demo!234".to_string());

        assert_eq!(format!("{:?}", password), "[REDACTED]");
        assert_eq!(format!("{}", password), "[REDACTED]");
        assert!(!format!("{:?}", password).contains("String"));
    }

    #[test]
    fn explicit_access_returns_value() {
        let secret = Secret::new(42);
        assert_eq!(*secret.expose_secret(), 42);
        assert_eq!(secret.into_exposed(), 42);
    }

    #[test]
    fn blank_detection() {
        assert!(Secret::new("  ".to_string()).is_blank());
        assert!(!Secret::new("k".to_string()).is_blank());
    }

    #[test]
    fn deserializes_transparently() {
        #[derive(Deserialize)]
        struct Holder {
            key: Secret<String>,
        }

        let holder: Holder = serde_json::from_str(r#"{"key":"s3cr3t"}"#).unwrap();
        assert_eq!(holder.key.expose_secret(), "s3cr3t");
        assert_eq!(format!("{}", holder.key), "[REDACTED]");
    }
}
