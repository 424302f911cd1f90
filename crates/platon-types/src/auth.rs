//! Merchant credentials.

use std::fmt;

/// Merchant key and secret.
///
/// The secret only ever enters digest computations. It is never written to
/// a transport map and is redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Auth {
    pub key: String,
    secret: String,
}

impl Auth {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Auth")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}
