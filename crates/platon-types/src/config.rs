//! Merchant configuration.
//!
//! Secrets rarely belong in a config file. Any [`LiteralOrEnv`] value may
//! instead name an environment variable:
//!
//! ```json
//! {
//!   "merchant_key": "CLIENT_KEY",
//!   "secret_key": "$PLATON_SECRET",
//!   "success_redirect": "${PLATON_SUCCESS_URL}"
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use crate::auth::Auth;

/// A config value given literally or as a `$VAR` / `${VAR}` reference.
///
/// References are resolved once, during deserialization.
#[derive(Clone, PartialEq, Eq)]
pub struct LiteralOrEnv<T>(T);

/// Name of the variable a config string refers to, if it is a reference.
fn env_reference(s: &str) -> Option<&str> {
    if let Some(braced) = s.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) {
        return Some(braced);
    }
    let name = s.strip_prefix('$')?;
    (!name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_')).then_some(name)
}

impl<T> LiteralOrEnv<T> {
    pub fn from_literal(value: T) -> Self {
        Self(value)
    }

    pub fn inner(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> LiteralOrEnv<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    /// Resolves `raw` against the process environment and parses the result.
    pub fn resolve(raw: &str) -> Result<Self, String> {
        let value = match env_reference(raw) {
            Some(name) => std::env::var(name).map_err(|_| {
                format!("environment variable '{name}' not found (referenced as '{raw}')")
            })?,
            None => raw.to_string(),
        };
        value
            .parse::<T>()
            .map(LiteralOrEnv)
            .map_err(|e| format!("failed to parse value: {e}"))
    }
}

impl<T> Deref for LiteralOrEnv<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Values may be secrets, so only the type is printed.
impl<T> fmt::Debug for LiteralOrEnv<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LiteralOrEnv<{}>(..)", std::any::type_name::<T>())
    }
}

impl<'de, T> Deserialize<'de> for LiteralOrEnv<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::resolve(&raw).map_err(serde::de::Error::custom)
    }
}

impl<T: Serialize> Serialize for LiteralOrEnv<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

/// Credentials and merchant-wide defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerchantConfig {
    /// Public `client_key`.
    pub merchant_key: String,
    pub secret_key: LiteralOrEnv<String>,
    /// Browser redirect after a successful client-server verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_redirect: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_redirect: Option<String>,
    /// 3-DS return URL; falls back to `success_redirect`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term_url_3ds: Option<String>,
    /// Payer IP sent when the payment itself carries none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer_ip: Option<String>,
}

impl MerchantConfig {
    pub fn new(merchant_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            merchant_key: merchant_key.into(),
            secret_key: LiteralOrEnv::from_literal(secret_key.into()),
            success_redirect: None,
            fail_redirect: None,
            term_url_3ds: None,
            payer_ip: None,
        }
    }

    pub fn auth(&self) -> Auth {
        Auth::new(self.merchant_key.clone(), self.secret_key.inner().clone())
    }

    /// `term_url_3ds`, else the success redirect.
    pub fn term_url(&self) -> Option<&str> {
        self.term_url_3ds
            .as_deref()
            .or(self.success_redirect.as_deref())
            .filter(|url| !url.trim().is_empty())
    }
}
