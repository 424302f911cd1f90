//! Base64 helpers for gateway payloads.
//!
//! The client-server verification form carries its JSON sub-payload as
//! standard (padded) base64, and wallet payment tokens travel the same way.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as b64;
use std::borrow::Cow;
use std::fmt::Display;

/// Base64 text held as bytes.
///
/// ```rust
/// use platon_types::util::Base64Bytes;
///
/// let encoded = Base64Bytes::encode(br#"{"amount":"0.40"}"#);
/// assert_eq!(encoded.to_string(), "eyJhbW91bnQiOiIwLjQwIn0=");
/// assert_eq!(encoded.decode().unwrap(), br#"{"amount":"0.40"}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64Bytes<'a>(pub Cow<'a, [u8]>);

impl Base64Bytes<'_> {
    /// Decodes the base64 text to raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is not valid standard base64.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        b64.decode(&self.0)
    }

    /// Encodes raw bytes into base64 text.
    pub fn encode<T: AsRef<[u8]>>(input: T) -> Base64Bytes<'static> {
        let encoded = b64.encode(input.as_ref());
        Base64Bytes(Cow::Owned(encoded.into_bytes()))
    }

    /// Decodes the payload as JSON.
    pub fn decode_json<T: serde::de::DeserializeOwned>(&self) -> Result<T, Base64JsonError> {
        let raw = self.decode()?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// Serializes `value` as compact JSON and encodes it.
    pub fn encode_json<T: serde::Serialize + ?Sized>(
        value: &T,
    ) -> Result<Base64Bytes<'static>, serde_json::Error> {
        let raw = serde_json::to_vec(value)?;
        Ok(Self::encode(raw))
    }
}

/// Failure to read a base64-wrapped JSON document.
#[derive(Debug, thiserror::Error)]
pub enum Base64JsonError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid JSON inside base64: {0}")]
    Json(#[from] serde_json::Error),
}

impl AsRef<[u8]> for Base64Bytes<'_> {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl<'a> From<&'a [u8]> for Base64Bytes<'a> {
    fn from(slice: &'a [u8]) -> Self {
        Base64Bytes(Cow::Borrowed(slice))
    }
}

impl<'a> From<&'a str> for Base64Bytes<'a> {
    fn from(text: &'a str) -> Self {
        Base64Bytes(Cow::Borrowed(text.as_bytes()))
    }
}

impl Display for Base64Bytes<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(self.0.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_through_base64() {
        let encoded = Base64Bytes::encode_json(&json!({"token": "abc"})).unwrap();
        let value: serde_json::Value = encoded.decode_json().unwrap();
        assert_eq!(value["token"], "abc");
    }

    #[test]
    fn test_rejects_garbage() {
        let bytes = Base64Bytes::from("not base64!!");
        assert!(matches!(
            bytes.decode_json::<serde_json::Value>(),
            Err(Base64JsonError::Base64(_))
        ));
        let not_json = Base64Bytes::encode(b"plain text");
        assert!(matches!(
            not_json.decode_json::<serde_json::Value>(),
            Err(Base64JsonError::Json(_))
        ));
    }
}
