//! Gateway response envelope.
//!
//! Every server-to-server call answers with a JSON envelope. Business
//! failures arrive as `result: "DECLINED"` or `"ERROR"` with a human readable
//! `error_message`/`decline_reason`, either of which may be a plain string or
//! a JSON object depending on the gateway installation.

use std::fmt;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Deserializer, Serialize};

/// Value of the envelope's `result` member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResponseResult {
    Accepted,
    Declined,
    Error,
    Success,
    /// Any value this crate does not know about, kept verbatim.
    Other(String),
}

impl ResponseResult {
    pub fn as_str(&self) -> &str {
        match self {
            ResponseResult::Accepted => "ACCEPTED",
            ResponseResult::Declined => "DECLINED",
            ResponseResult::Error => "ERROR",
            ResponseResult::Success => "SUCCESS",
            ResponseResult::Other(other) => other,
        }
    }
}

impl From<String> for ResponseResult {
    fn from(value: String) -> Self {
        match value.as_str() {
            "ACCEPTED" => ResponseResult::Accepted,
            "DECLINED" => ResponseResult::Declined,
            "ERROR" => ResponseResult::Error,
            "SUCCESS" => ResponseResult::Success,
            _ => ResponseResult::Other(value),
        }
    }
}

impl From<ResponseResult> for String {
    fn from(value: ResponseResult) -> Self {
        match value {
            ResponseResult::Other(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl Display for ResponseResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Nested `response` block of configuration calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submerchant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submerchant_id_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl ResponseData {
    fn is_empty(&self) -> bool {
        self.submerchant_id.is_none() && self.submerchant_id_status.is_none() && self.hash.is_none()
    }
}

/// Renders a string, object or null member as text; objects become compact JSON.
fn text_or_json<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(text)) => Some(text).filter(|t| !t.is_empty()),
        Some(other) => Some(other.to_string()),
    })
}

#[derive(Deserialize)]
struct RawResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    result: Option<ResponseResult>,
    #[serde(default)]
    order_id: Option<String>,
    #[serde(default)]
    trans_id: Option<String>,
    #[serde(default)]
    trans_date: Option<String>,
    #[serde(default)]
    redirect_url: Option<String>,
    #[serde(default)]
    redirect_params: Option<serde_json::Value>,
    #[serde(default)]
    response: Option<ResponseData>,
    #[serde(default)]
    submerchant_id: Option<String>,
    #[serde(default)]
    submerchant_id_status: Option<String>,
    #[serde(default)]
    hash: Option<String>,
    #[serde(default, deserialize_with = "text_or_json")]
    error_message: Option<String>,
    #[serde(default, deserialize_with = "text_or_json")]
    decline_reason: Option<String>,
}

/// Decoded gateway envelope.
///
/// Top-level `submerchant_id`, `submerchant_id_status` and `hash` are folded
/// into [`Response::response`] when the nested block does not carry them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawResponse")]
pub struct Response {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResponseResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trans_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trans_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_params: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decline_reason: Option<String>,
}

impl From<RawResponse> for Response {
    fn from(raw: RawResponse) -> Self {
        let mut data = raw.response.unwrap_or_default();
        data.submerchant_id = data.submerchant_id.or(raw.submerchant_id);
        data.submerchant_id_status = data.submerchant_id_status.or(raw.submerchant_id_status);
        data.hash = data.hash.or(raw.hash);
        Response {
            status: raw.status,
            action: raw.action,
            result: raw.result,
            order_id: raw.order_id,
            trans_id: raw.trans_id,
            trans_date: raw.trans_date,
            redirect_url: raw.redirect_url,
            redirect_params: raw.redirect_params,
            response: (!data.is_empty()).then_some(data),
            error_message: raw.error_message,
            decline_reason: raw.decline_reason,
        }
    }
}

/// A business failure reported inside an otherwise successful HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("platon api error: {0}")]
    Message(String),
    #[error("platon api decline: {0}")]
    Declined(String),
    #[error("unknown platon api decline")]
    UnknownDecline,
    #[error("unknown platon api error")]
    Unknown,
}

impl Response {
    pub fn from_slice(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }

    /// Normalized business error, if the envelope reports one.
    pub fn error(&self) -> Option<GatewayError> {
        if let Some(message) = &self.error_message {
            return Some(GatewayError::Message(message.clone()));
        }
        match self.result {
            Some(ResponseResult::Declined) => Some(match &self.decline_reason {
                Some(reason) => GatewayError::Declined(reason.clone()),
                None => GatewayError::UnknownDecline,
            }),
            Some(ResponseResult::Error) => Some(GatewayError::Unknown),
            _ => None,
        }
    }

    pub fn submerchant_id_status(&self) -> Option<&str> {
        self.response
            .as_ref()
            .and_then(|data| data.submerchant_id_status.as_deref())
    }
}
