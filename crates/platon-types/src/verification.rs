//! Client-server card verification form.
//!
//! Instead of a server-to-server call, the merchant hands the browser a
//! signed form that posts straight to the gateway's payment page. The order
//! details travel as base64 JSON in `data`, and the form is signed as
//!
//! ```text
//! md5(upper(R(key) + R("CC") + R(data) + R(url) + R(secret)))
//! ```

use std::collections::BTreeMap;

use serde::Serialize;
use serde_with::skip_serializing_none;

use crate::request::FormFields;
use crate::sign::{CanonicalString, Signature};
use crate::util::{Base64Bytes, MoneyAmount, PAYMENT_CODE, VERIFY_FORM_ID};

/// HTTP method the form is submitted with.
pub const VERIFICATION_FORM_METHOD: &str = "POST";

#[derive(Debug, thiserror::Error)]
pub enum VerificationFormError {
    #[error("verification: {0} is required")]
    Missing(&'static str),
    #[error("verification: cannot encode data payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Inputs of a client-server verification form.
#[derive(Debug, Clone, Default)]
pub struct VerificationParams {
    pub client_key: String,
    pub secret: String,
    /// Where the gateway sends the browser after a successful verification.
    pub redirect_url: String,
    pub description: String,
    pub currency: String,
    pub order_id: Option<String>,
    /// `ext1`..`ext10` values keyed by their field name.
    pub metadata: BTreeMap<String, String>,
}

#[skip_serializing_none]
#[derive(Debug, Serialize)]
struct VerificationData<'a> {
    amount: &'static str,
    description: &'a str,
    currency: &'a str,
    recurring: &'static str,
    order: Option<&'a str>,
    ext1: Option<&'a str>,
    ext2: Option<&'a str>,
    ext3: Option<&'a str>,
    ext4: Option<&'a str>,
    ext5: Option<&'a str>,
    ext6: Option<&'a str>,
    ext7: Option<&'a str>,
    ext8: Option<&'a str>,
    ext9: Option<&'a str>,
    ext10: Option<&'a str>,
}

/// A signed browser form: method, target and fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationForm {
    pub method: &'static str,
    pub endpoint: String,
    pub fields: FormFields,
}

impl VerificationForm {
    pub fn sign(&self) -> Option<&str> {
        self.fields.get("sign").map(String::as_str)
    }
}

fn required(value: &str, name: &'static str) -> Result<String, VerificationFormError> {
    match value.trim() {
        "" => Err(VerificationFormError::Missing(name)),
        trimmed => Ok(trimmed.to_string()),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Signature of a client-server form.
pub fn sign_verification_form(
    client_key: &str,
    data: &str,
    redirect_url: &str,
    secret: &str,
) -> Signature {
    CanonicalString::new()
        .reversed(client_key)
        .reversed(PAYMENT_CODE)
        .reversed(data)
        .reversed(redirect_url)
        .reversed(secret)
        .digest()
}

/// Builds the signed verification form posting to `endpoint`.
pub fn build_verification_form(
    params: &VerificationParams,
    endpoint: &str,
) -> Result<VerificationForm, VerificationFormError> {
    let client_key = required(&params.client_key, "merchant client_key")?;
    let secret = required(&params.secret, "merchant secret key")?;
    let redirect_url = required(&params.redirect_url, "success redirect URL")?;
    let description = required(&params.description, "order_description")?;
    let currency = required(&params.currency, "order_currency")?;
    let endpoint = required(endpoint, "endpoint")?;

    let ext: Vec<Option<&str>> = (1..=10)
        .map(|i| non_blank(params.metadata.get(&format!("ext{i}")).map(String::as_str)))
        .collect();
    let data = VerificationData {
        amount: MoneyAmount::VERIFY_NO_AMOUNT,
        description: &description,
        currency: &currency,
        recurring: "Y",
        order: non_blank(params.order_id.as_deref()),
        ext1: ext[0],
        ext2: ext[1],
        ext3: ext[2],
        ext4: ext[3],
        ext5: ext[4],
        ext6: ext[5],
        ext7: ext[6],
        ext8: ext[7],
        ext9: ext[8],
        ext10: ext[9],
    };
    let encoded = Base64Bytes::encode_json(&data)?.to_string();
    let sign = sign_verification_form(&client_key, &encoded, &redirect_url, &secret);

    let mut fields = FormFields::from([
        ("payment".to_string(), PAYMENT_CODE.to_string()),
        ("key".to_string(), client_key),
        ("url".to_string(), redirect_url),
        ("data".to_string(), encoded),
        ("formid".to_string(), VERIFY_FORM_ID.to_string()),
        ("req_token".to_string(), "Y".to_string()),
        ("sign".to_string(), sign.into_string()),
    ]);
    // The gateway echoes ext values in callbacks only when they are also top-level fields.
    for (i, value) in ext.iter().enumerate() {
        if let Some(value) = value {
            fields.insert(format!("ext{}", i + 1), value.to_string());
        }
    }
    tracing::debug!(endpoint = %endpoint, "built client-server verification form");

    Ok(VerificationForm {
        method: VERIFICATION_FORM_METHOD,
        endpoint,
        fields,
    })
}
