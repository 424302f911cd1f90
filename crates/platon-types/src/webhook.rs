//! Inbound callback verification.
//!
//! The gateway notifies the merchant with an `application/x-www-form-urlencoded`
//! POST. [`WebhookForm::parse`] decodes it and [`WebhookForm::verify_sign`]
//! recomputes the callback digest:
//!
//! ```text
//! md5(upper(R(email) + secret + order + R(first6+last4 of card) + R(status)))
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::sign::{self, CanonicalString, Signature};

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("webhook form payload is empty")]
    Empty,
    #[error("cannot parse webhook form payload: {0}")]
    Decode(#[from] serde_urlencoded::de::Error),
    #[error("webhook: secret is required")]
    MissingSecret,
    #[error("webhook: {field} is required")]
    MissingField { field: &'static str },
    #[error("webhook: card value is too short to build signature ({digits} digits)")]
    CardTooShort { digits: usize },
}

/// Decoded callback payload.
///
/// Every value is trimmed except `name`, which is kept as sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookForm {
    pub id: String,
    pub order: String,
    pub status: String,
    /// Masked card, e.g. `411111****1111`.
    pub card: String,
    pub description: String,
    pub amount: String,
    pub currency: String,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub date: String,
    pub ip: String,
    pub sign: String,
    pub rc_id: String,
    pub rc_token: String,
    pub issuing_bank: String,
    pub ext1: String,
    pub ext2: String,
    pub ext3: String,
    pub ext4: String,
    pub ext5: String,
    pub ext6: String,
    pub ext7: String,
    pub ext8: String,
    pub ext9: String,
    pub ext10: String,
    pub cardholder_email: String,
    pub brand: String,
    pub terminal: String,
}

impl WebhookForm {
    /// Decodes a callback body.
    pub fn parse(data: &[u8]) -> Result<Self, WebhookError> {
        if data.is_empty() {
            return Err(WebhookError::Empty);
        }
        let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(data)?;
        Ok(Self::from_pairs(pairs))
    }

    /// Maps already decoded form pairs. When a key repeats, the first value wins.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut form = WebhookForm::default();
        let mut seen = HashSet::new();
        for (key, value) in pairs {
            let key = key.as_ref();
            let Some(slot) = form.slot(key) else {
                continue;
            };
            if !seen.insert(key.to_string()) {
                continue;
            }
            let value: String = value.into();
            *slot = if key == "name" {
                value
            } else {
                value.trim().to_string()
            };
        }
        form
    }

    fn slot(&mut self, key: &str) -> Option<&mut String> {
        let slot = match key {
            "id" => &mut self.id,
            "order" => &mut self.order,
            "status" => &mut self.status,
            "card" => &mut self.card,
            "description" => &mut self.description,
            "amount" => &mut self.amount,
            "currency" => &mut self.currency,
            "name" => &mut self.name,
            "phone" => &mut self.phone,
            "email" => &mut self.email,
            "date" => &mut self.date,
            "ip" => &mut self.ip,
            "sign" => &mut self.sign,
            "rc_id" => &mut self.rc_id,
            "rc_token" => &mut self.rc_token,
            "issuing_bank" => &mut self.issuing_bank,
            "ext1" => &mut self.ext1,
            "ext2" => &mut self.ext2,
            "ext3" => &mut self.ext3,
            "ext4" => &mut self.ext4,
            "ext5" => &mut self.ext5,
            "ext6" => &mut self.ext6,
            "ext7" => &mut self.ext7,
            "ext8" => &mut self.ext8,
            "ext9" => &mut self.ext9,
            "ext10" => &mut self.ext10,
            "cardholder_email" => &mut self.cardholder_email,
            "brand" => &mut self.brand,
            "terminal" => &mut self.terminal,
            _ => return None,
        };
        Some(slot)
    }

    /// Computes the digest the gateway should have sent.
    ///
    /// Callbacks do not always echo the payer email. Pass the email of the
    /// original payment as `email_override`; a blank override falls back to
    /// the form's own `email`.
    pub fn expected_sign(&self, secret: &str, email_override: &str) -> Result<Signature, WebhookError> {
        let secret = secret.trim();
        if secret.is_empty() {
            return Err(WebhookError::MissingSecret);
        }
        let order = self.order.trim();
        if order.is_empty() {
            return Err(WebhookError::MissingField { field: "order" });
        }
        let status = self.status.trim();
        if status.is_empty() {
            return Err(WebhookError::MissingField { field: "status" });
        }
        if self.card.is_empty() {
            return Err(WebhookError::MissingField { field: "card" });
        }
        let card = sign::first_six_last_four(&self.card).ok_or_else(|| WebhookError::CardTooShort {
            digits: sign::digit_count(&self.card),
        })?;

        let email = match email_override.trim() {
            "" => self.email.as_str(),
            email => email,
        };

        let signature = CanonicalString::new()
            .reversed(email)
            .plain(secret)
            .plain(order)
            .reversed(&card)
            .reversed(status)
            .digest();
        tracing::debug!(order = %order, status = %status, "computed callback signature");
        Ok(signature)
    }

    /// Checks the form's `sign` against [`WebhookForm::expected_sign`],
    /// ignoring case.
    ///
    /// Callers must refuse to process the callback when this returns `false`.
    pub fn verify_sign(&self, secret: &str, email_override: &str) -> Result<bool, WebhookError> {
        if self.sign.is_empty() {
            return Err(WebhookError::MissingField { field: "sign" });
        }
        let expected = self.expected_sign(secret, email_override)?;
        let verified = expected.matches(&self.sign);
        if !verified {
            tracing::warn!(order = %self.order, "callback signature mismatch");
        }
        Ok(verified)
    }
}
