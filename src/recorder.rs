//! Exchange recording.
//!
//! A [`Recorder`] attached with
//! [`PlatonClient::with_recorder`](crate::client::PlatonClient::with_recorder)
//! sees every server-to-server exchange: the encoded request form, the raw
//! response body, and any transport or decoding error. All three events of one
//! exchange share the `X-Request-ID` sent to the gateway.
//!
//! Card number, CVV2 and expiry are masked before the form reaches the
//! recorder. The merchant secret never travels in the form.

use std::collections::BTreeMap;
use std::fmt;

use platon_types::field::Field;
use platon_types::request::FormFields;

use crate::client::PlatonError;

/// Tags attached to every event: `action`, `order_id` and `trans_id` when present.
pub type RecordTags = BTreeMap<String, String>;

/// Sink for gateway exchanges.
///
/// Implementations must not block for long; they run inline with the request.
pub trait Recorder: Send + Sync {
    /// The URL-encoded form about to be sent, with card data masked.
    fn record_request(&self, request_id: &str, body: &[u8], tags: &RecordTags);

    /// The response body as received, before status or JSON checks.
    fn record_response(&self, request_id: &str, body: &[u8], tags: &RecordTags);

    /// A failure of the exchange itself. Business declines are not errors
    /// here; their envelope has already been passed to
    /// [`Recorder::record_response`].
    fn record_error(&self, request_id: &str, error: &PlatonError, tags: &RecordTags);
}

impl fmt::Debug for dyn Recorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Recorder")
    }
}

const TAG_FIELDS: [Field; 3] = [Field::Action, Field::OrderId, Field::TransId];

pub(crate) fn record_tags(fields: &FormFields) -> RecordTags {
    TAG_FIELDS
        .iter()
        .filter_map(|field| {
            let name = field.name();
            fields
                .get(name)
                .map(|value| (name.to_string(), value.clone()))
        })
        .collect()
}

/// Keeps the first six and last four characters of a card number.
fn mask_card_number(pan: &str) -> String {
    let len = pan.chars().count();
    if len < 10 {
        return "*".repeat(len);
    }
    pan.chars()
        .enumerate()
        .map(|(i, c)| if i < 6 || i >= len - 4 { c } else { '*' })
        .collect()
}

/// Copy of `fields` that is safe to hand to a recorder.
pub(crate) fn masked_form(fields: &FormFields) -> FormFields {
    let mut masked = fields.clone();
    for (name, value) in masked.iter_mut() {
        if name == Field::CardNumber.name() {
            *value = mask_card_number(value);
        } else if name == Field::CardCvv2.name()
            || name == Field::CardExpMonth.name()
            || name == Field::CardExpYear.name()
        {
            *value = "*".repeat(value.chars().count());
        }
    }
    masked
}
