//! Canonical strings, signature recipes and digests.
//!
//! Every signed message is an ordered concatenation of values, some of them
//! character-reversed. The concatenation is upper-cased and hashed with MD5;
//! the lowercase hex digest is the signature.
//!
//! [`CanonicalString`] assembles such a concatenation. The outbound recipes
//! live in a static table keyed by [`OperationKind`] (see [`recipe`]); the
//! inbound callback and the client-server form use the builder directly with
//! their own fixed order.
//!
//! | Operation kind                              | Canonical string                                  |
//! |---------------------------------------------|---------------------------------------------------|
//! | card payment, verification                  | `R(email) + secret + R(first6+last4 of PAN)`      |
//! | card-token payment, recurring               | `R(email) + secret + R(card_token)`               |
//! | Apple Pay, Google Pay                       | `R(email) + secret + R(payment_token)`            |
//! | status by trans id, capture, refund/void    | `R(email) + secret + trans_id [+ R(first6+last4)]`|
//! | status by order                             | `order_id + secret`                               |
//! | submerchant lookup                          | `secret + submerchant_id`                         |
//! | payout by PAN                               | `secret + R(first6+last4 of PAN)`                 |
//! | payout by token                             | `secret + R(card_token)`                          |

use md5::{Digest, Md5};
use std::fmt;
use std::fmt::{Debug, Display, Formatter};

use crate::field::Field;
use crate::operation::{OperationKind, UnknownOperationKind};

/// Fewest digits a card value needs to yield a first6+last4 fragment.
pub const CARD_HASH_MIN_DIGITS: usize = 10;

/// Errors raised while building a canonical string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignError {
    #[error("{kind}: merchant secret is required for signature generation")]
    MissingSecret { kind: OperationKind },
    #[error("{kind}: {field} is required for signature generation")]
    MissingField { kind: OperationKind, field: Field },
    #[error(
        "{kind}: {field} is too short to build signature ({digits} digits, at least {} required)",
        CARD_HASH_MIN_DIGITS
    )]
    CardTooShort {
        kind: OperationKind,
        field: Field,
        digits: usize,
    },
    #[error(transparent)]
    UnknownKind(#[from] UnknownOperationKind),
}

/// A hex-encoded MD5 signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature(String);

impl Signature {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against a supplied digest.
    pub fn matches(&self, supplied: &str) -> bool {
        self.0.eq_ignore_ascii_case(supplied.trim())
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Signature {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Ordered concatenation fed to the digest.
///
/// The buffer contains the merchant secret, so `Debug` only reports its length.
#[derive(Default, Clone)]
pub struct CanonicalString {
    buf: String,
}

impl CanonicalString {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `value` as is.
    pub fn plain(mut self, value: &str) -> Self {
        self.buf.push_str(value);
        self
    }

    /// Appends `value` with its characters in reverse order.
    pub fn reversed(mut self, value: &str) -> Self {
        self.buf.extend(value.chars().rev());
        self
    }

    /// MD5 of the upper-cased concatenation, lowercase hex.
    pub fn digest(&self) -> Signature {
        let upper = self.buf.to_uppercase();
        let hash = Md5::digest(upper.as_bytes());
        Signature(hex::encode(hash))
    }

    #[cfg(test)]
    pub(crate) fn as_str(&self) -> &str {
        &self.buf
    }
}

impl Debug for CanonicalString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanonicalString")
            .field("len", &self.buf.len())
            .finish()
    }
}

/// Strips every non-digit and keeps the first six and last four digits.
///
/// Returns `None` when fewer than ten digits remain. Masked callback cards
/// such as `411111****1111` qualify.
pub fn first_six_last_four(card: &str) -> Option<String> {
    let digits: String = card.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < CARD_HASH_MIN_DIGITS {
        return None;
    }
    let mut fragment = String::with_capacity(CARD_HASH_MIN_DIGITS);
    fragment.push_str(&digits[..6]);
    fragment.push_str(&digits[digits.len() - 4..]);
    Some(fragment)
}

/// Counts the digits [`first_six_last_four`] would see.
pub(crate) fn digit_count(card: &str) -> usize {
    card.chars().filter(char::is_ascii_digit).count()
}

/// Values a recipe may read.
pub trait SignInputs {
    /// Current value of a request field, `None` when unset.
    fn field(&self, field: Field) -> Option<&str>;
    /// The merchant secret, `None` when no credentials were attached.
    fn secret(&self) -> Option<&str>;
}

/// Where a recipe part takes its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Secret,
    Field(Field),
    /// `payer_email`, falling back to the internal `hash_email` override.
    PayerEmail,
    /// The internal `hash_email` override, falling back to `payer_email`, else empty.
    HashEmail,
}

/// How a part's value is written into the canonical string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Plain,
    Reversed,
    /// first6+last4 of the value, reversed.
    CardHashReversed,
}

/// One segment of a recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Part {
    pub source: Source,
    pub encoding: Encoding,
    /// Optional parts are skipped when their source is unset or empty.
    pub optional: bool,
}

impl Part {
    const fn plain(source: Source) -> Self {
        Part {
            source,
            encoding: Encoding::Plain,
            optional: false,
        }
    }

    const fn reversed(source: Source) -> Self {
        Part {
            source,
            encoding: Encoding::Reversed,
            optional: false,
        }
    }

    const fn card_hash(field: Field) -> Self {
        Part {
            source: Source::Field(field),
            encoding: Encoding::CardHashReversed,
            optional: false,
        }
    }

    const fn optional(self) -> Self {
        Part {
            optional: true,
            ..self
        }
    }
}

/// Ordered list of parts for one operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recipe {
    pub parts: &'static [Part],
}

mod recipes {
    use super::*;

    const SECRET: Part = Part::plain(Source::Secret);

    pub static CARD_PAN: Recipe = Recipe {
        parts: &[
            Part::reversed(Source::PayerEmail),
            SECRET,
            Part::card_hash(Field::CardNumber),
        ],
    };

    pub static CARD_TOKEN: Recipe = Recipe {
        parts: &[
            Part::reversed(Source::PayerEmail),
            SECRET,
            Part::reversed(Source::Field(Field::CardToken)),
        ],
    };

    pub static PAYMENT_TOKEN: Recipe = Recipe {
        parts: &[
            Part::reversed(Source::PayerEmail),
            SECRET,
            Part::reversed(Source::Field(Field::PaymentToken)),
        ],
    };

    pub static TRANS_ID: Recipe = Recipe {
        parts: &[
            Part::reversed(Source::HashEmail).optional(),
            SECRET,
            Part::plain(Source::Field(Field::TransId)),
            Part::card_hash(Field::CardHashPart).optional(),
        ],
    };

    pub static BY_ORDER: Recipe = Recipe {
        parts: &[Part::plain(Source::Field(Field::OrderId)), SECRET],
    };

    pub static SUBMERCHANT: Recipe = Recipe {
        parts: &[SECRET, Part::plain(Source::Field(Field::SubmerchantId))],
    };

    pub static PAYOUT_PAN: Recipe = Recipe {
        parts: &[SECRET, Part::card_hash(Field::CardNumber)],
    };

    pub static PAYOUT_TOKEN: Recipe = Recipe {
        parts: &[SECRET, Part::reversed(Source::Field(Field::CardToken))],
    };
}

/// Returns the signature recipe of an operation kind.
pub fn recipe(kind: OperationKind) -> &'static Recipe {
    match kind {
        OperationKind::CardPayment | OperationKind::Verification => &recipes::CARD_PAN,
        OperationKind::CardTokenPayment | OperationKind::Recurring => &recipes::CARD_TOKEN,
        OperationKind::ApplePay | OperationKind::GooglePay => &recipes::PAYMENT_TOKEN,
        OperationKind::GetTransStatus | OperationKind::Capture | OperationKind::Creditvoid => {
            &recipes::TRANS_ID
        }
        OperationKind::GetTransStatusByOrder => &recipes::BY_ORDER,
        OperationKind::GetSubmerchant => &recipes::SUBMERCHANT,
        OperationKind::Credit2Card => &recipes::PAYOUT_PAN,
        OperationKind::Credit2CardToken => &recipes::PAYOUT_TOKEN,
    }
}

/// Looks a recipe up by its operation tag, e.g. `"card_token_payment"`.
pub fn recipe_for_tag(tag: &str) -> Result<(OperationKind, &'static Recipe), SignError> {
    let kind: OperationKind = tag.parse()?;
    Ok((kind, recipe(kind)))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

impl Recipe {
    /// Assembles the canonical string for `kind` from `inputs`.
    pub fn canonical<I: SignInputs + ?Sized>(
        &self,
        kind: OperationKind,
        inputs: &I,
    ) -> Result<CanonicalString, SignError> {
        let mut canonical = CanonicalString::new();
        for part in self.parts {
            let (value, field) = match part.source {
                Source::Secret => {
                    let secret = non_empty(inputs.secret())
                        .ok_or(SignError::MissingSecret { kind })?;
                    canonical = canonical.plain(secret);
                    continue;
                }
                Source::Field(field) => (non_empty(inputs.field(field)), field),
                Source::PayerEmail => (
                    non_empty(inputs.field(Field::PayerEmail))
                        .or_else(|| non_empty(inputs.field(Field::HashEmail))),
                    Field::PayerEmail,
                ),
                Source::HashEmail => (
                    inputs
                        .field(Field::HashEmail)
                        .or_else(|| inputs.field(Field::PayerEmail)),
                    Field::HashEmail,
                ),
            };
            let value = match value {
                Some(value) if !value.is_empty() => value,
                _ if part.optional => continue,
                _ => return Err(SignError::MissingField { kind, field }),
            };
            canonical = match part.encoding {
                Encoding::Plain => canonical.plain(value),
                Encoding::Reversed => canonical.reversed(value),
                Encoding::CardHashReversed => {
                    let fragment =
                        first_six_last_four(value).ok_or_else(|| SignError::CardTooShort {
                            kind,
                            field,
                            digits: digit_count(value),
                        })?;
                    canonical.reversed(&fragment)
                }
            };
        }
        Ok(canonical)
    }
}

/// Signs `inputs` with the recipe registered for `kind`.
pub fn sign<I: SignInputs + ?Sized>(
    kind: OperationKind,
    inputs: &I,
) -> Result<Signature, SignError> {
    let signature = recipe(kind).canonical(kind, inputs)?.digest();
    tracing::debug!(kind = %kind, "computed request signature");
    Ok(signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct Inputs {
        secret: Option<&'static str>,
        fields: HashMap<Field, &'static str>,
    }

    impl Inputs {
        fn secret(secret: &'static str) -> Self {
            Inputs {
                secret: Some(secret),
                fields: HashMap::new(),
            }
        }

        fn with(mut self, field: Field, value: &'static str) -> Self {
            self.fields.insert(field, value);
            self
        }
    }

    impl SignInputs for Inputs {
        fn field(&self, field: Field) -> Option<&str> {
            self.fields.get(&field).copied()
        }

        fn secret(&self) -> Option<&str> {
            self.secret
        }
    }

    #[test]
    fn test_card_token_payment_digest() {
        let inputs = Inputs::secret("secret123")
            .with(Field::PayerEmail, "payer@example.com")
            .with(Field::CardToken, "TOKEN123");
        let signature = sign(OperationKind::CardTokenPayment, &inputs).unwrap();
        assert_eq!(signature.as_str(), "03838ac02c89b98621f95ec98a68aa14");
        assert_eq!(sign(OperationKind::Recurring, &inputs).unwrap(), signature);
    }

    #[test]
    fn test_trans_id_digest_with_card_hash() {
        let inputs = Inputs::secret("secret123")
            .with(Field::PayerEmail, "payer@example.com")
            .with(Field::TransId, "632508054")
            .with(Field::CardHashPart, "4111111111111111");
        let signature = sign(OperationKind::GetTransStatus, &inputs).unwrap();
        assert_eq!(signature.as_str(), "77a4785689636b4d3875ec7acf47d5e2");
        assert_eq!(sign(OperationKind::Capture, &inputs).unwrap(), signature);
        assert_eq!(sign(OperationKind::Creditvoid, &inputs).unwrap(), signature);
    }

    #[test]
    fn test_trans_id_digest_without_card_hash() {
        let inputs = Inputs::secret("secret123")
            .with(Field::PayerEmail, "payer@example.com")
            .with(Field::TransId, "632508054");
        let canonical = recipe(OperationKind::GetTransStatus)
            .canonical(OperationKind::GetTransStatus, &inputs)
            .unwrap();
        assert_eq!(canonical.as_str(), "moc.elpmaxe@reyapsecret123632508054");
        assert_eq!(
            canonical.digest().as_str(),
            "ef374c28b6398c097e0b3d6230deebd6"
        );
    }

    #[test]
    fn test_trans_id_prefers_hash_email() {
        let inputs = Inputs::secret("s")
            .with(Field::PayerEmail, "payer@example.com")
            .with(Field::HashEmail, "other@example.com")
            .with(Field::TransId, "1");
        let canonical = recipe(OperationKind::Capture)
            .canonical(OperationKind::Capture, &inputs)
            .unwrap();
        assert_eq!(canonical.as_str(), "moc.elpmaxe@rehtos1");
    }

    #[test]
    fn test_trans_id_without_email() {
        let inputs = Inputs::secret("s").with(Field::TransId, "42");
        let canonical = recipe(OperationKind::Creditvoid)
            .canonical(OperationKind::Creditvoid, &inputs)
            .unwrap();
        assert_eq!(canonical.as_str(), "s42");
    }

    #[test]
    fn test_submerchant_digest() {
        let inputs = Inputs::secret("secret123").with(Field::SubmerchantId, "12345678");
        let signature = sign(OperationKind::GetSubmerchant, &inputs).unwrap();
        assert_eq!(signature.as_str(), "15f549d19f26ce89022396a649c4ac9f");
    }

    #[test]
    fn test_recipe_orders() {
        let inputs = Inputs::secret("pass")
            .with(Field::PayerEmail, "ab@c")
            .with(Field::CardNumber, "4111 1122 3344 5566")
            .with(Field::CardToken, "TOK")
            .with(Field::PaymentToken, "PT")
            .with(Field::OrderId, "ord-1")
            .with(Field::SubmerchantId, "sub");
        let canonical = |kind: OperationKind| {
            recipe(kind)
                .canonical(kind, &inputs)
                .unwrap()
                .as_str()
                .to_string()
        };
        assert_eq!(canonical(OperationKind::CardPayment), "c@bapass6655111114");
        assert_eq!(canonical(OperationKind::Verification), "c@bapass6655111114");
        assert_eq!(canonical(OperationKind::ApplePay), "c@bapassTP");
        assert_eq!(canonical(OperationKind::GooglePay), "c@bapassTP");
        assert_eq!(canonical(OperationKind::GetTransStatusByOrder), "ord-1pass");
        assert_eq!(canonical(OperationKind::Credit2Card), "pass6655111114");
        assert_eq!(canonical(OperationKind::Credit2CardToken), "passKOT");
    }

    #[test]
    fn test_every_kind_is_deterministic() {
        let inputs = Inputs::secret("secret123")
            .with(Field::PayerEmail, "payer@example.com")
            .with(Field::CardNumber, "4111111111111111")
            .with(Field::CardToken, "TOKEN123")
            .with(Field::PaymentToken, "eyJ0b2tlbiI6IjEifQ==")
            .with(Field::TransId, "632508054")
            .with(Field::OrderId, "order-1")
            .with(Field::SubmerchantId, "12345678");
        for kind in OperationKind::ALL {
            let first = sign(kind, &inputs).unwrap();
            let second = sign(kind, &inputs).unwrap();
            assert_eq!(first, second, "{kind}");
            assert_eq!(first.as_str().len(), 32);
            assert!(first.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn test_missing_inputs() {
        let inputs = Inputs::default().with(Field::CardToken, "T");
        assert_eq!(
            sign(OperationKind::Credit2CardToken, &inputs),
            Err(SignError::MissingSecret {
                kind: OperationKind::Credit2CardToken
            })
        );
        let inputs = Inputs::secret("s").with(Field::CardToken, "");
        assert_eq!(
            sign(OperationKind::Credit2CardToken, &inputs),
            Err(SignError::MissingField {
                kind: OperationKind::Credit2CardToken,
                field: Field::CardToken
            })
        );
        let inputs = Inputs::secret("s").with(Field::CardToken, "T");
        assert_eq!(
            sign(OperationKind::CardTokenPayment, &inputs),
            Err(SignError::MissingField {
                kind: OperationKind::CardTokenPayment,
                field: Field::PayerEmail
            })
        );
    }

    #[test]
    fn test_payer_email_falls_back_to_override() {
        let with_override = Inputs::secret("s")
            .with(Field::HashEmail, "payer@example.com")
            .with(Field::CardToken, "T");
        let with_payer = Inputs::secret("s")
            .with(Field::PayerEmail, "payer@example.com")
            .with(Field::CardToken, "T");
        assert_eq!(
            sign(OperationKind::CardTokenPayment, &with_override).unwrap(),
            sign(OperationKind::CardTokenPayment, &with_payer).unwrap()
        );
    }

    #[test]
    fn test_card_too_short() {
        let inputs = Inputs::secret("s").with(Field::CardNumber, "411111-111");
        assert_eq!(
            sign(OperationKind::Credit2Card, &inputs),
            Err(SignError::CardTooShort {
                kind: OperationKind::Credit2Card,
                field: Field::CardNumber,
                digits: 9
            })
        );
    }

    #[test]
    fn test_first_six_last_four_boundary() {
        assert_eq!(first_six_last_four("4111111111").as_deref(), Some("4111111111"));
        assert_eq!(first_six_last_four("1234567890").as_deref(), Some("1234567890"));
        assert_eq!(first_six_last_four("411111****1111").as_deref(), Some("4111111111"));
        assert_eq!(first_six_last_four("5168 7422 1234 9876").as_deref(), Some("5168749876"));
        assert_eq!(first_six_last_four("4111 11** **** 1111").as_deref(), Some("4111111111"));
        assert_eq!(first_six_last_four("4111-11**-****-1111").as_deref(), Some("4111111111"));
        assert_eq!(first_six_last_four("411111111"), None);
        assert_eq!(first_six_last_four("41111****1111"), None);
        assert_eq!(first_six_last_four(""), None);
    }

    #[test]
    fn test_reversal_is_by_character() {
        let canonical = CanonicalString::new().reversed("пароль").plain("x");
        assert_eq!(canonical.as_str(), "ьлорапx");
    }

    #[test]
    fn test_recipe_for_tag() {
        let (kind, found) = recipe_for_tag("get_submerchant").unwrap();
        assert_eq!(kind, OperationKind::GetSubmerchant);
        assert_eq!(found, recipe(OperationKind::GetSubmerchant));
        assert!(matches!(
            recipe_for_tag("wallet_topup"),
            Err(SignError::UnknownKind(_))
        ));
    }

    #[test]
    fn test_signature_matches_case_insensitively() {
        let signature = CanonicalString::new().plain("abc").digest();
        assert!(signature.matches(&signature.as_str().to_uppercase()));
        assert!(!signature.matches("00000000000000000000000000000000"));
    }

    #[test]
    fn test_canonical_debug_is_redacted() {
        let canonical = CanonicalString::new().plain("secret123");
        assert!(!format!("{canonical:?}").contains("secret123"));
    }
}
