//! Field validation.
//!
//! Two passes guard an outbound request. [`check_shape`] enforces field-level
//! formats that hold for every operation kind (lengths, digits, addresses).
//! [`validate`] then applies the per-kind rule table: required fields,
//! kind-specific length limits, reserved literals, amounts and split rules.
//!
//! The per-kind tables deliberately differ from each other (payer phone is
//! required for PAN and wallet payments but not for token payments, Apple Pay
//! allows longer descriptions than Google Pay). They mirror what the gateway
//! accepts and are not meant to be unified.

use std::net::Ipv4Addr;
use std::sync::LazyLock;

use regex::Regex;

use crate::field::Field;
use crate::operation::{OperationKind, YesNo};
use crate::request::Request;
use crate::sign::SignInputs;
use crate::split::SplitRuleError;
use crate::util::{MoneyAmount, MoneyAmountParseError, VERIFY_ZERO_CHANNEL};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{kind}: {field} is required")]
    Missing { kind: OperationKind, field: Field },
    #[error("{kind}: {field} must be <= {max} characters (got {len})")]
    TooLong {
        kind: OperationKind,
        field: Field,
        max: usize,
        len: usize,
    },
    #[error("{kind}: {field} must be {expected} (got {actual:?})")]
    Mismatch {
        kind: OperationKind,
        field: Field,
        expected: &'static str,
        actual: Option<String>,
    },
    #[error("{kind}: {field} {source}")]
    InvalidAmount {
        kind: OperationKind,
        field: Field,
        #[source]
        source: MoneyAmountParseError,
    },
    #[error("{kind}: {field} must be > 0 (got {value:?})")]
    NonPositiveAmount {
        kind: OperationKind,
        field: Field,
        value: String,
    },
    #[error("{kind}: {field} must be {expected}")]
    InvalidFormat {
        kind: OperationKind,
        field: Field,
        expected: &'static str,
    },
    #[error("{kind}: {source}")]
    SplitRules {
        kind: OperationKind,
        #[source]
        source: SplitRuleError,
    },
    #[error("{kind}: split_rules are not allowed")]
    SplitRulesForbidden { kind: OperationKind },
}

/// One per-kind rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    /// `action` must equal the kind's action code.
    Action,
    /// Present and non-empty.
    Required(Field),
    /// Present and non-blank after trimming.
    NonBlank(Field),
    /// At most this many characters, when present.
    MaxLen(Field, usize),
    /// Exactly this literal.
    Equals(Field, &'static str),
    /// Present, two-decimal and strictly positive.
    Amount(Field),
    /// Split rules, if any, must add up to this amount field.
    Split(Field),
    NoSplit,
}

use Rule::*;

static CARD_PAYMENT: &[Rule] = &[
    Action,
    Required(Field::OrderId),
    MaxLen(Field::OrderId, 32),
    Amount(Field::OrderAmount),
    Split(Field::OrderAmount),
    Required(Field::OrderCurrency),
    Required(Field::OrderDescription),
    MaxLen(Field::OrderDescription, 255),
    Required(Field::PayerIp),
    Required(Field::TermUrl3ds),
    MaxLen(Field::TermUrl3ds, 255),
    Required(Field::PayerEmail),
    Required(Field::PayerPhone),
    Required(Field::CardNumber),
    Required(Field::CardExpMonth),
    Required(Field::CardExpYear),
    Required(Field::CardCvv2),
    Required(Field::ReqToken),
    Required(Field::RecurringInit),
];

static VERIFICATION: &[Rule] = &[
    Action,
    Equals(Field::ChannelId, VERIFY_ZERO_CHANNEL),
    Equals(Field::OrderAmount, MoneyAmount::VERIFY_NO_AMOUNT),
    Required(Field::OrderId),
    MaxLen(Field::OrderId, 32),
    Required(Field::OrderCurrency),
    Required(Field::OrderDescription),
    MaxLen(Field::OrderDescription, 255),
    Required(Field::PayerIp),
    Required(Field::TermUrl3ds),
    MaxLen(Field::TermUrl3ds, 255),
    Required(Field::PayerEmail),
    Required(Field::PayerPhone),
    Required(Field::CardNumber),
    Required(Field::CardExpMonth),
    Required(Field::CardExpYear),
    Required(Field::CardCvv2),
    Required(Field::ReqToken),
    Equals(Field::ReqToken, "Y"),
    Required(Field::RecurringInit),
    Equals(Field::RecurringInit, "Y"),
    NoSplit,
];

static CARD_TOKEN_PAYMENT: &[Rule] = &[
    Action,
    Required(Field::CardToken),
    Required(Field::OrderId),
    MaxLen(Field::OrderId, 32),
    Amount(Field::OrderAmount),
    Split(Field::OrderAmount),
    Required(Field::OrderCurrency),
    Required(Field::OrderDescription),
    MaxLen(Field::OrderDescription, 255),
    Required(Field::PayerIp),
    Required(Field::TermUrl3ds),
    MaxLen(Field::TermUrl3ds, 255),
    Required(Field::PayerEmail),
];

static RECURRING: &[Rule] = &[
    Action,
    Required(Field::CardToken),
    Equals(Field::Ext3, "recurring"),
    Required(Field::OrderId),
    MaxLen(Field::OrderId, 32),
    Amount(Field::OrderAmount),
    Split(Field::OrderAmount),
    Required(Field::OrderCurrency),
    Required(Field::OrderDescription),
    MaxLen(Field::OrderDescription, 255),
    Required(Field::PayerIp),
    Required(Field::TermUrl3ds),
    MaxLen(Field::TermUrl3ds, 255),
    Required(Field::PayerEmail),
];

static APPLE_PAY: &[Rule] = &[
    Action,
    Required(Field::PaymentToken),
    Required(Field::OrderId),
    MaxLen(Field::OrderId, 255),
    Amount(Field::OrderAmount),
    Split(Field::OrderAmount),
    Required(Field::OrderCurrency),
    Required(Field::OrderDescription),
    MaxLen(Field::OrderDescription, 1024),
    Required(Field::PayerIp),
    Required(Field::TermUrl3ds),
    MaxLen(Field::TermUrl3ds, 1024),
    Required(Field::PayerEmail),
    Required(Field::PayerPhone),
];

static GOOGLE_PAY: &[Rule] = &[
    Action,
    Required(Field::PaymentToken),
    Required(Field::OrderId),
    MaxLen(Field::OrderId, 255),
    Amount(Field::OrderAmount),
    Split(Field::OrderAmount),
    Required(Field::OrderCurrency),
    Required(Field::OrderDescription),
    MaxLen(Field::OrderDescription, 255),
    Required(Field::PayerIp),
    Required(Field::TermUrl3ds),
    MaxLen(Field::TermUrl3ds, 255),
    Required(Field::PayerEmail),
    Required(Field::PayerPhone),
];

static GET_TRANS_STATUS: &[Rule] = &[Action, Required(Field::TransId), NoSplit];

static GET_TRANS_STATUS_BY_ORDER: &[Rule] = &[Action, NonBlank(Field::OrderId), NoSplit];

static CAPTURE_OR_VOID: &[Rule] = &[
    Action,
    Required(Field::TransId),
    Amount(Field::Amount),
    Split(Field::Amount),
];

static GET_SUBMERCHANT: &[Rule] = &[Action, NonBlank(Field::SubmerchantId), NoSplit];

static CREDIT2CARD: &[Rule] = &[
    Action,
    NonBlank(Field::CardNumber),
    NonBlank(Field::OrderId),
    Amount(Field::Amount),
    Required(Field::OrderCurrency),
    NonBlank(Field::OrderDescription),
    NonBlank(Field::PayerFirstName),
    NonBlank(Field::PayerLastName),
    NonBlank(Field::PayerAddress),
    NonBlank(Field::PayerCountry),
    NonBlank(Field::PayerState),
    NonBlank(Field::PayerCity),
    NonBlank(Field::PayerZip),
    NoSplit,
];

static CREDIT2CARD_TOKEN: &[Rule] = &[
    Action,
    NonBlank(Field::CardToken),
    NonBlank(Field::OrderId),
    Amount(Field::Amount),
    Required(Field::OrderCurrency),
    NonBlank(Field::OrderDescription),
    NonBlank(Field::PayerFirstName),
    NonBlank(Field::PayerLastName),
    NonBlank(Field::PayerAddress),
    NonBlank(Field::PayerCountry),
    NonBlank(Field::PayerState),
    NonBlank(Field::PayerCity),
    NonBlank(Field::PayerZip),
    NoSplit,
];

fn rules(kind: OperationKind) -> &'static [Rule] {
    match kind {
        OperationKind::CardPayment => CARD_PAYMENT,
        OperationKind::CardTokenPayment => CARD_TOKEN_PAYMENT,
        OperationKind::ApplePay => APPLE_PAY,
        OperationKind::GooglePay => GOOGLE_PAY,
        OperationKind::Recurring => RECURRING,
        OperationKind::Verification => VERIFICATION,
        OperationKind::GetTransStatus => GET_TRANS_STATUS,
        OperationKind::GetTransStatusByOrder => GET_TRANS_STATUS_BY_ORDER,
        OperationKind::Capture | OperationKind::Creditvoid => CAPTURE_OR_VOID,
        OperationKind::GetSubmerchant => GET_SUBMERCHANT,
        OperationKind::Credit2Card => CREDIT2CARD,
        OperationKind::Credit2CardToken => CREDIT2CARD_TOKEN,
    }
}

/// Value the `req_token` and `recurring_init` flags take when a kind
/// requires them and the caller left them unset.
pub fn default_flag(kind: OperationKind) -> Option<YesNo> {
    match kind {
        OperationKind::Verification => Some(YesNo::Yes),
        OperationKind::CardPayment => Some(YesNo::No),
        OperationKind::CardTokenPayment
        | OperationKind::ApplePay
        | OperationKind::GooglePay
        | OperationKind::Recurring
        | OperationKind::GetTransStatus
        | OperationKind::GetTransStatusByOrder
        | OperationKind::Capture
        | OperationKind::Creditvoid
        | OperationKind::GetSubmerchant
        | OperationKind::Credit2Card
        | OperationKind::Credit2CardToken => None,
    }
}

/// Fills unset `req_token`/`recurring_init` flags for kinds that require them.
///
/// This is the only change validation ever makes to a request.
pub fn apply_flag_defaults(kind: OperationKind, request: &mut Request) {
    if let Some(flag) = default_flag(kind) {
        request.req_token.get_or_insert(flag);
        request.recurring_init.get_or_insert(flag);
    }
}

fn present<'a>(request: &'a Request, field: Field) -> Option<&'a str> {
    request.field(field).filter(|v| !v.is_empty())
}

fn check_amount(
    kind: OperationKind,
    request: &Request,
    field: Field,
) -> Result<MoneyAmount, ValidationError> {
    let value = present(request, field).ok_or(ValidationError::Missing { kind, field })?;
    let amount = MoneyAmount::parse(value)
        .map_err(|source| ValidationError::InvalidAmount { kind, field, source })?;
    if !amount.is_positive() {
        return Err(ValidationError::NonPositiveAmount {
            kind,
            field,
            value: value.to_string(),
        });
    }
    Ok(amount)
}

/// Applies the per-kind rule table to `request`.
pub fn validate(kind: OperationKind, request: &Request) -> Result<(), ValidationError> {
    for rule in rules(kind) {
        match *rule {
            Action => {
                let expected = kind.action();
                if request.action != Some(expected) {
                    return Err(ValidationError::Mismatch {
                        kind,
                        field: Field::Action,
                        expected: expected.as_str(),
                        actual: request.action.map(|a| a.to_string()),
                    });
                }
            }
            Required(field) => {
                present(request, field).ok_or(ValidationError::Missing { kind, field })?;
            }
            NonBlank(field) => {
                request
                    .field(field)
                    .filter(|v| !v.trim().is_empty())
                    .ok_or(ValidationError::Missing { kind, field })?;
            }
            MaxLen(field, max) => {
                if let Some(value) = request.field(field) {
                    let len = value.chars().count();
                    if len > max {
                        return Err(ValidationError::TooLong {
                            kind,
                            field,
                            max,
                            len,
                        });
                    }
                }
            }
            Equals(field, expected) => {
                let actual = request.field(field);
                if actual != Some(expected) {
                    return Err(ValidationError::Mismatch {
                        kind,
                        field,
                        expected,
                        actual: actual.map(str::to_string),
                    });
                }
            }
            Amount(field) => {
                check_amount(kind, request, field)?;
            }
            Split(field) => {
                let rules = request.split_rules();
                if !rules.is_empty() {
                    let total = check_amount(kind, request, field)?;
                    rules
                        .validate(total.minor_units())
                        .map_err(|source| ValidationError::SplitRules { kind, source })?;
                }
            }
            NoSplit => {
                if !request.split_rules().is_empty() {
                    return Err(ValidationError::SplitRulesForbidden { kind });
                }
            }
        }
    }
    Ok(())
}

/// Field-level format constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    MaxLen(usize),
    Len(usize),
    Numeric,
    Alpha,
    Ipv4,
    Url,
    Email,
    StartsWith(&'static str),
}

static SHAPES: &[(Field, &[Shape])] = &[
    (Field::ChannelId, &[Shape::MaxLen(255)]),
    (Field::PayerIp, &[Shape::Ipv4]),
    (Field::TermUrl3ds, &[Shape::MaxLen(1024), Shape::Url]),
    (Field::OrderId, &[Shape::MaxLen(255)]),
    (Field::OrderCurrency, &[Shape::Alpha, Shape::Len(3)]),
    (Field::SubmerchantId, &[Shape::MaxLen(255)]),
    (Field::OrderDescription, &[Shape::MaxLen(1024)]),
    (Field::PayerEmail, &[Shape::Email, Shape::MaxLen(256)]),
    (
        Field::PayerPhone,
        &[Shape::Numeric, Shape::StartsWith("380"), Shape::MaxLen(32)],
    ),
    (Field::PayerFirstName, &[Shape::MaxLen(32)]),
    (Field::PayerLastName, &[Shape::MaxLen(32)]),
    (Field::PayerAddress, &[Shape::MaxLen(256)]),
    (Field::PayerCountry, &[Shape::MaxLen(2)]),
    (Field::PayerState, &[Shape::MaxLen(2)]),
    (Field::PayerCity, &[Shape::MaxLen(32)]),
    (Field::PayerZip, &[Shape::MaxLen(32)]),
    (Field::CustomerWallet, &[Shape::MaxLen(255)]),
    (Field::CardNumber, &[Shape::Numeric, Shape::Len(16)]),
    (Field::CardExpMonth, &[Shape::Numeric, Shape::Len(2)]),
    (Field::CardExpYear, &[Shape::Numeric, Shape::Len(4)]),
    (Field::CardCvv2, &[Shape::Numeric, Shape::Len(3)]),
    (Field::CardToken, &[Shape::MaxLen(32)]),
    (Field::RecurringFirstTransId, &[Shape::MaxLen(32)]),
    (Field::TransId, &[Shape::MaxLen(32)]),
    (Field::Ext1, &[Shape::MaxLen(1024)]),
    (Field::Ext2, &[Shape::MaxLen(1024)]),
    (Field::Ext3, &[Shape::MaxLen(1024)]),
    (Field::Ext4, &[Shape::MaxLen(1024)]),
    (Field::Ext5, &[Shape::MaxLen(1024)]),
    (Field::Ext6, &[Shape::MaxLen(1024)]),
    (Field::Ext7, &[Shape::MaxLen(1024)]),
    (Field::Ext8, &[Shape::MaxLen(1024)]),
    (Field::Ext9, &[Shape::MaxLen(1024)]),
    (Field::Ext10, &[Shape::MaxLen(1024)]),
];

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email pattern")
});

fn shape_error(kind: OperationKind, field: Field, shape: Shape, value: &str) -> ValidationError {
    let expected = match shape {
        Shape::MaxLen(max) => {
            return ValidationError::TooLong {
                kind,
                field,
                max,
                len: value.chars().count(),
            };
        }
        Shape::Len(2) => "exactly 2 characters long",
        Shape::Len(3) => "exactly 3 characters long",
        Shape::Len(4) => "exactly 4 characters long",
        Shape::Len(16) => "exactly 16 characters long",
        Shape::Len(_) => "of the fixed length",
        Shape::Numeric => "numeric",
        Shape::Alpha => "alphabetic",
        Shape::Ipv4 => "an IPv4 address",
        Shape::Url => "a valid URL",
        Shape::Email => "a valid email address",
        Shape::StartsWith(_) => "prefixed with 380",
    };
    ValidationError::InvalidFormat {
        kind,
        field,
        expected,
    }
}

fn shape_holds(shape: Shape, value: &str) -> bool {
    match shape {
        Shape::MaxLen(max) => value.chars().count() <= max,
        Shape::Len(len) => value.chars().count() == len,
        Shape::Numeric => value.chars().all(|c| c.is_ascii_digit()),
        Shape::Alpha => value.chars().all(|c| c.is_ascii_alphabetic()),
        Shape::Ipv4 => value.parse::<Ipv4Addr>().is_ok(),
        Shape::Url => url::Url::parse(value).is_ok_and(|u| u.has_host()),
        Shape::Email => EMAIL.is_match(value),
        Shape::StartsWith(prefix) => value.starts_with(prefix),
    }
}

/// Kind-independent format checks, run before signing.
///
/// Empty or unset fields are skipped here; presence is a per-kind concern.
/// `client_key` is the one field every request must carry.
pub fn check_shape(kind: OperationKind, request: &Request) -> Result<(), ValidationError> {
    present(request, Field::ClientKey).ok_or(ValidationError::Missing {
        kind,
        field: Field::ClientKey,
    })?;
    for (field, shapes) in SHAPES {
        let Some(value) = present(request, *field) else {
            continue;
        };
        if let Some(shape) = shapes.iter().find(|s| !shape_holds(**s, value)) {
            return Err(shape_error(kind, *field, *shape, value));
        }
    }
    Ok(())
}
