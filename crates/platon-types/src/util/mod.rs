//! Helper types shared by the signing and validation layers.
//!
//! - [`b64`] - Base64 encoding/decoding utilities
//! - [`money_amount`] - Two-decimal wire amounts

pub mod b64;
pub mod money_amount;

pub use b64::*;
pub use money_amount::{MoneyAmount, MoneyAmountParseError};

/// Payment code of the client-server verification form.
pub const PAYMENT_CODE: &str = "CC";

/// `formid` of the client-server verification form.
pub const VERIFY_FORM_ID: &str = "verify";

/// Channel of the server-to-server zero-amount verification.
pub const VERIFY_ZERO_CHANNEL: &str = "VERIFY_ZERO";
