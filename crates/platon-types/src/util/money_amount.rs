//! Two-decimal wire amounts.
//!
//! The gateway exchanges every amount as a decimal string with exactly two
//! fractional digits (`"1.00"`, `"250.75"`). Internally amounts are minor
//! units (kopecks, cents): `"12.34"` is `1234`.
//!
//! ```rust
//! use platon_types::util::MoneyAmount;
//!
//! let amount = MoneyAmount::parse("12.34").unwrap();
//! assert_eq!(amount.minor_units(), 1234);
//! assert_eq!(MoneyAmount::from_minor_units(5).to_string(), "0.05");
//! ```

use regex::Regex;
use rust_decimal::Decimal;
use std::fmt;
use std::fmt::Display;
use std::str::FromStr;

/// A non-negative amount with a fixed scale of two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MoneyAmount(Decimal);

/// Errors that can occur when parsing a wire amount.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyAmountParseError {
    /// The input is not `digits "." two-digits`.
    #[error("amount must match {} (got {input:?})", constants::WIRE_PATTERN)]
    InvalidFormat { input: String },
    /// The value does not fit into minor units.
    #[error("amount {input:?} is out of range")]
    OutOfRange { input: String },
}

mod constants {
    use super::*;
    use std::sync::LazyLock;

    pub const WIRE_PATTERN: &str = r"^[0-9]+\.[0-9]{2}$";
    pub const SCALE: u32 = 2;

    pub static WIRE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(WIRE_PATTERN).expect("valid amount pattern"));
}

impl MoneyAmount {
    /// Reserved order amount of a zero-amount card verification.
    pub const VERIFY_NO_AMOUNT: &'static str = "0.40";

    /// Parses a wire amount, accepting only the strict two-decimal form.
    ///
    /// No currency symbols, separators, signs or whitespace are tolerated.
    pub fn parse(input: &str) -> Result<Self, MoneyAmountParseError> {
        if !constants::WIRE.is_match(input) {
            return Err(MoneyAmountParseError::InvalidFormat {
                input: input.to_string(),
            });
        }
        let out_of_range = || MoneyAmountParseError::OutOfRange {
            input: input.to_string(),
        };
        let parsed = Decimal::from_str(input).map_err(|_| out_of_range())?;
        u64::try_from(parsed.mantissa()).map_err(|_| out_of_range())?;
        Ok(MoneyAmount(parsed))
    }

    /// Builds an amount from minor units.
    pub fn from_minor_units(minor: u64) -> Self {
        MoneyAmount(Decimal::from_i128_with_scale(
            i128::from(minor),
            constants::SCALE,
        ))
    }

    /// Returns the amount in minor units, `major * 100 + minor`.
    pub fn minor_units(&self) -> u64 {
        // Scale is fixed at two and the mantissa was range-checked on construction.
        u64::try_from(self.0.mantissa()).unwrap_or(u64::MAX)
    }

    pub fn is_positive(&self) -> bool {
        self.minor_units() > 0
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl FromStr for MoneyAmount {
    type Err = MoneyAmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MoneyAmount::parse(s)
    }
}

impl TryFrom<&str> for MoneyAmount {
    type Error = MoneyAmountParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        MoneyAmount::from_str(value)
    }
}

impl From<u64> for MoneyAmount {
    fn from(minor: u64) -> Self {
        MoneyAmount::from_minor_units(minor)
    }
}

impl Display for MoneyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
