//! Operation kinds and gateway action codes.
//!
//! An [`OperationKind`] is chosen once per outbound request. It selects the
//! signature recipe and the validation rule set, and names the
//! [`ActionCode`] the request must carry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Closed set of gateway action families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// `SALE` by full card number, expiry and CVV2.
    CardPayment,
    /// One-click `SALE` by a previously issued card token.
    CardTokenPayment,
    ApplePay,
    GooglePay,
    /// Merchant-initiated `SALE` by card token, marked with `ext3=recurring`.
    Recurring,
    /// Zero-amount card verification that issues a card token.
    Verification,
    GetTransStatus,
    GetTransStatusByOrder,
    /// Confirms a hold.
    Capture,
    /// Refund or void.
    Creditvoid,
    GetSubmerchant,
    /// Payout to a card by full card number.
    #[serde(rename = "credit2card")]
    Credit2Card,
    /// Payout to a card by card token.
    #[serde(rename = "credit2card_token")]
    Credit2CardToken,
}

impl OperationKind {
    pub const ALL: [OperationKind; 13] = [
        OperationKind::CardPayment,
        OperationKind::CardTokenPayment,
        OperationKind::ApplePay,
        OperationKind::GooglePay,
        OperationKind::Recurring,
        OperationKind::Verification,
        OperationKind::GetTransStatus,
        OperationKind::GetTransStatusByOrder,
        OperationKind::Capture,
        OperationKind::Creditvoid,
        OperationKind::GetSubmerchant,
        OperationKind::Credit2Card,
        OperationKind::Credit2CardToken,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::CardPayment => "card_payment",
            OperationKind::CardTokenPayment => "card_token_payment",
            OperationKind::ApplePay => "apple_pay",
            OperationKind::GooglePay => "google_pay",
            OperationKind::Recurring => "recurring",
            OperationKind::Verification => "verification",
            OperationKind::GetTransStatus => "get_trans_status",
            OperationKind::GetTransStatusByOrder => "get_trans_status_by_order",
            OperationKind::Capture => "capture",
            OperationKind::Creditvoid => "creditvoid",
            OperationKind::GetSubmerchant => "get_submerchant",
            OperationKind::Credit2Card => "credit2card",
            OperationKind::Credit2CardToken => "credit2card_token",
        }
    }

    /// The action code a request of this kind must carry.
    pub fn action(&self) -> ActionCode {
        match self {
            OperationKind::CardPayment
            | OperationKind::CardTokenPayment
            | OperationKind::Recurring
            | OperationKind::Verification => ActionCode::Sale,
            OperationKind::ApplePay => ActionCode::ApplePay,
            OperationKind::GooglePay => ActionCode::GooglePay,
            OperationKind::GetTransStatus => ActionCode::GetTransStatus,
            OperationKind::GetTransStatusByOrder => ActionCode::GetTransStatusByOrder,
            OperationKind::Capture => ActionCode::Capture,
            OperationKind::Creditvoid => ActionCode::Creditvoid,
            OperationKind::GetSubmerchant => ActionCode::GetSubmerchant,
            OperationKind::Credit2Card | OperationKind::Credit2CardToken => {
                ActionCode::Credit2Card
            }
        }
    }
}

impl Display for OperationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operation tag that names no known kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown operation kind {0:?}: no signature recipe is registered for it")]
pub struct UnknownOperationKind(pub String);

impl FromStr for OperationKind {
    type Err = UnknownOperationKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperationKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownOperationKind(s.to_string()))
    }
}

/// Value of the `action` wire field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionCode {
    #[serde(rename = "SALE")]
    Sale,
    #[serde(rename = "GET_TRANS_STATUS")]
    GetTransStatus,
    #[serde(rename = "GET_TRANS_STATUS_BY_ORDER")]
    GetTransStatusByOrder,
    #[serde(rename = "APPLEPAY")]
    ApplePay,
    #[serde(rename = "GOOGLEPAY")]
    GooglePay,
    #[serde(rename = "CAPTURE")]
    Capture,
    #[serde(rename = "CREDITVOID")]
    Creditvoid,
    #[serde(rename = "CREDIT2CARD")]
    Credit2Card,
    #[serde(rename = "GET_SUBMERCHANT")]
    GetSubmerchant,
}

impl ActionCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionCode::Sale => "SALE",
            ActionCode::GetTransStatus => "GET_TRANS_STATUS",
            ActionCode::GetTransStatusByOrder => "GET_TRANS_STATUS_BY_ORDER",
            ActionCode::ApplePay => "APPLEPAY",
            ActionCode::GooglePay => "GOOGLEPAY",
            ActionCode::Capture => "CAPTURE",
            ActionCode::Creditvoid => "CREDITVOID",
            ActionCode::Credit2Card => "CREDIT2CARD",
            ActionCode::GetSubmerchant => "GET_SUBMERCHANT",
        }
    }
}

impl Display for ActionCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `Y`/`N` flag as the gateway spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum YesNo {
    #[serde(rename = "Y")]
    Yes,
    #[serde(rename = "N")]
    No,
}

impl YesNo {
    pub fn as_str(&self) -> &'static str {
        match self {
            YesNo::Yes => "Y",
            YesNo::No => "N",
        }
    }
}

impl From<bool> for YesNo {
    fn from(flag: bool) -> Self {
        if flag { YesNo::Yes } else { YesNo::No }
    }
}

impl Display for YesNo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags_parse_back() {
        for kind in OperationKind::ALL {
            assert_eq!(kind.as_str().parse::<OperationKind>().unwrap(), kind);
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_unknown_kind() {
        let err = "credit2wallet".parse::<OperationKind>().unwrap_err();
        assert_eq!(err, UnknownOperationKind("credit2wallet".into()));
        assert!(err.to_string().contains("credit2wallet"));
    }

    #[test]
    fn test_kind_actions() {
        assert_eq!(OperationKind::Verification.action(), ActionCode::Sale);
        assert_eq!(OperationKind::Recurring.action(), ActionCode::Sale);
        assert_eq!(OperationKind::Credit2CardToken.action(), ActionCode::Credit2Card);
        assert_eq!(OperationKind::GetSubmerchant.action().to_string(), "GET_SUBMERCHANT");
        assert_eq!(
            serde_json::to_string(&ActionCode::GetTransStatusByOrder).unwrap(),
            "\"GET_TRANS_STATUS_BY_ORDER\""
        );
    }
}
