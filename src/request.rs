//! Merchant-level payment model and the builders that turn it into signed
//! gateway requests.
//!
//! A [`PaymentRequest`] describes a payment the way a shop sees it: who the
//! merchant is, who pays, how much, and with what. Each builder picks the
//! right operation kind and endpoint for one gateway flow and returns a
//! [`Dispatch`], which can be sent with
//! [`PlatonClient::send`](crate::client::PlatonClient::send) or inspected as a
//! dry run.

use std::collections::BTreeMap;

use platon_types::auth::Auth;
use platon_types::config::MerchantConfig;
use platon_types::currency::Currency;
use platon_types::operation::{OperationKind, YesNo};
use platon_types::request::{FormFields, Request, RequestError, SignedRequest};
use platon_types::sign;
use platon_types::split::{SplitRule, SplitRuleError, SplitRules};
use platon_types::util::{Base64Bytes, Base64JsonError, MoneyAmount, VERIFY_ZERO_CHANNEL};
use platon_types::verification::{
    VerificationForm, VerificationFormError, VerificationParams, build_verification_form,
};
use serde::{Deserialize, Serialize};

/// Payer IP sent when neither the merchant nor the payment supplies one.
pub const DEFAULT_PAYER_IP: &str = "127.0.0.1";

/// Gateway endpoints, relative to the base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Server-to-server card, token, recurring, status, capture, refund and payout calls.
    PostUnq,
    /// Apple Pay and Google Pay.
    Post,
    /// Submerchant lookup.
    Configuration,
    /// Client-server verification form.
    PaymentAuth,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::PostUnq => "./post-unq/",
            Endpoint::Post => "./post/",
            Endpoint::Configuration => "./configuration/",
            Endpoint::PaymentAuth => "./payment/auth",
        }
    }
}

/// A signed request and the endpoint it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub endpoint: Endpoint,
    pub request: SignedRequest,
}

impl Dispatch {
    fn new(endpoint: Endpoint, request: SignedRequest) -> Self {
        Self { endpoint, request }
    }

    pub fn kind(&self) -> OperationKind {
        self.request.kind()
    }

    /// Form body exactly as it would be posted.
    pub fn fields(&self) -> FormFields {
        self.request.to_form()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("{flow}: {what} is required")]
    Missing {
        flow: &'static str,
        what: &'static str,
    },
    #[error("{flow}: amount (minor units) must be > 0")]
    NonPositiveAmount { flow: &'static str },
    #[error("{flow}: invalid split rules: {source}")]
    SplitRules {
        flow: &'static str,
        #[source]
        source: SplitRuleError,
    },
    #[error("{flow}: card_number must contain at least 10 digits")]
    CardTooShort { flow: &'static str },
    #[error("{flow}: cannot decode {what}: {source}")]
    WalletToken {
        flow: &'static str,
        what: &'static str,
        #[source]
        source: Base64JsonError,
    },
    #[error("{flow}: cannot encode {what}: {source}")]
    WalletEncode {
        flow: &'static str,
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error(
        "{flow}: unsupported payment method (expected card PAN, CARD_TOKEN, Apple Pay, or Google Pay data)"
    )]
    UnsupportedMethod { flow: &'static str },
    #[error("{flow}: {source}")]
    Prepare {
        flow: &'static str,
        #[source]
        source: RequestError,
    },
    #[error(transparent)]
    VerificationForm(#[from] VerificationFormError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalData {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub address: Option<String>,
    /// Two-letter country code.
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentData {
    /// Gateway `trans_id` for status, capture and refund.
    pub platon_trans_id: Option<String>,
    /// Numeric transaction id; used when `platon_trans_id` is unset.
    pub platon_payment_id: Option<i64>,
    /// Merchant order id.
    pub payment_id: Option<String>,
    /// Amount in minor units.
    pub amount: u64,
    pub currency: Currency,
    pub description: String,
    pub split_rules: Vec<SplitRule>,
    pub submerchant_id: Option<String>,
    /// `ext1`..`ext10` travel as request fields of the same name.
    /// `immediately` (`Y`, `YES`, `TRUE`, `1`) requests a fast refund.
    pub metadata: BTreeMap<String, String>,
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub pan: Option<String>,
    pub token: Option<String>,
    pub expiration_month: Option<String>,
    pub expiration_year: Option<String>,
    pub cvv2: Option<String>,
}

impl std::fmt::Debug for Card {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Card")
            .field("pan", &self.pan.as_ref().map(|_| "<redacted>"))
            .field("token", &self.token)
            .field("expiration_month", &self.expiration_month)
            .field("expiration_year", &self.expiration_year)
            .field("cvv2", &self.cvv2.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub card: Option<Card>,
    /// Base64 JSON from Apple Pay; its `token` member is what the gateway needs.
    pub apple_container: Option<String>,
    /// Base64 JSON from Google Pay (`paymentMethodData.tokenizationData.token`).
    pub google_token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub merchant: Option<MerchantConfig>,
    pub personal_data: Option<PersonalData>,
    pub payment_data: Option<PaymentData>,
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GooglePayData {
    payment_method_data: GoogleMethodData,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleMethodData {
    tokenization_data: GoogleTokenizationData,
}

#[derive(Deserialize)]
struct GoogleTokenizationData {
    #[serde(default)]
    token: String,
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}

fn fast_refund(metadata: &BTreeMap<String, String>) -> bool {
    metadata.get("immediately").is_some_and(|v| {
        matches!(
            v.trim().to_ascii_uppercase().as_str(),
            "Y" | "YES" | "TRUE" | "1"
        )
    })
}

impl PaymentRequest {
    fn card(&self) -> Option<&Card> {
        self.payment_method.as_ref()?.card.as_ref()
    }

    fn card_pan(&self) -> Option<&str> {
        non_empty(self.card()?.pan.as_ref())
    }

    fn card_token(&self) -> Option<&str> {
        non_empty(self.card()?.token.as_ref())
    }

    fn payer_email(&self) -> Option<&str> {
        non_empty(self.personal_data.as_ref()?.email.as_ref())
    }

    fn payment_data(&self, flow: &'static str) -> Result<&PaymentData, BuildError> {
        self.payment_data.as_ref().ok_or(BuildError::Missing {
            flow,
            what: "PaymentData",
        })
    }

    fn merchant(&self, flow: &'static str) -> Result<&MerchantConfig, BuildError> {
        self.merchant
            .as_ref()
            .filter(|m| !m.merchant_key.is_empty())
            .ok_or(BuildError::Missing {
                flow,
                what: "merchant client_key",
            })
    }

    fn auth(&self, flow: &'static str) -> Result<Auth, BuildError> {
        Ok(self.merchant(flow)?.auth())
    }

    /// Gateway transaction id: `platon_trans_id`, else `platon_payment_id`.
    pub fn trans_id(&self) -> Option<String> {
        let data = self.payment_data.as_ref()?;
        non_empty(data.platon_trans_id.as_ref())
            .map(str::to_string)
            .or_else(|| data.platon_payment_id.map(|id| id.to_string()))
    }

    fn require_trans_id(&self, flow: &'static str) -> Result<String, BuildError> {
        self.trans_id().ok_or(BuildError::Missing {
            flow,
            what: "trans_id (PaymentData.platon_trans_id or platon_payment_id)",
        })
    }

    /// first6+last4 of the card number, required by trans-id signatures.
    fn card_hash_part(&self, flow: &'static str) -> Result<String, BuildError> {
        let pan = self.card_pan().ok_or(BuildError::Missing {
            flow,
            what: "card_number (only first 6 and last 4 digits are used)",
        })?;
        sign::first_six_last_four(pan).ok_or(BuildError::CardTooShort { flow })
    }

    fn split_rules(&self, flow: &'static str) -> Result<SplitRules, BuildError> {
        let Some(data) = self.payment_data.as_ref() else {
            return Ok(SplitRules::default());
        };
        SplitRules::normalize(&data.split_rules, data.amount)
            .map_err(|source| BuildError::SplitRules { flow, source })
    }

    /// Apple Pay container re-encoded as the gateway expects: the `token`
    /// member, as base64 JSON.
    pub fn apple_payment_token(&self) -> Result<String, BuildError> {
        const FLOW: &str = "payment";
        let container = self
            .payment_method
            .as_ref()
            .and_then(|m| non_empty(m.apple_container.as_ref()))
            .ok_or(BuildError::Missing {
                flow: FLOW,
                what: "Apple Pay container",
            })?;
        let decoded: serde_json::Value = Base64Bytes::from(container)
            .decode_json()
            .map_err(|source| BuildError::WalletToken {
                flow: FLOW,
                what: "Apple Pay container",
                source,
            })?;
        let token = decoded.get("token").cloned().unwrap_or_default();
        Base64Bytes::encode_json(&token)
            .map(|encoded| encoded.to_string())
            .map_err(|source| BuildError::WalletEncode {
                flow: FLOW,
                what: "Apple Pay token",
                source,
            })
    }

    /// Google Pay tokenization token, base64 encoded.
    pub fn google_payment_token(&self) -> Result<String, BuildError> {
        const FLOW: &str = "payment";
        let token = self
            .payment_method
            .as_ref()
            .and_then(|m| non_empty(m.google_token.as_ref()))
            .ok_or(BuildError::Missing {
                flow: FLOW,
                what: "Google Pay token",
            })?;
        let data: GooglePayData =
            Base64Bytes::from(token)
                .decode_json()
                .map_err(|source| BuildError::WalletToken {
                    flow: FLOW,
                    what: "Google Pay token",
                    source,
                })?;
        Ok(Base64Bytes::encode(data.payment_method_data.tokenization_data.token).to_string())
    }

    fn with_metadata(request: Request, metadata: &BTreeMap<String, String>) -> Request {
        (1..=10).fold(request, |request, i| {
            match metadata.get(&format!("ext{i}")).map(|v| v.trim()) {
                Some(value) if !value.is_empty() => request.with_ext(i, value),
                _ => request,
            }
        })
    }

    /// Fields shared by every SALE-family request.
    fn order_base(&self, kind: OperationKind, flow: &'static str) -> Result<Request, BuildError> {
        let merchant = self.merchant(flow)?;
        let data = self.payment_data(flow)?;
        let order_id = non_empty(data.payment_id.as_ref()).ok_or(BuildError::Missing {
            flow,
            what: "order_id (PaymentData.payment_id)",
        })?;
        if data.description.is_empty() {
            return Err(BuildError::Missing {
                flow,
                what: "order_description",
            });
        }
        let personal = self.personal_data.clone().unwrap_or_default();
        let request = Request::for_kind(kind)
            .with_auth(merchant.auth())
            .with_order_id(order_id)
            .with_order_currency(data.currency.as_str())
            .with_order_description(data.description.as_str())
            .with_payer_ip(merchant.payer_ip.as_deref().unwrap_or(DEFAULT_PAYER_IP))
            .when(merchant.term_url(), Request::with_term_url_3ds)
            .when(personal.email, Request::with_payer_email)
            .when(personal.phone, Request::with_payer_phone)
            .when(personal.first_name, Request::with_payer_first_name)
            .when(personal.last_name, Request::with_payer_last_name);
        Ok(Self::with_metadata(request, &data.metadata))
    }

    fn sign(flow: &'static str, request: Request, kind: OperationKind) -> Result<SignedRequest, BuildError> {
        request
            .sign_and_prepare(kind)
            .map_err(|source| BuildError::Prepare { flow, source })
    }

    fn with_card(&self, request: Request) -> Request {
        let card = self.card().cloned().unwrap_or_default();
        request
            .when(card.pan, Request::with_card_number)
            .when(card.expiration_month, Request::with_card_exp_month)
            .when(card.expiration_year, Request::with_card_exp_year)
            .when(card.cvv2, Request::with_card_cvv2)
    }

    fn sale(&self, flow: &'static str, hold: bool) -> Result<Dispatch, BuildError> {
        let data = self.payment_data(flow)?;
        if data.amount == 0 {
            return Err(BuildError::NonPositiveAmount { flow });
        }
        let split = self.split_rules(flow)?;
        let amount = MoneyAmount::from_minor_units(data.amount).to_string();
        let base = |kind: OperationKind| -> Result<Request, BuildError> {
            let request = self
                .order_base(kind, flow)?
                .with_order_amount(amount.as_str())
                .with_split_rules(split.clone());
            Ok(if hold {
                request.with_auth_flag(YesNo::Yes)
            } else {
                request
            })
        };

        let method = self.payment_method.as_ref();
        if method.is_some_and(|m| non_empty(m.apple_container.as_ref()).is_some()) {
            let kind = OperationKind::ApplePay;
            let request = base(kind)?.with_payment_token(self.apple_payment_token()?);
            return Ok(Dispatch::new(Endpoint::Post, Self::sign(flow, request, kind)?));
        }
        if method.is_some_and(|m| non_empty(m.google_token.as_ref()).is_some()) {
            let kind = OperationKind::GooglePay;
            let request = base(kind)?.with_payment_token(self.google_payment_token()?);
            return Ok(Dispatch::new(Endpoint::Post, Self::sign(flow, request, kind)?));
        }
        if let Some(token) = self.card_token() {
            let kind = OperationKind::CardTokenPayment;
            let request = base(kind)?.with_card_token(token);
            return Ok(Dispatch::new(Endpoint::PostUnq, Self::sign(flow, request, kind)?));
        }
        if self.card_pan().is_some() {
            let kind = OperationKind::CardPayment;
            let request = self
                .with_card(base(kind)?)
                .with_req_token(YesNo::No)
                .with_recurring_init(YesNo::No);
            return Ok(Dispatch::new(Endpoint::PostUnq, Self::sign(flow, request, kind)?));
        }
        Err(BuildError::UnsupportedMethod { flow })
    }

    /// Charges the payer. Apple Pay wins over Google Pay, which wins over a
    /// card token, which wins over a full card number.
    pub fn payment(&self) -> Result<Dispatch, BuildError> {
        self.sale("payment", false)
    }

    /// Like [`PaymentRequest::payment`] but only places a hold (`auth=Y`).
    pub fn hold(&self) -> Result<Dispatch, BuildError> {
        self.sale("hold", true)
    }

    /// Server-to-server zero-amount verification that issues a card token.
    pub fn card_verification(&self) -> Result<Dispatch, BuildError> {
        const FLOW: &str = "card verification";
        let kind = OperationKind::Verification;
        self.card_pan().ok_or(BuildError::Missing {
            flow: FLOW,
            what: "card_number",
        })?;
        let request = self
            .with_card(self.order_base(kind, FLOW)?)
            .with_channel_id(VERIFY_ZERO_CHANNEL)
            .with_order_amount(MoneyAmount::VERIFY_NO_AMOUNT)
            .with_req_token(YesNo::Yes)
            .with_recurring_init(YesNo::Yes);
        Ok(Dispatch::new(Endpoint::PostUnq, Self::sign(FLOW, request, kind)?))
    }

    /// Merchant-initiated charge of a stored card token.
    pub fn recurring_payment(&self) -> Result<Dispatch, BuildError> {
        const FLOW: &str = "recurring payment";
        let kind = OperationKind::Recurring;
        let data = self.payment_data(FLOW)?;
        if data.amount == 0 {
            return Err(BuildError::NonPositiveAmount { flow: FLOW });
        }
        let token = self.card_token().ok_or(BuildError::Missing {
            flow: FLOW,
            what: "card_token",
        })?;
        let request = self
            .order_base(kind, FLOW)?
            .with_order_amount(MoneyAmount::from_minor_units(data.amount).to_string())
            .with_split_rules(self.split_rules(FLOW)?)
            .with_card_token(token)
            .when(self.trans_id(), Request::with_recurring_first_trans_id)
            .with_ext(3, "recurring");
        Ok(Dispatch::new(Endpoint::PostUnq, Self::sign(FLOW, request, kind)?))
    }

    /// Transaction status by gateway `trans_id`.
    pub fn status(&self) -> Result<Dispatch, BuildError> {
        const FLOW: &str = "status";
        let kind = OperationKind::GetTransStatus;
        let trans_id = self.require_trans_id(FLOW)?;
        let card_hash_part = self.card_hash_part(FLOW)?;
        let request = Request::for_kind(kind)
            .with_auth(self.auth(FLOW)?)
            .with_trans_id(trans_id)
            .when(self.payer_email(), Request::with_hash_email)
            .with_card_hash_part(card_hash_part);
        Ok(Dispatch::new(Endpoint::PostUnq, Self::sign(FLOW, request, kind)?))
    }

    /// Transaction status by merchant order id.
    pub fn status_by_order(&self) -> Result<Dispatch, BuildError> {
        const FLOW: &str = "status by order";
        let kind = OperationKind::GetTransStatusByOrder;
        let order_id = self
            .payment_data
            .as_ref()
            .and_then(|d| d.payment_id.as_deref())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(BuildError::Missing {
                flow: FLOW,
                what: "order_id (PaymentData.payment_id)",
            })?;
        let request = Request::for_kind(kind)
            .with_auth(self.auth(FLOW)?)
            .with_order_id(order_id);
        Ok(Dispatch::new(Endpoint::PostUnq, Self::sign(FLOW, request, kind)?))
    }

    fn settle(&self, flow: &'static str, kind: OperationKind) -> Result<Request, BuildError> {
        let trans_id = self.require_trans_id(flow)?;
        let auth = self.auth(flow)?;
        let data = self.payment_data(flow)?;
        if data.amount == 0 {
            return Err(BuildError::NonPositiveAmount { flow });
        }
        let split = self.split_rules(flow)?;
        let card_hash_part = self.card_hash_part(flow)?;
        Ok(Request::for_kind(kind)
            .with_auth(auth)
            .with_trans_id(trans_id)
            .with_amount(MoneyAmount::from_minor_units(data.amount).to_string())
            .with_split_rules(split)
            .when(self.payer_email(), Request::with_hash_email)
            .with_card_hash_part(card_hash_part))
    }

    /// Confirms a hold.
    pub fn capture(&self) -> Result<Dispatch, BuildError> {
        const FLOW: &str = "capture";
        let kind = OperationKind::Capture;
        let request = self.settle(FLOW, kind)?;
        Ok(Dispatch::new(Endpoint::PostUnq, Self::sign(FLOW, request, kind)?))
    }

    /// Refunds or voids a transaction.
    pub fn refund(&self) -> Result<Dispatch, BuildError> {
        const FLOW: &str = "refund";
        let kind = OperationKind::Creditvoid;
        let immediately = fast_refund(&self.payment_data(FLOW)?.metadata);
        let request = self.settle(FLOW, kind)?.with_immediately(immediately);
        Ok(Dispatch::new(Endpoint::PostUnq, Self::sign(FLOW, request, kind)?))
    }

    /// Pays out to a card, by full card number or by card token.
    pub fn credit(&self) -> Result<Dispatch, BuildError> {
        const FLOW: &str = "credit";
        let data = self.payment_data(FLOW)?;
        if data.amount == 0 {
            return Err(BuildError::NonPositiveAmount { flow: FLOW });
        }
        let kind = match (self.card_pan(), self.card_token()) {
            (Some(_), _) => OperationKind::Credit2Card,
            (None, Some(_)) => OperationKind::Credit2CardToken,
            (None, None) => return Err(BuildError::UnsupportedMethod { flow: FLOW }),
        };
        let personal = self.personal_data.clone().unwrap_or_default();
        let request = Request::for_kind(kind)
            .with_auth(self.auth(FLOW)?)
            .when(self.card_pan(), Request::with_card_number)
            .when(
                self.card_token().filter(|_| kind == OperationKind::Credit2CardToken),
                Request::with_card_token,
            )
            .when(data.payment_id.as_deref().map(str::trim), Request::with_order_id)
            .with_amount(MoneyAmount::from_minor_units(data.amount).to_string())
            .with_order_currency(data.currency.as_str())
            .with_order_description(data.description.trim())
            .when(personal.first_name, Request::with_payer_first_name)
            .when(personal.last_name, Request::with_payer_last_name)
            .when(personal.address, Request::with_payer_address)
            .when(personal.country, Request::with_payer_country)
            .when(personal.state, Request::with_payer_state)
            .when(personal.city, Request::with_payer_city)
            .when(personal.zip, Request::with_payer_zip);
        let request = Self::with_metadata(request, &data.metadata);
        Ok(Dispatch::new(Endpoint::PostUnq, Self::sign(FLOW, request, kind)?))
    }

    /// Asks whether a sub-merchant may receive split payments.
    pub fn submerchant_lookup(&self) -> Result<Dispatch, BuildError> {
        const FLOW: &str = "split availability";
        let kind = OperationKind::GetSubmerchant;
        let auth = self.auth(FLOW)?;
        let submerchant_id = self
            .payment_data
            .as_ref()
            .and_then(|d| d.submerchant_id.as_deref())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(BuildError::Missing {
                flow: FLOW,
                what: "submerchant_id",
            })?;
        let request = Request::for_kind(kind)
            .with_auth(auth)
            .with_submerchant_id(submerchant_id);
        Ok(Dispatch::new(Endpoint::Configuration, Self::sign(FLOW, request, kind)?))
    }

    /// Signed browser form for client-server card verification.
    ///
    /// The redirect is the merchant's success URL, else its fail URL.
    pub fn verification_form(&self, endpoint: &str) -> Result<VerificationForm, BuildError> {
        let merchant = self.merchant.as_ref().ok_or(BuildError::Missing {
            flow: "verification",
            what: "merchant",
        })?;
        let redirect_url = [&merchant.success_redirect, &merchant.fail_redirect]
            .into_iter()
            .flatten()
            .map(|url| url.trim())
            .find(|url| !url.is_empty())
            .unwrap_or_default();
        let data = self.payment_data.clone().unwrap_or_default();
        let params = VerificationParams {
            client_key: merchant.merchant_key.clone(),
            secret: merchant.secret_key.inner().clone(),
            redirect_url: redirect_url.to_string(),
            description: data.description,
            currency: data.currency.to_string(),
            order_id: data.payment_id,
            metadata: data.metadata,
        };
        Ok(build_verification_form(&params, endpoint)?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn merchant() -> MerchantConfig {
        let mut merchant = MerchantConfig::new("CLIENT", "secret123");
        merchant.success_redirect = Some("https://merchant.example/ok".into());
        merchant.term_url_3ds = Some("https://merchant.example/3ds".into());
        merchant
    }

    pub(crate) fn card_request() -> PaymentRequest {
        PaymentRequest {
            merchant: Some(merchant()),
            personal_data: Some(PersonalData {
                email: Some("payer@example.com".into()),
                phone: Some("380501234567".into()),
                ..Default::default()
            }),
            payment_data: Some(PaymentData {
                platon_trans_id: Some("632508054".into()),
                payment_id: Some("order-1".into()),
                amount: 1000,
                description: "Coffee".into(),
                ..Default::default()
            }),
            payment_method: Some(PaymentMethod {
                card: Some(Card {
                    pan: Some("4111111111111111".into()),
                    expiration_month: Some("01".into()),
                    expiration_year: Some("2030".into()),
                    cvv2: Some("123".into()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
        }
    }

    fn with_method(method: PaymentMethod) -> PaymentRequest {
        PaymentRequest {
            payment_method: Some(method),
            ..card_request()
        }
    }

    #[test]
    fn test_card_payment() {
        let dispatch = card_request().payment().unwrap();
        assert_eq!(dispatch.endpoint, Endpoint::PostUnq);
        assert_eq!(dispatch.kind(), OperationKind::CardPayment);
        let fields = dispatch.fields();
        assert_eq!(fields["order_amount"], "10.00");
        assert_eq!(fields["order_currency"], "UAH");
        assert_eq!(fields["payer_ip"], DEFAULT_PAYER_IP);
        assert_eq!(fields["term_url_3ds"], "https://merchant.example/3ds");
        assert_eq!(fields["req_token"], "N");
        assert!(!fields.contains_key("auth"));
    }

    #[test]
    fn test_hold_sets_auth_flag() {
        let fields = card_request().hold().unwrap().fields();
        assert_eq!(fields["auth"], "Y");
    }

    #[test]
    fn test_token_wins_over_pan() {
        let mut request = card_request();
        if let Some(card) = request
            .payment_method
            .as_mut()
            .and_then(|m| m.card.as_mut())
        {
            card.token = Some("TOKEN123".into());
        }
        let dispatch = request.payment().unwrap();
        assert_eq!(dispatch.kind(), OperationKind::CardTokenPayment);
        assert_eq!(
            dispatch.request.hash().as_str(),
            "03838ac02c89b98621f95ec98a68aa14"
        );
        assert!(!dispatch.fields().contains_key("card_number"));
    }

    #[test]
    fn test_apple_pay_token_is_reencoded() {
        let container = Base64Bytes::encode_json(&json!({
            "token": {"paymentData": {"data": "abc"}},
            "other": 1
        }))
        .unwrap()
        .to_string();
        let dispatch = with_method(PaymentMethod {
            apple_container: Some(container),
            ..Default::default()
        })
        .payment()
        .unwrap();
        assert_eq!(dispatch.endpoint, Endpoint::Post);
        assert_eq!(dispatch.kind(), OperationKind::ApplePay);
        let token: serde_json::Value =
            Base64Bytes::from(dispatch.fields()["payment_token"].as_str())
                .decode_json()
                .unwrap();
        assert_eq!(token, json!({"paymentData": {"data": "abc"}}));
        assert_eq!(dispatch.fields()["action"], "APPLEPAY");
    }

    #[test]
    fn test_google_pay_token() {
        let wrapper = Base64Bytes::encode_json(&json!({
            "paymentMethodData": {"tokenizationData": {"token": "{\"signature\":\"sig\"}"}}
        }))
        .unwrap()
        .to_string();
        let dispatch = with_method(PaymentMethod {
            google_token: Some(wrapper),
            ..Default::default()
        })
        .payment()
        .unwrap();
        assert_eq!(dispatch.kind(), OperationKind::GooglePay);
        let raw = Base64Bytes::from(dispatch.fields()["payment_token"].as_str())
            .decode()
            .unwrap();
        assert_eq!(raw, br#"{"signature":"sig"}"#);
    }

    #[test]
    fn test_broken_wallet_token() {
        let err = with_method(PaymentMethod {
            google_token: Some("%%%".into()),
            ..Default::default()
        })
        .payment()
        .unwrap_err();
        assert!(matches!(err, BuildError::WalletToken { .. }));
    }

    #[test]
    fn test_no_payment_method() {
        let err = with_method(PaymentMethod::default()).payment().unwrap_err();
        assert!(matches!(err, BuildError::UnsupportedMethod { flow: "payment" }));
    }

    #[test]
    fn test_card_verification() {
        let fields = card_request().card_verification().unwrap().fields();
        assert_eq!(fields["channel_id"], "VERIFY_ZERO");
        assert_eq!(fields["order_amount"], "0.40");
        assert_eq!(fields["req_token"], "Y");
        assert_eq!(fields["recurring_init"], "Y");
    }

    #[test]
    fn test_status_signs_with_card_hash() {
        let dispatch = card_request().status().unwrap();
        assert_eq!(
            dispatch.request.hash().as_str(),
            "77a4785689636b4d3875ec7acf47d5e2"
        );
        let fields = dispatch.fields();
        assert_eq!(fields["trans_id"], "632508054");
        assert!(!fields.contains_key("card_number"));
        assert!(!fields.contains_key("payer_email"));
    }

    #[test]
    fn test_status_requires_card() {
        let err = with_method(PaymentMethod::default()).status().unwrap_err();
        assert!(matches!(err, BuildError::Missing { flow: "status", .. }));
    }

    #[test]
    fn test_trans_id_falls_back_to_payment_id() {
        let mut request = card_request();
        if let Some(data) = request.payment_data.as_mut() {
            data.platon_trans_id = None;
            data.platon_payment_id = Some(42);
        }
        assert_eq!(request.trans_id().as_deref(), Some("42"));
    }

    #[test]
    fn test_refund_fast_mode() {
        let mut request = card_request();
        if let Some(data) = request.payment_data.as_mut() {
            data.metadata.insert("immediately".into(), " true ".into());
        }
        let fields = request.refund().unwrap().fields();
        assert_eq!(fields["action"], "CREDITVOID");
        assert_eq!(fields["amount"], "10.00");
        assert_eq!(fields["immediately"], "Y");

        let fields = card_request().refund().unwrap().fields();
        assert!(!fields.contains_key("immediately"));
    }

    #[test]
    fn test_capture_with_split_rules() {
        let mut request = card_request();
        if let Some(data) = request.payment_data.as_mut() {
            data.split_rules = vec![SplitRule::new("sub-1", 600), SplitRule::new("sub-2", 400)];
        }
        let fields = request.capture().unwrap().fields();
        assert_eq!(fields["split_rules"], r#"{"sub-1":"6.00","sub-2":"4.00"}"#);

        if let Some(data) = request.payment_data.as_mut() {
            data.split_rules = vec![SplitRule::new("sub-1", 600)];
        }
        assert!(matches!(
            request.capture().unwrap_err(),
            BuildError::SplitRules { flow: "capture", .. }
        ));
    }

    #[test]
    fn test_credit_by_token() {
        let mut request = card_request();
        request.payment_method = Some(PaymentMethod {
            card: Some(Card {
                token: Some("TOKEN123".into()),
                ..Default::default()
            }),
            ..Default::default()
        });
        request.personal_data = Some(PersonalData {
            first_name: Some("Taras".into()),
            last_name: Some("Shevchenko".into()),
            address: Some("Khreshchatyk 1".into()),
            country: Some("UA".into()),
            state: Some("KV".into()),
            city: Some("Kyiv".into()),
            zip: Some("01001".into()),
            ..Default::default()
        });
        let dispatch = request.credit().unwrap();
        assert_eq!(dispatch.kind(), OperationKind::Credit2CardToken);
        let fields = dispatch.fields();
        assert_eq!(fields["action"], "CREDIT2CARD");
        assert_eq!(fields["card_token"], "TOKEN123");
        assert_eq!(fields["amount"], "10.00");
    }

    #[test]
    fn test_credit_requires_recipient() {
        let err = card_request().credit().unwrap_err();
        assert!(matches!(err, BuildError::Prepare { flow: "credit", .. }));
    }

    #[test]
    fn test_submerchant_lookup() {
        let mut request = card_request();
        if let Some(data) = request.payment_data.as_mut() {
            data.submerchant_id = Some(" 12345678 ".into());
        }
        let dispatch = request.submerchant_lookup().unwrap();
        assert_eq!(dispatch.endpoint, Endpoint::Configuration);
        assert_eq!(
            dispatch.request.hash().as_str(),
            "15f549d19f26ce89022396a649c4ac9f"
        );
    }

    #[test]
    fn test_missing_merchant_key() {
        let request = PaymentRequest {
            merchant: None,
            ..card_request()
        };
        assert!(matches!(
            request.capture().unwrap_err(),
            BuildError::Missing {
                what: "merchant client_key",
                ..
            }
        ));
    }

    #[test]
    fn test_verification_form_uses_fail_redirect_as_fallback() {
        let mut request = card_request();
        if let Some(merchant) = request.merchant.as_mut() {
            merchant.success_redirect = None;
            merchant.fail_redirect = Some("https://merchant.example/fail".into());
        }
        let form = request
            .verification_form("https://secure.platononline.com/payment/auth")
            .unwrap();
        assert_eq!(form.fields["url"], "https://merchant.example/fail");
        assert_eq!(form.fields["key"], "CLIENT");
    }
}
