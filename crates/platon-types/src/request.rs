//! Outbound gateway request and its signed, transport-ready form.

use std::collections::BTreeMap;
use std::fmt;

use crate::auth::Auth;
use crate::field::Field;
use crate::operation::{ActionCode, OperationKind, YesNo};
use crate::sign::{self, SignError, SignInputs, Signature};
use crate::split::SplitRules;
use crate::validate::{self, ValidationError};

/// Flat name to value map sent as an `application/x-www-form-urlencoded` body.
pub type FormFields = BTreeMap<String, String>;

/// Card data that must not show up in logs.
#[derive(Clone, PartialEq, Eq)]
struct Sensitive(String);

impl fmt::Debug for Sensitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("signature generation failed: {0}")]
    Sign(#[from] SignError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// An unsigned gateway request.
///
/// Every field is optional; which ones an operation needs is decided when the
/// request is signed for a particular [`OperationKind`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    pub(crate) action: Option<ActionCode>,
    client_key: Option<String>,
    channel_id: Option<String>,
    payer_ip: Option<String>,
    term_url_3ds: Option<String>,
    order_id: Option<String>,
    order_amount: Option<String>,
    order_currency: Option<String>,
    submerchant_id: Option<String>,
    order_description: Option<String>,
    payment_token: Option<String>,
    payer_email: Option<String>,
    payer_phone: Option<String>,
    payer_first_name: Option<String>,
    payer_last_name: Option<String>,
    payer_address: Option<String>,
    payer_country: Option<String>,
    payer_state: Option<String>,
    payer_city: Option<String>,
    payer_zip: Option<String>,
    customer_wallet: Option<String>,
    card_number: Option<Sensitive>,
    card_exp_month: Option<String>,
    card_exp_year: Option<String>,
    card_cvv2: Option<Sensitive>,
    card_token: Option<String>,
    auth: Option<YesNo>,
    recurring_first_trans_id: Option<String>,
    trans_id: Option<String>,
    amount: Option<String>,
    immediately: bool,
    pub(crate) req_token: Option<YesNo>,
    pub(crate) recurring_init: Option<YesNo>,
    async_flag: Option<YesNo>,
    ext: [Option<String>; 10],
    split_rules: SplitRules,
    hash_email: Option<String>,
    card_hash_part: Option<Sensitive>,
    credentials: Option<Auth>,
}

macro_rules! setters {
    ($($(#[$meta:meta])* $name:ident => $field:ident;)*) => {
        $(
            $(#[$meta])*
            pub fn $name(mut self, value: impl Into<String>) -> Self {
                self.$field = Some(value.into());
                self
            }
        )*
    };
}

impl Request {
    pub fn new(action: ActionCode) -> Self {
        Self {
            action: Some(action),
            ..Default::default()
        }
    }

    /// Request whose action code is the one `kind` expects.
    pub fn for_kind(kind: OperationKind) -> Self {
        Self::new(kind.action())
    }

    /// Sets merchant credentials. The key becomes `client_key`; the secret
    /// only feeds the signature.
    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.client_key = Some(auth.key.clone());
        self.credentials = Some(auth);
        self
    }

    pub fn with_action(mut self, action: ActionCode) -> Self {
        self.action = Some(action);
        self
    }

    setters! {
        with_client_key => client_key;
        with_channel_id => channel_id;
        with_payer_ip => payer_ip;
        with_term_url_3ds => term_url_3ds;
        with_order_id => order_id;
        /// Two-decimal order amount, e.g. `"10.00"`.
        with_order_amount => order_amount;
        with_order_currency => order_currency;
        with_submerchant_id => submerchant_id;
        with_order_description => order_description;
        /// Apple Pay or Google Pay token, already base64-encoded.
        with_payment_token => payment_token;
        with_payer_email => payer_email;
        with_payer_phone => payer_phone;
        with_payer_first_name => payer_first_name;
        with_payer_last_name => payer_last_name;
        with_payer_address => payer_address;
        with_payer_country => payer_country;
        with_payer_state => payer_state;
        with_payer_city => payer_city;
        with_payer_zip => payer_zip;
        with_customer_wallet => customer_wallet;
        with_card_exp_month => card_exp_month;
        with_card_exp_year => card_exp_year;
        with_card_token => card_token;
        with_recurring_first_trans_id => recurring_first_trans_id;
        with_trans_id => trans_id;
        /// Two-decimal amount used by capture, refund and payouts.
        with_amount => amount;
        /// Email entering trans-id signatures. Never transmitted.
        with_hash_email => hash_email;
    }

    pub fn with_card_number(mut self, value: impl Into<String>) -> Self {
        self.card_number = Some(Sensitive(value.into()));
        self
    }

    pub fn with_card_cvv2(mut self, value: impl Into<String>) -> Self {
        self.card_cvv2 = Some(Sensitive(value.into()));
        self
    }

    /// Card number (or a first6+last4 fragment) entering trans-id
    /// signatures. Never transmitted.
    pub fn with_card_hash_part(mut self, value: impl Into<String>) -> Self {
        self.card_hash_part = Some(Sensitive(value.into()));
        self
    }

    /// `auth=Y` places a hold instead of charging.
    pub fn with_auth_flag(mut self, flag: YesNo) -> Self {
        self.auth = Some(flag);
        self
    }

    /// Requests immediate capture. The gateway only accepts `Y`, so the field
    /// is omitted when `false`.
    pub fn with_immediately(mut self, immediately: bool) -> Self {
        self.immediately = immediately;
        self
    }

    pub fn with_req_token(mut self, flag: YesNo) -> Self {
        self.req_token = Some(flag);
        self
    }

    pub fn with_recurring_init(mut self, flag: YesNo) -> Self {
        self.recurring_init = Some(flag);
        self
    }

    pub fn with_async(mut self, flag: YesNo) -> Self {
        self.async_flag = Some(flag);
        self
    }

    /// Sets `ext{index}`, 1-based. Indexes outside `1..=10` are ignored.
    pub fn with_ext(mut self, index: usize, value: impl Into<String>) -> Self {
        if let Some(slot) = index.checked_sub(1).and_then(|i| self.ext.get_mut(i)) {
            *slot = Some(value.into());
        }
        self
    }

    pub fn with_split_rules(mut self, rules: SplitRules) -> Self {
        self.split_rules = rules;
        self
    }

    /// Applies `set` when `value` is present.
    ///
    /// ```ignore
    /// request.when(phone, Request::with_payer_phone)
    /// ```
    pub fn when<T>(self, value: Option<T>, set: impl FnOnce(Self, T) -> Self) -> Self {
        match value {
            Some(value) => set(self, value),
            None => self,
        }
    }

    pub fn action(&self) -> Option<ActionCode> {
        self.action
    }

    pub fn split_rules(&self) -> &SplitRules {
        &self.split_rules
    }

    /// Signs the request for `kind` and validates it.
    ///
    /// Format checks run first, then the signature is computed, unset
    /// `req_token`/`recurring_init` flags get their per-kind defaults and
    /// finally the per-kind rule table is applied.
    pub fn sign_and_prepare(mut self, kind: OperationKind) -> Result<SignedRequest, RequestError> {
        validate::check_shape(kind, &self)?;
        let hash = sign::sign(kind, &self)?;
        validate::apply_flag_defaults(kind, &mut self);
        validate::validate(kind, &self)?;
        Ok(SignedRequest {
            kind,
            request: self,
            hash,
        })
    }
}

impl SignInputs for Request {
    fn field(&self, field: Field) -> Option<&str> {
        let text = Option::<String>::as_deref;
        let flag = |v: &Option<YesNo>| v.map(|f| f.as_str());
        match field {
            Field::Action => self.action.map(|a| a.as_str()),
            Field::ClientKey => text(&self.client_key),
            Field::ChannelId => text(&self.channel_id),
            Field::PayerIp => text(&self.payer_ip),
            Field::TermUrl3ds => text(&self.term_url_3ds),
            Field::OrderId => text(&self.order_id),
            Field::OrderAmount => text(&self.order_amount),
            Field::OrderCurrency => text(&self.order_currency),
            Field::SubmerchantId => text(&self.submerchant_id),
            Field::OrderDescription => text(&self.order_description),
            Field::PaymentToken => text(&self.payment_token),
            Field::PayerEmail => text(&self.payer_email),
            Field::PayerPhone => text(&self.payer_phone),
            Field::PayerFirstName => text(&self.payer_first_name),
            Field::PayerLastName => text(&self.payer_last_name),
            Field::PayerAddress => text(&self.payer_address),
            Field::PayerCountry => text(&self.payer_country),
            Field::PayerState => text(&self.payer_state),
            Field::PayerCity => text(&self.payer_city),
            Field::PayerZip => text(&self.payer_zip),
            Field::CustomerWallet => text(&self.customer_wallet),
            Field::CardNumber => self.card_number.as_ref().map(|s| s.0.as_str()),
            Field::CardExpMonth => text(&self.card_exp_month),
            Field::CardExpYear => text(&self.card_exp_year),
            Field::CardCvv2 => self.card_cvv2.as_ref().map(|s| s.0.as_str()),
            Field::CardToken => text(&self.card_token),
            Field::Auth => flag(&self.auth),
            Field::RecurringFirstTransId => text(&self.recurring_first_trans_id),
            Field::TransId => text(&self.trans_id),
            Field::Amount => text(&self.amount),
            Field::Immediately => self.immediately.then_some(YesNo::Yes.as_str()),
            Field::ReqToken => flag(&self.req_token),
            Field::RecurringInit => flag(&self.recurring_init),
            Field::Async => flag(&self.async_flag),
            Field::Ext1 => text(&self.ext[0]),
            Field::Ext2 => text(&self.ext[1]),
            Field::Ext3 => text(&self.ext[2]),
            Field::Ext4 => text(&self.ext[3]),
            Field::Ext5 => text(&self.ext[4]),
            Field::Ext6 => text(&self.ext[5]),
            Field::Ext7 => text(&self.ext[6]),
            Field::Ext8 => text(&self.ext[7]),
            Field::Ext9 => text(&self.ext[8]),
            Field::Ext10 => text(&self.ext[9]),
            Field::HashEmail => text(&self.hash_email),
            Field::CardHashPart => self.card_hash_part.as_ref().map(|s| s.0.as_str()),
            Field::Hash | Field::SplitRules => None,
        }
    }

    fn secret(&self) -> Option<&str> {
        self.credentials.as_ref().map(Auth::secret)
    }
}

/// Plain string fields in transport order. `hash` and `split_rules` are
/// appended separately; internal signature helpers never appear.
const TRANSPORT_FIELDS: &[Field] = &[
    Field::Action,
    Field::ClientKey,
    Field::ChannelId,
    Field::PayerIp,
    Field::TermUrl3ds,
    Field::OrderId,
    Field::OrderAmount,
    Field::OrderCurrency,
    Field::SubmerchantId,
    Field::OrderDescription,
    Field::PaymentToken,
    Field::PayerEmail,
    Field::PayerPhone,
    Field::PayerFirstName,
    Field::PayerLastName,
    Field::PayerAddress,
    Field::PayerCountry,
    Field::PayerState,
    Field::PayerCity,
    Field::PayerZip,
    Field::CustomerWallet,
    Field::CardNumber,
    Field::CardExpMonth,
    Field::CardExpYear,
    Field::CardCvv2,
    Field::CardToken,
    Field::Auth,
    Field::RecurringFirstTransId,
    Field::TransId,
    Field::Amount,
    Field::Immediately,
    Field::ReqToken,
    Field::RecurringInit,
    Field::Async,
    Field::Ext1,
    Field::Ext2,
    Field::Ext3,
    Field::Ext4,
    Field::Ext5,
    Field::Ext6,
    Field::Ext7,
    Field::Ext8,
    Field::Ext9,
    Field::Ext10,
];

/// A request that passed signing and validation.
///
/// Immutable; only the transport map can be derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedRequest {
    kind: OperationKind,
    request: Request,
    hash: Signature,
}

impl SignedRequest {
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn hash(&self) -> &Signature {
        &self.hash
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Flat transport map: non-empty fields, the signature and, when
    /// present, the JSON-encoded split rules.
    pub fn to_form(&self) -> FormFields {
        let mut form: FormFields = TRANSPORT_FIELDS
            .iter()
            .filter_map(|field| {
                self.request
                    .field(*field)
                    .filter(|v| !v.is_empty())
                    .map(|v| (field.name().to_string(), v.to_string()))
            })
            .collect();
        form.insert(
            Field::Hash.name().to_string(),
            self.hash.as_str().to_string(),
        );
        if !self.request.split_rules.is_empty() {
            form.insert(
                Field::SplitRules.name().to_string(),
                self.request.split_rules.to_wire_json(),
            );
        }
        form
    }
}
