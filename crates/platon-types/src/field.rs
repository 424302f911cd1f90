//! Wire names of outbound request fields.

use std::fmt;
use std::fmt::{Display, Formatter};

/// Every field an outbound [`Request`](crate::request::Request) can carry.
///
/// Signature recipes, validation rules and transport serialization all
/// address request values through this enum, so a field is spelled once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Action,
    ClientKey,
    Hash,
    ChannelId,
    PayerIp,
    TermUrl3ds,
    OrderId,
    OrderAmount,
    OrderCurrency,
    SubmerchantId,
    OrderDescription,
    PaymentToken,
    PayerEmail,
    PayerPhone,
    PayerFirstName,
    PayerLastName,
    PayerAddress,
    PayerCountry,
    PayerState,
    PayerCity,
    PayerZip,
    CustomerWallet,
    CardNumber,
    CardExpMonth,
    CardExpYear,
    CardCvv2,
    CardToken,
    Auth,
    RecurringFirstTransId,
    TransId,
    Amount,
    Immediately,
    ReqToken,
    RecurringInit,
    Async,
    Ext1,
    Ext2,
    Ext3,
    Ext4,
    Ext5,
    Ext6,
    Ext7,
    Ext8,
    Ext9,
    Ext10,
    SplitRules,
    /// Email used only for trans-id signatures. Never transmitted.
    HashEmail,
    /// Card number or its first6+last4 fragment used only for trans-id
    /// signatures. Never transmitted.
    CardHashPart,
}

impl Field {
    /// Extension slots in wire order.
    pub const EXT: [Field; 10] = [
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

    pub fn name(&self) -> &'static str {
        match self {
            Field::Action => "action",
            Field::ClientKey => "client_key",
            Field::Hash => "hash",
            Field::ChannelId => "channel_id",
            Field::PayerIp => "payer_ip",
            Field::TermUrl3ds => "term_url_3ds",
            Field::OrderId => "order_id",
            Field::OrderAmount => "order_amount",
            Field::OrderCurrency => "order_currency",
            Field::SubmerchantId => "submerchant_id",
            Field::OrderDescription => "order_description",
            Field::PaymentToken => "payment_token",
            Field::PayerEmail => "payer_email",
            Field::PayerPhone => "payer_phone",
            Field::PayerFirstName => "payer_first_name",
            Field::PayerLastName => "payer_last_name",
            Field::PayerAddress => "payer_address",
            Field::PayerCountry => "payer_country",
            Field::PayerState => "payer_state",
            Field::PayerCity => "payer_city",
            Field::PayerZip => "payer_zip",
            Field::CustomerWallet => "customer_wallet",
            Field::CardNumber => "card_number",
            Field::CardExpMonth => "card_exp_month",
            Field::CardExpYear => "card_exp_year",
            Field::CardCvv2 => "card_cvv2",
            Field::CardToken => "card_token",
            Field::Auth => "auth",
            Field::RecurringFirstTransId => "recurring_first_trans_id",
            Field::TransId => "trans_id",
            Field::Amount => "amount",
            Field::Immediately => "immediately",
            Field::ReqToken => "req_token",
            Field::RecurringInit => "recurring_init",
            Field::Async => "async",
            Field::Ext1 => "ext1",
            Field::Ext2 => "ext2",
            Field::Ext3 => "ext3",
            Field::Ext4 => "ext4",
            Field::Ext5 => "ext5",
            Field::Ext6 => "ext6",
            Field::Ext7 => "ext7",
            Field::Ext8 => "ext8",
            Field::Ext9 => "ext9",
            Field::Ext10 => "ext10",
            Field::SplitRules => "split_rules",
            Field::HashEmail => "hash_email",
            Field::CardHashPart => "card_hash_part",
        }
    }

    /// Internal helpers feed signatures but never reach the transport map.
    pub fn is_internal(&self) -> bool {
        matches!(self, Field::HashEmail | Field::CardHashPart)
    }

    /// Returns the extension slot for a 1-based index.
    pub fn ext(index: usize) -> Option<Field> {
        index.checked_sub(1).and_then(|i| Field::EXT.get(i).copied())
    }
}

impl Display for Field {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
