//! Rust client for the Platon payment gateway.
//!
//! This crate sends signed card, token, wallet, status, capture, refund and
//! payout requests to Platon, resolves client-server card verification into a
//! purchase URL, and exposes the pure signing and callback-verification layer
//! from [`platon_types`].
//!
//! # Modules
//!
//! - [`client`] - [`PlatonClient`](client::PlatonClient), the async HTTP client.
//! - [`config`] - JSON client configuration with `.env` support.
//! - [`recorder`] - [`Recorder`](recorder::Recorder) hook for auditing gateway exchanges.
//! - [`request`] - Merchant-level payment model and per-flow request builders.
//! - [`types`] - Re-export of [`platon_types`]: signatures, validation, webhooks.
//!
//! # Feature Flags
//!
//! - `telemetry` - Emits [`tracing`](https://docs.rs/tracing) spans for each
//!   gateway call and records their outcome.
//!
//! # Example
//!
//! ```rust
//! use platon_rs::request::{Card, PaymentData, PaymentMethod, PaymentRequest, PersonalData};
//! use platon_rs::types::config::MerchantConfig;
//!
//! let mut merchant = MerchantConfig::new("CLIENT", "secret123");
//! merchant.term_url_3ds = Some("https://merchant.example/3ds".into());
//!
//! let request = PaymentRequest {
//!     merchant: Some(merchant),
//!     personal_data: Some(PersonalData {
//!         email: Some("payer@example.com".into()),
//!         ..Default::default()
//!     }),
//!     payment_data: Some(PaymentData {
//!         payment_id: Some("order-1".into()),
//!         amount: 1250,
//!         description: "Coffee".into(),
//!         ..Default::default()
//!     }),
//!     payment_method: Some(PaymentMethod {
//!         card: Some(Card {
//!             token: Some("TOKEN123".into()),
//!             ..Default::default()
//!         }),
//!         ..Default::default()
//!     }),
//! };
//!
//! let dispatch = request.payment().unwrap();
//! assert_eq!(dispatch.fields()["order_amount"], "12.50");
//! assert_eq!(dispatch.request.hash().as_str(), "03838ac02c89b98621f95ec98a68aa14");
//! ```

pub mod client;
pub mod config;
pub mod recorder;
pub mod request;

pub use platon_types as types;
