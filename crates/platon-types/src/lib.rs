#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for the Platon payment gateway.
//!
//! Every outbound request and every inbound callback is authenticated with a
//! per-operation keyed MD5 digest over a canonical string. This crate holds
//! the pure, synchronous part of the integration: recipes, validation and
//! the wire shapes. It performs no I/O.
//!
//! # Modules
//!
//! - [`operation`] - Operation kinds, action codes and `Y`/`N` flags
//! - [`sign`] - Canonical-string builder and the signature recipe registry
//! - [`validate`] - Format checks and per-kind rule tables
//! - [`split`] - Split rules across sub-merchants
//! - [`request`] - Outbound request assembly and its transport map
//! - [`webhook`] - Inbound callback decoding and verification
//! - [`verification`] - Client-server card verification form
//! - [`response`] - Gateway response envelope
//! - [`config`] - Merchant configuration with environment references
//! - [`util`] - Helper types (base64, wire literals, money amounts)
//!
//! # Example
//!
//! ```rust
//! use platon_types::auth::Auth;
//! use platon_types::operation::OperationKind;
//! use platon_types::request::Request;
//!
//! let signed = Request::for_kind(OperationKind::GetSubmerchant)
//!     .with_auth(Auth::new("CLIENT", "secret123"))
//!     .with_submerchant_id("12345678")
//!     .sign_and_prepare(OperationKind::GetSubmerchant)
//!     .unwrap();
//! assert_eq!(signed.hash().as_str(), "15f549d19f26ce89022396a649c4ac9f");
//! ```

pub mod auth;
pub mod config;
pub mod currency;
pub mod field;
pub mod operation;
pub mod request;
pub mod response;
pub mod sign;
pub mod split;
pub mod util;
pub mod validate;
pub mod verification;
pub mod webhook;
