//! autodeploy GitHub webhook adapter.
//!
//! Knows GitHub's webhook wire format and nothing else:
//!
//! - [`signature`]: `X-Hub-Signature-256` HMAC-SHA256 verification over the
//!   raw request body.
//! - [`classify`]: turns a payload into a [`pipeline::WebhookEvent`] (ping or
//!   push), or explains why it was ignored.
//! - [`payload`]: serde models for the fields autodeploy reads.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain domain rules. The
//! [`pipeline`] crate sees only [`pipeline::WebhookEvent`].

pub mod classify;
pub mod payload;
pub mod signature;

pub use classify::{classify, ClassifyError};
pub use signature::{sign, verify, SignatureError, WebhookSecret, SIGNATURE_HEADER};
