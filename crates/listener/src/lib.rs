//! autodeploy webhook event source.
//!
//! Binds an HTTP server (axum) and receives GitHub webhook deliveries directly.
//! Every request's HMAC-SHA256 signature is checked against the raw body before
//! anything else happens. Accepted deliveries are answered immediately and
//! processed on a spawned task by the [`pipeline::DeliveryHandler`].
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Transport details live here. The [`pipeline`] crate sees
//! only [`pipeline::WebhookEvent`] values produced by the [`github`] classifier.

pub mod readiness;
pub mod server;
pub mod task;

pub use readiness::{connect_and_open, ReadinessGate};
pub use server::{create_router, serve, WebhookState};
pub use task::spawn_delivery;
