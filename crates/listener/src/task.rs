//! Background processing of an accepted delivery.
//!
//! The HTTP response is sent before any of this runs. Every failure is caught
//! here and logged; none escapes the task, and a panic inside the handler is
//! reported rather than tearing down the daemon.

use std::sync::Arc;

use axum::body::Bytes;
use pipeline::{DeliveryError, DeliveryHandler, DeliveryId, DeliveryReport};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Spawns processing of one delivery's raw body.
///
/// The returned handle resolves to the delivery report for pushes that reached
/// the orchestrator, and `None` for everything else.
pub fn spawn_delivery(
    handler: Arc<DeliveryHandler>,
    delivery: DeliveryId,
    body: Bytes,
) -> JoinHandle<Option<DeliveryReport>> {
    let work = tokio::spawn(process_delivery(handler, delivery, body));
    tokio::spawn(async move {
        match work.await {
            Ok(report) => report,
            Err(e) => {
                let err = DeliveryError::Aborted {
                    delivery: delivery.to_string(),
                    message: e.to_string(),
                };
                error!(delivery_id = %delivery, error = %err, "Delivery task failed");
                None
            }
        }
    })
}

async fn process_delivery(
    handler: Arc<DeliveryHandler>,
    delivery: DeliveryId,
    body: Bytes,
) -> Option<DeliveryReport> {
    let event = match github::classify(&body) {
        Ok(event) => event,
        Err(e) => {
            info!(delivery_id = %delivery, reason = %e, "Ignoring webhook payload");
            return None;
        }
    };

    match handler.handle(delivery, event).await {
        Ok(report) => report,
        Err(e) => {
            error!(delivery_id = %delivery, error = %e, "Delivery aborted");
            None
        }
    }
}
