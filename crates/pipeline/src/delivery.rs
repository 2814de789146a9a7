//! Handling of one accepted webhook delivery.
//!
//! By the time a delivery reaches [`DeliveryHandler::handle`] the sender has
//! already been answered, so nothing here is reported back over HTTP. Outcomes
//! are visible in the logs only.

use std::sync::Arc;

use tracing::{info, info_span, warn, Instrument};

use crate::matcher::{match_candidates, match_with_inspection};
use crate::{
    DeliveryError, DeliveryId, DeliveryReport, PingEvent, ProcessSupervisor, PushEvent,
    RemoteInspector, Timestamp, UpdateOrchestrator, WebhookEvent,
};

/// Resolves the inventory, matches, and orchestrates updates for one delivery.
#[derive(Clone)]
pub struct DeliveryHandler {
    supervisor: Arc<dyn ProcessSupervisor>,
    orchestrator: UpdateOrchestrator,
    inspector: Option<Arc<dyn RemoteInspector>>,
}

impl DeliveryHandler {
    pub fn new(supervisor: Arc<dyn ProcessSupervisor>, orchestrator: UpdateOrchestrator) -> Self {
        Self {
            supervisor,
            orchestrator,
            inspector: None,
        }
    }

    /// Enables on-disk matching for processes without recorded versioning
    /// metadata.
    pub fn with_remote_inspection(mut self, inspector: Arc<dyn RemoteInspector>) -> Self {
        self.inspector = Some(inspector);
        self
    }

    /// Processes one classified event.
    ///
    /// Returns the delivery report for pushes and `None` for pings. Per-process
    /// failures are inside the report; only an inventory failure is an `Err`.
    pub async fn handle(
        &self,
        delivery: DeliveryId,
        event: WebhookEvent,
    ) -> Result<Option<DeliveryReport>, DeliveryError> {
        let span = info_span!("delivery", delivery_id = %delivery);
        async {
            match event {
                WebhookEvent::Ping(ping) => {
                    log_ping(&ping);
                    Ok(None)
                }
                WebhookEvent::Push(push) => self.handle_push(delivery, &push).await.map(Some),
            }
        }
        .instrument(span)
        .await
    }

    async fn handle_push(
        &self,
        delivery: DeliveryId,
        push: &PushEvent,
    ) -> Result<DeliveryReport, DeliveryError> {
        let started_at = Timestamp::now();
        info!(
            repository = push.repository_name.as_deref().unwrap_or("unknown"),
            git_ref = %push.ref_name,
            before = %push.before_commit,
            head = %push.head_commit,
            "Push received"
        );

        let inventory = self
            .supervisor
            .list_processes()
            .await
            .map_err(DeliveryError::InventoryUnavailable)?;

        let candidates = match &self.inspector {
            Some(inspector) => match_with_inspection(push, &inventory, inspector.as_ref()).await,
            None => match_candidates(push, &inventory),
        };
        let ids: Vec<&str> = candidates.iter().map(|c| c.process_id.as_str()).collect();
        info!(
            inventory = inventory.len(),
            matched = candidates.len(),
            processes = ?ids,
            "Trying to pull"
        );

        let outcomes = self.orchestrator.run(&candidates).await;
        let report = DeliveryReport {
            delivery_id: delivery,
            started_at,
            inventory_size: inventory.len(),
            outcomes,
        };
        if report.failed() > 0 {
            warn!(
                started_at = %report.started_at,
                succeeded = report.succeeded(),
                failed = report.failed(),
                "Delivery finished with failures"
            );
        } else {
            info!(
                started_at = %report.started_at,
                succeeded = report.succeeded(),
                "Delivery finished"
            );
        }
        Ok(report)
    }
}

fn log_ping(ping: &PingEvent) {
    info!(
        repository = ping.repository_name.as_deref().unwrap_or("unknown"),
        zen = %ping.zen_message,
        "Ping"
    );
}
