//! Supervisor connection readiness.
//!
//! The supervisor handshake happens once, at startup. Until it succeeds the
//! gate is closed and the receiver answers signed deliveries with `503`, so no
//! delivery ever runs against an unconnected supervisor.

use std::sync::{Arc, OnceLock};

use pipeline::{DeliveryHandler, ProcessSupervisor, SupervisorError};
use tracing::{error, info};

/// One-shot gate holding the delivery handler once the supervisor is connected.
///
/// Cheap to clone; clones observe the same gate.
#[derive(Clone, Default)]
pub struct ReadinessGate {
    handler: Arc<OnceLock<Arc<DeliveryHandler>>>,
}

impl ReadinessGate {
    /// A closed gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// An already open gate, for callers that connected beforehand.
    pub fn ready(handler: DeliveryHandler) -> Self {
        let gate = Self::new();
        gate.open(handler);
        gate
    }

    /// Opens the gate. Later calls are ignored.
    pub fn open(&self, handler: DeliveryHandler) {
        if self.handler.set(Arc::new(handler)).is_err() {
            tracing::debug!("Readiness gate already open");
        }
    }

    /// The delivery handler, if the gate is open.
    pub fn handler(&self) -> Option<Arc<DeliveryHandler>> {
        self.handler.get().cloned()
    }

    pub fn is_ready(&self) -> bool {
        self.handler.get().is_some()
    }
}

impl std::fmt::Debug for ReadinessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadinessGate")
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// Performs the supervisor handshake and opens `gate` on success.
///
/// On failure the gate stays closed and the error is returned to the caller,
/// which decides whether the daemon can continue.
pub async fn connect_and_open(
    gate: &ReadinessGate,
    supervisor: Arc<dyn ProcessSupervisor>,
    handler: DeliveryHandler,
) -> Result<(), SupervisorError> {
    match supervisor.connect().await {
        Ok(()) => {
            info!("Connected to process supervisor");
            gate.open(handler);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Could not connect to process supervisor");
            Err(e)
        }
    }
}
