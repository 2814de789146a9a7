//! Per-process update serialization.
//!
//! Two deliveries for the same repository may overlap. Without coordination
//! both would pull, build and reload the same working directory at once. The
//! orchestrator holds the lock for a process from the manifest snapshot until
//! reload returns, so overlapping deliveries for one process run one after the
//! other while different processes stay independent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::ProcessId;

/// Registry of async locks keyed by process id. Cheap to clone; clones share
/// the same registry.
#[derive(Debug, Clone, Default)]
pub struct ProcessLocks {
    inner: Arc<Mutex<HashMap<ProcessId, Arc<AsyncMutex<()>>>>>,
}

impl ProcessLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other holder has the lock for `id`, then returns a guard
    /// that releases it on drop.
    pub async fn acquire(&self, id: &ProcessId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self
                .inner
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            // Drop entries nobody is holding or waiting on.
            map.retain(|key, lock| key == id || Arc::strong_count(lock) > 1);
            Arc::clone(map.entry(id.clone()).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of processes currently tracked.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_same_process_is_serialized() {
        let locks = ProcessLocks::new();
        let id = ProcessId::new("1").unwrap();

        let guard = locks.acquire(&id).await;
        let waiter = {
            let locks = locks.clone();
            let id = id.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&id).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_processes_are_independent() {
        let locks = ProcessLocks::new();
        let _a = locks.acquire(&ProcessId::new("a").unwrap()).await;
        let b = tokio::time::timeout(
            Duration::from_secs(1),
            locks.acquire(&ProcessId::new("b").unwrap()),
        )
        .await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_idle_entries_are_pruned() {
        let locks = ProcessLocks::new();
        drop(locks.acquire(&ProcessId::new("a").unwrap()).await);
        drop(locks.acquire(&ProcessId::new("b").unwrap()).await);
        assert_eq!(locks.len(), 1);
    }
}
