//! Per metadata collection id serialization of registry changes and the fan-outs they cause.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

pub(crate) type RegistrationGuard = OwnedMutexGuard<()>;

/// Hands out one async lock per metadata collection id.
///
/// A holder sees the registration and every subscriber callback for that id without
/// interleaving from other announcements or replays of the same id.
pub(crate) struct RegistrationLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl RegistrationLocks {
    pub(crate) fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) async fn lock(&self, metadata_collection_id: &str) -> RegistrationGuard {
        let lock = self.handle(metadata_collection_id).await;
        lock.lock_owned().await
    }

    /// Locks every id in ascending order; callers holding one id never wait for another.
    pub(crate) async fn lock_all(
        &self,
        metadata_collection_ids: &BTreeSet<String>,
    ) -> Vec<RegistrationGuard> {
        let mut guards = Vec::with_capacity(metadata_collection_ids.len());
        for metadata_collection_id in metadata_collection_ids {
            guards.push(self.lock(metadata_collection_id).await);
        }
        guards
    }

    async fn handle(&self, metadata_collection_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        // a handle referenced only by the map is neither held nor awaited
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks
            .entry(metadata_collection_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }
}
