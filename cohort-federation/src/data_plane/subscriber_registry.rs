//! Registered connector consumers and their retirement gates.

use crate::observability::events;
use crate::ConnectorConsumer;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

const COMPONENT: &str = "subscriber_registry";

/// Opaque token returned by subscribe, used only to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for SubscriberId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

tokio::task_local! {
    // Set while one of that subscriber's callbacks is being polled.
    static DELIVERING_TO: SubscriberId;
}

pub(crate) struct SubscriberEntry {
    id: SubscriberId,
    consumer: Arc<dyn ConnectorConsumer>,
    // Read side held for one callback; write side drains them on removal.
    in_flight: RwLock<()>,
    retired: AtomicBool,
    // metadata collection id -> registration generation already handed over
    handovers: Mutex<HashMap<String, u64>>,
}

impl SubscriberEntry {
    fn new(consumer: Arc<dyn ConnectorConsumer>) -> Self {
        Self {
            id: SubscriberId::generate(),
            consumer,
            in_flight: RwLock::new(()),
            retired: AtomicBool::new(false),
            handovers: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn id(&self) -> SubscriberId {
        self.id
    }

    /// Runs `call` against the consumer unless the entry has been retired.
    pub(crate) async fn with_active_consumer<F, Fut>(&self, call: F) -> Option<Fut::Output>
    where
        F: FnOnce(Arc<dyn ConnectorConsumer>) -> Fut,
        Fut: Future,
    {
        let _in_flight = self.in_flight.read().await;
        if self.retired.load(Ordering::SeqCst) {
            return None;
        }
        Some(
            DELIVERING_TO
                .scope(self.id, call(self.consumer.clone()))
                .await,
        )
    }

    pub(crate) async fn has_received(&self, metadata_collection_id: &str, generation: u64) -> bool {
        self.handovers.lock().await.get(metadata_collection_id) == Some(&generation)
    }

    pub(crate) async fn record_handover(&self, metadata_collection_id: &str, generation: u64) {
        self.handovers
            .lock()
            .await
            .insert(metadata_collection_id.to_string(), generation);
    }

    pub(crate) async fn forget_handover(&self, metadata_collection_id: &str) {
        self.handovers.lock().await.remove(metadata_collection_id);
    }

    pub(crate) async fn forget_all_handovers(&self) {
        self.handovers.lock().await.clear();
    }

    /// Blocks later callbacks, then waits for in-flight ones. From inside one of this
    /// subscriber's own callbacks it returns without waiting.
    async fn retire(&self) {
        self.retired.store(true, Ordering::SeqCst);

        if DELIVERING_TO
            .try_with(|delivering_to| *delivering_to == self.id)
            .unwrap_or(false)
        {
            debug!(
                event = events::SUBSCRIBER_RETIRED_FROM_CALLBACK,
                component = COMPONENT,
                subscriber_id = %self.id,
                "unsubscribed from inside its own callback"
            );
            return;
        }
        drop(self.in_flight.write().await);
    }
}

pub(crate) struct SubscriberRegistry {
    entries: Mutex<Vec<Arc<SubscriberEntry>>>,
}

impl SubscriberRegistry {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    pub(crate) async fn add(&self, consumer: Arc<dyn ConnectorConsumer>) -> Arc<SubscriberEntry> {
        let entry = Arc::new(SubscriberEntry::new(consumer));
        self.entries.lock().await.push(entry.clone());

        debug!(
            event = events::SUBSCRIBER_ADDED,
            component = COMPONENT,
            subscriber_id = %entry.id(),
            "subscriber added"
        );
        entry
    }

    /// Returns `false` when no entry has this id.
    pub(crate) async fn remove(&self, subscriber_id: SubscriberId) -> bool {
        let removed = {
            let mut entries = self.entries.lock().await;
            entries
                .iter()
                .position(|entry| entry.id() == subscriber_id)
                .map(|index| entries.remove(index))
        };

        let Some(entry) = removed else {
            return false;
        };

        // list lock released first so fan-outs already holding this entry can finish
        entry.retire().await;
        debug!(
            event = events::SUBSCRIBER_REMOVED,
            component = COMPONENT,
            subscriber_id = %subscriber_id,
            "subscriber removed"
        );
        true
    }

    pub(crate) async fn snapshot(&self) -> Vec<Arc<SubscriberEntry>> {
        self.entries.lock().await.clone()
    }

    pub(crate) async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::SubscriberRegistry;
    use crate::{ConnectorConsumer, FederationError, RepositoryConnector};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    #[derive(Default)]
    struct CountingConsumer {
        removals: AtomicUsize,
    }

    #[async_trait]
    impl ConnectorConsumer for CountingConsumer {
        async fn set_local_connector(
            &self,
            _metadata_collection_id: &str,
            _connector: Arc<dyn RepositoryConnector>,
        ) -> Result<(), FederationError> {
            Ok(())
        }

        async fn add_remote_connector(
            &self,
            _metadata_collection_id: &str,
            _connector: Arc<dyn RepositoryConnector>,
        ) -> Result<(), FederationError> {
            Ok(())
        }

        async fn remove_remote_connector(
            &self,
            _metadata_collection_id: &str,
        ) -> Result<(), FederationError> {
            self.removals.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn disconnect_all_connectors(&self) -> Result<(), FederationError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn add_generates_distinct_ids() {
        let registry = SubscriberRegistry::new();

        let first = registry.add(Arc::new(CountingConsumer::default())).await;
        let second = registry.add(Arc::new(CountingConsumer::default())).await;

        assert_ne!(first.id(), second.id());
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn remove_unknown_id_is_a_no_op() {
        let registry = SubscriberRegistry::new();
        let entry = registry.add(Arc::new(CountingConsumer::default())).await;

        assert!(registry.remove(entry.id()).await);
        assert!(!registry.remove(entry.id()).await);
        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test]
    async fn snapshot_is_not_affected_by_later_removal() {
        let registry = SubscriberRegistry::new();
        let entry = registry.add(Arc::new(CountingConsumer::default())).await;

        let snapshot = registry.snapshot().await;
        registry.remove(entry.id()).await;

        assert_eq!(snapshot.len(), 1);
        assert!(registry.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn retired_entry_rejects_callbacks() {
        let registry = SubscriberRegistry::new();
        let consumer = Arc::new(CountingConsumer::default());
        let entry = registry.add(consumer.clone()).await;

        let delivered = entry
            .with_active_consumer(|c| async move { c.remove_remote_connector("mc-1").await })
            .await;
        assert!(matches!(delivered, Some(Ok(()))));

        registry.remove(entry.id()).await;
        let skipped = entry
            .with_active_consumer(|c| async move { c.remove_remote_connector("mc-1").await })
            .await;

        assert!(skipped.is_none());
        assert_eq!(consumer.removals.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unsubscribing_from_inside_own_callback_does_not_hang() {
        let registry = SubscriberRegistry::new();
        let consumer = Arc::new(CountingConsumer::default());
        let entry = registry.add(consumer.clone()).await;
        let subscriber_id = entry.id();

        let removed = timeout(
            Duration::from_secs(1),
            entry.with_active_consumer(|_consumer| registry.remove(subscriber_id)),
        )
        .await
        .expect("remove returns from inside the callback");

        assert_eq!(removed, Some(true));
        assert_eq!(registry.len().await, 0);
        let after = entry
            .with_active_consumer(|c| async move { c.remove_remote_connector("mc-1").await })
            .await;
        assert!(after.is_none());
        assert_eq!(consumer.removals.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn handovers_are_tracked_per_generation() {
        let registry = SubscriberRegistry::new();
        let entry = registry.add(Arc::new(CountingConsumer::default())).await;

        entry.record_handover("mc-1", 3).await;
        assert!(entry.has_received("mc-1", 3).await);
        assert!(!entry.has_received("mc-1", 4).await);
        assert!(!entry.has_received("mc-2", 3).await);

        entry.forget_handover("mc-1").await;
        assert!(!entry.has_received("mc-1", 3).await);

        entry.record_handover("mc-2", 5).await;
        entry.forget_all_handovers().await;
        assert!(!entry.has_received("mc-2", 5).await);
    }

    #[tokio::test]
    async fn remove_waits_for_in_flight_callback() {
        let registry = Arc::new(SubscriberRegistry::new());
        let consumer = Arc::new(CountingConsumer::default());
        let entry = registry.add(consumer.clone()).await;
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();

        let in_flight = tokio::spawn({
            let entry = entry.clone();
            async move {
                entry
                    .with_active_consumer(|c| async move {
                        let _ = started_tx.send(());
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        c.remove_remote_connector("mc-1").await
                    })
                    .await
            }
        });

        started_rx.await.expect("callback started");
        assert!(registry.remove(entry.id()).await);

        // the callback finished before remove returned
        assert_eq!(consumer.removals.load(Ordering::SeqCst), 1);
        assert!(matches!(
            in_flight.await.expect("task joined"),
            Some(Ok(()))
        ));
    }
}
