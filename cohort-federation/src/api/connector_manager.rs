//! Inbound interface used by components that want federation connector events.

use crate::{ConnectorConsumer, FederationCoordinator, SubscriberId};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait ConnectorManager: Send + Sync {
    /// Registers `consumer`; it first receives a replay of the current connectors.
    async fn subscribe(&self, consumer: Arc<dyn ConnectorConsumer>) -> SubscriberId;

    async fn unsubscribe(&self, subscriber_id: SubscriberId);
}

#[async_trait]
impl ConnectorManager for FederationCoordinator {
    async fn subscribe(&self, consumer: Arc<dyn ConnectorConsumer>) -> SubscriberId {
        FederationCoordinator::subscribe(self, consumer).await
    }

    async fn unsubscribe(&self, subscriber_id: SubscriberId) {
        FederationCoordinator::unsubscribe(self, subscriber_id).await
    }
}
