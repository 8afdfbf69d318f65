//! Inbound interface used by the cohort discovery layer.

use crate::{ConnectionDescriptor, FederationCoordinator, FederationError, RepositoryIdentity};
use async_trait::async_trait;

/// Receives cohort membership announcements.
///
/// Only joins can fail; leaves and departures are applied unconditionally.
#[async_trait]
pub trait CohortConnectionConsumer: Send + Sync {
    async fn announce_join_or_refresh(
        &self,
        cohort_name: &str,
        identity: RepositoryIdentity,
        connection: ConnectionDescriptor,
    ) -> Result<(), FederationError>;

    async fn announce_leave(&self, cohort_name: &str, metadata_collection_id: &str);

    async fn announce_group_departure(&self, cohort_name: &str);
}

#[async_trait]
impl CohortConnectionConsumer for FederationCoordinator {
    async fn announce_join_or_refresh(
        &self,
        cohort_name: &str,
        identity: RepositoryIdentity,
        connection: ConnectionDescriptor,
    ) -> Result<(), FederationError> {
        FederationCoordinator::announce_join_or_refresh(self, cohort_name, identity, connection)
            .await
    }

    async fn announce_leave(&self, cohort_name: &str, metadata_collection_id: &str) {
        FederationCoordinator::announce_leave(self, cohort_name, metadata_collection_id).await
    }

    async fn announce_group_departure(&self, cohort_name: &str) {
        FederationCoordinator::announce_group_departure(self, cohort_name).await
    }
}
