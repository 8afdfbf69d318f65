//! Remote registration store keyed by metadata collection id, with cohort membership counting.

use crate::control_plane::local_binding::LocalBinding;
use crate::observability::{events, fields};
use crate::{ConnectionDescriptor, FederationError, RepositoryConnector, RepositoryIdentity};
use arc_swap::ArcSwapOption;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const COMPONENT: &str = "connector_registry";

/// One remote repository's presence in the federation.
///
/// Handed out only as point-in-time copies; the registry owns the live entry.
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteRegistration {
    identity: RepositoryIdentity,
    connection: ConnectionDescriptor,
    memberships: BTreeSet<String>,
    // Bumped whenever subscribers need a new connector for this id.
    generation: u64,
}

impl RemoteRegistration {
    fn new(
        cohort_name: &str,
        identity: &RepositoryIdentity,
        connection: &ConnectionDescriptor,
        generation: u64,
    ) -> Self {
        Self {
            identity: identity.clone(),
            connection: connection.clone(),
            memberships: BTreeSet::from([cohort_name.to_string()]),
            generation,
        }
    }

    pub fn metadata_collection_id(&self) -> &str {
        &self.identity.metadata_collection_id
    }

    pub fn identity(&self) -> &RepositoryIdentity {
        &self.identity
    }

    pub fn connection(&self) -> &ConnectionDescriptor {
        &self.connection
    }

    pub fn memberships(&self) -> &BTreeSet<String> {
        &self.memberships
    }

    pub fn is_member_of(&self, cohort_name: &str) -> bool {
        self.memberships.contains(cohort_name)
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Display fields only; the id never changes.
    fn refresh_display_fields(&mut self, identity: &RepositoryIdentity) {
        self.identity.metadata_collection_name = identity.metadata_collection_name.clone();
        self.identity.server_name = identity.server_name.clone();
        self.identity.server_type = identity.server_type.clone();
        self.identity.owning_organization_name = identity.owning_organization_name.clone();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Refreshed,
    Unchanged,
}

impl UpsertOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpsertOutcome::Created => "created",
            UpsertOutcome::Refreshed => "refreshed",
            UpsertOutcome::Unchanged => "unchanged",
        }
    }

    /// Whether subscribers need a fresh connector for this outcome.
    pub fn needs_fan_out(&self) -> bool {
        !matches!(self, UpsertOutcome::Unchanged)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetractOutcome {
    RemovedEntirely,
    StillMember,
    /// Unknown id, or the cohort never asserted it.
    NotRegistered,
}

/// What a group retraction changed, read under a single registry lock.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct GroupRetraction {
    pub(crate) removed: Vec<String>,
    pub(crate) remaining_registrations: usize,
}

pub(crate) struct ConnectorRegistry {
    capacity: usize,
    next_generation: AtomicU64,
    registrations: Mutex<HashMap<String, RemoteRegistration>>,
    local_binding: ArcSwapOption<LocalBinding>,
}

impl ConnectorRegistry {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            next_generation: AtomicU64::new(1),
            registrations: Mutex::new(HashMap::new()),
            local_binding: ArcSwapOption::empty(),
        }
    }

    pub(crate) async fn find(&self, metadata_collection_id: &str) -> Option<RemoteRegistration> {
        self.registrations
            .lock()
            .await
            .get(metadata_collection_id)
            .cloned()
    }

    pub(crate) async fn len(&self) -> usize {
        self.registrations.lock().await.len()
    }

    /// Heartbeat check: `true` when the cohort already asserts this exact connection.
    ///
    /// Display fields are refreshed in place on a match; nothing changes otherwise.
    pub(crate) async fn refresh_if_current(
        &self,
        cohort_name: &str,
        identity: &RepositoryIdentity,
        connection: &ConnectionDescriptor,
    ) -> bool {
        let mut registrations = self.registrations.lock().await;
        match registrations.get_mut(&identity.metadata_collection_id) {
            Some(registration)
                if registration.connection == *connection
                    && registration.is_member_of(cohort_name) =>
            {
                registration.refresh_display_fields(identity);
                true
            }
            _ => false,
        }
    }

    pub(crate) async fn upsert(
        &self,
        cohort_name: &str,
        identity: &RepositoryIdentity,
        connection: &ConnectionDescriptor,
    ) -> Result<UpsertOutcome, FederationError> {
        let metadata_collection_id = identity.metadata_collection_id.as_str();
        let mut registrations = self.registrations.lock().await;

        let Some(registration) = registrations.get_mut(metadata_collection_id) else {
            if registrations.len() >= self.capacity {
                warn!(
                    event = events::REGISTRY_CAPACITY_EXCEEDED,
                    component = COMPONENT,
                    cohort = cohort_name,
                    metadata_collection_id,
                    capacity = self.capacity,
                    "registry is full, refusing new registration"
                );
                return Err(FederationError::RegistryCapacityExceeded {
                    metadata_collection_id: metadata_collection_id.to_string(),
                    capacity: self.capacity,
                });
            }

            registrations.insert(
                metadata_collection_id.to_string(),
                RemoteRegistration::new(
                    cohort_name,
                    identity,
                    connection,
                    self.bump_generation(),
                ),
            );
            return Ok(UpsertOutcome::Created);
        };

        registration.memberships.insert(cohort_name.to_string());
        registration.refresh_display_fields(identity);

        if registration.connection == *connection {
            return Ok(UpsertOutcome::Unchanged);
        }

        debug!(
            component = COMPONENT,
            metadata_collection_id,
            previous = %fields::format_connection(&registration.connection),
            current = %fields::format_connection(connection),
            "connection changed"
        );
        registration.connection = connection.clone();
        registration.generation = self.bump_generation();
        Ok(UpsertOutcome::Refreshed)
    }

    pub(crate) async fn retract_membership(
        &self,
        cohort_name: &str,
        metadata_collection_id: &str,
    ) -> RetractOutcome {
        let mut registrations = self.registrations.lock().await;
        Self::retract_locked(&mut registrations, cohort_name, metadata_collection_id)
    }

    /// Ids currently asserted by `cohort_name`.
    pub(crate) async fn members_of(&self, cohort_name: &str) -> BTreeSet<String> {
        self.registrations
            .lock()
            .await
            .values()
            .filter(|registration| registration.is_member_of(cohort_name))
            .map(|registration| registration.metadata_collection_id().to_string())
            .collect()
    }

    /// Retracts `cohort_name` from every id in `scope` and reports the ids no longer asserted
    /// by any cohort. Ids outside `scope` are untouched even if tagged with the cohort.
    pub(crate) async fn retract_group(
        &self,
        cohort_name: &str,
        scope: &BTreeSet<String>,
    ) -> GroupRetraction {
        let mut registrations = self.registrations.lock().await;

        let removed = scope
            .iter()
            .filter(|metadata_collection_id| {
                Self::retract_locked(&mut registrations, cohort_name, metadata_collection_id)
                    == RetractOutcome::RemovedEntirely
            })
            .cloned()
            .collect();

        GroupRetraction {
            removed,
            remaining_registrations: registrations.len(),
        }
    }

    fn retract_locked(
        registrations: &mut HashMap<String, RemoteRegistration>,
        cohort_name: &str,
        metadata_collection_id: &str,
    ) -> RetractOutcome {
        let Some(registration) = registrations.get_mut(metadata_collection_id) else {
            return RetractOutcome::NotRegistered;
        };

        if !registration.memberships.remove(cohort_name) {
            return RetractOutcome::NotRegistered;
        }

        debug!(
            event = events::REGISTRY_MEMBERSHIP_RETRACTED,
            component = COMPONENT,
            cohort = cohort_name,
            metadata_collection_id,
            remaining = %fields::format_memberships(&registration.memberships),
            "membership retracted"
        );

        if registration.memberships.is_empty() {
            registrations.remove(metadata_collection_id);
            RetractOutcome::RemovedEntirely
        } else {
            RetractOutcome::StillMember
        }
    }

    fn bump_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) async fn list_all(&self) -> Vec<RemoteRegistration> {
        self.registrations.lock().await.values().cloned().collect()
    }

    /// Replaces the local binding and returns the one it superseded.
    pub(crate) fn set_local_binding(
        &self,
        metadata_collection_id: &str,
        connector: Arc<dyn RepositoryConnector>,
    ) -> Option<Arc<LocalBinding>> {
        self.local_binding.swap(Some(Arc::new(LocalBinding::new(
            metadata_collection_id,
            connector,
        ))))
    }

    pub(crate) fn local_binding(&self) -> Option<Arc<LocalBinding>> {
        self.local_binding.load_full()
    }
}

#[cfg(test)]
mod tests {
    use super::{ConnectorRegistry, RetractOutcome, UpsertOutcome};
    use crate::{
        ConnectionDescriptor, FederationError, MetadataCollection, RepositoryConnector,
        RepositoryIdentity,
    };
    use async_trait::async_trait;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    struct NoopConnector;

    #[async_trait]
    impl RepositoryConnector for NoopConnector {
        async fn metadata_collection(
            &self,
        ) -> Result<Option<Arc<dyn MetadataCollection>>, FederationError> {
            Ok(None)
        }

        async fn disconnect(&self) -> Result<(), FederationError> {
            Ok(())
        }
    }

    fn identity(metadata_collection_id: &str) -> RepositoryIdentity {
        RepositoryIdentity::new(metadata_collection_id, &format!("{metadata_collection_id} name"))
            .with_server("server", "Metadata Server")
    }

    fn connection(endpoint: &str) -> ConnectionDescriptor {
        ConnectionDescriptor::new("rest-repository", endpoint)
    }

    fn memberships(cohorts: &[&str]) -> BTreeSet<String> {
        cohorts.iter().map(|cohort| cohort.to_string()).collect()
    }

    #[tokio::test]
    async fn upsert_creates_then_unions_cohorts() {
        let registry = ConnectorRegistry::new(8);

        let first = registry
            .upsert("cohort-a", &identity("mc-1"), &connection("https://a"))
            .await
            .expect("first upsert");
        let second = registry
            .upsert("cohort-b", &identity("mc-1"), &connection("https://a"))
            .await
            .expect("second upsert");

        assert_eq!(first, UpsertOutcome::Created);
        assert_eq!(second, UpsertOutcome::Unchanged);
        let registration = registry.find("mc-1").await.expect("registered");
        assert_eq!(registration.memberships(), &memberships(&["cohort-a", "cohort-b"]));
    }

    #[tokio::test]
    async fn upsert_with_changed_connection_refreshes() {
        let registry = ConnectorRegistry::new(8);
        registry
            .upsert("cohort-a", &identity("mc-1"), &connection("https://a"))
            .await
            .expect("create");

        let renamed = RepositoryIdentity::new("mc-1", "renamed");
        let outcome = registry
            .upsert("cohort-a", &renamed, &connection("https://a-moved"))
            .await
            .expect("refresh");

        assert_eq!(outcome, UpsertOutcome::Refreshed);
        let registration = registry.find("mc-1").await.expect("registered");
        assert_eq!(registration.connection(), &connection("https://a-moved"));
        assert_eq!(registration.identity().metadata_collection_name, "renamed");
        assert_eq!(registration.memberships(), &memberships(&["cohort-a"]));
    }

    #[tokio::test]
    async fn upsert_beyond_capacity_fails_without_side_effects() {
        let registry = ConnectorRegistry::new(1);
        registry
            .upsert("cohort-a", &identity("mc-1"), &connection("https://a"))
            .await
            .expect("create");

        let result = registry
            .upsert("cohort-a", &identity("mc-2"), &connection("https://b"))
            .await;

        assert!(matches!(
            result,
            Err(FederationError::RegistryCapacityExceeded { capacity: 1, .. })
        ));
        assert!(registry.find("mc-2").await.is_none());
        assert_eq!(registry.len().await, 1);

        // existing ids are still refreshable at capacity
        assert!(registry
            .upsert("cohort-b", &identity("mc-1"), &connection("https://a"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn refresh_if_current_requires_same_connection_and_cohort() {
        let registry = ConnectorRegistry::new(8);
        registry
            .upsert("cohort-a", &identity("mc-1"), &connection("https://a"))
            .await
            .expect("create");

        assert!(
            !registry
                .refresh_if_current("cohort-b", &identity("mc-1"), &connection("https://a"))
                .await
        );
        assert!(
            !registry
                .refresh_if_current("cohort-a", &identity("mc-1"), &connection("https://other"))
                .await
        );
        assert!(
            !registry
                .refresh_if_current("cohort-a", &identity("mc-9"), &connection("https://a"))
                .await
        );

        let renamed = RepositoryIdentity::new("mc-1", "display rename");
        assert!(
            registry
                .refresh_if_current("cohort-a", &renamed, &connection("https://a"))
                .await
        );
        let registration = registry.find("mc-1").await.expect("registered");
        assert_eq!(registration.identity().metadata_collection_name, "display rename");
        assert_eq!(registration.memberships(), &memberships(&["cohort-a"]));
    }

    #[tokio::test]
    async fn retract_membership_counts_remaining_cohorts() {
        let registry = ConnectorRegistry::new(8);
        for cohort in ["cohort-a", "cohort-b"] {
            registry
                .upsert(cohort, &identity("mc-1"), &connection("https://a"))
                .await
                .expect("upsert");
        }

        assert_eq!(
            registry.retract_membership("cohort-a", "mc-1").await,
            RetractOutcome::StillMember
        );
        assert_eq!(
            registry.retract_membership("cohort-a", "mc-1").await,
            RetractOutcome::NotRegistered
        );
        assert_eq!(
            registry.retract_membership("cohort-b", "mc-1").await,
            RetractOutcome::RemovedEntirely
        );
        assert!(registry.find("mc-1").await.is_none());
        assert_eq!(
            registry.retract_membership("cohort-b", "mc-1").await,
            RetractOutcome::NotRegistered
        );
    }

    #[tokio::test]
    async fn retract_group_returns_only_fully_removed_ids() {
        let registry = ConnectorRegistry::new(8);
        registry
            .upsert("cohort-a", &identity("mc-a"), &connection("https://a"))
            .await
            .expect("upsert a");
        for cohort in ["cohort-a", "cohort-b"] {
            registry
                .upsert(cohort, &identity("mc-b"), &connection("https://b"))
                .await
                .expect("upsert b");
        }
        registry
            .upsert("cohort-b", &identity("mc-c"), &connection("https://c"))
            .await
            .expect("upsert c");

        let tagged = registry.members_of("cohort-a").await;
        assert_eq!(tagged, memberships(&["mc-a", "mc-b"]));

        let retraction = registry.retract_group("cohort-a", &tagged).await;

        assert_eq!(retraction.removed, vec!["mc-a".to_string()]);
        assert_eq!(retraction.remaining_registrations, 2);
        let remaining = registry.find("mc-b").await.expect("mc-b stays");
        assert_eq!(remaining.memberships(), &memberships(&["cohort-b"]));
        assert!(registry.find("mc-c").await.is_some());

        let unknown = registry.members_of("cohort-unknown").await;
        assert!(registry
            .retract_group("cohort-unknown", &unknown)
            .await
            .removed
            .is_empty());
    }

    #[tokio::test]
    async fn retract_group_leaves_ids_outside_scope_alone() {
        let registry = ConnectorRegistry::new(8);
        registry
            .upsert("cohort-a", &identity("mc-a"), &connection("https://a"))
            .await
            .expect("upsert a");
        let scope = registry.members_of("cohort-a").await;
        // joins the cohort after the scope was taken
        registry
            .upsert("cohort-a", &identity("mc-late"), &connection("https://late"))
            .await
            .expect("upsert late");

        let retraction = registry.retract_group("cohort-a", &scope).await;

        assert_eq!(retraction.removed, vec!["mc-a".to_string()]);
        assert_eq!(retraction.remaining_registrations, 1);
        assert!(registry
            .find("mc-late")
            .await
            .expect("late joiner stays")
            .is_member_of("cohort-a"));
    }

    #[tokio::test]
    async fn generation_moves_only_when_subscribers_need_a_new_connector() {
        let registry = ConnectorRegistry::new(8);
        registry
            .upsert("cohort-a", &identity("mc-1"), &connection("https://a"))
            .await
            .expect("create");
        let created = registry.find("mc-1").await.expect("registered").generation();

        registry
            .upsert("cohort-b", &identity("mc-1"), &connection("https://a"))
            .await
            .expect("union");
        assert_eq!(
            registry.find("mc-1").await.expect("registered").generation(),
            created
        );

        registry
            .upsert("cohort-a", &identity("mc-1"), &connection("https://a-moved"))
            .await
            .expect("refresh");
        assert!(registry.find("mc-1").await.expect("registered").generation() > created);
    }

    #[tokio::test]
    async fn list_all_is_a_snapshot() {
        let registry = ConnectorRegistry::new(8);
        registry
            .upsert("cohort-a", &identity("mc-1"), &connection("https://a"))
            .await
            .expect("upsert");

        let snapshot = registry.list_all().await;
        registry.retract_membership("cohort-a", "mc-1").await;

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].metadata_collection_id(), "mc-1");
        assert!(registry.list_all().await.is_empty());
    }

    #[test]
    fn local_binding_is_replaced() {
        let registry = ConnectorRegistry::new(8);
        assert!(registry.local_binding().is_none());

        assert!(registry
            .set_local_binding("local-1", Arc::new(NoopConnector))
            .is_none());
        let superseded = registry
            .set_local_binding("local-2", Arc::new(NoopConnector))
            .expect("previous binding");

        assert_eq!(superseded.metadata_collection_id(), "local-1");
        assert_eq!(
            registry
                .local_binding()
                .expect("current binding")
                .metadata_collection_id(),
            "local-2"
        );
    }
}
