/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

use crate::control_plane::connector_registry::{
    ConnectorRegistry, RemoteRegistration, RetractOutcome,
};
use crate::control_plane::registration_locks::RegistrationLocks;
use crate::data_plane::fan_out::{
    deliver, Delivery, ADD_REMOTE_CONNECTOR, DISCONNECT_ALL_CONNECTORS, REMOVE_REMOTE_CONNECTOR,
    SET_LOCAL_CONNECTOR,
};
use crate::data_plane::subscriber_registry::{SubscriberEntry, SubscriberId, SubscriberRegistry};
use crate::observability::{events, fields};
use crate::runtime::connector_lifecycle::{
    build_connector, disconnect_quietly, validate_connection,
};
use crate::{
    ConnectionDescriptor, ConnectorConsumer, ConnectorFactory, FederationConfig,
    FederationError, RepositoryConnector, RepositoryIdentity,
};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const COMPONENT: &str = "coordinator";

/// Keeps the federation's connector set consistent with cohort membership and fans
/// connector lifecycle events out to every subscribed [`ConnectorConsumer`].
///
/// Everything that touches one metadata collection id (its registry change, the fan-out that
/// follows, a replay of it to a new subscriber) runs under that id's lock, so each
/// subscriber sees the adds and removals for an id in registry order.
///
/// Construct once at service start-up and share it as `Arc<FederationCoordinator>`.
pub struct FederationCoordinator {
    name: String,
    enterprise_access_enabled: bool,
    factory: Arc<dyn ConnectorFactory>,
    registry: ConnectorRegistry,
    registration_locks: RegistrationLocks,
    // Orders local binding changes against replays of the binding.
    local_binding_lock: Mutex<()>,
    subscribers: SubscriberRegistry,
}

impl FederationCoordinator {
    pub fn new(
        config: &FederationConfig,
        factory: Arc<dyn ConnectorFactory>,
    ) -> Result<Self, FederationError> {
        config.validate()?;
        info!(
            event = events::COORDINATOR_CREATED,
            component = COMPONENT,
            federation = config.name.as_str(),
            enterprise_access_enabled = config.enterprise_access_enabled,
            max_remote_registrations = config.max_remote_registrations,
            "federation coordinator created"
        );

        Ok(Self {
            name: config.name.clone(),
            enterprise_access_enabled: config.enterprise_access_enabled,
            factory,
            registry: ConnectorRegistry::new(config.max_remote_registrations),
            registration_locks: RegistrationLocks::new(),
            local_binding_lock: Mutex::new(()),
            subscribers: SubscriberRegistry::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn enterprise_access_enabled(&self) -> bool {
        self.enterprise_access_enabled
    }

    /// Records a cohort member's connection, validating it first unless it is a heartbeat
    /// for a connection this cohort already asserts.
    ///
    /// On error the registry is untouched and no subscriber is notified.
    pub async fn announce_join_or_refresh(
        &self,
        cohort_name: &str,
        identity: RepositoryIdentity,
        connection: ConnectionDescriptor,
    ) -> Result<(), FederationError> {
        let metadata_collection_id = identity.metadata_collection_id.as_str();
        debug!(
            event = events::ANNOUNCE_JOIN,
            component = COMPONENT,
            federation = self.name.as_str(),
            cohort = cohort_name,
            metadata_collection_id,
            connection = %fields::format_connection(&connection),
            "join announced"
        );

        if cohort_name.is_empty() || metadata_collection_id.is_empty() {
            let err = FederationError::invalid_connection(
                metadata_collection_id,
                "cohort name and metadata collection id must not be empty",
            );
            warn!(
                event = events::ANNOUNCE_JOIN_REJECTED,
                component = COMPONENT,
                federation = self.name.as_str(),
                cohort = cohort_name,
                err = %err,
                "join rejected"
            );
            return Err(err);
        }

        let _serialized = self.registration_locks.lock(metadata_collection_id).await;

        if self
            .registry
            .refresh_if_current(cohort_name, &identity, &connection)
            .await
        {
            debug!(
                event = events::ANNOUNCE_JOIN_HEARTBEAT,
                component = COMPONENT,
                federation = self.name.as_str(),
                cohort = cohort_name,
                metadata_collection_id,
                "connection unchanged"
            );
            return Ok(());
        }

        if let Err(err) = validate_connection(self.factory.as_ref(), &connection, &identity).await
        {
            warn!(
                event = events::ANNOUNCE_JOIN_REJECTED,
                component = COMPONENT,
                federation = self.name.as_str(),
                cohort = cohort_name,
                metadata_collection_id,
                err = %err,
                "join rejected"
            );
            return Err(err);
        }

        let outcome = self
            .registry
            .upsert(cohort_name, &identity, &connection)
            .await?;
        info!(
            event = events::ANNOUNCE_JOIN_COMMITTED,
            component = COMPONENT,
            federation = self.name.as_str(),
            cohort = cohort_name,
            metadata_collection_id,
            metadata_collection_name = identity.metadata_collection_name.as_str(),
            server_name = identity.server_name.as_str(),
            outcome = outcome.as_str(),
            "remote connection registered"
        );

        if !self.enterprise_access_enabled || !outcome.needs_fan_out() {
            return Ok(());
        }
        if let Some(registration) = self.registry.find(metadata_collection_id).await {
            self.fan_out_remote_connector(&registration).await;
        }

        Ok(())
    }

    /// Retracts one cohort's assertion; subscribers hear about it only once no cohort is left.
    pub async fn announce_leave(&self, cohort_name: &str, metadata_collection_id: &str) {
        let _serialized = self.registration_locks.lock(metadata_collection_id).await;
        let outcome = self
            .registry
            .retract_membership(cohort_name, metadata_collection_id)
            .await;
        info!(
            event = events::ANNOUNCE_LEAVE,
            component = COMPONENT,
            federation = self.name.as_str(),
            cohort = cohort_name,
            metadata_collection_id,
            outcome = ?outcome,
            "leave announced"
        );

        if outcome == RetractOutcome::RemovedEntirely && self.enterprise_access_enabled {
            self.fan_out_removal(metadata_collection_id).await;
        }
    }

    /// Retracts the cohort from every id it asserts when the departure starts. An id that
    /// joins the cohort afterwards is ordered after the departure and stays.
    pub async fn announce_group_departure(&self, cohort_name: &str) {
        let tagged = self.registry.members_of(cohort_name).await;
        let _serialized = self.registration_locks.lock_all(&tagged).await;
        let retraction = self.registry.retract_group(cohort_name, &tagged).await;
        info!(
            event = events::ANNOUNCE_GROUP_DEPARTURE,
            component = COMPONENT,
            federation = self.name.as_str(),
            cohort = cohort_name,
            removed = retraction.removed.len(),
            remaining_registrations = retraction.remaining_registrations,
            "cohort departed"
        );

        if !self.enterprise_access_enabled {
            return;
        }
        for metadata_collection_id in &retraction.removed {
            self.fan_out_removal(metadata_collection_id).await;
        }
    }

    /// Registers `consumer` and replays the current state to it alone: the local connector
    /// first, then every remote connector still registered when its turn comes.
    pub async fn subscribe(&self, consumer: Arc<dyn ConnectorConsumer>) -> SubscriberId {
        let entry = self.subscribers.add(consumer).await;

        {
            let _local = self.local_binding_lock.lock().await;
            if let Some(binding) = self.registry.local_binding() {
                let metadata_collection_id = binding.metadata_collection_id();
                let connector = binding.connector();
                deliver(
                    &entry,
                    SET_LOCAL_CONNECTOR,
                    Some(metadata_collection_id),
                    |consumer| async move {
                        consumer
                            .set_local_connector(metadata_collection_id, connector)
                            .await
                    },
                )
                .await;
            }
        }

        if self.enterprise_access_enabled {
            for registration in self.registry.list_all().await {
                self.replay_remote_connector(&entry, registration.metadata_collection_id())
                    .await;
            }
        }

        entry.id()
    }

    /// Unknown ids are ignored. Safe to call from inside one of the subscriber's own
    /// callbacks; otherwise it returns only after in-flight callbacks to it have finished.
    pub async fn unsubscribe(&self, subscriber_id: SubscriberId) {
        if !self.subscribers.remove(subscriber_id).await {
            debug!(
                event = events::UNKNOWN_SUBSCRIBER,
                component = COMPONENT,
                federation = self.name.as_str(),
                subscriber_id = %subscriber_id,
                "unsubscribe for unknown subscriber"
            );
        }
    }

    pub async fn set_local_connector(
        &self,
        metadata_collection_id: &str,
        connector: Arc<dyn RepositoryConnector>,
    ) {
        let _local = self.local_binding_lock.lock().await;
        if let Some(superseded) = self
            .registry
            .set_local_binding(metadata_collection_id, connector.clone())
        {
            debug!(
                component = COMPONENT,
                federation = self.name.as_str(),
                superseded = superseded.metadata_collection_id(),
                "local binding superseded"
            );
        }
        info!(
            event = events::LOCAL_CONNECTOR_SET,
            component = COMPONENT,
            federation = self.name.as_str(),
            metadata_collection_id,
            "local connector set"
        );

        let entries = self.subscribers.snapshot().await;
        join_all(entries.iter().map(|entry| {
            let connector = connector.clone();
            deliver(
                entry,
                SET_LOCAL_CONNECTOR,
                Some(metadata_collection_id),
                move |consumer| async move {
                    consumer
                        .set_local_connector(metadata_collection_id, connector)
                        .await
                },
            )
        }))
        .await;
    }

    /// Shutdown path: disconnects the local connector, then asks every subscriber to
    /// disconnect the connectors it holds.
    pub async fn disconnect_all(&self) {
        info!(
            event = events::DISCONNECT_ALL,
            component = COMPONENT,
            federation = self.name.as_str(),
            "disconnecting all connectors"
        );

        if let Some(binding) = self.registry.local_binding() {
            disconnect_quietly(
                binding.connector().as_ref(),
                binding.metadata_collection_id(),
                "local connector",
            )
            .await;
        }

        let entries = self.subscribers.snapshot().await;
        join_all(entries.iter().map(|entry| async move {
            entry.forget_all_handovers().await;
            deliver(entry, DISCONNECT_ALL_CONNECTORS, None, |consumer| async move {
                consumer.disconnect_all_connectors().await
            })
            .await
        }))
        .await;
    }

    pub async fn find_registration(
        &self,
        metadata_collection_id: &str,
    ) -> Option<RemoteRegistration> {
        self.registry.find(metadata_collection_id).await
    }

    pub async fn registered_repositories(&self) -> Vec<RemoteRegistration> {
        self.registry.list_all().await
    }

    pub async fn registration_count(&self) -> usize {
        self.registry.len().await
    }

    pub fn local_metadata_collection_id(&self) -> Option<String> {
        self.registry
            .local_binding()
            .map(|binding| binding.metadata_collection_id().to_string())
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.len().await
    }

    /// Caller holds the registration's id lock.
    async fn fan_out_remote_connector(&self, registration: &RemoteRegistration) {
        let entries = self.subscribers.snapshot().await;
        join_all(
            entries
                .iter()
                .map(|entry| self.hand_over_remote_connector(entry, registration)),
        )
        .await;
    }

    /// Caller holds the id lock.
    async fn fan_out_removal(&self, metadata_collection_id: &str) {
        let entries = self.subscribers.snapshot().await;
        join_all(entries.iter().map(|entry| async move {
            entry.forget_handover(metadata_collection_id).await;
            deliver(
                entry,
                REMOVE_REMOTE_CONNECTOR,
                Some(metadata_collection_id),
                |consumer| async move {
                    consumer
                        .remove_remote_connector(metadata_collection_id)
                        .await
                },
            )
            .await
        }))
        .await;
    }

    /// Re-reads the registration under its id lock; one that left since the replay listing
    /// started is skipped.
    async fn replay_remote_connector(&self, entry: &SubscriberEntry, metadata_collection_id: &str) {
        let _serialized = self.registration_locks.lock(metadata_collection_id).await;
        let Some(registration) = self.registry.find(metadata_collection_id).await else {
            debug!(
                event = events::REPLAY_REGISTRATION_DEPARTED,
                component = COMPONENT,
                federation = self.name.as_str(),
                subscriber_id = %entry.id(),
                metadata_collection_id,
                "registration left before replay reached it"
            );
            return;
        };

        if let Err(err) = self.hand_over_remote_connector(entry, &registration).await {
            warn!(
                event = events::REPLAY_PARTIAL_FAILURE,
                component = COMPONENT,
                federation = self.name.as_str(),
                subscriber_id = %entry.id(),
                metadata_collection_id,
                err = %err,
                "skipping remote connector during replay"
            );
        }
    }

    /// Builds a connector owned by this subscriber alone and hands it over, unless the
    /// subscriber already holds one for this registration generation.
    ///
    /// Caller holds the registration's id lock.
    async fn hand_over_remote_connector(
        &self,
        entry: &SubscriberEntry,
        registration: &RemoteRegistration,
    ) -> Result<Delivery, FederationError> {
        let metadata_collection_id = registration.metadata_collection_id();
        let generation = registration.generation();

        if entry.has_received(metadata_collection_id, generation).await {
            debug!(
                event = events::FAN_OUT_ALREADY_HANDED_OVER,
                component = COMPONENT,
                federation = self.name.as_str(),
                subscriber_id = %entry.id(),
                metadata_collection_id,
                generation,
                "subscriber already holds this connector"
            );
            return Ok(Delivery::Delivered);
        }

        let connector = match build_connector(
            self.factory.as_ref(),
            registration.connection(),
            registration.identity(),
        )
        .await
        {
            Ok(connector) => connector,
            Err(err) => {
                warn!(
                    event = events::FAN_OUT_CONNECTOR_BUILD_FAILED,
                    component = COMPONENT,
                    federation = self.name.as_str(),
                    subscriber_id = %entry.id(),
                    metadata_collection_id,
                    err = %err,
                    "unable to build connector for subscriber"
                );
                return Err(err);
            }
        };

        let handed_over = connector.clone();
        let delivery = deliver(
            entry,
            ADD_REMOTE_CONNECTOR,
            Some(metadata_collection_id),
            |consumer| async move {
                consumer
                    .add_remote_connector(metadata_collection_id, handed_over)
                    .await
            },
        )
        .await;

        match delivery {
            Delivery::Retired => {
                disconnect_quietly(
                    connector.as_ref(),
                    metadata_collection_id,
                    "connector for retired subscriber",
                )
                .await;
            }
            Delivery::Delivered | Delivery::Failed => {
                entry.record_handover(metadata_collection_id, generation).await;
            }
        }
        Ok(delivery)
    }
}
