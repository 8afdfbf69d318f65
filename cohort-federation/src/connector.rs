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

//! Connector-side vocabulary: what a remote repository announces, how a connector is
//! built from it, and the callbacks subscribers implement.

use crate::FederationError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Identity fields carried with every join announcement.
///
/// `metadata_collection_id` is the stable key; the remaining fields are display data and may
/// change when a repository re-announces itself.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryIdentity {
    pub metadata_collection_id: String,
    pub metadata_collection_name: String,
    pub server_name: String,
    pub server_type: String,
    pub owning_organization_name: String,
}

impl RepositoryIdentity {
    pub fn new(metadata_collection_id: &str, metadata_collection_name: &str) -> Self {
        Self {
            metadata_collection_id: metadata_collection_id.to_string(),
            metadata_collection_name: metadata_collection_name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_server(mut self, server_name: &str, server_type: &str) -> Self {
        self.server_name = server_name.to_string();
        self.server_type = server_type.to_string();
        self
    }

    pub fn with_organization(mut self, owning_organization_name: &str) -> Self {
        self.owning_organization_name = owning_organization_name.to_string();
        self
    }
}

/// Everything a [`ConnectorFactory`] needs to (re)build a connector.
///
/// Opaque to the coordinator apart from equality, which decides whether a re-announcement is a
/// heartbeat or a changed connection.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionDescriptor {
    pub connector_provider: String,
    pub endpoint_address: String,
    pub user_id: Option<String>,
    pub configuration_properties: BTreeMap<String, serde_json::Value>,
}

impl ConnectionDescriptor {
    pub fn new(connector_provider: &str, endpoint_address: &str) -> Self {
        Self {
            connector_provider: connector_provider.to_string(),
            endpoint_address: endpoint_address.to_string(),
            ..Default::default()
        }
    }

    pub fn with_property(mut self, key: &str, value: serde_json::Value) -> Self {
        self.configuration_properties.insert(key.to_string(), value);
        self
    }
}

/// The metadata-collection capability of a started connector.
pub trait MetadataCollection: Send + Sync {
    fn metadata_collection_id(&self) -> &str;
}

/// A live, started handle to one repository.
#[async_trait]
pub trait RepositoryConnector: Send + Sync {
    /// Returns the metadata collection capability, `Ok(None)` when the connector has none.
    async fn metadata_collection(
        &self,
    ) -> Result<Option<Arc<dyn MetadataCollection>>, FederationError>;

    async fn disconnect(&self) -> Result<(), FederationError>;
}

/// Builds started connectors from connection descriptors.
///
/// Implementations report malformed descriptors as [`FederationError::InvalidConnection`] and
/// start-up failures as [`FederationError::ConnectorConstruction`]. Any timeout is the
/// implementation's own.
#[async_trait]
pub trait ConnectorFactory: Send + Sync {
    async fn build(
        &self,
        connection: &ConnectionDescriptor,
        identity: &RepositoryIdentity,
    ) -> Result<Arc<dyn RepositoryConnector>, FederationError>;
}

/// Callbacks implemented by components that route queries across the federation.
///
/// `add_remote_connector` is called again for an id whose connection changed; the new
/// connector replaces the old one. Every connector handed over belongs to the consumer, which
/// is expected to disconnect them from `disconnect_all_connectors`.
///
/// A callback may unsubscribe its own consumer; nothing further is delivered to it. A remote
/// connector callback must not announce a join or leave for the id it is handling, since the
/// coordinator holds that id's lock until the callback returns.
#[async_trait]
pub trait ConnectorConsumer: Send + Sync {
    async fn set_local_connector(
        &self,
        metadata_collection_id: &str,
        connector: Arc<dyn RepositoryConnector>,
    ) -> Result<(), FederationError>;

    async fn add_remote_connector(
        &self,
        metadata_collection_id: &str,
        connector: Arc<dyn RepositoryConnector>,
    ) -> Result<(), FederationError>;

    async fn remove_remote_connector(
        &self,
        metadata_collection_id: &str,
    ) -> Result<(), FederationError>;

    async fn disconnect_all_connectors(&self) -> Result<(), FederationError>;
}

#[cfg(test)]
mod tests {
    use super::{ConnectionDescriptor, RepositoryIdentity};
    use serde_json::json;

    #[test]
    fn descriptors_with_different_properties_are_not_equal() {
        let plain = ConnectionDescriptor::new("rest-repository", "https://repo-a:9443");
        let tuned = plain.clone().with_property("pageSize", json!(100));

        assert_ne!(plain, tuned);
        assert_eq!(plain, ConnectionDescriptor::new("rest-repository", "https://repo-a:9443"));
    }

    #[test]
    fn descriptor_deserializes_with_missing_fields() {
        let descriptor: ConnectionDescriptor =
            serde_json::from_str(r#"{"connector_provider": "rest-repository"}"#)
                .expect("valid descriptor json");

        assert_eq!(descriptor.connector_provider, "rest-repository");
        assert!(descriptor.endpoint_address.is_empty());
        assert!(descriptor.configuration_properties.is_empty());
    }

    #[test]
    fn identity_builder_populates_fields() {
        let identity = RepositoryIdentity::new("mc-1", "Repository One")
            .with_server("server-1", "Metadata Server")
            .with_organization("Coco Pharmaceuticals");

        assert_eq!(identity.metadata_collection_id, "mc-1");
        assert_eq!(identity.server_name, "server-1");
        assert_eq!(identity.server_type, "Metadata Server");
        assert_eq!(identity.owning_organization_name, "Coco Pharmaceuticals");
    }
}
