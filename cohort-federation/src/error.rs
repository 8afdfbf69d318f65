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

//! Error type shared by the coordinator, its collaborators and its consumers.

use std::error::Error;
use std::fmt;
use std::fmt::{Display, Formatter};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FederationError {
    /// The connection descriptor is malformed or no connector can be built from it.
    InvalidConnection {
        metadata_collection_id: String,
        reason: String,
    },
    /// A connector was produced but could not be started.
    ConnectorConstruction {
        metadata_collection_id: String,
        reason: String,
    },
    /// The connector started but has no usable metadata collection.
    MissingCapability {
        metadata_collection_id: String,
        reason: String,
    },
    RegistryCapacityExceeded {
        metadata_collection_id: String,
        capacity: usize,
    },
    ConsumerCallback {
        reason: String,
    },
    Disconnect {
        reason: String,
    },
    Configuration {
        reason: String,
    },
}

impl FederationError {
    pub fn invalid_connection(metadata_collection_id: &str, reason: impl Into<String>) -> Self {
        FederationError::InvalidConnection {
            metadata_collection_id: metadata_collection_id.to_string(),
            reason: reason.into(),
        }
    }

    pub fn connector_construction(
        metadata_collection_id: &str,
        reason: impl Into<String>,
    ) -> Self {
        FederationError::ConnectorConstruction {
            metadata_collection_id: metadata_collection_id.to_string(),
            reason: reason.into(),
        }
    }

    pub fn missing_capability(metadata_collection_id: &str, reason: impl Into<String>) -> Self {
        FederationError::MissingCapability {
            metadata_collection_id: metadata_collection_id.to_string(),
            reason: reason.into(),
        }
    }

    pub fn consumer_callback(reason: impl Into<String>) -> Self {
        FederationError::ConsumerCallback {
            reason: reason.into(),
        }
    }

    pub fn disconnect(reason: impl Into<String>) -> Self {
        FederationError::Disconnect {
            reason: reason.into(),
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        FederationError::Configuration {
            reason: reason.into(),
        }
    }

    /// `true` for the failures a join announcement can surface after validation.
    pub fn is_validation_failure(&self) -> bool {
        matches!(
            self,
            FederationError::InvalidConnection { .. }
                | FederationError::ConnectorConstruction { .. }
                | FederationError::MissingCapability { .. }
        )
    }
}

impl Display for FederationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FederationError::InvalidConnection {
                metadata_collection_id,
                reason,
            } => write!(
                f,
                "Invalid connection for metadata collection {metadata_collection_id}: {reason}"
            ),
            FederationError::ConnectorConstruction {
                metadata_collection_id,
                reason,
            } => write!(
                f,
                "Unable to construct connector for metadata collection {metadata_collection_id}: {reason}"
            ),
            FederationError::MissingCapability {
                metadata_collection_id,
                reason,
            } => write!(
                f,
                "Connector for metadata collection {metadata_collection_id} has no usable metadata collection: {reason}"
            ),
            FederationError::RegistryCapacityExceeded {
                metadata_collection_id,
                capacity,
            } => write!(
                f,
                "Unable to register metadata collection {metadata_collection_id}: registry is full ({capacity} registrations)"
            ),
            FederationError::ConsumerCallback { reason } => {
                write!(f, "Connector consumer callback failed: {reason}")
            }
            FederationError::Disconnect { reason } => {
                write!(f, "Unable to disconnect connector: {reason}")
            }
            FederationError::Configuration { reason } => {
                write!(f, "Invalid federation configuration: {reason}")
            }
        }
    }
}

impl Error for FederationError {}
