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

//! # cohort-federation
//!
//! `cohort-federation` keeps the set of repository connectors behind a federated metadata
//! query layer consistent while remote repositories join and leave overlapping cohorts, and
//! fans connector lifecycle events out to every subscribed [`ConnectorConsumer`].
//!
//! Typical usage is centered on [`FederationCoordinator`]: the cohort discovery layer feeds it
//! announcements, query-routing services subscribe to it.
//!
//! ## Quick start
//!
//! ```
//! use std::sync::Arc;
//! use cohort_federation::{FederationConfig, FederationCoordinator};
//! use federation_test_utils::{remote_member, RecordingConsumer, ScriptedConnectorFactory};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let config = FederationConfig::new("quick-start", true);
//! let factory = Arc::new(ScriptedConnectorFactory::default());
//! let coordinator = FederationCoordinator::new(&config, factory).unwrap();
//!
//! let consumer = Arc::new(RecordingConsumer::default());
//! coordinator.subscribe(consumer.clone()).await;
//!
//! let (identity, connection) = remote_member("mc-1", "https://repo-1:9443");
//! coordinator
//!     .announce_join_or_refresh("cohort-a", identity, connection)
//!     .await
//!     .unwrap();
//! coordinator.announce_leave("cohort-a", "mc-1").await;
//!
//! assert_eq!(consumer.added_ids(), vec!["mc-1".to_string()]);
//! assert_eq!(consumer.removed_ids(), vec!["mc-1".to_string()]);
//! # });
//! ```
//!
//! ## Membership contract
//!
//! A repository may be asserted by several cohorts. Subscribers hear about it once when it
//! first becomes reachable and once when the last asserting cohort lets it go. A connection
//! that fails validation never reaches the registry or any subscriber.
//!
//! ```
//! use std::sync::Arc;
//! use cohort_federation::{FederationConfig, FederationCoordinator};
//! use federation_test_utils::{remote_member, RecordingConsumer, ScriptedConnectorFactory};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let factory = Arc::new(ScriptedConnectorFactory::default());
//! factory.reject_endpoint("https://broken:9443");
//! let coordinator =
//!     FederationCoordinator::new(&FederationConfig::new("contract", true), factory).unwrap();
//! let consumer = Arc::new(RecordingConsumer::default());
//! coordinator.subscribe(consumer.clone()).await;
//!
//! let (identity, connection) = remote_member("mc-1", "https://repo-1:9443");
//! for cohort in ["cohort-a", "cohort-b"] {
//!     coordinator
//!         .announce_join_or_refresh(cohort, identity.clone(), connection.clone())
//!         .await
//!         .unwrap();
//! }
//! assert_eq!(consumer.added_ids().len(), 1);
//!
//! coordinator.announce_leave("cohort-a", "mc-1").await;
//! assert!(consumer.removed_ids().is_empty());
//! coordinator.announce_leave("cohort-b", "mc-1").await;
//! assert_eq!(consumer.removed_ids().len(), 1);
//!
//! let (identity, connection) = remote_member("mc-2", "https://broken:9443");
//! assert!(coordinator
//!     .announce_join_or_refresh("cohort-a", identity, connection)
//!     .await
//!     .is_err());
//! assert!(coordinator.find_registration("mc-2").await.is_none());
//! # });
//! ```
//!
//! ## Internal architecture map
//!
//! - API facade: inbound [`CohortConnectionConsumer`] / [`ConnectorManager`] capabilities
//! - Control plane: remote registrations, cohort membership counting, local binding
//! - Data plane: subscriber registry, retirement gates and callback fan-out
//! - Runtime: connector construction, validation probing and teardown
//!
//! ## Observability model
//!
//! Every state change and every isolated failure is a structured `tracing` event carrying
//! `event`, `component` and the affected cohort, metadata collection or subscriber. This crate
//! never installs a subscriber; the hosting service does, and tests go through
//! `federation_test_utils::init_logging`.

mod api;
pub use api::connection_consumer::CohortConnectionConsumer;
pub use api::connector_manager::ConnectorManager;

mod config;
pub use config::{FederationConfig, DEFAULT_MAX_REMOTE_REGISTRATIONS};

mod connector;
pub use connector::{
    ConnectionDescriptor, ConnectorConsumer, ConnectorFactory, MetadataCollection,
    RepositoryConnector, RepositoryIdentity,
};

mod error;
pub use error::FederationError;

mod control_plane;
pub use control_plane::connector_registry::RemoteRegistration;

mod data_plane;
pub use data_plane::subscriber_registry::SubscriberId;

#[doc(hidden)]
pub mod observability;
mod runtime;

mod coordinator;
pub use coordinator::FederationCoordinator;
