/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
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

//! Control-plane layer.
//!
//! Owns the remote registration store, the local binding and the per-id locks that keep each
//! repository's registry changes and subscriber callbacks in order. This layer enforces the
//! membership-counting rule: a repository leaves the federation only when the last cohort
//! asserting it has left.
//!
//! ```
//! use std::sync::Arc;
//! use cohort_federation::{FederationConfig, FederationCoordinator};
//! use federation_test_utils::{remote_member, ScriptedConnectorFactory};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let coordinator = FederationCoordinator::new(
//!     &FederationConfig::new("control-plane-doc", true),
//!     Arc::new(ScriptedConnectorFactory::default()),
//! )
//! .unwrap();
//!
//! for cohort in ["cohort-a", "cohort-b"] {
//!     let (identity, connection) = remote_member("mc-1", "https://repo-1:9443");
//!     coordinator
//!         .announce_join_or_refresh(cohort, identity, connection)
//!         .await
//!         .unwrap();
//! }
//!
//! // Still asserted by cohort-b.
//! coordinator.announce_leave("cohort-a", "mc-1").await;
//! assert!(coordinator.find_registration("mc-1").await.is_some());
//!
//! coordinator.announce_leave("cohort-b", "mc-1").await;
//! assert!(coordinator.find_registration("mc-1").await.is_none());
//! # });
//! ```

pub(crate) mod connector_registry;
pub(crate) mod local_binding;
pub(crate) mod registration_locks;
