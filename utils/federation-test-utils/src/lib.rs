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

//! Fakes shared by the `cohort-federation` integration tests and doctests.

mod consumer;
mod factory;

pub use consumer::{ConsumerBehaviour, ConsumerCall, RecordingConsumer};
pub use factory::{BuildPause, EndpointScript, FakeConnector, ScriptedConnectorFactory};

use cohort_federation::{ConnectionDescriptor, RepositoryIdentity};
use serde_json::json;
use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Installs a test-writer subscriber once per process; `RUST_LOG` overrides the `warn` default.
pub fn init_logging() {
    INIT_LOGGING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Identity and connection for a remote repository served at `endpoint`.
pub fn remote_member(
    metadata_collection_id: &str,
    endpoint: &str,
) -> (RepositoryIdentity, ConnectionDescriptor) {
    let identity = RepositoryIdentity::new(
        metadata_collection_id,
        &format!("{metadata_collection_id} metadata collection"),
    )
    .with_server(&format!("{metadata_collection_id}-server"), "Metadata Access Store")
    .with_organization("Coco Pharmaceuticals");

    let connection = ConnectionDescriptor::new("rest-repository", endpoint)
        .with_property("pageSize", json!(100));

    (identity, connection)
}
