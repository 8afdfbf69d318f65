//! Connector construction, validation probing and teardown around the external factory.

use crate::observability::{events, fields};
use crate::{
    ConnectionDescriptor, ConnectorFactory, FederationError, RepositoryConnector,
    RepositoryIdentity,
};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, warn};

const COMPONENT: &str = "connector_lifecycle";

/// Builds a started connector. A panicking factory counts as a construction failure.
pub(crate) async fn build_connector(
    factory: &dyn ConnectorFactory,
    connection: &ConnectionDescriptor,
    identity: &RepositoryIdentity,
) -> Result<Arc<dyn RepositoryConnector>, FederationError> {
    match AssertUnwindSafe(factory.build(connection, identity))
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(_panic) => {
            error!(
                event = events::CONNECTOR_BUILD_PANICKED,
                component = COMPONENT,
                metadata_collection_id = identity.metadata_collection_id.as_str(),
                connection = %fields::format_connection(connection),
                "connector factory panicked"
            );
            Err(FederationError::connector_construction(
                &identity.metadata_collection_id,
                "connector factory panicked",
            ))
        }
    }
}

/// Proves a connection usable: build a connector, ask for its metadata collection,
/// then disconnect it whatever the answer.
pub(crate) async fn validate_connection(
    factory: &dyn ConnectorFactory,
    connection: &ConnectionDescriptor,
    identity: &RepositoryIdentity,
) -> Result<(), FederationError> {
    let metadata_collection_id = identity.metadata_collection_id.as_str();

    let probe = match build_connector(factory, connection, identity).await {
        Ok(probe) => probe,
        Err(err) => {
            warn!(
                event = events::PROBE_CONNECTOR_BUILD_FAILED,
                component = COMPONENT,
                metadata_collection_id,
                connection = %fields::format_connection(connection),
                err = %err,
                "unable to build probe connector"
            );
            return Err(err);
        }
    };

    let capability = AssertUnwindSafe(probe.metadata_collection())
        .catch_unwind()
        .await;
    disconnect_quietly(probe.as_ref(), metadata_collection_id, "validation probe").await;

    let reason = match capability {
        Ok(Ok(Some(_metadata_collection))) => {
            debug!(
                component = COMPONENT,
                metadata_collection_id, "probe connector validated"
            );
            return Ok(());
        }
        Ok(Ok(None)) => "connector returned no metadata collection".to_string(),
        Ok(Err(err)) => err.to_string(),
        Err(_panic) => "metadata collection request panicked".to_string(),
    };

    warn!(
        event = events::PROBE_CAPABILITY_MISSING,
        component = COMPONENT,
        metadata_collection_id,
        connection = %fields::format_connection(connection),
        reason = reason.as_str(),
        "probe connector has no usable metadata collection"
    );
    Err(FederationError::missing_capability(
        metadata_collection_id,
        reason,
    ))
}

/// Disconnects and logs failures; never propagates.
pub(crate) async fn disconnect_quietly(
    connector: &dyn RepositoryConnector,
    metadata_collection_id: &str,
    purpose: &str,
) {
    if let Err(err) = connector.disconnect().await {
        warn!(
            event = events::CONNECTOR_DISCONNECT_FAILED,
            component = COMPONENT,
            metadata_collection_id,
            purpose,
            err = %err,
            "unable to disconnect connector"
        );
    }
}
