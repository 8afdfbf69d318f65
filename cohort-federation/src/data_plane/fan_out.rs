//! Per-subscriber callback delivery with failure isolation.

use crate::data_plane::subscriber_registry::SubscriberEntry;
use crate::observability::events;
use crate::{ConnectorConsumer, FederationError};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, warn};

const COMPONENT: &str = "fan_out";

pub(crate) const SET_LOCAL_CONNECTOR: &str = "set_local_connector";
pub(crate) const ADD_REMOTE_CONNECTOR: &str = "add_remote_connector";
pub(crate) const REMOVE_REMOTE_CONNECTOR: &str = "remove_remote_connector";
pub(crate) const DISCONNECT_ALL_CONNECTORS: &str = "disconnect_all_connectors";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Delivery {
    Delivered,
    /// The callback returned an error or panicked; already logged.
    Failed,
    /// The subscriber was removed before the callback could run.
    Retired,
}

/// Invokes one callback on one subscriber. Errors and panics stay with that subscriber.
///
/// `metadata_collection_id` is `None` for callbacks that concern every connector.
pub(crate) async fn deliver<F, Fut>(
    entry: &SubscriberEntry,
    callback: &'static str,
    metadata_collection_id: Option<&str>,
    call: F,
) -> Delivery
where
    F: FnOnce(Arc<dyn ConnectorConsumer>) -> Fut,
    Fut: Future<Output = Result<(), FederationError>>,
{
    let outcome = entry
        .with_active_consumer(|consumer| AssertUnwindSafe(call(consumer)).catch_unwind())
        .await;

    match outcome {
        Some(Ok(Ok(()))) => Delivery::Delivered,
        Some(Ok(Err(err))) => {
            warn!(
                event = events::FAN_OUT_CALLBACK_FAILED,
                component = COMPONENT,
                callback,
                subscriber_id = %entry.id(),
                metadata_collection_id,
                err = %err,
                "connector consumer callback failed"
            );
            Delivery::Failed
        }
        Some(Err(_panic)) => {
            error!(
                event = events::FAN_OUT_CALLBACK_PANICKED,
                component = COMPONENT,
                callback,
                subscriber_id = %entry.id(),
                metadata_collection_id,
                "connector consumer callback panicked"
            );
            Delivery::Failed
        }
        None => {
            debug!(
                event = events::FAN_OUT_SUBSCRIBER_RETIRED,
                component = COMPONENT,
                callback,
                subscriber_id = %entry.id(),
                metadata_collection_id,
                "subscriber retired before delivery"
            );
            Delivery::Retired
        }
    }
}
