use async_trait::async_trait;
use cohort_federation::{ConnectorConsumer, FederationError, RepositoryConnector};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConsumerCall {
    SetLocal(String),
    AddRemote(String),
    RemoveRemote(String),
    DisconnectAll,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConsumerBehaviour {
    #[default]
    Accept,
    /// Records the call, then returns an error.
    Fail,
    /// Records the call, then panics.
    Panic,
}

/// A connector consumer that records every callback and holds the connectors it is given,
/// the way a query-routing service would.
#[derive(Default)]
pub struct RecordingConsumer {
    behaviour: ConsumerBehaviour,
    calls: Mutex<Vec<ConsumerCall>>,
    remote_connectors: Mutex<HashMap<String, Arc<dyn RepositoryConnector>>>,
    unsubscribed: AtomicBool,
    calls_after_unsubscribe: AtomicUsize,
}

impl RecordingConsumer {
    pub fn with_behaviour(behaviour: ConsumerBehaviour) -> Self {
        Self {
            behaviour,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<ConsumerCall> {
        self.calls.lock().expect("lock calls").clone()
    }

    pub fn added_ids(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ConsumerCall::AddRemote(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn removed_ids(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ConsumerCall::RemoveRemote(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn local_ids(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ConsumerCall::SetLocal(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Ids whose remote connector this consumer currently holds.
    pub fn held_remote_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .remote_connectors
            .lock()
            .expect("lock remote_connectors")
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Call once unsubscribe has returned; any later callback is counted as a violation.
    pub fn mark_unsubscribed(&self) {
        self.unsubscribed.store(true, Ordering::SeqCst);
    }

    pub fn calls_after_unsubscribe(&self) -> usize {
        self.calls_after_unsubscribe.load(Ordering::SeqCst)
    }

    fn record(&self, call: ConsumerCall) -> Result<(), FederationError> {
        if self.unsubscribed.load(Ordering::SeqCst) {
            self.calls_after_unsubscribe.fetch_add(1, Ordering::SeqCst);
        }
        debug!(?call, "consumer callback");
        self.calls.lock().expect("lock calls").push(call.clone());

        match self.behaviour {
            ConsumerBehaviour::Accept => Ok(()),
            ConsumerBehaviour::Fail => Err(FederationError::consumer_callback(format!(
                "consumer refused {call:?}"
            ))),
            ConsumerBehaviour::Panic => panic!("consumer panicked on {call:?}"),
        }
    }
}

#[async_trait]
impl ConnectorConsumer for RecordingConsumer {
    async fn set_local_connector(
        &self,
        metadata_collection_id: &str,
        _connector: Arc<dyn RepositoryConnector>,
    ) -> Result<(), FederationError> {
        self.record(ConsumerCall::SetLocal(metadata_collection_id.to_string()))
    }

    async fn add_remote_connector(
        &self,
        metadata_collection_id: &str,
        connector: Arc<dyn RepositoryConnector>,
    ) -> Result<(), FederationError> {
        self.record(ConsumerCall::AddRemote(metadata_collection_id.to_string()))?;

        let replaced = self
            .remote_connectors
            .lock()
            .expect("lock remote_connectors")
            .insert(metadata_collection_id.to_string(), connector);
        if let Some(replaced) = replaced {
            replaced.disconnect().await?;
        }
        Ok(())
    }

    async fn remove_remote_connector(
        &self,
        metadata_collection_id: &str,
    ) -> Result<(), FederationError> {
        self.record(ConsumerCall::RemoveRemote(metadata_collection_id.to_string()))?;

        let removed = self
            .remote_connectors
            .lock()
            .expect("lock remote_connectors")
            .remove(metadata_collection_id);
        if let Some(removed) = removed {
            removed.disconnect().await?;
        }
        Ok(())
    }

    async fn disconnect_all_connectors(&self) -> Result<(), FederationError> {
        self.record(ConsumerCall::DisconnectAll)?;

        let held: Vec<Arc<dyn RepositoryConnector>> = self
            .remote_connectors
            .lock()
            .expect("lock remote_connectors")
            .drain()
            .map(|(_, connector)| connector)
            .collect();
        for connector in held {
            connector.disconnect().await?;
        }
        Ok(())
    }
}
