use async_trait::async_trait;
use cohort_federation::{
    ConnectionDescriptor, ConnectorFactory, FederationError, MetadataCollection,
    RepositoryConnector, RepositoryIdentity,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing::debug;

/// How the factory treats one endpoint address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EndpointScript {
    #[default]
    Healthy,
    InvalidConnection,
    ConstructionFails,
    NoMetadataCollection,
}

struct FakeMetadataCollection {
    metadata_collection_id: String,
}

impl MetadataCollection for FakeMetadataCollection {
    fn metadata_collection_id(&self) -> &str {
        &self.metadata_collection_id
    }
}

pub struct FakeConnector {
    metadata_collection_id: String,
    endpoint_address: String,
    has_metadata_collection: bool,
    disconnected: AtomicBool,
}

impl FakeConnector {
    pub fn new(metadata_collection_id: &str, endpoint_address: &str) -> Self {
        Self {
            metadata_collection_id: metadata_collection_id.to_string(),
            endpoint_address: endpoint_address.to_string(),
            has_metadata_collection: true,
            disconnected: AtomicBool::new(false),
        }
    }

    pub fn metadata_collection_id(&self) -> &str {
        &self.metadata_collection_id
    }

    pub fn endpoint_address(&self) -> &str {
        &self.endpoint_address
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RepositoryConnector for FakeConnector {
    async fn metadata_collection(
        &self,
    ) -> Result<Option<Arc<dyn MetadataCollection>>, FederationError> {
        if !self.has_metadata_collection {
            return Ok(None);
        }
        Ok(Some(Arc::new(FakeMetadataCollection {
            metadata_collection_id: self.metadata_collection_id.clone(),
        })))
    }

    async fn disconnect(&self) -> Result<(), FederationError> {
        self.disconnected.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// The test's side of a build held open by [`ScriptedConnectorFactory::pause_build`].
/// Dropping it releases the build.
pub struct BuildPause {
    reached: oneshot::Receiver<()>,
    release: oneshot::Sender<()>,
}

impl BuildPause {
    /// Resolves once the paused build has started.
    pub async fn reached(&mut self) {
        let _ = (&mut self.reached).await;
    }

    pub fn release(self) {
        let _ = self.release.send(());
    }
}

struct PausedBuild {
    reached: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
}

/// Connector factory whose behaviour is scripted per endpoint address; unscripted endpoints
/// are healthy. Every connector it hands out is kept for later inspection.
#[derive(Default)]
pub struct ScriptedConnectorFactory {
    scripts: Mutex<HashMap<String, EndpointScript>>,
    built: Mutex<Vec<Arc<FakeConnector>>>,
    build_attempts: AtomicUsize,
    pauses: Mutex<HashMap<usize, PausedBuild>>,
}

impl ScriptedConnectorFactory {
    pub fn script_endpoint(&self, endpoint_address: &str, script: EndpointScript) {
        self.scripts
            .lock()
            .expect("lock scripts")
            .insert(endpoint_address.to_string(), script);
    }

    pub fn reject_endpoint(&self, endpoint_address: &str) {
        self.script_endpoint(endpoint_address, EndpointScript::InvalidConnection);
    }

    pub fn restore_endpoint(&self, endpoint_address: &str) {
        self.script_endpoint(endpoint_address, EndpointScript::Healthy);
    }

    /// Holds the `attempt`-th call to `build` (counting from 1) until the returned pause is
    /// released or dropped.
    pub fn pause_build(&self, attempt: usize) -> BuildPause {
        let (reached_tx, reached_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        self.pauses.lock().expect("lock pauses").insert(
            attempt,
            PausedBuild {
                reached: reached_tx,
                release: release_rx,
            },
        );
        BuildPause {
            reached: reached_rx,
            release: release_tx,
        }
    }

    pub fn build_attempts(&self) -> usize {
        self.build_attempts.load(Ordering::SeqCst)
    }

    pub fn built_connectors(&self) -> Vec<Arc<FakeConnector>> {
        self.built.lock().expect("lock built").clone()
    }

    /// Connectors built so far that nobody has disconnected.
    pub fn live_connectors(&self) -> Vec<Arc<FakeConnector>> {
        self.built_connectors()
            .into_iter()
            .filter(|connector| !connector.is_disconnected())
            .collect()
    }

    fn script_for(&self, endpoint_address: &str) -> EndpointScript {
        self.scripts
            .lock()
            .expect("lock scripts")
            .get(endpoint_address)
            .copied()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ConnectorFactory for ScriptedConnectorFactory {
    async fn build(
        &self,
        connection: &ConnectionDescriptor,
        identity: &RepositoryIdentity,
    ) -> Result<Arc<dyn RepositoryConnector>, FederationError> {
        let attempt = self.build_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let paused = self.pauses.lock().expect("lock pauses").remove(&attempt);
        if let Some(paused) = paused {
            debug!(attempt, "build paused");
            let _ = paused.reached.send(());
            let _ = paused.release.await;
        }

        let endpoint_address = connection.endpoint_address.as_str();
        let metadata_collection_id = identity.metadata_collection_id.as_str();
        let script = self.script_for(endpoint_address);
        debug!(endpoint_address, metadata_collection_id, ?script, "building fake connector");

        let has_metadata_collection = match script {
            EndpointScript::InvalidConnection => {
                return Err(FederationError::invalid_connection(
                    metadata_collection_id,
                    format!("no connector provider for {endpoint_address}"),
                ))
            }
            EndpointScript::ConstructionFails => {
                return Err(FederationError::connector_construction(
                    metadata_collection_id,
                    format!("{endpoint_address} refused the handshake"),
                ))
            }
            EndpointScript::NoMetadataCollection => false,
            EndpointScript::Healthy => true,
        };

        let connector = Arc::new(FakeConnector {
            has_metadata_collection,
            ..FakeConnector::new(metadata_collection_id, endpoint_address)
        });
        self.built
            .lock()
            .expect("lock built")
            .push(connector.clone());
        Ok(connector)
    }
}
