//! API facade layer.
//!
//! The inbound capability groups of the coordinator, expressed as traits so the discovery
//! layer and subscribing services can depend on the capability instead of the concrete
//! [`crate::FederationCoordinator`].
//!
//! ```
//! use std::sync::Arc;
//! use cohort_federation::{
//!     CohortConnectionConsumer, ConnectorManager, FederationConfig, FederationCoordinator,
//! };
//! use federation_test_utils::{remote_member, RecordingConsumer, ScriptedConnectorFactory};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let coordinator = Arc::new(FederationCoordinator::new(
//!     &FederationConfig::new("api-doc", true),
//!     Arc::new(ScriptedConnectorFactory::default()),
//! ).unwrap());
//! let discovery: Arc<dyn CohortConnectionConsumer> = coordinator.clone();
//! let manager: Arc<dyn ConnectorManager> = coordinator.clone();
//!
//! let consumer = Arc::new(RecordingConsumer::default());
//! let subscriber_id = manager.subscribe(consumer.clone()).await;
//!
//! let (identity, connection) = remote_member("mc-1", "https://repo-1:9443");
//! discovery
//!     .announce_join_or_refresh("cohort-a", identity, connection)
//!     .await
//!     .unwrap();
//! assert_eq!(consumer.added_ids(), vec!["mc-1".to_string()]);
//!
//! manager.unsubscribe(subscriber_id).await;
//! # });
//! ```

pub mod connection_consumer;
pub mod connector_manager;
