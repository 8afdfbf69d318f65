//! The federation's own repository connector.

use crate::RepositoryConnector;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct LocalBinding {
    metadata_collection_id: String,
    connector: Arc<dyn RepositoryConnector>,
}

impl LocalBinding {
    pub(crate) fn new(metadata_collection_id: &str, connector: Arc<dyn RepositoryConnector>) -> Self {
        Self {
            metadata_collection_id: metadata_collection_id.to_string(),
            connector,
        }
    }

    pub(crate) fn metadata_collection_id(&self) -> &str {
        &self.metadata_collection_id
    }

    pub(crate) fn connector(&self) -> Arc<dyn RepositoryConnector> {
        self.connector.clone()
    }
}

impl Debug for LocalBinding {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalBinding")
            .field("metadata_collection_id", &self.metadata_collection_id)
            .finish_non_exhaustive()
    }
}
