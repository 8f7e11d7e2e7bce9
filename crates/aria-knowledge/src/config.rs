//! Knowledge store configuration

use crate::backend::JsonlBackend;
use crate::store::KnowledgeStore;
use aria_core::Clock;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// JSON-lines file backing the store. Memory only when unset.
    pub path: Option<PathBuf>,
}

impl KnowledgeConfig {
    /// Build the configured store. A backing file that cannot be opened or
    /// read leaves the store running in memory, flagged as degraded.
    pub fn build(&self, clock: Arc<dyn Clock>) -> KnowledgeStore {
        let Some(path) = &self.path else {
            return KnowledgeStore::in_memory(clock);
        };
        let opened = JsonlBackend::open(path)
            .and_then(|backend| KnowledgeStore::open(Box::new(backend), clock.clone()));
        match opened {
            Ok(store) => {
                tracing::info!("Knowledge store backed by {}", path.display());
                store
            }
            Err(e) => {
                tracing::warn!(
                    "Knowledge store at {} unavailable: {}, continuing in memory",
                    path.display(),
                    e
                );
                KnowledgeStore::degraded(clock)
            }
        }
    }
}
