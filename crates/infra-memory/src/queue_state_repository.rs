// In-memory Queue State Repository

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use clinq_core::domain::{QueueKey, QueueState};
use clinq_core::error::Result;
use clinq_core::port::QueueStateRepository;

#[derive(Default)]
pub struct InMemoryQueueStateRepository {
    states: RwLock<HashMap<QueueKey, QueueState>>,
}

impl InMemoryQueueStateRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueStateRepository for InMemoryQueueStateRepository {
    async fn get(&self, key: &QueueKey) -> Result<Option<QueueState>> {
        Ok(self.states.read().await.get(key).cloned())
    }

    async fn upsert(&self, state: &QueueState) -> Result<()> {
        self.states.write().await.insert(state.key, state.clone());
        Ok(())
    }

    async fn all(&self) -> Result<Vec<QueueState>> {
        Ok(self.states.read().await.values().cloned().collect())
    }

    async fn remove(&self, key: &QueueKey) -> Result<()> {
        self.states.write().await.remove(key);
        Ok(())
    }
}
