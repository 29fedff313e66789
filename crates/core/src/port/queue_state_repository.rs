// Queue State Repository Port (Interface)

use crate::domain::{QueueKey, QueueState};
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for the denormalized queue-state projections.
///
/// Reads through this port are lock-free and may be at most one in-flight
/// transition stale; writes happen only under the coordinator's per-service
/// lock.
#[async_trait]
pub trait QueueStateRepository: Send + Sync {
    async fn get(&self, key: &QueueKey) -> Result<Option<QueueState>>;

    async fn upsert(&self, state: &QueueState) -> Result<()>;

    async fn all(&self) -> Result<Vec<QueueState>>;

    async fn remove(&self, key: &QueueKey) -> Result<()>;
}
