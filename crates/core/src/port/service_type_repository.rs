// Service Type Repository Port (Interface)

use crate::domain::{ServiceType, ServiceTypeId};
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for ServiceType persistence
#[async_trait]
pub trait ServiceTypeRepository: Send + Sync {
    async fn upsert(&self, service_type: &ServiceType) -> Result<()>;

    async fn find_by_id(&self, id: ServiceTypeId) -> Result<Option<ServiceType>>;

    /// All active (not soft-disabled) service types
    async fn all_active(&self) -> Result<Vec<ServiceType>>;
}
