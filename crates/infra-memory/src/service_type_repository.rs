// In-memory Service Type Repository

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use clinq_core::domain::{ServiceType, ServiceTypeId};
use clinq_core::error::Result;
use clinq_core::port::ServiceTypeRepository;

#[derive(Default)]
pub struct InMemoryServiceTypeRepository {
    services: RwLock<HashMap<ServiceTypeId, ServiceType>>,
}

impl InMemoryServiceTypeRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ServiceTypeRepository for InMemoryServiceTypeRepository {
    async fn upsert(&self, service_type: &ServiceType) -> Result<()> {
        self.services
            .write()
            .await
            .insert(service_type.id, service_type.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: ServiceTypeId) -> Result<Option<ServiceType>> {
        Ok(self.services.read().await.get(&id).cloned())
    }

    async fn all_active(&self) -> Result<Vec<ServiceType>> {
        let mut active: Vec<ServiceType> = self
            .services
            .read()
            .await
            .values()
            .filter(|s| s.is_active)
            .cloned()
            .collect();
        active.sort_by_key(|s| s.id);
        Ok(active)
    }
}
