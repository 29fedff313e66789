// In-memory Station Repository

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use clinq_core::domain::{ServiceTypeId, Station, StationId};
use clinq_core::error::{AppError, Result};
use clinq_core::port::StationRepository;

#[derive(Default)]
pub struct InMemoryStationRepository {
    stations: RwLock<HashMap<StationId, Station>>,
}

impl InMemoryStationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StationRepository for InMemoryStationRepository {
    async fn insert(&self, station: &Station) -> Result<()> {
        let mut stations = self.stations.write().await;
        if stations.contains_key(&station.id) {
            return Err(AppError::Storage(format!(
                "station {} already exists",
                station.id
            )));
        }
        stations.insert(station.id, station.clone());
        Ok(())
    }

    async fn update(&self, station: &Station) -> Result<()> {
        let mut stations = self.stations.write().await;
        match stations.get_mut(&station.id) {
            Some(slot) => {
                *slot = station.clone();
                Ok(())
            }
            None => Err(AppError::Storage(format!(
                "station {} does not exist",
                station.id
            ))),
        }
    }

    async fn find_by_id(&self, id: StationId) -> Result<Option<Station>> {
        Ok(self.stations.read().await.get(&id).cloned())
    }

    async fn all_active(&self) -> Result<Vec<Station>> {
        let mut active: Vec<Station> = self
            .stations
            .read()
            .await
            .values()
            .filter(|s| s.is_active)
            .cloned()
            .collect();
        active.sort_by_key(|s| s.id);
        Ok(active)
    }

    async fn active_for_service(&self, service_type_id: ServiceTypeId) -> Result<Vec<Station>> {
        let mut matching: Vec<Station> = self
            .stations
            .read()
            .await
            .values()
            .filter(|s| s.is_active && s.serves(service_type_id))
            .cloned()
            .collect();
        matching.sort_by_key(|s| s.id);
        Ok(matching)
    }
}
