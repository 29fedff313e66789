// Station Repository Port (Interface)

use crate::domain::{ServiceTypeId, Station, StationId};
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for Station persistence
#[async_trait]
pub trait StationRepository: Send + Sync {
    async fn insert(&self, station: &Station) -> Result<()>;

    async fn update(&self, station: &Station) -> Result<()>;

    async fn find_by_id(&self, id: StationId) -> Result<Option<Station>>;

    /// All active stations
    async fn all_active(&self) -> Result<Vec<Station>>;

    /// Active stations that serve the given service (dedicated or unassigned)
    async fn active_for_service(&self, service_type_id: ServiceTypeId) -> Result<Vec<Station>>;
}
