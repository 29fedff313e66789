// Station Registry - station operational status and ticket bindings

use std::sync::Arc;

use tracing::info;

use crate::domain::{ServiceTypeId, Station, StationId, TicketId};
use crate::error::{AppError, Result};
use crate::port::StationRepository;

/// Manages station status transitions and the station/ticket binding.
///
/// Status changes that interrupt work (break, maintenance, offline) do NOT
/// touch the ticket side here; the coordinator decides what happens to an
/// interrupted ticket and calls back in.
pub struct StationRegistry {
    stations: Arc<dyn StationRepository>,
}

impl StationRegistry {
    pub fn new(stations: Arc<dyn StationRepository>) -> Self {
        Self { stations }
    }

    pub async fn require(&self, id: StationId) -> Result<Station> {
        self.stations
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("station {id}")))
    }

    /// Station that exists, is available, and serves the given service.
    pub async fn require_callable(
        &self,
        id: StationId,
        service_type_id: ServiceTypeId,
    ) -> Result<Station> {
        let station = self.require(id).await?;
        if !station.serves(service_type_id) {
            return Err(AppError::StationUnavailable(format!(
                "station {} does not serve service {}",
                station.code, service_type_id
            )));
        }
        if !station.is_available() {
            return Err(AppError::StationUnavailable(format!(
                "station {} is {}",
                station.code, station.status
            )));
        }
        Ok(station)
    }

    /// Bind a ticket to a station, marking it Busy.
    pub async fn assign(&self, id: StationId, ticket_id: &TicketId) -> Result<Station> {
        let mut station = self.require(id).await?;
        station.assign(ticket_id.clone()).map_err(AppError::from)?;
        self.stations.update(&station).await?;
        Ok(station)
    }

    /// Release a station unconditionally (binding cleared, Busy -> Available).
    pub async fn release(&self, id: StationId) -> Result<Station> {
        let mut station = self.require(id).await?;
        station.release();
        self.stations.update(&station).await?;
        Ok(station)
    }

    /// Release only if the station still holds the given ticket. Guards
    /// against clearing a binding that has since moved on.
    pub async fn release_if_holding(
        &self,
        id: StationId,
        ticket_id: &TicketId,
    ) -> Result<Option<Station>> {
        let mut station = self.require(id).await?;
        if station.current_ticket_id.as_ref() != Some(ticket_id) {
            return Ok(None);
        }
        station.release();
        self.stations.update(&station).await?;
        Ok(Some(station))
    }

    pub async fn set_available(&self, id: StationId) -> Result<Station> {
        let mut station = self.require(id).await?;
        station.set_available();
        self.stations.update(&station).await?;
        info!(station_id = id, "station restored to available");
        Ok(station)
    }

    pub async fn set_break(&self, id: StationId) -> Result<Station> {
        let mut station = self.require(id).await?;
        station.set_break().map_err(AppError::from)?;
        self.stations.update(&station).await?;
        info!(station_id = id, "station on break");
        Ok(station)
    }

    pub async fn set_maintenance(&self, id: StationId) -> Result<Station> {
        let mut station = self.require(id).await?;
        station.set_maintenance();
        self.stations.update(&station).await?;
        info!(station_id = id, "station in maintenance");
        Ok(station)
    }

    pub async fn set_offline(&self, id: StationId) -> Result<Station> {
        let mut station = self.require(id).await?;
        station.set_offline();
        self.stations.update(&station).await?;
        info!(station_id = id, "station offline");
        Ok(station)
    }

    pub async fn active_for_service(&self, service_type_id: ServiceTypeId) -> Result<Vec<Station>> {
        self.stations.active_for_service(service_type_id).await
    }

    pub async fn all_active(&self) -> Result<Vec<Station>> {
        self.stations.all_active().await
    }

    /// Persist a previously captured snapshot; used by rollback paths.
    pub async fn restore(&self, snapshot: &Station) -> Result<()> {
        self.stations.update(snapshot).await
    }
}
