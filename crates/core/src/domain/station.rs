// Station Domain Model - operational status and current ticket binding

use serde::{Deserialize, Serialize};

use super::error::{DomainError, Result};
use super::service_type::ServiceTypeId;
use super::ticket::TicketId;

/// Station identifier
pub type StationId = i32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StationStatus {
    Available,
    Busy,
    Break,
    Maintenance,
    Offline,
}

impl std::fmt::Display for StationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StationStatus::Available => write!(f, "Available"),
            StationStatus::Busy => write!(f, "Busy"),
            StationStatus::Break => write!(f, "Break"),
            StationStatus::Maintenance => write!(f, "Maintenance"),
            StationStatus::Offline => write!(f, "Offline"),
        }
    }
}

/// A service window/booth.
///
/// Invariant: `current_ticket_id` is set only while `status == Busy`.
/// Offline/Maintenance stations accept no operation except an explicit
/// restore to Available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    pub id: StationId,
    pub code: String,
    pub name: String,
    /// Service this station is dedicated to; `None` serves any
    pub service_type_id: Option<ServiceTypeId>,
    pub status: StationStatus,
    pub current_ticket_id: Option<TicketId>,
    pub is_active: bool,
}

impl Station {
    pub fn new(
        id: StationId,
        code: impl Into<String>,
        name: impl Into<String>,
        service_type_id: Option<ServiceTypeId>,
    ) -> Self {
        Self {
            id,
            code: code.into(),
            name: name.into(),
            service_type_id,
            status: StationStatus::Available,
            current_ticket_id: None,
            is_active: true,
        }
    }

    pub fn is_available(&self) -> bool {
        self.is_active && self.status == StationStatus::Available
    }

    /// Available or Busy stations count toward wait-time estimation.
    pub fn is_operational(&self) -> bool {
        self.is_active && matches!(self.status, StationStatus::Available | StationStatus::Busy)
    }

    pub fn serves(&self, service_type_id: ServiceTypeId) -> bool {
        match self.service_type_id {
            Some(id) => id == service_type_id,
            None => true,
        }
    }

    /// Restore to Available. The only transition allowed out of
    /// Offline/Maintenance; always clears the ticket binding.
    pub fn set_available(&mut self) {
        self.status = StationStatus::Available;
        self.current_ticket_id = None;
    }

    /// Bind a ticket and mark Busy.
    pub fn assign(&mut self, ticket_id: TicketId) -> Result<()> {
        self.guard_operable("assign")?;
        self.status = StationStatus::Busy;
        self.current_ticket_id = Some(ticket_id);
        Ok(())
    }

    /// Clear the binding and return to Available. Both fields change
    /// together; there is no state with a binding and a non-Busy status.
    pub fn release(&mut self) {
        self.current_ticket_id = None;
        if self.status == StationStatus::Busy {
            self.status = StationStatus::Available;
        }
    }

    pub fn set_break(&mut self) -> Result<()> {
        self.guard_operable("break")?;
        self.status = StationStatus::Break;
        self.current_ticket_id = None;
        Ok(())
    }

    pub fn set_maintenance(&mut self) {
        self.status = StationStatus::Maintenance;
        self.current_ticket_id = None;
    }

    pub fn set_offline(&mut self) {
        self.status = StationStatus::Offline;
        self.current_ticket_id = None;
    }

    fn guard_operable(&self, op: &str) -> Result<()> {
        if matches!(
            self.status,
            StationStatus::Offline | StationStatus::Maintenance
        ) {
            return Err(DomainError::InvalidStationState(format!(
                "station {} is {} and cannot {}",
                self.code, self.status, op
            )));
        }
        Ok(())
    }
}
