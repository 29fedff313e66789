// Domain Events - emitted by coordinator operations for the notification
// dispatcher (SMS/audio/display). The core only produces them; delivery is
// an external collaborator and happens after lock release.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::queue_state::QueueKey;
use super::service_type::ServiceTypeId;
use super::station::{StationId, StationStatus};
use super::ticket::TicketId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    TicketCreated {
        ticket_id: TicketId,
        ticket_number: String,
        service_type_id: ServiceTypeId,
        estimated_wait_minutes: u32,
        at: DateTime<Utc>,
    },
    TicketCalled {
        ticket_id: TicketId,
        ticket_number: String,
        station_id: StationId,
        at: DateTime<Utc>,
    },
    TicketStarted {
        ticket_id: TicketId,
        ticket_number: String,
        station_id: StationId,
        at: DateTime<Utc>,
    },
    TicketCompleted {
        ticket_id: TicketId,
        ticket_number: String,
        at: DateTime<Utc>,
    },
    TicketCancelled {
        ticket_id: TicketId,
        ticket_number: String,
        no_show: bool,
        at: DateTime<Utc>,
    },
    TicketTransferred {
        ticket_id: TicketId,
        ticket_number: String,
        from_station_id: Option<StationId>,
        to_station_id: StationId,
        at: DateTime<Utc>,
    },
    QueueStateChanged {
        key: QueueKey,
        queue_length: u32,
        at: DateTime<Utc>,
    },
    StationStatusChanged {
        station_id: StationId,
        status: StationStatus,
        at: DateTime<Utc>,
    },
}
