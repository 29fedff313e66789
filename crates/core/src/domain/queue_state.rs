// Queue State Projection - denormalized per (service, station) summary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::service_type::ServiceTypeId;
use super::station::StationId;
use super::ticket::TicketId;

/// Projection key: one global state per service plus one per station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueKey {
    pub service_type_id: ServiceTypeId,
    pub station_id: Option<StationId>,
}

impl QueueKey {
    pub fn global(service_type_id: ServiceTypeId) -> Self {
        Self {
            service_type_id,
            station_id: None,
        }
    }

    pub fn station(service_type_id: ServiceTypeId, station_id: StationId) -> Self {
        Self {
            service_type_id,
            station_id: Some(station_id),
        }
    }
}

/// Cached queue summary. Derived, never authoritative: always recomputable
/// from the live ticket set.
///
/// Invariants: `queue_length == 0` implies `next_ticket_id == None`.
/// `queue_length` counts Waiting tickets (a called ticket has left the
/// waiting line even though it is still live).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueState {
    pub key: QueueKey,
    pub queue_length: u32,
    pub current_ticket_id: Option<TicketId>,
    pub next_ticket_id: Option<TicketId>,
    pub average_wait_minutes: u32,
    pub last_update_at: DateTime<Utc>,
}

impl QueueState {
    pub fn empty(key: QueueKey, now: DateTime<Utc>) -> Self {
        Self {
            key,
            queue_length: 0,
            current_ticket_id: None,
            next_ticket_id: None,
            average_wait_minutes: 0,
            last_update_at: now,
        }
    }

    /// Idle projections (nothing queued, nothing in attention) are the only
    /// ones `cleanup_stale` may purge.
    pub fn is_idle(&self) -> bool {
        self.queue_length == 0 && self.current_ticket_id.is_none()
    }

    /// Equality ignoring the refresh timestamp; used to assert the
    /// incremental-vs-rebuild equivalence property.
    pub fn same_content(&self, other: &QueueState) -> bool {
        self.key == other.key
            && self.queue_length == other.queue_length
            && self.current_ticket_id == other.current_ticket_id
            && self.next_ticket_id == other.next_ticket_id
            && self.average_wait_minutes == other.average_wait_minutes
    }
}
