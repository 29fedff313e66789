// Queue Ordering - computes the ordering rank and the next ticket to call

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ServiceType, Station, StationId, Ticket, TicketStatus};

/// Ordering constants. The magnitudes are policy, not law: the defaults
/// reproduce the shipped behavior but hosts may tune them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderingPolicy {
    /// Weight of one service-priority step
    pub priority_weight: i64,
    /// Flat bonus for patients flagged for priority handling
    pub priority_bonus: i64,
    /// Cap on the wait-time credit, so very old tickets cannot invert the
    /// ordering without bound
    pub wait_ceiling_minutes: i64,
}

impl Default for OrderingPolicy {
    fn default() -> Self {
        Self {
            priority_weight: 100,
            priority_bonus: 500,
            wait_ceiling_minutes: 120,
        }
    }
}

/// Pure ordering engine over a live-ticket snapshot. Lower rank = earlier.
#[derive(Debug, Clone, Default)]
pub struct QueueOrdering {
    policy: OrderingPolicy,
}

impl QueueOrdering {
    pub fn new(policy: OrderingPolicy) -> Self {
        Self { policy }
    }

    /// Ordering rank of a ticket. Adjustments apply in a fixed order:
    /// service priority, bounded wait credit, patient priority bonus.
    pub fn rank(&self, ticket: &Ticket, service: &ServiceType, now: DateTime<Utc>) -> i64 {
        let mut score = ticket.position as i64;

        // 1 = highest priority moves earliest
        score -= (6 - service.priority as i64) * self.policy.priority_weight;

        let waited = ticket
            .actual_wait_minutes(now)
            .clamp(0, self.policy.wait_ceiling_minutes);
        score -= waited;

        if ticket.requires_priority {
            score -= self.policy.priority_bonus;
        }

        score
    }

    /// The single next ticket to call among Waiting tickets.
    /// Ties break by earliest `created_at`, then lowest `position` -
    /// deterministic, never iteration order.
    pub fn next_waiting<'a>(
        &self,
        tickets: &'a [Ticket],
        service: &ServiceType,
        now: DateTime<Utc>,
    ) -> Option<&'a Ticket> {
        tickets
            .iter()
            .filter(|t| t.status == TicketStatus::Waiting)
            .min_by_key(|t| (self.rank(t, service, now), t.created_at, t.position))
    }

    /// Next ticket for a specific station: excludes tickets already bound to
    /// a different station.
    pub fn next_for_station<'a>(
        &self,
        tickets: &'a [Ticket],
        service: &ServiceType,
        station: &Station,
        now: DateTime<Utc>,
    ) -> Option<&'a Ticket> {
        tickets
            .iter()
            .filter(|t| t.status == TicketStatus::Waiting)
            .filter(|t| t.station_id.map_or(true, |id| id == station.id))
            .min_by_key(|t| (self.rank(t, service, now), t.created_at, t.position))
    }

    /// Count of live tickets ranking strictly ahead of the given rank.
    /// Drives `queue_length_ahead` for wait-time estimation.
    pub fn ahead_of(
        &self,
        tickets: &[Ticket],
        service: &ServiceType,
        rank: i64,
        now: DateTime<Utc>,
    ) -> usize {
        tickets
            .iter()
            .filter(|t| t.is_live())
            .filter(|t| self.rank(t, service, now) < rank)
            .count()
    }

    /// Whether a ticket may be served at the given station: unbound tickets
    /// qualify everywhere, bound tickets only at their own station.
    pub fn exclude_other_station(ticket: &Ticket, station_id: StationId) -> bool {
        ticket.station_id.map_or(true, |id| id == station_id)
    }
}
