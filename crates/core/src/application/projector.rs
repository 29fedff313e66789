// Queue State Projector - recomputes the denormalized per-queue summaries

use std::sync::Arc;

use tracing::{debug, info};

use crate::application::estimator::WaitTimeEstimator;
use crate::application::ordering::QueueOrdering;
use crate::domain::{QueueKey, QueueState, ServiceType, Station, Ticket, TicketStatus};
use crate::error::Result;
use crate::port::{QueueStateRepository, TicketRepository, TimeProvider};

/// Maintains the queue-state projections.
///
/// There is exactly one computation path: incremental refreshes after a
/// transition and the full rebuild both call [`Projector::compute`], so the
/// two can never drift apart.
pub struct Projector {
    tickets: Arc<dyn TicketRepository>,
    states: Arc<dyn QueueStateRepository>,
    ordering: Arc<QueueOrdering>,
    estimator: Arc<WaitTimeEstimator>,
    time: Arc<dyn TimeProvider>,
}

impl Projector {
    pub fn new(
        tickets: Arc<dyn TicketRepository>,
        states: Arc<dyn QueueStateRepository>,
        ordering: Arc<QueueOrdering>,
        estimator: Arc<WaitTimeEstimator>,
        time: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            tickets,
            states,
            ordering,
            estimator,
            time,
        }
    }

    /// Compute a projection from the live ticket set, without persisting.
    pub async fn compute(
        &self,
        service: &ServiceType,
        station: Option<&Station>,
    ) -> Result<QueueState> {
        let live = self.tickets.live_for_service(service.id).await?;
        let now = self.time.now();

        let key = match station {
            Some(s) => QueueKey::station(service.id, s.id),
            None => QueueKey::global(service.id),
        };

        let in_scope = |t: &Ticket| match station {
            Some(s) => QueueOrdering::exclude_other_station(t, s.id),
            None => true,
        };

        let queue_length = live
            .iter()
            .filter(|t| t.status == TicketStatus::Waiting && in_scope(t))
            .count() as u32;

        // In-attention ticket for the scope; earliest call wins in the
        // global view when several stations are serving at once
        let current_ticket_id = live
            .iter()
            .filter(|t| matches!(t.status, TicketStatus::Called | TicketStatus::InProgress))
            .filter(|t| match station {
                Some(s) => t.station_id == Some(s.id),
                None => true,
            })
            .min_by_key(|t| (t.called_at, t.position))
            .map(|t| t.id.clone());

        let next_ticket_id = match station {
            Some(s) => self.ordering.next_for_station(&live, service, s, now),
            None => self.ordering.next_waiting(&live, service, now),
        }
        .map(|t| t.id.clone());

        let average_wait_minutes = self.estimator.projected_average(service, queue_length).await?;

        Ok(QueueState {
            key,
            queue_length,
            current_ticket_id,
            next_ticket_id,
            average_wait_minutes,
            last_update_at: now,
        })
    }

    /// Recompute and persist one projection.
    pub async fn refresh(
        &self,
        service: &ServiceType,
        station: Option<&Station>,
    ) -> Result<QueueState> {
        let state = self.compute(service, station).await?;
        self.states.upsert(&state).await?;
        debug!(
            service_type_id = state.key.service_type_id,
            station_id = ?state.key.station_id,
            queue_length = state.queue_length,
            "queue state refreshed"
        );
        Ok(state)
    }

    /// Refresh the global projection plus one per dedicated station.
    /// Returns the number of projections written.
    pub async fn refresh_service(
        &self,
        service: &ServiceType,
        stations: &[Station],
    ) -> Result<u32> {
        let mut refreshed = 1u32;
        self.refresh(service, None).await?;
        for station in stations {
            if station.service_type_id == Some(service.id) {
                self.refresh(service, Some(station)).await?;
                refreshed += 1;
            }
        }
        Ok(refreshed)
    }

    /// Remove idle projections not refreshed within the threshold. Non-idle
    /// projections are never purged regardless of age.
    pub async fn cleanup_stale(&self, threshold_minutes: i64) -> Result<u32> {
        let now = self.time.now();
        let mut removed = 0u32;
        for state in self.states.all().await? {
            let age = (now - state.last_update_at).num_minutes();
            if state.is_idle() && age > threshold_minutes {
                self.states.remove(&state.key).await?;
                removed += 1;
            }
        }
        if removed > 0 {
            info!(removed, "purged stale queue projections");
        }
        Ok(removed)
    }
}
