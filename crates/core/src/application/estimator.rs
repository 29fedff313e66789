// Wait-Time Estimator - trailing-window averages and congestion projection

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::ServiceType;
use crate::error::Result;
use crate::port::{StationRepository, TicketRepository, TimeProvider};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Trailing window over completed tickets, in minutes
    pub window_minutes: i64,
    /// Queue length at which the congestion factor saturates at 2.0
    pub congestion_saturation: u32,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            window_minutes: 120,
            congestion_saturation: 10,
        }
    }
}

/// Average wait for a service, with provenance: `historical` is false when
/// the configured fallback was used because no completed sample existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AverageWait {
    pub minutes: u32,
    pub historical: bool,
}

/// Computes wait-time estimates from recent completions.
///
/// Estimates are advisory: they quantify expectation, never ordering, and a
/// degenerate sample must never produce a zero or negative estimate.
pub struct WaitTimeEstimator {
    tickets: Arc<dyn TicketRepository>,
    stations: Arc<dyn StationRepository>,
    time: Arc<dyn TimeProvider>,
    config: EstimatorConfig,
}

impl WaitTimeEstimator {
    pub fn new(
        tickets: Arc<dyn TicketRepository>,
        stations: Arc<dyn StationRepository>,
        time: Arc<dyn TimeProvider>,
        config: EstimatorConfig,
    ) -> Self {
        Self {
            tickets,
            stations,
            time,
            config,
        }
    }

    /// Mean actual wait over tickets completed inside the trailing window.
    /// Tickets with a non-positive wait are excluded from the sample; with no
    /// sample at all, falls back to the service's configured average.
    pub async fn average_wait(&self, service: &ServiceType) -> Result<AverageWait> {
        let cutoff = self.time.now() - chrono::Duration::minutes(self.config.window_minutes);
        let completed = self.tickets.completed_since(service.id, cutoff).await?;

        let samples: Vec<i64> = completed
            .iter()
            .filter_map(|t| {
                let attended = t.attended_at?;
                let wait = (attended - t.created_at).num_minutes();
                (wait > 0).then_some(wait)
            })
            .collect();

        if samples.is_empty() {
            return Ok(AverageWait {
                minutes: service.average_service_minutes,
                historical: false,
            });
        }

        let sum: i64 = samples.iter().sum();
        let mean = (sum as f64 / samples.len() as f64).round() as u32;
        debug!(
            service_type_id = service.id,
            samples = samples.len(),
            mean,
            "computed trailing average wait"
        );
        Ok(AverageWait {
            minutes: mean.max(1),
            historical: true,
        })
    }

    /// Published queue-state average: the historical mean scaled by a linear
    /// congestion factor in [1.0, 2.0]. The factor applies only to
    /// historically-derived averages, not the configured fallback.
    pub async fn projected_average(
        &self,
        service: &ServiceType,
        queue_length: u32,
    ) -> Result<u32> {
        let avg = self.average_wait(service).await?;
        if !avg.historical || queue_length == 0 {
            return Ok(avg.minutes);
        }

        let saturation = self.config.congestion_saturation.max(1);
        let factor = 1.0 + (queue_length.min(saturation) as f64 / saturation as f64);
        Ok(((avg.minutes as f64 * factor).round() as u32).max(1))
    }

    /// Estimate for a ticket with `ahead` live tickets ranking before it:
    /// `ahead * average / active_stations`, floored at one minute.
    pub async fn estimate_for_new(&self, service: &ServiceType, ahead: usize) -> Result<u32> {
        let avg = self.average_wait(service).await?;
        let active = self
            .stations
            .active_for_service(service.id)
            .await?
            .iter()
            .filter(|s| s.is_operational())
            .count()
            .max(1);

        let estimate = (ahead as u64 * avg.minutes as u64) / active as u64;
        Ok((estimate as u32).max(1))
    }
}
