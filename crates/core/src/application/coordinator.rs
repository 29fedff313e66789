// Queue Coordinator - serializes queue mutations and keeps tickets,
// stations and projections consistent

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info, warn};

use crate::application::catalog::ServiceCatalog;
use crate::application::ledger::{TicketLedger, Transition};
use crate::application::ordering::QueueOrdering;
use crate::application::projector::Projector;
use crate::application::registry::StationRegistry;
use crate::domain::{
    DomainEvent, QueueKey, QueueState, ServiceType, ServiceTypeId, Station, StationId,
    StationStatus, Ticket, TicketId, TicketStatus,
};
use crate::error::{AppError, Result};
use crate::port::{PatientDirectory, QueueStateRepository, TicketRepository, TimeProvider};

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Idle projections older than this are eligible for cleanup
    pub stale_threshold_minutes: i64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            stale_threshold_minutes: 30,
        }
    }
}

/// Result of a queue mutation: the affected ticket, the refreshed global
/// projection and the events to hand to the notification dispatcher (after
/// the lock is already released).
#[derive(Debug, Clone)]
pub struct Outcome {
    pub ticket: Option<Ticket>,
    pub queue_state: Option<QueueState>,
    pub events: Vec<DomainEvent>,
}

/// A patient-facing view of where a ticket stands in its queue.
#[derive(Debug, Clone, Serialize)]
pub struct QueuePositionView {
    pub ticket_id: TicketId,
    pub ticket_number: String,
    pub service_name: String,
    pub status: TicketStatus,
    pub position: i32,
    pub ahead_count: u32,
    pub estimated_wait_minutes: u32,
}

/// Aggregate counters for one calendar day, across all services.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStatistics {
    pub day: NaiveDate,
    pub created: u32,
    pub completed: u32,
    pub cancelled: u32,
    pub no_show: u32,
    pub live: u32,
    pub average_wait_minutes: u32,
    pub average_service_minutes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum LockKey {
    Service(ServiceTypeId),
    Station(StationId),
}

/// Serializes all mutations of a service's queue.
///
/// Locking protocol: the service key is always acquired first, then any
/// station keys in ascending id order. Reads never take a lock. A storage
/// failure aborts the operation (rolling back already-applied steps) and the
/// whole operation is retried once from scratch.
pub struct QueueCoordinator {
    catalog: Arc<ServiceCatalog>,
    ledger: Arc<TicketLedger>,
    registry: Arc<StationRegistry>,
    projector: Arc<Projector>,
    ordering: Arc<QueueOrdering>,
    patients: Arc<dyn PatientDirectory>,
    tickets: Arc<dyn TicketRepository>,
    states: Arc<dyn QueueStateRepository>,
    time: Arc<dyn TimeProvider>,
    config: CoordinatorConfig,
    locks: Mutex<HashMap<LockKey, Arc<Mutex<()>>>>,
}

impl QueueCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        catalog: Arc<ServiceCatalog>,
        ledger: Arc<TicketLedger>,
        registry: Arc<StationRegistry>,
        projector: Arc<Projector>,
        ordering: Arc<QueueOrdering>,
        patients: Arc<dyn PatientDirectory>,
        tickets: Arc<dyn TicketRepository>,
        states: Arc<dyn QueueStateRepository>,
        time: Arc<dyn TimeProvider>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            catalog,
            ledger,
            registry,
            projector,
            ordering,
            patients,
            tickets,
            states,
            time,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    // ---- ticket lifecycle ------------------------------------------------

    /// Issue a new ticket for a patient on a service queue.
    pub async fn create_ticket(
        &self,
        patient_id: &str,
        service_type_id: ServiceTypeId,
    ) -> Result<Outcome> {
        self.retry_storage("create_ticket", || {
            self.create_ticket_once(patient_id, service_type_id)
        })
        .await
    }

    async fn create_ticket_once(
        &self,
        patient_id: &str,
        service_type_id: ServiceTypeId,
    ) -> Result<Outcome> {
        let service = self.catalog.require_active(service_type_id).await?;
        // External lookup happens before the lock is taken
        let patient = self
            .patients
            .resolve(&patient_id.to_string())
            .await?
            .ok_or_else(|| AppError::InvalidInput(format!("unknown patient {patient_id}")))?;

        let _guards = self.acquire(&[LockKey::Service(service.id)]).await;

        let ticket = self.ledger.create(&patient, &service).await?;
        let state = match self.projector.refresh(&service, None).await {
            Ok(state) => state,
            Err(e) => {
                // Creation compensation: the ticket never became visible
                if let Err(re) = self.tickets.remove(&ticket.id).await {
                    error!(ticket_id = %ticket.id, error = %re, "creation rollback failed");
                }
                return Err(e);
            }
        };

        let at = self.time.now();
        let events = vec![
            DomainEvent::TicketCreated {
                ticket_id: ticket.id.clone(),
                ticket_number: ticket.number.clone(),
                service_type_id: service.id,
                estimated_wait_minutes: ticket.estimated_wait_minutes,
                at,
            },
            queue_changed(&state, at),
        ];
        Ok(Outcome {
            ticket: Some(ticket),
            queue_state: Some(state),
            events,
        })
    }

    /// Call the next waiting ticket to a station.
    pub async fn call_next(
        &self,
        service_type_id: ServiceTypeId,
        station_id: StationId,
    ) -> Result<Outcome> {
        self.retry_storage("call_next", || {
            self.call_next_once(service_type_id, station_id)
        })
        .await
    }

    async fn call_next_once(
        &self,
        service_type_id: ServiceTypeId,
        station_id: StationId,
    ) -> Result<Outcome> {
        let service = self.catalog.require_active(service_type_id).await?;
        let _guards = self
            .acquire(&keys(service.id, [station_id]))
            .await;

        let station = self.registry.require_callable(station_id, service.id).await?;
        let live = self.tickets.live_for_service(service.id).await?;
        let now = self.time.now();
        let next = self
            .ordering
            .next_for_station(&live, &service, &station, now)
            .cloned()
            .ok_or_else(|| {
                AppError::QueueEmpty(format!("no waiting tickets for service {}", service.code))
            })?;

        let tr = self.ledger.call(&next.id, &station).await?;

        let station_after = match self.registry.assign(station.id, &tr.after.id).await {
            Ok(s) => s,
            Err(e) => {
                self.rollback_ticket(&tr).await;
                return Err(e);
            }
        };

        let state = match self.refresh_scope(&service, Some(&station_after)).await {
            Ok(state) => state,
            Err(e) => {
                self.rollback_ticket(&tr).await;
                self.rollback_station(&station).await;
                return Err(e);
            }
        };

        let at = self.time.now();
        let events = vec![
            DomainEvent::TicketCalled {
                ticket_id: tr.after.id.clone(),
                ticket_number: tr.after.number.clone(),
                station_id: station.id,
                at,
            },
            DomainEvent::StationStatusChanged {
                station_id: station.id,
                status: StationStatus::Busy,
                at,
            },
            queue_changed(&state, at),
        ];
        Ok(Outcome {
            ticket: Some(tr.after),
            queue_state: Some(state),
            events,
        })
    }

    /// Mark a called ticket as being attended.
    pub async fn start_attention(&self, ticket_id: &TicketId) -> Result<Outcome> {
        self.retry_storage("start_attention", || self.start_attention_once(ticket_id))
            .await
    }

    async fn start_attention_once(&self, ticket_id: &TicketId) -> Result<Outcome> {
        let (_guards, _ticket, service) = self.lock_ticket_scope(ticket_id, None).await?;

        let tr = self.ledger.start(ticket_id).await?;
        let station = match tr.after.station_id {
            Some(id) => Some(self.registry.require(id).await?),
            None => None,
        };

        let state = match self.refresh_scope(&service, station.as_ref()).await {
            Ok(state) => state,
            Err(e) => {
                self.rollback_ticket(&tr).await;
                return Err(e);
            }
        };

        let at = self.time.now();
        let events = vec![
            DomainEvent::TicketStarted {
                ticket_id: tr.after.id.clone(),
                ticket_number: tr.after.number.clone(),
                // start is only reachable from Called, which always binds
                station_id: tr.after.station_id.unwrap_or_default(),
                at,
            },
            queue_changed(&state, at),
        ];
        Ok(Outcome {
            ticket: Some(tr.after),
            queue_state: Some(state),
            events,
        })
    }

    /// Complete an in-progress ticket and free its station.
    pub async fn complete_ticket(
        &self,
        ticket_id: &TicketId,
        notes: Option<&str>,
    ) -> Result<Outcome> {
        self.retry_storage("complete_ticket", || {
            self.complete_ticket_once(ticket_id, notes)
        })
        .await
    }

    async fn complete_ticket_once(
        &self,
        ticket_id: &TicketId,
        notes: Option<&str>,
    ) -> Result<Outcome> {
        let (_guards, _ticket, service) = self.lock_ticket_scope(ticket_id, None).await?;

        let tr = self.ledger.complete(ticket_id, notes).await?;
        let at = self.time.now();
        let mut events = vec![DomainEvent::TicketCompleted {
            ticket_id: tr.after.id.clone(),
            ticket_number: tr.after.number.clone(),
            at,
        }];

        let station = match self.free_station(&tr, &mut events).await {
            Ok(s) => s,
            Err(e) => {
                self.rollback_ticket(&tr).await;
                return Err(e);
            }
        };

        let state = match self.refresh_scope(&service, station.as_ref()).await {
            Ok(state) => state,
            Err(e) => {
                self.rollback_ticket(&tr).await;
                return Err(e);
            }
        };

        events.push(queue_changed(&state, at));
        Ok(Outcome {
            ticket: Some(tr.after),
            queue_state: Some(state),
            events,
        })
    }

    /// Cancel a live ticket. A no-show reason records the NoShow terminal
    /// state instead of Cancelled.
    pub async fn cancel_ticket(&self, ticket_id: &TicketId, reason: &str) -> Result<Outcome> {
        self.retry_storage("cancel_ticket", || self.cancel_ticket_once(ticket_id, reason))
            .await
    }

    async fn cancel_ticket_once(&self, ticket_id: &TicketId, reason: &str) -> Result<Outcome> {
        if reason.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "cancellation requires a reason".to_string(),
            ));
        }
        let (_guards, _ticket, service) = self.lock_ticket_scope(ticket_id, None).await?;

        let tr = self.ledger.cancel(ticket_id, reason).await?;
        let at = self.time.now();
        let mut events = vec![DomainEvent::TicketCancelled {
            ticket_id: tr.after.id.clone(),
            ticket_number: tr.after.number.clone(),
            no_show: tr.after.status == TicketStatus::NoShow,
            at,
        }];

        let station = match self.free_station(&tr, &mut events).await {
            Ok(s) => s,
            Err(e) => {
                self.rollback_ticket(&tr).await;
                return Err(e);
            }
        };

        let state = match self.refresh_scope(&service, station.as_ref()).await {
            Ok(state) => state,
            Err(e) => {
                self.rollback_ticket(&tr).await;
                return Err(e);
            }
        };

        events.push(queue_changed(&state, at));
        Ok(Outcome {
            ticket: Some(tr.after),
            queue_state: Some(state),
            events,
        })
    }

    /// Move a called or in-progress ticket to another station. An
    /// in-progress ticket reverts to Called; attention restarts there.
    pub async fn transfer_ticket(
        &self,
        ticket_id: &TicketId,
        new_station_id: StationId,
        reason: Option<&str>,
    ) -> Result<Outcome> {
        self.retry_storage("transfer_ticket", || {
            self.transfer_ticket_once(ticket_id, new_station_id, reason)
        })
        .await
    }

    async fn transfer_ticket_once(
        &self,
        ticket_id: &TicketId,
        new_station_id: StationId,
        reason: Option<&str>,
    ) -> Result<Outcome> {
        let (_guards, ticket, service) = self
            .lock_ticket_scope(ticket_id, Some(new_station_id))
            .await?;

        let new_station = self
            .registry
            .require_callable(new_station_id, service.id)
            .await?;
        let old_station = match ticket.station_id {
            Some(id) if id != new_station_id => Some(self.registry.require(id).await?),
            _ => None,
        };

        let tr = self.ledger.transfer(ticket_id, &new_station, reason).await?;
        let at = self.time.now();
        let mut events = vec![DomainEvent::TicketTransferred {
            ticket_id: tr.after.id.clone(),
            ticket_number: tr.after.number.clone(),
            from_station_id: tr.before.station_id,
            to_station_id: new_station_id,
            at,
        }];

        if let Some(old) = &old_station {
            match self.registry.release_if_holding(old.id, ticket_id).await {
                Ok(Some(released)) => events.push(DomainEvent::StationStatusChanged {
                    station_id: released.id,
                    status: released.status,
                    at,
                }),
                Ok(None) => {}
                Err(e) => {
                    self.rollback_ticket(&tr).await;
                    return Err(e);
                }
            }
        }

        let new_after = match self.registry.assign(new_station.id, &tr.after.id).await {
            Ok(s) => s,
            Err(e) => {
                self.rollback_ticket(&tr).await;
                if let Some(old) = &old_station {
                    self.rollback_station(old).await;
                }
                return Err(e);
            }
        };
        events.push(DomainEvent::StationStatusChanged {
            station_id: new_after.id,
            status: StationStatus::Busy,
            at,
        });

        let state = match self.refresh_transfer(&service, old_station.as_ref(), &new_after).await {
            Ok(state) => state,
            Err(e) => {
                self.rollback_ticket(&tr).await;
                if let Some(old) = &old_station {
                    self.rollback_station(old).await;
                }
                self.rollback_station(&new_station).await;
                return Err(e);
            }
        };

        events.push(queue_changed(&state, at));
        Ok(Outcome {
            ticket: Some(tr.after),
            queue_state: Some(state),
            events,
        })
    }

    // ---- queue administration --------------------------------------------

    /// Cancel live tickets of a service and release their stations. With a
    /// station scope only the tickets bound to that station are cancelled;
    /// waiting unbound tickets keep their place in line.
    pub async fn reset_queue(
        &self,
        service_type_id: ServiceTypeId,
        station_id: Option<StationId>,
    ) -> Result<Outcome> {
        self.retry_storage("reset_queue", || {
            self.reset_queue_once(service_type_id, station_id)
        })
        .await
    }

    async fn reset_queue_once(
        &self,
        service_type_id: ServiceTypeId,
        station_id: Option<StationId>,
    ) -> Result<Outcome> {
        let service = self
            .catalog
            .get(service_type_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("service type {service_type_id}")))?;
        let scoped_station = match station_id {
            Some(id) => Some(self.registry.require(id).await?),
            None => None,
        };
        let _guards = self.acquire(&keys(service.id, station_id)).await;

        let mut live = self.tickets.live_for_service(service.id).await?;
        live.retain(|t| match station_id {
            Some(id) => t.station_id == Some(id),
            None => true,
        });
        live.sort_by_key(|t| t.position);

        let at = self.time.now();
        let mut events = Vec::new();
        for ticket in &live {
            let tr = self.ledger.cancel(&ticket.id, "queue reset").await?;
            if let Some(bound) = tr.after.station_id {
                self.registry
                    .release_if_holding(bound, &ticket.id)
                    .await?;
            }
            events.push(DomainEvent::TicketCancelled {
                ticket_id: tr.after.id.clone(),
                ticket_number: tr.after.number.clone(),
                no_show: false,
                at,
            });
        }

        let state = match &scoped_station {
            Some(station) => {
                self.projector.refresh(&service, Some(station)).await?;
                self.projector.refresh(&service, None).await?
            }
            None => {
                let stations = self.registry.active_for_service(service.id).await?;
                self.projector.refresh_service(&service, &stations).await?;
                self.projector.refresh(&service, None).await?
            }
        };
        events.push(queue_changed(&state, at));

        info!(
            service_type_id = service.id,
            station_id = ?station_id,
            cancelled = live.len(),
            "queue reset"
        );
        Ok(Outcome {
            ticket: None,
            queue_state: Some(state),
            events,
        })
    }

    /// Rebuild every projection from the live ticket sets. Idempotent: a
    /// second run with no interleaved transition writes identical content.
    pub async fn rebalance(&self) -> Result<u32> {
        self.retry_storage("rebalance", || self.rebalance_once()).await
    }

    async fn rebalance_once(&self) -> Result<u32> {
        let mut refreshed = 0u32;
        for service in self.catalog.all_active().await? {
            let _guards = self.acquire(&[LockKey::Service(service.id)]).await;
            let stations = self.registry.active_for_service(service.id).await?;
            refreshed += self.projector.refresh_service(&service, &stations).await?;
        }
        info!(refreshed, "projections rebuilt");
        Ok(refreshed)
    }

    /// Day-close sweep: live tickets created before today's opening are
    /// closed as no-shows and their stations freed.
    pub async fn close_expired(&self) -> Result<u32> {
        self.retry_storage("close_expired", || self.close_expired_once())
            .await
    }

    async fn close_expired_once(&self) -> Result<u32> {
        let cutoff = match self.time.today().and_hms_opt(0, 0, 0) {
            Some(dt) => dt.and_utc(),
            None => return Ok(0),
        };
        let expired = self.tickets.live_before(cutoff).await?;
        if expired.is_empty() {
            return Ok(0);
        }

        let mut by_service: HashMap<ServiceTypeId, Vec<Ticket>> = HashMap::new();
        for t in expired {
            by_service.entry(t.service_type_id).or_default().push(t);
        }

        let mut closed = 0u32;
        for (service_type_id, tickets) in by_service {
            let service = match self.catalog.get(service_type_id).await? {
                Some(s) => s,
                None => continue,
            };
            let _guards = self.acquire(&[LockKey::Service(service.id)]).await;
            for ticket in tickets {
                // The ticket may have progressed since the unlocked scan
                let current = match self.tickets.find_by_id(&ticket.id).await? {
                    Some(t) if t.is_live() => t,
                    _ => continue,
                };
                let tr = self.ledger.cancel(&current.id, "no show").await?;
                if let Some(station_id) = tr.after.station_id {
                    self.registry
                        .release_if_holding(station_id, &current.id)
                        .await?;
                }
                closed += 1;
            }
            let stations = self.registry.active_for_service(service.id).await?;
            self.projector.refresh_service(&service, &stations).await?;
        }

        info!(closed, "expired tickets closed");
        Ok(closed)
    }

    /// Purge idle projections past the configured staleness threshold.
    pub async fn cleanup_stale(&self) -> Result<u32> {
        self.projector
            .cleanup_stale(self.config.stale_threshold_minutes)
            .await
    }

    // ---- station status --------------------------------------------------

    /// Change a station's operational status. Rejected while the station is
    /// serving a ticket; complete or transfer it first.
    pub async fn set_station_status(
        &self,
        station_id: StationId,
        target: StationStatus,
    ) -> Result<Station> {
        let _guards = self.acquire(&[LockKey::Station(station_id)]).await;

        let station = self.registry.require(station_id).await?;
        if target != StationStatus::Available && station.current_ticket_id.is_some() {
            return Err(AppError::StationUnavailable(format!(
                "station {} is serving a ticket",
                station.code
            )));
        }

        let updated = match target {
            StationStatus::Available => self.registry.set_available(station_id).await?,
            StationStatus::Break => self.registry.set_break(station_id).await?,
            StationStatus::Maintenance => self.registry.set_maintenance(station_id).await?,
            StationStatus::Offline => self.registry.set_offline(station_id).await?,
            StationStatus::Busy => {
                return Err(AppError::InvalidInput(
                    "Busy is set by calling a ticket, not directly".to_string(),
                ))
            }
        };
        Ok(updated)
    }

    // ---- lock-free reads -------------------------------------------------

    /// Current projection for a queue; computed on demand when no cached
    /// projection exists yet. Never takes a lock.
    pub async fn get_queue_state(
        &self,
        service_type_id: ServiceTypeId,
        station_id: Option<StationId>,
    ) -> Result<QueueState> {
        let key = match station_id {
            Some(id) => QueueKey::station(service_type_id, id),
            None => QueueKey::global(service_type_id),
        };
        if let Some(state) = self.states.get(&key).await? {
            return Ok(state);
        }

        let service = self
            .catalog
            .get(service_type_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("service type {service_type_id}")))?;
        let station = match station_id {
            Some(id) => Some(self.registry.require(id).await?),
            None => None,
        };
        self.projector.compute(&service, station.as_ref()).await
    }

    /// Where a ticket stands in its queue right now.
    pub async fn queue_position(&self, ticket_id: &TicketId) -> Result<QueuePositionView> {
        let (ticket, service) = self.load_ticket_context(ticket_id).await?;
        if ticket.status.is_terminal() {
            return Err(AppError::InvalidInput(format!(
                "ticket {} is already {}",
                ticket.number, ticket.status
            )));
        }

        let (ahead_count, estimated_wait_minutes) = if ticket.status == TicketStatus::Waiting {
            let live = self.tickets.live_for_service(service.id).await?;
            let now = self.time.now();
            let rank = self.ordering.rank(&ticket, &service, now);
            let ahead = self.ordering.ahead_of(&live, &service, rank, now);
            (ahead as u32, ticket.estimated_wait_minutes)
        } else {
            (0, 0)
        };

        Ok(QueuePositionView {
            ticket_id: ticket.id.clone(),
            ticket_number: ticket.number.clone(),
            service_name: service.name.clone(),
            status: ticket.status,
            position: ticket.position,
            ahead_count,
            estimated_wait_minutes,
        })
    }

    /// Aggregate counters for one calendar day.
    pub async fn queue_statistics(&self, day: NaiveDate) -> Result<QueueStatistics> {
        let tickets = self.tickets.created_on(day).await?;

        let mut stats = QueueStatistics {
            day,
            created: tickets.len() as u32,
            completed: 0,
            cancelled: 0,
            no_show: 0,
            live: 0,
            average_wait_minutes: 0,
            average_service_minutes: 0,
        };

        let mut waits = Vec::new();
        let mut services = Vec::new();
        for t in &tickets {
            match t.status {
                TicketStatus::Completed => {
                    stats.completed += 1;
                    if let Some(attended) = t.attended_at {
                        let wait = (attended - t.created_at).num_minutes();
                        if wait > 0 {
                            waits.push(wait);
                        }
                    }
                    if let Some(minutes) = t.service_minutes() {
                        services.push(minutes);
                    }
                }
                TicketStatus::Cancelled => stats.cancelled += 1,
                TicketStatus::NoShow => stats.no_show += 1,
                _ => stats.live += 1,
            }
        }

        stats.average_wait_minutes = mean(&waits);
        stats.average_service_minutes = mean(&services);
        Ok(stats)
    }

    // ---- internals -------------------------------------------------------

    async fn retry_storage<T, F, Fut>(&self, op: &'static str, f: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match f().await {
            Err(AppError::Storage(msg)) => {
                warn!(op, error = %msg, "storage failure, retrying once");
                f().await
            }
            other => other,
        }
    }

    async fn acquire(&self, lock_keys: &[LockKey]) -> Vec<OwnedMutexGuard<()>> {
        let mut guards = Vec::with_capacity(lock_keys.len());
        for key in lock_keys {
            let handle = {
                let mut map = self.locks.lock().await;
                map.entry(*key)
                    .or_insert_with(|| Arc::new(Mutex::new(())))
                    .clone()
            };
            guards.push(handle.lock_owned().await);
        }
        guards
    }

    /// Load a ticket and lock its serialization scope. A concurrent transfer
    /// can rebind the ticket between the unlocked read and the lock grab, so
    /// after acquiring we re-read and, if the held keys no longer cover the
    /// ticket's current station, drop and re-acquire until they do.
    async fn lock_ticket_scope(
        &self,
        ticket_id: &TicketId,
        extra_station: Option<StationId>,
    ) -> Result<(Vec<OwnedMutexGuard<()>>, Ticket, ServiceType)> {
        let (mut ticket, mut service) = self.load_ticket_context(ticket_id).await?;
        loop {
            let held = keys(service.id, ticket.station_id.into_iter().chain(extra_station));
            let guards = self.acquire(&held).await;
            let (current, current_service) = self.load_ticket_context(ticket_id).await?;
            let wanted = keys(
                current_service.id,
                current.station_id.into_iter().chain(extra_station),
            );
            if wanted == held {
                return Ok((guards, current, current_service));
            }
            drop(guards);
            ticket = current;
            service = current_service;
        }
    }

    async fn load_ticket_context(&self, ticket_id: &TicketId) -> Result<(Ticket, ServiceType)> {
        let ticket = self
            .tickets
            .find_by_id(ticket_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("ticket {ticket_id}")))?;
        let service = self
            .catalog
            .get(ticket.service_type_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("service type {}", ticket.service_type_id))
            })?;
        Ok((ticket, service))
    }

    /// Refresh the global projection and, when the ticket was bound, the
    /// station's projection. Returns the global one.
    async fn refresh_scope(
        &self,
        service: &ServiceType,
        station: Option<&Station>,
    ) -> Result<QueueState> {
        let state = self.projector.refresh(service, None).await?;
        if let Some(s) = station {
            self.projector.refresh(service, Some(s)).await?;
        }
        Ok(state)
    }

    async fn refresh_transfer(
        &self,
        service: &ServiceType,
        old_station: Option<&Station>,
        new_station: &Station,
    ) -> Result<QueueState> {
        let state = self.projector.refresh(service, None).await?;
        if let Some(old) = old_station {
            self.projector.refresh(service, Some(old)).await?;
        }
        self.projector.refresh(service, Some(new_station)).await?;
        Ok(state)
    }

    /// Free the station bound to a just-terminated ticket, recording the
    /// status event. Returns the station for projection refresh.
    async fn free_station(
        &self,
        tr: &Transition,
        events: &mut Vec<DomainEvent>,
    ) -> Result<Option<Station>> {
        let Some(station_id) = tr.after.station_id else {
            return Ok(None);
        };
        match self
            .registry
            .release_if_holding(station_id, &tr.after.id)
            .await?
        {
            Some(released) => {
                events.push(DomainEvent::StationStatusChanged {
                    station_id: released.id,
                    status: released.status,
                    at: self.time.now(),
                });
                Ok(Some(released))
            }
            None => Ok(Some(self.registry.require(station_id).await?)),
        }
    }

    async fn rollback_ticket(&self, tr: &Transition) {
        if let Err(e) = self.ledger.restore(&tr.before).await {
            error!(ticket_id = %tr.before.id, error = %e, "ticket rollback failed");
        }
    }

    async fn rollback_station(&self, snapshot: &Station) {
        if let Err(e) = self.registry.restore(snapshot).await {
            error!(station_id = snapshot.id, error = %e, "station rollback failed");
        }
    }
}

fn keys(
    service_type_id: ServiceTypeId,
    stations: impl IntoIterator<Item = StationId>,
) -> Vec<LockKey> {
    let mut station_ids: Vec<StationId> = stations.into_iter().collect();
    station_ids.sort_unstable();
    station_ids.dedup();

    let mut all = Vec::with_capacity(station_ids.len() + 1);
    all.push(LockKey::Service(service_type_id));
    all.extend(station_ids.into_iter().map(LockKey::Station));
    all
}

fn queue_changed(state: &QueueState, at: chrono::DateTime<chrono::Utc>) -> DomainEvent {
    DomainEvent::QueueStateChanged {
        key: state.key,
        queue_length: state.queue_length,
        at,
    }
}

fn mean(samples: &[i64]) -> u32 {
    if samples.is_empty() {
        return 0;
    }
    let sum: i64 = samples.iter().sum();
    (sum as f64 / samples.len() as f64).round() as u32
}
