// Ticket Ledger - ticket creation (numbering, capacity, estimate) and
// persisted status transitions

use std::sync::Arc;

use tracing::info;

use crate::application::estimator::WaitTimeEstimator;
use crate::application::ordering::QueueOrdering;
use crate::domain::{Patient, ServiceType, Station, Ticket, TicketId};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, TicketRepository, TimeProvider};

/// A persisted ticket transition: the state before and after. The `before`
/// snapshot is what rollback paths restore.
#[derive(Debug, Clone)]
pub struct Transition {
    pub before: Ticket,
    pub after: Ticket,
}

/// Creates tickets and applies status transitions, persisting each one.
///
/// Callers (the coordinator) hold the per-service lock; the ledger itself
/// assumes exclusive access to the service's live set for the duration of a
/// call.
pub struct TicketLedger {
    tickets: Arc<dyn TicketRepository>,
    ordering: Arc<QueueOrdering>,
    estimator: Arc<WaitTimeEstimator>,
    time: Arc<dyn TimeProvider>,
    ids: Arc<dyn IdProvider>,
}

impl TicketLedger {
    pub fn new(
        tickets: Arc<dyn TicketRepository>,
        ordering: Arc<QueueOrdering>,
        estimator: Arc<WaitTimeEstimator>,
        time: Arc<dyn TimeProvider>,
        ids: Arc<dyn IdProvider>,
    ) -> Self {
        Self {
            tickets,
            ordering,
            estimator,
            time,
            ids,
        }
    }

    /// Create a ticket: daily number, queue position, capacity check and the
    /// initial wait estimate, then insert.
    pub async fn create(&self, patient: &Patient, service: &ServiceType) -> Result<Ticket> {
        let today = self.time.today();
        let created_today = self.tickets.count_created_on(service.id, today).await?;

        if let Some(cap) = service.daily_ticket_cap {
            if created_today >= cap {
                return Err(AppError::CapacityExceeded(format!(
                    "service {} reached its daily cap of {}",
                    service.code, cap
                )));
            }
        }

        let live = self.tickets.live_for_service(service.id).await?;
        let now = self.time.now();

        let mut ticket = Ticket::new(
            self.ids.generate_id(),
            service.format_ticket_number(created_today + 1),
            service.id,
            patient.id.clone(),
            patient.requires_priority,
            live.len() as i32 + 1,
            0,
            now,
        )?;

        let rank = self.ordering.rank(&ticket, service, now);
        let ahead = self.ordering.ahead_of(&live, service, rank, now);
        ticket.estimated_wait_minutes = self.estimator.estimate_for_new(service, ahead).await?;

        self.tickets.insert(&ticket).await?;
        info!(
            ticket_id = %ticket.id,
            number = %ticket.number,
            service_type_id = service.id,
            position = ticket.position,
            estimated_wait_minutes = ticket.estimated_wait_minutes,
            "ticket created"
        );
        Ok(ticket)
    }

    /// Waiting -> Called at the given station.
    pub async fn call(&self, ticket_id: &TicketId, station: &Station) -> Result<Transition> {
        self.apply(ticket_id, |t, now| t.call(station.id, now)).await
    }

    /// Called -> InProgress.
    pub async fn start(&self, ticket_id: &TicketId) -> Result<Transition> {
        self.apply(ticket_id, |t, now| t.start(now)).await
    }

    /// InProgress -> Completed, with optional notes.
    pub async fn complete(
        &self,
        ticket_id: &TicketId,
        notes: Option<&str>,
    ) -> Result<Transition> {
        self.apply(ticket_id, |t, now| t.complete(notes, now)).await
    }

    /// Live -> Cancelled | NoShow, reason recorded as a note.
    pub async fn cancel(&self, ticket_id: &TicketId, reason: &str) -> Result<Transition> {
        self.apply(ticket_id, |t, now| t.cancel(reason, now)).await
    }

    /// Called | InProgress -> Called at a new station. The reason, when
    /// given, joins the ticket's note trail.
    pub async fn transfer(
        &self,
        ticket_id: &TicketId,
        new_station: &Station,
        reason: Option<&str>,
    ) -> Result<Transition> {
        self.apply(ticket_id, |t, _now| {
            t.transfer(new_station.id)?;
            if let Some(r) = reason {
                t.append_note(&format!("transferred to {}: {}", new_station.code, r));
            }
            Ok(())
        })
        .await
    }

    /// Restore a pre-transition snapshot; used by coordinator rollback.
    pub async fn restore(&self, snapshot: &Ticket) -> Result<()> {
        self.tickets.update(snapshot).await
    }

    async fn apply<F>(&self, ticket_id: &TicketId, mutate: F) -> Result<Transition>
    where
        F: FnOnce(&mut Ticket, chrono::DateTime<chrono::Utc>) -> crate::domain::error::Result<()>,
    {
        let before = self
            .tickets
            .find_by_id(ticket_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("ticket {ticket_id}")))?;

        let mut after = before.clone();
        mutate(&mut after, self.time.now())?;
        self.tickets.update(&after).await?;

        info!(
            ticket_id = %after.id,
            number = %after.number,
            from = %before.status,
            to = %after.status,
            "ticket transition"
        );
        Ok(Transition { before, after })
    }
}
