// Ticket Repository Port (Interface)

use crate::domain::{ServiceTypeId, Ticket, TicketId};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

/// Repository interface for Ticket persistence.
///
/// The core is agnostic to the concrete storage engine; callers of the
/// coordinator hold the per-service lock while these are invoked, so the
/// implementation needs no ordering guarantees beyond read-your-writes.
#[async_trait]
pub trait TicketRepository: Send + Sync {
    /// Insert a new ticket
    async fn insert(&self, ticket: &Ticket) -> Result<()>;

    /// Update an existing ticket
    async fn update(&self, ticket: &Ticket) -> Result<()>;

    /// Delete a ticket. Used only to compensate a creation that failed
    /// mid-transition; committed tickets are never removed.
    async fn remove(&self, id: &TicketId) -> Result<()>;

    /// Find ticket by ID
    async fn find_by_id(&self, id: &TicketId) -> Result<Option<Ticket>>;

    /// All live (Waiting/Called/InProgress) tickets for a service
    async fn live_for_service(&self, service_type_id: ServiceTypeId) -> Result<Vec<Ticket>>;

    /// Completed tickets for a service with `completed_at >= cutoff`
    async fn completed_since(
        &self,
        service_type_id: ServiceTypeId,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Ticket>>;

    /// Count of tickets created for a service on a calendar day
    /// (drives daily numbering and the capacity check)
    async fn count_created_on(
        &self,
        service_type_id: ServiceTypeId,
        day: NaiveDate,
    ) -> Result<u32>;

    /// All tickets created on a calendar day, any service (statistics)
    async fn created_on(&self, day: NaiveDate) -> Result<Vec<Ticket>>;

    /// Live tickets created before a cutoff instant (day-close sweep)
    async fn live_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Ticket>>;
}
