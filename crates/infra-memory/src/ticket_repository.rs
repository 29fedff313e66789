// In-memory Ticket Repository

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;

use clinq_core::domain::{ServiceTypeId, Ticket, TicketId, TicketStatus};
use clinq_core::error::{AppError, Result};
use clinq_core::port::TicketRepository;

/// Ticket store backed by a `HashMap` under an async `RwLock`.
///
/// Insert/update distinguish between new and existing keys so that the same
/// bugs a persistent store would reject (double insert, update of a missing
/// row) surface here too.
#[derive(Default)]
pub struct InMemoryTicketRepository {
    tickets: RwLock<HashMap<TicketId, Ticket>>,
}

impl InMemoryTicketRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TicketRepository for InMemoryTicketRepository {
    async fn insert(&self, ticket: &Ticket) -> Result<()> {
        let mut tickets = self.tickets.write().await;
        if tickets.contains_key(&ticket.id) {
            return Err(AppError::Storage(format!(
                "ticket {} already exists",
                ticket.id
            )));
        }
        tickets.insert(ticket.id.clone(), ticket.clone());
        Ok(())
    }

    async fn update(&self, ticket: &Ticket) -> Result<()> {
        let mut tickets = self.tickets.write().await;
        match tickets.get_mut(&ticket.id) {
            Some(slot) => {
                *slot = ticket.clone();
                Ok(())
            }
            None => Err(AppError::Storage(format!(
                "ticket {} does not exist",
                ticket.id
            ))),
        }
    }

    async fn remove(&self, id: &TicketId) -> Result<()> {
        self.tickets.write().await.remove(id);
        Ok(())
    }

    async fn find_by_id(&self, id: &TicketId) -> Result<Option<Ticket>> {
        Ok(self.tickets.read().await.get(id).cloned())
    }

    async fn live_for_service(&self, service_type_id: ServiceTypeId) -> Result<Vec<Ticket>> {
        let mut live: Vec<Ticket> = self
            .tickets
            .read()
            .await
            .values()
            .filter(|t| t.service_type_id == service_type_id && t.is_live())
            .cloned()
            .collect();
        live.sort_by_key(|t| t.position);
        Ok(live)
    }

    async fn completed_since(
        &self,
        service_type_id: ServiceTypeId,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Ticket>> {
        Ok(self
            .tickets
            .read()
            .await
            .values()
            .filter(|t| {
                t.service_type_id == service_type_id
                    && t.status == TicketStatus::Completed
                    && t.completed_at.is_some_and(|c| c >= cutoff)
            })
            .cloned()
            .collect())
    }

    async fn count_created_on(
        &self,
        service_type_id: ServiceTypeId,
        day: NaiveDate,
    ) -> Result<u32> {
        Ok(self
            .tickets
            .read()
            .await
            .values()
            .filter(|t| t.service_type_id == service_type_id && t.created_at.date_naive() == day)
            .count() as u32)
    }

    async fn created_on(&self, day: NaiveDate) -> Result<Vec<Ticket>> {
        Ok(self
            .tickets
            .read()
            .await
            .values()
            .filter(|t| t.created_at.date_naive() == day)
            .cloned()
            .collect())
    }

    async fn live_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Ticket>> {
        Ok(self
            .tickets
            .read()
            .await
            .values()
            .filter(|t| t.is_live() && t.created_at < cutoff)
            .cloned()
            .collect())
    }
}
