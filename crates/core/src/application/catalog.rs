// Service Catalog - service type definitions and lifecycle

use std::sync::Arc;

use tracing::info;

use crate::domain::{ServiceType, ServiceTypeId};
use crate::error::{AppError, Result};
use crate::port::{ServiceTypeRepository, TicketRepository};

/// Holds service-type definitions and guards their lifecycle rules.
///
/// Definitions are immutable during a queue session: changes made here apply
/// only to tickets created afterwards. Services are never deleted, only
/// soft-disabled, so historical tickets always resolve their service.
pub struct ServiceCatalog {
    services: Arc<dyn ServiceTypeRepository>,
    tickets: Arc<dyn TicketRepository>,
}

impl ServiceCatalog {
    pub fn new(
        services: Arc<dyn ServiceTypeRepository>,
        tickets: Arc<dyn TicketRepository>,
    ) -> Self {
        Self { services, tickets }
    }

    pub async fn get(&self, id: ServiceTypeId) -> Result<Option<ServiceType>> {
        self.services.find_by_id(id).await
    }

    /// Resolve a service that must exist and be active, as required by every
    /// ticket-creating or queue-mutating operation.
    pub async fn require_active(&self, id: ServiceTypeId) -> Result<ServiceType> {
        let service = self
            .services
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::InvalidInput(format!("unknown service type {id}")))?;
        if !service.is_active {
            return Err(AppError::InvalidInput(format!(
                "service type {} is disabled",
                service.code
            )));
        }
        Ok(service)
    }

    pub async fn all_active(&self) -> Result<Vec<ServiceType>> {
        self.services.all_active().await
    }

    /// Create or update a definition. Validation lives in the domain
    /// constructor; this only persists.
    pub async fn upsert(&self, service: &ServiceType) -> Result<()> {
        self.services.upsert(service).await?;
        info!(service_type_id = service.id, code = %service.code, "service type upserted");
        Ok(())
    }

    /// Soft-disable: rejected while live tickets reference the service.
    pub async fn disable(&self, id: ServiceTypeId) -> Result<ServiceType> {
        let mut service = self
            .services
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("service type {id}")))?;

        let live = self.tickets.live_for_service(id).await?;
        if !live.is_empty() {
            return Err(AppError::InvalidInput(format!(
                "service type {} has {} live tickets",
                service.code,
                live.len()
            )));
        }

        service.is_active = false;
        self.services.upsert(&service).await?;
        info!(service_type_id = id, "service type disabled");
        Ok(service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{MemServices, MemTickets};
    use crate::domain::Ticket;
    use chrono::{TimeZone, Utc};

    fn catalog(services: Arc<MemServices>, tickets: Arc<MemTickets>) -> ServiceCatalog {
        ServiceCatalog::new(services, tickets)
    }

    #[tokio::test]
    async fn require_active_rejects_unknown_and_disabled() {
        let services = Arc::new(MemServices::default());
        let mut disabled = ServiceType::new(2, "RES", "Results", "R", 3, 5).unwrap();
        disabled.is_active = false;
        services.put(disabled).await;

        let cat = catalog(services, Arc::new(MemTickets::default()));
        assert!(matches!(
            cat.require_active(1).await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            cat.require_active(2).await,
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn disable_refuses_while_tickets_are_live() {
        let services = Arc::new(MemServices::default());
        services
            .put(ServiceType::new(1, "LAB", "Laboratory", "L", 2, 15).unwrap())
            .await;

        let tickets = Arc::new(MemTickets::default());
        let t0 = Utc.with_ymd_and_hms(2024, 6, 3, 8, 0, 0).unwrap();
        tickets
            .put(Ticket::new("t-1", "L001", 1, "p", false, 1, 5, t0).unwrap())
            .await;

        let cat = catalog(services, tickets.clone());
        assert!(cat.disable(1).await.is_err());

        // Once the ticket is terminal the disable goes through
        let mut t = tickets.find_by_id(&"t-1".to_string()).await.unwrap().unwrap();
        t.cancel("left", t0).unwrap();
        tickets.put(t).await;

        let disabled = cat.disable(1).await.unwrap();
        assert!(!disabled.is_active);
        assert!(cat.require_active(1).await.is_err());
    }
}
