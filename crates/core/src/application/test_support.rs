// Shared in-memory fakes for application-layer unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;

use crate::domain::{
    Patient, PatientId, QueueKey, QueueState, ServiceType, ServiceTypeId, Station, StationId,
    Ticket, TicketId,
};
use crate::error::{AppError, Result};
use crate::port::{
    IdProvider, PatientDirectory, QueueStateRepository, ServiceTypeRepository, StationRepository,
    TicketRepository, TimeProvider,
};

#[derive(Default)]
pub struct MemTickets {
    inner: RwLock<HashMap<TicketId, Ticket>>,
    // Remaining writes to fail with a storage error (retry tests)
    failures: AtomicU32,
}

impl MemTickets {
    pub async fn put(&self, ticket: Ticket) {
        self.inner.write().await.insert(ticket.id.clone(), ticket);
    }

    pub fn fail_next_writes(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    fn check_failure(&self) -> Result<()> {
        let prev = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1))
            .unwrap_or(0);
        if prev > 0 {
            return Err(AppError::Storage("injected write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TicketRepository for MemTickets {
    async fn insert(&self, ticket: &Ticket) -> Result<()> {
        self.check_failure()?;
        self.inner
            .write()
            .await
            .insert(ticket.id.clone(), ticket.clone());
        Ok(())
    }

    async fn update(&self, ticket: &Ticket) -> Result<()> {
        self.check_failure()?;
        self.inner
            .write()
            .await
            .insert(ticket.id.clone(), ticket.clone());
        Ok(())
    }

    async fn remove(&self, id: &TicketId) -> Result<()> {
        self.inner.write().await.remove(id);
        Ok(())
    }

    async fn find_by_id(&self, id: &TicketId) -> Result<Option<Ticket>> {
        Ok(self.inner.read().await.get(id).cloned())
    }

    async fn live_for_service(&self, service_type_id: ServiceTypeId) -> Result<Vec<Ticket>> {
        Ok(self
            .inner
            .read()
            .await
            .values()
            .filter(|t| t.service_type_id == service_type_id && t.is_live())
            .cloned()
            .collect())
    }

    async fn completed_since(
        &self,
        service_type_id: ServiceTypeId,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Ticket>> {
        Ok(self
            .inner
            .read()
            .await
            .values()
            .filter(|t| {
                t.service_type_id == service_type_id
                    && t.status == crate::domain::TicketStatus::Completed
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
            .inner
            .read()
            .await
            .values()
            .filter(|t| t.service_type_id == service_type_id && t.created_at.date_naive() == day)
            .count() as u32)
    }

    async fn created_on(&self, day: NaiveDate) -> Result<Vec<Ticket>> {
        Ok(self
            .inner
            .read()
            .await
            .values()
            .filter(|t| t.created_at.date_naive() == day)
            .cloned()
            .collect())
    }

    async fn live_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Ticket>> {
        Ok(self
            .inner
            .read()
            .await
            .values()
            .filter(|t| t.is_live() && t.created_at < cutoff)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemStations {
    inner: RwLock<HashMap<StationId, Station>>,
}

impl MemStations {
    pub async fn put(&self, station: Station) {
        self.inner.write().await.insert(station.id, station);
    }

    pub async fn get(&self, id: StationId) -> Option<Station> {
        self.inner.read().await.get(&id).cloned()
    }
}

#[async_trait]
impl StationRepository for MemStations {
    async fn insert(&self, station: &Station) -> Result<()> {
        self.inner.write().await.insert(station.id, station.clone());
        Ok(())
    }

    async fn update(&self, station: &Station) -> Result<()> {
        self.inner.write().await.insert(station.id, station.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: StationId) -> Result<Option<Station>> {
        Ok(self.inner.read().await.get(&id).cloned())
    }

    async fn all_active(&self) -> Result<Vec<Station>> {
        Ok(self
            .inner
            .read()
            .await
            .values()
            .filter(|s| s.is_active)
            .cloned()
            .collect())
    }

    async fn active_for_service(&self, service_type_id: ServiceTypeId) -> Result<Vec<Station>> {
        Ok(self
            .inner
            .read()
            .await
            .values()
            .filter(|s| s.is_active && s.serves(service_type_id))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemServices {
    inner: RwLock<HashMap<ServiceTypeId, ServiceType>>,
}

impl MemServices {
    pub async fn put(&self, service: ServiceType) {
        self.inner.write().await.insert(service.id, service);
    }
}

#[async_trait]
impl ServiceTypeRepository for MemServices {
    async fn upsert(&self, service_type: &ServiceType) -> Result<()> {
        self.inner
            .write()
            .await
            .insert(service_type.id, service_type.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: ServiceTypeId) -> Result<Option<ServiceType>> {
        Ok(self.inner.read().await.get(&id).cloned())
    }

    async fn all_active(&self) -> Result<Vec<ServiceType>> {
        let mut services: Vec<ServiceType> = self
            .inner
            .read()
            .await
            .values()
            .filter(|s| s.is_active)
            .cloned()
            .collect();
        services.sort_by_key(|s| s.id);
        Ok(services)
    }
}

#[derive(Default)]
pub struct MemStates {
    inner: RwLock<HashMap<QueueKey, QueueState>>,
}

#[async_trait]
impl QueueStateRepository for MemStates {
    async fn get(&self, key: &QueueKey) -> Result<Option<QueueState>> {
        Ok(self.inner.read().await.get(key).cloned())
    }

    async fn upsert(&self, state: &QueueState) -> Result<()> {
        self.inner.write().await.insert(state.key, state.clone());
        Ok(())
    }

    async fn all(&self) -> Result<Vec<QueueState>> {
        Ok(self.inner.read().await.values().cloned().collect())
    }

    async fn remove(&self, key: &QueueKey) -> Result<()> {
        self.inner.write().await.remove(key);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemPatients {
    inner: RwLock<HashMap<PatientId, Patient>>,
}

impl MemPatients {
    pub async fn put(&self, patient: Patient) {
        self.inner.write().await.insert(patient.id.clone(), patient);
    }
}

#[async_trait]
impl PatientDirectory for MemPatients {
    async fn resolve(&self, id: &PatientId) -> Result<Option<Patient>> {
        Ok(self.inner.read().await.get(id).cloned())
    }
}

/// Settable clock for deterministic tests.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, delta: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += delta;
    }
}

impl TimeProvider for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Sequential IDs ("t-1", "t-2", ...) for readable assertions.
#[derive(Default)]
pub struct SeqIds {
    next: AtomicU32,
}

impl IdProvider for SeqIds {
    fn generate_id(&self) -> String {
        format!("t-{}", self.next.fetch_add(1, Ordering::SeqCst) + 1)
    }
}
