// In-memory Patient Directory - stands in for the external identity service

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use clinq_core::domain::{Patient, PatientId};
use clinq_core::error::Result;
use clinq_core::port::PatientDirectory;

/// Patient lookup backed by a pre-registered map. Production deployments
/// replace this with an adapter over the real identity service.
#[derive(Default)]
pub struct InMemoryPatientDirectory {
    patients: RwLock<HashMap<PatientId, Patient>>,
}

impl InMemoryPatientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, patient: Patient) {
        self.patients
            .write()
            .await
            .insert(patient.id.clone(), patient);
    }
}

#[async_trait]
impl PatientDirectory for InMemoryPatientDirectory {
    async fn resolve(&self, id: &PatientId) -> Result<Option<Patient>> {
        Ok(self.patients.read().await.get(id).cloned())
    }
}
