// Patient Directory Port - external identity/lookup service

use crate::domain::{Patient, PatientId};
use crate::error::Result;
use async_trait::async_trait;

/// Resolves a patient reference to patient data.
///
/// Backed by the external identity service; the core only consumes the
/// resolved `Patient`. Called before any queue lock is taken.
#[async_trait]
pub trait PatientDirectory: Send + Sync {
    async fn resolve(&self, id: &PatientId) -> Result<Option<Patient>>;
}
