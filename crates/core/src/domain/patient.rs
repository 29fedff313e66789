// Patient reference - minimal shape consumed from the identity service

use serde::{Deserialize, Serialize};

/// Patient identifier (opaque, owned by the external identity service)
pub type PatientId = String;

/// The slice of patient data the queue core needs.
///
/// Resolved through the `PatientDirectory` port; the core never talks to the
/// identity service directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub id: PatientId,
    pub full_name: String,
    /// Age-based or explicitly flagged priority handling
    pub requires_priority: bool,
}

impl Patient {
    pub fn new(id: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            full_name: full_name.into(),
            requires_priority: false,
        }
    }

    pub fn with_priority(mut self) -> Self {
        self.requires_priority = true;
        self
    }
}
