// Service Type Domain Model

use serde::{Deserialize, Serialize};

use super::error::{DomainError, Result};

/// Service type identifier
pub type ServiceTypeId = i32;

/// A service offered by the lab (e.g. sample collection, results pickup).
///
/// Immutable during a queue session: admin changes apply only to future
/// tickets. Never deleted while tickets reference it; soft-disable only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceType {
    pub id: ServiceTypeId,
    pub code: String,
    pub name: String,
    /// Ticket number prefix (e.g. "L" -> L001, L002, ...)
    pub ticket_prefix: String,
    /// 1 = highest .. 5 = lowest
    pub priority: i32,
    pub average_service_minutes: u32,
    /// Optional per-day ticket cap; `None` means unbounded
    pub daily_ticket_cap: Option<u32>,
    pub is_active: bool,
}

impl ServiceType {
    pub fn new(
        id: ServiceTypeId,
        code: impl Into<String>,
        name: impl Into<String>,
        ticket_prefix: impl Into<String>,
        priority: i32,
        average_service_minutes: u32,
    ) -> Result<Self> {
        if !(1..=5).contains(&priority) {
            return Err(DomainError::InvalidPriority(priority));
        }
        let ticket_prefix = ticket_prefix.into();
        if ticket_prefix.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "ticket prefix must not be empty".to_string(),
            ));
        }
        Ok(Self {
            id,
            code: code.into(),
            name: name.into(),
            ticket_prefix,
            priority,
            average_service_minutes,
            daily_ticket_cap: None,
            is_active: true,
        })
    }

    pub fn with_daily_cap(mut self, cap: u32) -> Self {
        self.daily_ticket_cap = Some(cap);
        self
    }

    /// Formats the daily sequence into a ticket number (prefix + zero-padded).
    pub fn format_ticket_number(&self, daily_sequence: u32) -> String {
        format!("{}{:03}", self.ticket_prefix, daily_sequence)
    }
}
