// Domain Layer - Entities and State Machines

pub mod error;
pub mod event;
pub mod patient;
pub mod queue_state;
pub mod service_type;
pub mod station;
pub mod ticket;

// Re-exports
pub use error::DomainError;
pub use event::DomainEvent;
pub use patient::{Patient, PatientId};
pub use queue_state::{QueueKey, QueueState};
pub use service_type::{ServiceType, ServiceTypeId};
pub use station::{Station, StationId, StationStatus};
pub use ticket::{Ticket, TicketId, TicketStatus};
