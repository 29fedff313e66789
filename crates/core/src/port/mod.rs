// Port Layer - Interfaces for external dependencies

pub mod id_provider; // For deterministic testing
pub mod patient_directory;
pub mod queue_state_repository;
pub mod service_type_repository;
pub mod station_repository;
pub mod ticket_repository;
pub mod time_provider;

// Re-exports
pub use id_provider::IdProvider;
pub use patient_directory::PatientDirectory;
pub use queue_state_repository::QueueStateRepository;
pub use service_type_repository::ServiceTypeRepository;
pub use station_repository::StationRepository;
pub use ticket_repository::TicketRepository;
pub use time_provider::TimeProvider;
