// Clinq Infra Memory - in-memory adapter implementations of the core ports.
//
// Suitable for embedding, demos and tests; a persistent adapter can replace
// this crate without touching the core.

mod clock;
mod patient_directory;
mod queue_state_repository;
mod service_type_repository;
mod station_repository;
mod ticket_repository;

pub use clock::ManualClock;
pub use patient_directory::InMemoryPatientDirectory;
pub use queue_state_repository::InMemoryQueueStateRepository;
pub use service_type_repository::InMemoryServiceTypeRepository;
pub use station_repository::InMemoryStationRepository;
pub use ticket_repository::InMemoryTicketRepository;
