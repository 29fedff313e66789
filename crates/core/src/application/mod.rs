// Application Services - queue orchestration on top of the domain model

pub mod catalog;
pub mod coordinator;
pub mod estimator;
pub mod ledger;
pub mod ordering;
pub mod projector;
pub mod registry;

#[cfg(test)]
pub(crate) mod test_support;

pub use catalog::ServiceCatalog;
pub use coordinator::{
    CoordinatorConfig, Outcome, QueueCoordinator, QueuePositionView, QueueStatistics,
};
pub use estimator::{AverageWait, EstimatorConfig, WaitTimeEstimator};
pub use ledger::{TicketLedger, Transition};
pub use ordering::{OrderingPolicy, QueueOrdering};
pub use projector::Projector;
pub use registry::StationRegistry;
