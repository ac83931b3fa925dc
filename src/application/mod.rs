//! Application layer - Use cases and port interfaces
//!
//! Contains the segmented capture-and-delivery pipeline and the trait
//! definitions for the systems it drives.

pub mod delivery;
pub mod jobs;
pub mod orchestrator;
pub mod ports;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

// Re-export use cases
pub use delivery::{DeliveryClient, DeliveryError};
pub use jobs::{JobReport, JobSpawner, JobSupervisor};
pub use orchestrator::{
    Orchestrator, Run, RunCallbacks, RunError, RunSettings, RunSummary, SessionRecord,
};
pub use scheduler::{SchedulerError, SegmentCompletion, SegmentScheduler, SegmentTiming};
