pub mod app;
pub mod shutdown;

pub use app::{AdmissionCounts, Application, WorkloadOptions, WorkloadReport};
