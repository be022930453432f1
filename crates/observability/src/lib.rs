pub mod structured_logger;
pub mod telemetry_setup;

pub use structured_logger::StructuredLogger;
pub use telemetry_setup::{env_filter, file_layer, init_logging, FileLayer};
