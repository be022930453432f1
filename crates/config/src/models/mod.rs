pub mod app_config;
pub mod logging;
pub mod pool;

pub use app_config::*;
pub use logging::*;
pub use pool::*;
