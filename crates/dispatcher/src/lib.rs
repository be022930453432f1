//! Bounded Task Dispatcher
//!
//! Runs fire-and-forget tasks on a pool of worker threads that grows from
//! `core_size` to `max_size`, queues excess work up to `queue_capacity`, and
//! applies a [`RejectionPolicy`] once both the pool and the queue are full.
//! Task failures (errors and panics) are caught per task and handed to an
//! [`ErrorSink`]; they never take a worker down.
//!
//! ```no_run
//! use taskpool_config::{PoolConfig, RejectionPolicy};
//! use taskpool_dispatcher::Dispatcher;
//!
//! let dispatcher = Dispatcher::new(
//!     PoolConfig::new(2, 4, 16).with_policy(RejectionPolicy::CallerRuns),
//! )?;
//! dispatcher.submit(|| println!("sending report"))?;
//! dispatcher.shutdown(true);
//! # Ok::<(), taskpool_errors::DispatchError>(())
//! ```

pub mod dispatcher;
pub mod handle;
mod pool;
pub mod signal;
pub mod sink;
pub mod stats;
pub mod task;
mod worker;

pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use handle::TaskHandle;
pub use signal::ShutdownSignal;
pub use sink::{ErrorSink, TracingErrorSink};
pub use stats::{Admission, PoolStats, ShutdownReport};
pub use task::{IntoOutcome, Task, TaskFailure};

pub use taskpool_config::{PoolConfig, RejectionPolicy};
pub use taskpool_errors::{DispatchError, DispatchResult};
