//! # Taskpool Testing Utils
//!
//! Shared testing utilities for the dispatcher and the application crate:
//! gates that hold tasks inside workers, a recording error sink, and
//! polling helpers for asserting on state owned by other threads.
//!
//! ```toml
//! [dev-dependencies]
//! taskpool-testing-utils = { path = "../testing-utils" }
//! ```

pub mod helpers;
pub mod mocks;

pub use helpers::{wait_until, Gate, Recorder};
pub use mocks::{RecordedFailure, RecordingSink};
