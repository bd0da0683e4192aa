//! Worker supervision subsystem.
//!
//! Provides the [`manager::Supervisor`] registry that owns every worker
//! process, the per-instance supervision tasks in [`worker`], and the shared
//! [`types`] consumed by the TUI and headless runners.

pub mod manager;
pub mod types;
pub mod worker;

pub use manager::Supervisor;
pub use types::{ExitReason, Notice, NoticeLevel, WorkerSnapshot, WorkerState};
