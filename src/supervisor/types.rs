//! Type definitions for the supervision subsystem.
//!
//! These types form the shared vocabulary between the
//! [`super::Supervisor`], the per-worker supervision tasks, and the TUI.
//! The raw process handle never appears here: the render side only ever
//! sees [`WorkerSnapshot`] clones.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Why a worker process is gone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitReason {
    /// The process exited on its own with this code.
    Code(i32),
    /// The process was killed by a signal (no exit code available).
    Killed,
    /// The operator stopped it.
    Stopped,
    /// The process never started (missing interpreter/script, bad args).
    SpawnFailed,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::Code(code) => write!(f, "exit {code}"),
            ExitReason::Killed => write!(f, "killed"),
            ExitReason::Stopped => write!(f, "stopped"),
            ExitReason::SpawnFailed => write!(f, "spawn failed"),
        }
    }
}

/// Lifecycle state of one instance's worker.
///
/// The full observable set: `Pending → Starting → Running → Exited →
/// Restarting → Starting → ...`. `Exited` is terminal exactly when no
/// restart is pending (the supervision task has ended).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    /// Configured but not yet spawned.
    Pending,
    /// Process launched, no output observed yet.
    Starting,
    /// Process alive and producing output.
    Running,
    /// Process gone; a respawn is pending (backoff or immediate).
    Restarting,
    /// Process gone and no respawn in flight.
    Exited(ExitReason),
}

impl WorkerState {
    /// A process handle is currently attached.
    pub fn is_live(&self) -> bool {
        matches!(self, WorkerState::Starting | WorkerState::Running)
    }

    pub fn is_exited(&self) -> bool {
        matches!(self, WorkerState::Exited(_))
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerState::Pending => write!(f, "pending"),
            WorkerState::Starting => write!(f, "starting"),
            WorkerState::Running => write!(f, "running"),
            WorkerState::Restarting => write!(f, "restarting"),
            WorkerState::Exited(reason) => write!(f, "{reason}"),
        }
    }
}

/// Payload keys that get dedicated columns (or are worker bookkeeping) and
/// are therefore hidden from the generic counters column.
const RESERVED_KEYS: [&str; 6] = ["ts", "name", "device", "phase", "state", "message"];

/// Read-only view of one instance's runtime state.
///
/// This is a snapshot -- the live entry keeps changing after the clone is
/// taken. Mutation happens only inside the supervisor module; the render
/// loop consumes these and derives display fields per tick.
#[derive(Clone, Debug)]
pub struct WorkerSnapshot {
    pub name: String,
    pub device: String,
    /// OS pid of the live process, if any.
    pub pid: Option<u32>,
    pub state: WorkerState,
    /// Last-seen status payload; replaced wholesale per status event.
    pub payload: BTreeMap<String, serde_json::Value>,
    /// Most recent raw output line (status or log).
    pub last_line: String,
    /// Most recent instance-scoped error message, retained for display.
    pub last_error: Option<String>,
    /// Most recent exit, retained across restarts.
    pub last_exit: Option<ExitReason>,
    /// Respawns since the initial launch (automatic and manual).
    pub restarts: u32,
    pub started_at: Option<Instant>,
    pub stopped_at: Option<Instant>,
    /// Last time anything about this instance changed.
    pub last_update: Option<Instant>,
}

impl WorkerSnapshot {
    pub fn new(name: &str, device: &str) -> Self {
        WorkerSnapshot {
            name: name.to_string(),
            device: device.to_string(),
            pid: None,
            state: WorkerState::Pending,
            payload: BTreeMap::new(),
            last_line: String::new(),
            last_error: None,
            last_exit: None,
            restarts: 0,
            started_at: None,
            stopped_at: None,
            last_update: None,
        }
    }

    /// Wall-clock runtime of the current (or last) process.
    pub fn uptime(&self) -> Option<Duration> {
        let started = self.started_at?;
        match self.stopped_at {
            Some(stopped) => Some(stopped.saturating_duration_since(started)),
            None => Some(started.elapsed()),
        }
    }

    /// Time since the last observed change.
    pub fn age(&self) -> Option<Duration> {
        self.last_update.map(|at| at.elapsed())
    }

    /// The worker-reported phase. Workers emit it as `phase`; older scripts
    /// call the same field `state`.
    pub fn phase(&self) -> Option<String> {
        self.payload
            .get("phase")
            .or_else(|| self.payload.get("state"))
            .map(crate::protocol::scalar_to_string)
    }

    /// Free-form message from the last status payload.
    pub fn message(&self) -> Option<String> {
        self.payload
            .get("message")
            .map(crate::protocol::scalar_to_string)
    }

    /// Remaining payload fields as `key=value` pairs in stable key order.
    pub fn counters(&self) -> Vec<(String, String)> {
        self.payload
            .iter()
            .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), crate::protocol::scalar_to_string(value)))
            .collect()
    }
}

/// Severity of an operator notice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warn,
    Error,
}

/// One operator-visible event: spawns, exits, restarts, give-up alerts,
/// protocol errors. Rendered in the dashboard's notices pane and mirrored
/// to the tracing log.
#[derive(Clone, Debug)]
pub struct Notice {
    /// Wall-clock time, `HH:MM:SS`.
    pub timestamp: String,
    pub level: NoticeLevel,
    /// Instance the notice is about, if any.
    pub instance: Option<String>,
    pub text: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, instance: Option<&str>, text: impl Into<String>) -> Self {
        Notice {
            timestamp: chrono::Local::now().format("%H:%M:%S").to_string(),
            level,
            instance: instance.map(String::from),
            text: text.into(),
        }
    }
}
