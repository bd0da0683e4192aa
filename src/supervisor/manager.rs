//! Central registry for worker processes.
//!
//! [`Supervisor`] is the single source of truth for every instance's runtime
//! state. It wraps a `HashMap` behind `Arc<Mutex<..>>` for access from the
//! supervision tasks, the stream reader tasks, and the render loop.
//!
//! **Concurrency model:** `Arc<Mutex<HashMap>>`; contention is negligible --
//! readers and the render tick take the lock briefly and never across an
//! await. Raw process handles are never stored here: each supervision task
//! owns its `Child` exclusively, so a restart cannot see two live processes.
//!
//! **Cancellation model:** Each spawn attempt holds a [`CancellationToken`]
//! created as a child of the root token. Operator stop/restart cancels the
//! current attempt (graceful kill or backoff interrupt); cancelling the root
//! token cascades shutdown to every instance.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::types::{ExitReason, Notice, NoticeLevel, WorkerSnapshot, WorkerState};
use super::worker;
use crate::config::AppConfig;
use crate::error::{ProcessIOError, ProtocolError, SpawnError};
use crate::protocol::StatusEvent;
use crate::registry::{Instance, Registry};

/// Maximum queued status events per instance between render ticks. Replace
/// semantics make older events redundant, so dropping the oldest is safe.
const INBOX_CAPACITY: usize = 256;

/// Operator intent recorded for an instance, consumed by its supervision
/// task at the next decision point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Intent {
    None,
    Stop,
    Restart,
}

/// What the supervision task should do after an exit.
pub(crate) enum ExitDirective {
    /// Supervision ends; the instance is terminal.
    Terminal,
    /// Respawn immediately, bypassing backoff.
    RespawnNow,
    /// Wait out the delay (interruptible), then respawn.
    Backoff {
        delay: Duration,
        cancel: CancellationToken,
    },
}

/// A granted spawn attempt: the instance definition plus the token that
/// cancels this attempt (kill while running, interrupt while backing off).
pub(crate) struct Attempt {
    pub instance: Instance,
    pub cancel: CancellationToken,
}

/// Internal entry stored in the registry. Not exposed publicly -- callers
/// see [`WorkerSnapshot`] clones via `snapshot` / `snapshots`.
struct WorkerEntry {
    /// The immutable instance definition (respawns rebuild the command from it).
    instance: Instance,
    /// The read-only view cloned out to the render loop.
    snapshot: WorkerSnapshot,
    /// Per-instance inbox: parsed status events awaiting the render tick.
    inbox: VecDeque<StatusEvent>,
    intent: Intent,
    /// Token for the current attempt (child of the root token).
    attempt_cancel: CancellationToken,
    /// JoinHandle of the supervision task; cleared when it goes terminal.
    join_handle: Option<JoinHandle<()>>,
    /// Total spawns so far; `restarts` displayed is this minus the first.
    spawn_count: u32,
    consecutive_failures: u32,
}

/// Central registry and lifecycle owner for all worker processes.
///
/// Designed to be cloned freely: the supervision tasks, reader tasks, TUI,
/// and headless loop all hold clones.
#[derive(Clone)]
pub struct Supervisor {
    entries: Arc<Mutex<HashMap<String, WorkerEntry>>>,
    /// Instance names in registry (= display) order.
    order: Arc<Vec<String>>,
    config: Arc<AppConfig>,
    notice_tx: Option<UnboundedSender<Notice>>,
    root_cancel: CancellationToken,
}

impl Supervisor {
    /// Create a supervisor with one Pending entry per registry instance.
    /// Nothing is spawned until [`Supervisor::start_all`].
    pub fn new(
        registry: &Registry,
        config: AppConfig,
        notice_tx: Option<UnboundedSender<Notice>>,
        root_cancel: CancellationToken,
    ) -> Self {
        let mut entries = HashMap::new();
        let mut order = Vec::with_capacity(registry.len());
        for instance in registry.iter() {
            order.push(instance.name.clone());
            entries.insert(
                instance.name.clone(),
                WorkerEntry {
                    snapshot: WorkerSnapshot::new(&instance.name, &instance.device),
                    instance: instance.clone(),
                    inbox: VecDeque::new(),
                    intent: Intent::None,
                    attempt_cancel: root_cancel.child_token(),
                    join_handle: None,
                    spawn_count: 0,
                    consecutive_failures: 0,
                },
            );
        }

        Self {
            entries: Arc::new(Mutex::new(entries)),
            order: Arc::new(order),
            config: Arc::new(config),
            notice_tx,
            root_cancel,
        }
    }

    pub(crate) fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Launch a supervision task for every instance, in registry order.
    pub fn start_all(&self) {
        for name in self.order.iter() {
            self.spawn_supervision_task(name);
        }
    }

    /// Spawn the supervision task for one instance and store its handle.
    ///
    /// The task's first step takes the entries lock, so holding it here
    /// guarantees the handle is stored before the task makes any decision.
    fn spawn_supervision_task(&self, name: &str) {
        let mut entries = self.entries.lock().unwrap();
        let Some(entry) = entries.get_mut(name) else {
            return;
        };
        let handle = tokio::spawn(worker::run_supervision(self.clone(), name.to_string()));
        entry.join_handle = Some(handle);
    }

    // ---- operator commands ----------------------------------------------

    /// Request a graceful stop of one instance. Suppresses any restart,
    /// including a pending backoff. Returns `false` for unknown or already
    /// terminal instances.
    pub fn stop(&self, name: &str) -> bool {
        let mut entries = self.entries.lock().unwrap();
        let Some(entry) = entries.get_mut(name) else {
            return false;
        };
        if entry.snapshot.state.is_exited() {
            return false;
        }
        entry.intent = Intent::Stop;
        entry.attempt_cancel.cancel();
        true
    }

    /// Restart one instance: stop (if live) then respawn, bypassing backoff.
    /// A terminal instance gets a fresh supervision task.
    pub fn restart(&self, name: &str) -> bool {
        let relaunch = {
            let mut entries = self.entries.lock().unwrap();
            let Some(entry) = entries.get_mut(name) else {
                return false;
            };
            if entry.snapshot.state.is_exited() {
                if entry.join_handle.is_some() {
                    // A relaunch is already in flight.
                    return true;
                }
                entry.intent = Intent::None;
                entry.consecutive_failures = 0;
                true
            } else {
                entry.intent = Intent::Restart;
                entry.attempt_cancel.cancel();
                false
            }
        };

        if relaunch {
            self.notify(NoticeLevel::Info, Some(name), "manual restart".to_string());
            self.spawn_supervision_task(name);
        }
        true
    }

    /// Best-effort stop of everything: mark stop intent, cancel the root
    /// token, then await each supervision task with a bounded timeout.
    pub async fn shutdown(&self) {
        {
            let mut entries = self.entries.lock().unwrap();
            for entry in entries.values_mut() {
                if !entry.snapshot.state.is_exited() {
                    entry.intent = Intent::Stop;
                    entry.attempt_cancel.cancel();
                }
            }
        }
        self.root_cancel.cancel();

        let handles: Vec<JoinHandle<()>> = {
            let mut entries = self.entries.lock().unwrap();
            entries
                .values_mut()
                .filter_map(|e| e.join_handle.take())
                .collect()
        };

        // Grace period plus slack for the SIGKILL fallback and reaping.
        let deadline = self.config.grace_period + Duration::from_secs(2);
        for handle in handles {
            let _ = tokio::time::timeout(deadline, handle).await;
        }

        // Anything still not terminal was abandoned mid-teardown.
        let mut entries = self.entries.lock().unwrap();
        for entry in entries.values_mut() {
            if !entry.snapshot.state.is_exited() {
                entry.snapshot.state = WorkerState::Exited(ExitReason::Killed);
                entry.snapshot.pid = None;
                entry.snapshot.last_update = Some(Instant::now());
            }
        }
    }

    // ---- render-side reads ----------------------------------------------

    /// Apply every queued status event to its instance's snapshot, in
    /// arrival order. Called once per render tick.
    pub fn drain_status(&self) {
        let mut entries = self.entries.lock().unwrap();
        for entry in entries.values_mut() {
            while let Some(event) = entry.inbox.pop_front() {
                entry.snapshot.payload = event.payload;
                entry.snapshot.last_update = Some(event.received_at);
            }
        }
    }

    /// Snapshot of one instance.
    pub fn snapshot(&self, name: &str) -> Option<WorkerSnapshot> {
        let entries = self.entries.lock().unwrap();
        entries.get(name).map(|e| e.snapshot.clone())
    }

    /// Snapshots of all instances in display order.
    pub fn snapshots(&self) -> Vec<WorkerSnapshot> {
        let entries = self.entries.lock().unwrap();
        self.order
            .iter()
            .filter_map(|name| entries.get(name))
            .map(|e| e.snapshot.clone())
            .collect()
    }

    /// True once every instance is exited with no respawn in flight.
    pub fn all_terminal(&self) -> bool {
        let entries = self.entries.lock().unwrap();
        !entries.is_empty() && entries.values().all(|e| e.snapshot.state.is_exited())
    }

    // ---- supervision task callbacks -------------------------------------

    /// Grant (or refuse) the next spawn attempt for an instance.
    ///
    /// Refusal means a stop arrived before the spawn (or shutdown started);
    /// the entry is settled terminal and the supervision task must end.
    pub(crate) fn begin_attempt(&self, name: &str) -> Option<Attempt> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.get_mut(name)?;

        if std::mem::replace(&mut entry.intent, Intent::None) == Intent::Stop
            || self.root_cancel.is_cancelled()
        {
            entry.snapshot.state = WorkerState::Exited(ExitReason::Stopped);
            entry.snapshot.last_exit = Some(ExitReason::Stopped);
            entry.snapshot.last_update = Some(Instant::now());
            entry.join_handle = None;
            self.notify(NoticeLevel::Info, Some(name), "stopped".to_string());
            return None;
        }

        entry.spawn_count += 1;
        entry.snapshot.restarts = entry.spawn_count.saturating_sub(1);
        entry.snapshot.state = WorkerState::Starting;
        entry.snapshot.last_error = None;
        entry.snapshot.pid = None;
        entry.snapshot.started_at = None;
        entry.snapshot.stopped_at = None;
        entry.snapshot.last_update = Some(Instant::now());

        let cancel = self.root_cancel.child_token();
        entry.attempt_cancel = cancel.clone();

        Some(Attempt {
            instance: entry.instance.clone(),
            cancel,
        })
    }

    /// Record a successful spawn.
    pub(crate) fn record_spawned(&self, name: &str, pid: Option<u32>) {
        {
            let mut entries = self.entries.lock().unwrap();
            if let Some(entry) = entries.get_mut(name) {
                entry.snapshot.pid = pid;
                entry.snapshot.started_at = Some(Instant::now());
                entry.snapshot.last_update = Some(Instant::now());
            }
        }
        let pid = pid.map_or("?".to_string(), |p| p.to_string());
        self.notify(NoticeLevel::Info, Some(name), format!("started (pid {pid})"));
    }

    /// Record a spawn failure; the follow-up [`Supervisor::on_exit`] call
    /// with [`ExitReason::SpawnFailed`] settles the policy.
    pub(crate) fn record_spawn_failure(&self, name: &str, error: &SpawnError) {
        {
            let mut entries = self.entries.lock().unwrap();
            if let Some(entry) = entries.get_mut(name) {
                entry.snapshot.last_error = Some(error.to_string());
            }
        }
        self.notify(NoticeLevel::Error, Some(name), error.to_string());
    }

    /// A raw log line arrived from the worker (stdout or stderr).
    pub(crate) fn note_line(&self, name: &str, line: &str) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(name) {
            entry.snapshot.last_line = line.to_string();
            entry.snapshot.last_update = Some(Instant::now());
            mark_output_seen(name, &mut entry.snapshot);
        }
    }

    /// A parsed status event arrived; queue it for the next render tick.
    pub(crate) fn push_status(&self, name: &str, event: StatusEvent) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(name) {
            if entry.inbox.len() >= INBOX_CAPACITY {
                entry.inbox.pop_front();
            }
            entry.inbox.push_back(event);
            mark_output_seen(name, &mut entry.snapshot);
        }
    }

    /// A marker line with a malformed payload: log it, keep the line as the
    /// row's last output, drop the event.
    pub(crate) fn record_protocol_error(&self, name: &str, error: &ProtocolError, line: &str) {
        {
            let mut entries = self.entries.lock().unwrap();
            if let Some(entry) = entries.get_mut(name) {
                entry.snapshot.last_line = line.to_string();
                entry.snapshot.last_error = Some(error.to_string());
                entry.snapshot.last_update = Some(Instant::now());
                mark_output_seen(name, &mut entry.snapshot);
            }
        }
        self.notify(
            NoticeLevel::Warn,
            Some(name),
            format!("dropped status line: {error}"),
        );
    }

    /// A stream read failed mid-run. Kill the process group so the exit
    /// path (and with it the normal restart policy) takes over.
    pub(crate) fn record_stream_error(&self, name: &str, error: &ProcessIOError) {
        let pid = {
            let mut entries = self.entries.lock().unwrap();
            entries.get_mut(name).and_then(|entry| {
                entry.snapshot.last_error = Some(error.to_string());
                entry.snapshot.last_update = Some(Instant::now());
                entry.snapshot.pid
            })
        };
        self.notify(NoticeLevel::Warn, Some(name), error.to_string());
        if let Some(pid) = pid {
            worker::kill_process_group(pid, nix::sys::signal::Signal::SIGKILL);
        }
    }

    /// Process gone: record the exit and decide what happens next.
    pub(crate) fn on_exit(&self, name: &str, reason: ExitReason) -> ExitDirective {
        let mut entries = self.entries.lock().unwrap();
        let Some(entry) = entries.get_mut(name) else {
            return ExitDirective::Terminal;
        };

        let ran_for = entry.snapshot.started_at.map(|at| at.elapsed());
        let intent = std::mem::replace(&mut entry.intent, Intent::None);
        let reason = if intent == Intent::Stop {
            ExitReason::Stopped
        } else {
            reason
        };

        entry.snapshot.state = WorkerState::Exited(reason);
        entry.snapshot.last_exit = Some(reason);
        entry.snapshot.pid = None;
        entry.snapshot.stopped_at = Some(Instant::now());
        entry.snapshot.last_update = Some(Instant::now());

        match intent {
            Intent::Stop => {
                entry.join_handle = None;
                self.notify(NoticeLevel::Info, Some(name), "stopped".to_string());
                ExitDirective::Terminal
            }
            Intent::Restart => {
                entry.consecutive_failures = 0;
                entry.snapshot.state = WorkerState::Restarting;
                entry.snapshot.last_update = Some(Instant::now());
                self.notify(NoticeLevel::Info, Some(name), "restarting".to_string());
                ExitDirective::RespawnNow
            }
            Intent::None => {
                self.notify(NoticeLevel::Warn, Some(name), format!("worker {reason}"));

                if !self.config.restart || reason == ExitReason::SpawnFailed {
                    entry.join_handle = None;
                    return ExitDirective::Terminal;
                }

                // A run that stayed up long enough clears the failure streak.
                if ran_for.is_some_and(|up| up >= self.config.stable_uptime) {
                    entry.consecutive_failures = 0;
                }
                entry.consecutive_failures += 1;

                if entry.consecutive_failures > self.config.max_restarts {
                    entry.join_handle = None;
                    let text = format!(
                        "gave up after {} consecutive restarts (last: {reason})",
                        self.config.max_restarts
                    );
                    entry.snapshot.last_error = Some(text.clone());
                    self.notify(NoticeLevel::Error, Some(name), text);
                    return ExitDirective::Terminal;
                }

                let delay = backoff_delay(
                    self.config.backoff_base,
                    self.config.backoff_cap,
                    entry.consecutive_failures,
                );
                entry.snapshot.state = WorkerState::Restarting;
                entry.snapshot.last_update = Some(Instant::now());
                let cancel = self.root_cancel.child_token();
                entry.attempt_cancel = cancel.clone();
                self.notify(
                    NoticeLevel::Info,
                    Some(name),
                    format!(
                        "restarting in {}s (attempt {}/{})",
                        delay.as_secs(),
                        entry.consecutive_failures,
                        self.config.max_restarts
                    ),
                );
                ExitDirective::Backoff { delay, cancel }
            }
        }
    }

    /// A backoff sleep was interrupted. Returns `true` when the supervision
    /// task should respawn immediately (operator restart); `false` settles
    /// the instance terminal (operator stop or shutdown).
    pub(crate) fn resolve_interrupted_backoff(&self, name: &str) -> bool {
        let mut entries = self.entries.lock().unwrap();
        let Some(entry) = entries.get_mut(name) else {
            return false;
        };

        match std::mem::replace(&mut entry.intent, Intent::None) {
            Intent::Restart => {
                entry.consecutive_failures = 0;
                true
            }
            // Stop, or a root-token shutdown with no recorded intent.
            _ => {
                entry.snapshot.state = WorkerState::Exited(ExitReason::Stopped);
                entry.snapshot.last_exit = Some(ExitReason::Stopped);
                entry.snapshot.last_update = Some(Instant::now());
                entry.join_handle = None;
                self.notify(
                    NoticeLevel::Info,
                    Some(name),
                    "stopped (pending restart cancelled)".to_string(),
                );
                false
            }
        }
    }

    /// Emit an operator notice to the TUI channel and the tracing log.
    fn notify(&self, level: NoticeLevel, instance: Option<&str>, text: String) {
        let who = instance.unwrap_or("dashboard");
        match level {
            NoticeLevel::Info => tracing::info!("[{who}] {text}"),
            NoticeLevel::Warn => tracing::warn!("[{who}] {text}"),
            NoticeLevel::Error => tracing::error!("[{who}] {text}"),
        }
        if let Some(tx) = &self.notice_tx {
            let _ = tx.send(Notice::new(level, instance, text));
        }
    }
}

/// First observed output flips Starting to Running.
fn mark_output_seen(name: &str, snapshot: &mut WorkerSnapshot) {
    if snapshot.state == WorkerState::Starting {
        snapshot.state = WorkerState::Running;
        tracing::debug!("[{name}] running");
    }
}

/// Exponential backoff for consecutive failure `n` (1-based): `base *
/// 2^(n-1)`, capped.
pub(crate) fn backoff_delay(base: Duration, cap: Duration, failures: u32) -> Duration {
    let exponent = failures.saturating_sub(1).min(16);
    base.saturating_mul(1u32 << exponent).min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PartialConfig;
    use crate::registry::{InstanceDefaults, RegistrySource};
    use std::collections::BTreeMap;
    use tokio::sync::mpsc;

    fn test_config() -> AppConfig {
        let mut config = PartialConfig::default().finalize();
        config.backoff_base = Duration::from_millis(10);
        config.backoff_cap = Duration::from_millis(80);
        config.max_restarts = 2;
        // Short-lived test processes never count as stable runs.
        config.stable_uptime = Duration::from_secs(3600);
        config
    }

    fn test_registry(names: &[&str]) -> Registry {
        let devices = names
            .iter()
            .enumerate()
            .map(|(i, _)| format!("127.0.0.1:{}", 5555 + i))
            .collect();
        let defaults = InstanceDefaults {
            name_prefix: "bot".to_string(),
            config: "config.json".into(),
            extra_args: vec![],
        };
        Registry::load(RegistrySource::Devices(devices), &defaults).unwrap()
    }

    fn test_supervisor(count: usize) -> (Supervisor, mpsc::UnboundedReceiver<Notice>) {
        let names: Vec<&str> = ["a", "b", "c"].into_iter().take(count).collect();
        let (tx, rx) = mpsc::unbounded_channel();
        let supervisor = Supervisor::new(
            &test_registry(&names),
            test_config(),
            Some(tx),
            CancellationToken::new(),
        );
        (supervisor, rx)
    }

    fn event(pairs: &[(&str, serde_json::Value)]) -> StatusEvent {
        let mut payload = BTreeMap::new();
        for (key, value) in pairs {
            payload.insert(key.to_string(), value.clone());
        }
        StatusEvent {
            payload,
            received_at: Instant::now(),
        }
    }

    #[test]
    fn entries_start_pending_in_registry_order() {
        let (supervisor, _rx) = test_supervisor(2);
        let snapshots = supervisor.snapshots();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].name, "bot-01");
        assert_eq!(snapshots[1].name, "bot-02");
        assert!(
            snapshots
                .iter()
                .all(|s| s.state == WorkerState::Pending)
        );
        assert!(!supervisor.all_terminal());
    }

    #[test]
    fn status_events_apply_in_order_with_replace_semantics() {
        let (supervisor, _rx) = test_supervisor(1);
        supervisor.push_status(
            "bot-01",
            event(&[
                ("phase", serde_json::json!("login")),
                ("gold", serde_json::json!(5)),
            ]),
        );
        supervisor.push_status("bot-01", event(&[("phase", serde_json::json!("farming"))]));

        // Nothing visible until the render tick drains.
        assert!(supervisor.snapshot("bot-01").unwrap().payload.is_empty());

        supervisor.drain_status();
        let snapshot = supervisor.snapshot("bot-01").unwrap();
        assert_eq!(snapshot.phase().as_deref(), Some("farming"));
        // The second payload replaced the first wholesale.
        assert!(!snapshot.payload.contains_key("gold"));
    }

    #[test]
    fn interleaved_instances_keep_snapshots_independent() {
        let (supervisor, _rx) = test_supervisor(2);
        for round in 0..50 {
            supervisor.push_status("bot-01", event(&[("wave", serde_json::json!(round))]));
            supervisor.push_status("bot-02", event(&[("wave", serde_json::json!(round * 100))]));
        }
        supervisor.drain_status();

        let a = supervisor.snapshot("bot-01").unwrap();
        let b = supervisor.snapshot("bot-02").unwrap();
        assert_eq!(a.payload["wave"], serde_json::json!(49));
        assert_eq!(b.payload["wave"], serde_json::json!(4900));
    }

    #[test]
    fn first_output_flips_starting_to_running() {
        let (supervisor, _rx) = test_supervisor(1);
        let attempt = supervisor.begin_attempt("bot-01").unwrap();
        assert!(!attempt.cancel.is_cancelled());
        assert_eq!(
            supervisor.snapshot("bot-01").unwrap().state,
            WorkerState::Starting
        );

        supervisor.note_line("bot-01", "connecting to device...");
        let snapshot = supervisor.snapshot("bot-01").unwrap();
        assert_eq!(snapshot.state, WorkerState::Running);
        assert_eq!(snapshot.last_line, "connecting to device...");
    }

    #[test]
    fn status_event_also_counts_as_first_output() {
        let (supervisor, _rx) = test_supervisor(1);
        supervisor.begin_attempt("bot-01").unwrap();
        supervisor.push_status("bot-01", event(&[("phase", serde_json::json!("login"))]));
        assert_eq!(
            supervisor.snapshot("bot-01").unwrap().state,
            WorkerState::Running
        );
    }

    #[test]
    fn protocol_error_keeps_worker_running() {
        let (supervisor, mut rx) = test_supervisor(1);
        supervisor.begin_attempt("bot-01").unwrap();
        supervisor.note_line("bot-01", "hello");

        let error = ProtocolError::InvalidPayload("expected value".to_string());
        supervisor.record_protocol_error("bot-01", &error, "__STATUS__ {oops");

        let snapshot = supervisor.snapshot("bot-01").unwrap();
        assert_eq!(snapshot.state, WorkerState::Running);
        assert_eq!(snapshot.last_line, "__STATUS__ {oops");
        assert!(snapshot.last_error.is_some());

        let warn = std::iter::from_fn(|| rx.try_recv().ok())
            .find(|n: &Notice| n.level == NoticeLevel::Warn)
            .expect("protocol warn notice");
        assert!(warn.text.contains("dropped status line"));
    }

    #[test]
    fn exit_with_policy_schedules_backoff_and_escalates_delay() {
        let (supervisor, _rx) = test_supervisor(1);

        supervisor.begin_attempt("bot-01").unwrap();
        let first = supervisor.on_exit("bot-01", ExitReason::Code(1));
        let ExitDirective::Backoff { delay, .. } = first else {
            panic!("expected backoff after first failure");
        };
        assert_eq!(delay, Duration::from_millis(10));
        assert_eq!(
            supervisor.snapshot("bot-01").unwrap().state,
            WorkerState::Restarting
        );

        supervisor.begin_attempt("bot-01").unwrap();
        let second = supervisor.on_exit("bot-01", ExitReason::Code(1));
        let ExitDirective::Backoff { delay, .. } = second else {
            panic!("expected backoff after second failure");
        };
        assert_eq!(delay, Duration::from_millis(20));
    }

    #[test]
    fn exceeding_max_restarts_goes_terminal_with_alert() {
        let (supervisor, mut rx) = test_supervisor(1);

        // max_restarts = 2: failures one and two back off, three gives up.
        for _ in 0..2 {
            supervisor.begin_attempt("bot-01").unwrap();
            assert!(matches!(
                supervisor.on_exit("bot-01", ExitReason::Code(1)),
                ExitDirective::Backoff { .. }
            ));
        }
        supervisor.begin_attempt("bot-01").unwrap();
        assert!(matches!(
            supervisor.on_exit("bot-01", ExitReason::Code(1)),
            ExitDirective::Terminal
        ));

        let snapshot = supervisor.snapshot("bot-01").unwrap();
        assert_eq!(snapshot.state, WorkerState::Exited(ExitReason::Code(1)));
        assert_eq!(snapshot.restarts, 2);
        assert!(snapshot.last_error.as_deref().unwrap().contains("gave up"));
        assert!(supervisor.all_terminal());

        let alert = std::iter::from_fn(|| rx.try_recv().ok())
            .find(|n: &Notice| n.level == NoticeLevel::Error)
            .expect("give-up alert");
        assert!(alert.text.contains("gave up after 2"));
    }

    #[test]
    fn stable_run_resets_failure_streak() {
        // With stable_uptime zero, every run counts as stable.
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut config = test_config();
        config.stable_uptime = Duration::ZERO;
        let supervisor = Supervisor::new(
            &test_registry(&["a"]),
            config,
            Some(tx),
            CancellationToken::new(),
        );

        // Far more failures than max_restarts, each after a "stable" run.
        for _ in 0..10 {
            supervisor.begin_attempt("bot-01").unwrap();
            supervisor.record_spawned("bot-01", Some(4242));
            assert!(matches!(
                supervisor.on_exit("bot-01", ExitReason::Code(1)),
                ExitDirective::Backoff { .. }
            ));
        }
    }

    #[test]
    fn operator_stop_suppresses_restart() {
        let (supervisor, _rx) = test_supervisor(1);
        let attempt = supervisor.begin_attempt("bot-01").unwrap();
        supervisor.note_line("bot-01", "up");

        assert!(supervisor.stop("bot-01"));
        assert!(attempt.cancel.is_cancelled());

        // The supervision task observes the cancel, kills the child, and
        // reports the exit; policy must not schedule a respawn.
        assert!(matches!(
            supervisor.on_exit("bot-01", ExitReason::Killed),
            ExitDirective::Terminal
        ));
        let snapshot = supervisor.snapshot("bot-01").unwrap();
        assert_eq!(snapshot.state, WorkerState::Exited(ExitReason::Stopped));
        assert!(supervisor.all_terminal());

        // Terminal: another stop is a no-op.
        assert!(!supervisor.stop("bot-01"));
    }

    #[test]
    fn operator_restart_bypasses_backoff() {
        let (supervisor, _rx) = test_supervisor(1);
        let attempt = supervisor.begin_attempt("bot-01").unwrap();
        supervisor.note_line("bot-01", "up");

        assert!(supervisor.restart("bot-01"));
        assert!(attempt.cancel.is_cancelled());
        assert!(matches!(
            supervisor.on_exit("bot-01", ExitReason::Killed),
            ExitDirective::RespawnNow
        ));
        assert_eq!(
            supervisor.snapshot("bot-01").unwrap().state,
            WorkerState::Restarting
        );
    }

    #[test]
    fn stop_during_backoff_cancels_pending_restart() {
        let (supervisor, _rx) = test_supervisor(1);
        supervisor.begin_attempt("bot-01").unwrap();
        let directive = supervisor.on_exit("bot-01", ExitReason::Code(1));
        let ExitDirective::Backoff { cancel, .. } = directive else {
            panic!("expected backoff");
        };
        let restarts_before = supervisor.snapshot("bot-01").unwrap().restarts;

        assert!(supervisor.stop("bot-01"));
        assert!(cancel.is_cancelled());
        assert!(!supervisor.resolve_interrupted_backoff("bot-01"));

        let snapshot = supervisor.snapshot("bot-01").unwrap();
        assert_eq!(snapshot.state, WorkerState::Exited(ExitReason::Stopped));
        assert_eq!(snapshot.restarts, restarts_before);
        assert!(supervisor.all_terminal());
    }

    #[test]
    fn restart_during_backoff_respawns_immediately() {
        let (supervisor, _rx) = test_supervisor(1);
        supervisor.begin_attempt("bot-01").unwrap();
        let ExitDirective::Backoff { cancel, .. } =
            supervisor.on_exit("bot-01", ExitReason::Code(1))
        else {
            panic!("expected backoff");
        };

        assert!(supervisor.restart("bot-01"));
        assert!(cancel.is_cancelled());
        assert!(supervisor.resolve_interrupted_backoff("bot-01"));
    }

    #[test]
    fn stop_before_first_spawn_refuses_attempt() {
        let (supervisor, _rx) = test_supervisor(1);
        assert!(supervisor.stop("bot-01"));
        assert!(supervisor.begin_attempt("bot-01").is_none());
        assert_eq!(
            supervisor.snapshot("bot-01").unwrap().state,
            WorkerState::Exited(ExitReason::Stopped)
        );
    }

    #[test]
    fn spawn_failure_is_terminal_without_retry() {
        let (supervisor, mut rx) = test_supervisor(2);
        supervisor.begin_attempt("bot-01").unwrap();
        let error = SpawnError::MissingStream { stream: "stdout" };
        supervisor.record_spawn_failure("bot-01", &error);
        assert!(matches!(
            supervisor.on_exit("bot-01", ExitReason::SpawnFailed),
            ExitDirective::Terminal
        ));

        let failed = supervisor.snapshot("bot-01").unwrap();
        assert_eq!(failed.state, WorkerState::Exited(ExitReason::SpawnFailed));
        assert!(failed.last_error.is_some());

        // The sibling instance is untouched.
        assert_eq!(
            supervisor.snapshot("bot-02").unwrap().state,
            WorkerState::Pending
        );
        assert!(
            std::iter::from_fn(|| rx.try_recv().ok())
                .any(|n: Notice| n.level == NoticeLevel::Error)
        );
    }

    #[test]
    fn restarts_count_spawns_after_the_first() {
        let (supervisor, _rx) = test_supervisor(1);
        supervisor.begin_attempt("bot-01").unwrap();
        assert_eq!(supervisor.snapshot("bot-01").unwrap().restarts, 0);

        supervisor.on_exit("bot-01", ExitReason::Code(1));
        supervisor.begin_attempt("bot-01").unwrap();
        assert_eq!(supervisor.snapshot("bot-01").unwrap().restarts, 1);
    }

    #[test]
    fn unknown_instance_commands_return_false() {
        let (supervisor, _rx) = test_supervisor(1);
        assert!(!supervisor.stop("ghost"));
        assert!(!supervisor.restart("ghost"));
        assert!(supervisor.snapshot("ghost").is_none());
    }

    #[test]
    fn inbox_drops_oldest_beyond_capacity() {
        let (supervisor, _rx) = test_supervisor(1);
        for i in 0..(INBOX_CAPACITY + 10) {
            supervisor.push_status("bot-01", event(&[("i", serde_json::json!(i))]));
        }
        supervisor.drain_status();
        let snapshot = supervisor.snapshot("bot-01").unwrap();
        assert_eq!(
            snapshot.payload["i"],
            serde_json::json!(INBOX_CAPACITY + 9)
        );
    }

    #[test]
    fn backoff_delay_doubles_and_caps() {
        let base = Duration::from_secs(2);
        let cap = Duration::from_secs(30);
        assert_eq!(backoff_delay(base, cap, 1), Duration::from_secs(2));
        assert_eq!(backoff_delay(base, cap, 2), Duration::from_secs(4));
        assert_eq!(backoff_delay(base, cap, 3), Duration::from_secs(8));
        assert_eq!(backoff_delay(base, cap, 4), Duration::from_secs(16));
        assert_eq!(backoff_delay(base, cap, 5), Duration::from_secs(30));
        assert_eq!(backoff_delay(base, cap, 60), Duration::from_secs(30));
    }
}
