//! Worker process supervision.
//!
//! One supervision task per instance owns that instance's entire lifecycle:
//! spawn, stream consumption, exit policy, backoff, respawn. The task is
//! strictly sequential, so an instance can never have two live processes.
//!
//! The spawned worker:
//! - Runs in its own process group (`process_group(0)`) so stop signals reach
//!   helpers the script forks (adb, scrcpy)
//! - Has `kill_on_drop(true)` as a safety net
//! - Is stopped gracefully: SIGTERM to the group, a bounded grace period,
//!   then SIGKILL

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use nix::sys::signal::Signal;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio_util::sync::CancellationToken;

use super::manager::{ExitDirective, Supervisor};
use super::types::ExitReason;
use crate::config::AppConfig;
use crate::error::{ProcessIOError, SpawnError};
use crate::protocol::{self, WorkerLine};
use crate::registry::Instance;

/// Shared append handle for the instance's mirror log file.
type LogSink = Arc<tokio::sync::Mutex<tokio::fs::File>>;

/// Supervision loop for one instance. Runs until the instance goes terminal:
/// stopped by the operator, out of restart attempts, restarts disabled, or a
/// spawn failure.
pub(crate) async fn run_supervision(supervisor: Supervisor, name: String) {
    loop {
        // 1. Ask for the next spawn attempt (a stop may have arrived first).
        let Some(attempt) = supervisor.begin_attempt(&name) else {
            return;
        };

        // 2. Spawn, then wait out the process or an operator cancel.
        let directive = match spawn_worker(&supervisor, &name, &attempt.instance).await {
            Ok(child) => {
                let reason = wait_or_stop(&supervisor, &name, child, &attempt.cancel).await;
                supervisor.on_exit(&name, reason)
            }
            Err(error) => {
                supervisor.record_spawn_failure(&name, &error);
                supervisor.on_exit(&name, ExitReason::SpawnFailed)
            }
        };

        // 3. Apply the policy decision.
        match directive {
            ExitDirective::Terminal => return,
            ExitDirective::RespawnNow => continue,
            ExitDirective::Backoff { delay, cancel } => {
                let interrupted = tokio::select! {
                    _ = tokio::time::sleep(delay) => false,
                    _ = cancel.cancelled() => true,
                };
                if interrupted && !supervisor.resolve_interrupted_backoff(&name) {
                    return;
                }
            }
        }
    }
}

/// Build the worker command line:
///
/// ```text
/// <python> <script> --adb-device <device> --config <config> --status --name <name> [extra args]
/// ```
pub(crate) fn build_command(config: &AppConfig, instance: &Instance) -> Command {
    let mut command = Command::new(&config.python);
    command
        .arg(&config.script)
        .arg("--adb-device")
        .arg(&instance.device)
        .arg("--config")
        .arg(&instance.config)
        .arg("--status")
        .arg("--name")
        .arg(&instance.name)
        .args(&instance.extra_args)
        .current_dir(&config.workdir)
        .process_group(0)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    command
}

/// Spawn one worker process plus its stream reader tasks.
async fn spawn_worker(
    supervisor: &Supervisor,
    name: &str,
    instance: &Instance,
) -> Result<Child, SpawnError> {
    let config = supervisor.config();

    let mut child = build_command(config, instance)
        .spawn()
        .map_err(|source| SpawnError::SpawnFailed {
            command: format!("{} {}", config.python, config.script.display()),
            source,
        })?;

    let stdout = child
        .stdout
        .take()
        .ok_or(SpawnError::MissingStream { stream: "stdout" })?;
    let stderr = child
        .stderr
        .take()
        .ok_or(SpawnError::MissingStream { stream: "stderr" })?;

    supervisor.record_spawned(name, child.id());

    let sink = open_log_sink(config, name).await;
    spawn_readers(supervisor, name, stdout, stderr, sink);

    Ok(child)
}

/// Open the instance's append-mode mirror file, when log_dir is configured.
/// Mirror failures disable mirroring for this attempt but never the worker.
async fn open_log_sink(config: &AppConfig, name: &str) -> Option<LogSink> {
    let dir = config.log_dir.as_ref()?;
    let open = async {
        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(format!("{name}.log")))
            .await
    };
    match open.await {
        Ok(file) => Some(Arc::new(tokio::sync::Mutex::new(file))),
        Err(error) => {
            tracing::warn!("[{name}] log mirror disabled: {error}");
            None
        }
    }
}

/// Spawn the stdout and stderr reader tasks.
///
/// Stdout carries the status protocol: each line is mirrored raw, then
/// classified and routed. Stderr is plain logging, prefixed `[stderr] `.
/// A read error kills the worker via the registry so the exit path (and
/// with it the restart policy) takes over.
fn spawn_readers(
    supervisor: &Supervisor,
    name: &str,
    stdout: ChildStdout,
    stderr: ChildStderr,
    sink: Option<LogSink>,
) {
    let stdout_supervisor = supervisor.clone();
    let stdout_name = name.to_string();
    let stdout_sink = sink.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    mirror(&stdout_sink, &line).await;
                    match protocol::classify_line(&line) {
                        Ok(WorkerLine::Status(event)) => {
                            stdout_supervisor.push_status(&stdout_name, event);
                        }
                        Ok(WorkerLine::Log(text)) => {
                            stdout_supervisor.note_line(&stdout_name, &text);
                        }
                        Err(error) => {
                            stdout_supervisor.record_protocol_error(&stdout_name, &error, &line);
                        }
                    }
                }
                Ok(None) => break,
                Err(source) => {
                    stdout_supervisor.record_stream_error(&stdout_name, &ProcessIOError { source });
                    break;
                }
            }
        }
    });

    let stderr_supervisor = supervisor.clone();
    let stderr_name = name.to_string();
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let text = format!("[stderr] {line}");
                    mirror(&sink, &text).await;
                    stderr_supervisor.note_line(&stderr_name, &text);
                }
                Ok(None) => break,
                Err(source) => {
                    stderr_supervisor.record_stream_error(&stderr_name, &ProcessIOError { source });
                    break;
                }
            }
        }
    });
}

/// Append one line to the mirror file, if there is one. Flushed per line so
/// the file can be tailed live.
async fn mirror(sink: &Option<LogSink>, line: &str) {
    if let Some(sink) = sink {
        let mut file = sink.lock().await;
        let _ = file.write_all(line.as_bytes()).await;
        let _ = file.write_all(b"\n").await;
        let _ = file.flush().await;
    }
}

/// Wait for the worker to exit on its own, or stop it when the attempt is
/// cancelled (operator stop/restart or shutdown).
async fn wait_or_stop(
    supervisor: &Supervisor,
    name: &str,
    mut child: Child,
    cancel: &CancellationToken,
) -> ExitReason {
    tokio::select! {
        wait_result = child.wait() => exit_reason(wait_result),
        _ = cancel.cancelled() => {
            graceful_stop(name, &mut child, supervisor.config().grace_period).await
        }
    }
}

/// Stop a worker: SIGTERM to the process group, a bounded grace period, then
/// SIGKILL. The child is reaped in every path.
async fn graceful_stop(name: &str, child: &mut Child, grace: Duration) -> ExitReason {
    let Some(pid) = child.id() else {
        // Already exited; collect the status.
        return exit_reason(child.wait().await);
    };

    tracing::debug!("[{name}] sending SIGTERM to process group {pid}");
    kill_process_group(pid, Signal::SIGTERM);

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(wait_result) => exit_reason(wait_result),
        Err(_) => {
            tracing::debug!("[{name}] grace period expired, sending SIGKILL");
            kill_process_group(pid, Signal::SIGKILL);
            let _ = child.wait().await;
            ExitReason::Killed
        }
    }
}

/// Map a wait result onto an exit reason. A status without a code means the
/// process died from a signal.
fn exit_reason(result: std::io::Result<std::process::ExitStatus>) -> ExitReason {
    match result {
        Ok(status) => match status.code() {
            Some(code) => ExitReason::Code(code),
            None => ExitReason::Killed,
        },
        Err(error) => {
            tracing::warn!("process wait failed: {error}");
            ExitReason::Killed
        }
    }
}

/// Signal an entire worker process group.
pub(crate) fn kill_process_group(pid: u32, signal: Signal) {
    let pgid = nix::unistd::Pid::from_raw(pid as i32);
    let _ = nix::sys::signal::killpg(pgid, signal);
}
