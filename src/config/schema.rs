use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// The TOML file structure for castellan.toml.
///
/// The same shape is used for the instances file and the optional global
/// config; `[[instances]]` entries in the global file are ignored (the
/// registry comes from the instances file or the CLI device list only).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    pub worker: Option<WorkerConfig>,
    pub supervisor: Option<SupervisorConfig>,
    pub dashboard: Option<DashboardConfig>,
    #[serde(default)]
    pub instances: Vec<InstanceEntry>,
}

/// How to launch a worker process.
#[derive(Debug, Deserialize)]
pub struct WorkerConfig {
    pub python: Option<String>,
    pub script: Option<PathBuf>,
    /// Default bot config passed to instances that don't set their own.
    pub config: Option<PathBuf>,
    pub workdir: Option<PathBuf>,
}

/// Restart policy and stop behavior.
#[derive(Debug, Deserialize)]
pub struct SupervisorConfig {
    pub restart: Option<bool>,
    pub max_restarts: Option<u32>,
    pub backoff_base_ms: Option<u64>,
    pub backoff_cap_ms: Option<u64>,
    /// A run at least this long resets the consecutive-failure counter.
    pub stable_uptime_secs: Option<u64>,
    pub grace_period_ms: Option<u64>,
}

/// Render loop and display settings.
#[derive(Debug, Deserialize)]
pub struct DashboardConfig {
    pub tick_ms: Option<u64>,
    pub keep_open: Option<bool>,
    pub name_prefix: Option<String>,
    /// When set, every raw worker output line is appended to
    /// `<log_dir>/<instance>.log`.
    pub log_dir: Option<PathBuf>,
}

/// One `[[instances]]` entry. Only the device address is required; a missing
/// name is filled in as `{prefix}-NN` by position.
#[derive(Debug, Clone, Deserialize)]
pub struct InstanceEntry {
    pub name: Option<String>,
    pub device: Option<String>,
    pub config: Option<PathBuf>,
    pub extra_args: Option<Vec<String>>,
}

impl ConfigFile {
    /// Flatten the sectioned file into a PartialConfig for merging.
    pub fn to_partial(&self) -> PartialConfig {
        PartialConfig {
            python: self.worker.as_ref().and_then(|w| w.python.clone()),
            script: self.worker.as_ref().and_then(|w| w.script.clone()),
            worker_config: self.worker.as_ref().and_then(|w| w.config.clone()),
            workdir: self.worker.as_ref().and_then(|w| w.workdir.clone()),
            restart: self.supervisor.as_ref().and_then(|s| s.restart),
            max_restarts: self.supervisor.as_ref().and_then(|s| s.max_restarts),
            backoff_base_ms: self.supervisor.as_ref().and_then(|s| s.backoff_base_ms),
            backoff_cap_ms: self.supervisor.as_ref().and_then(|s| s.backoff_cap_ms),
            stable_uptime_secs: self.supervisor.as_ref().and_then(|s| s.stable_uptime_secs),
            grace_period_ms: self.supervisor.as_ref().and_then(|s| s.grace_period_ms),
            tick_ms: self.dashboard.as_ref().and_then(|d| d.tick_ms),
            keep_open: self.dashboard.as_ref().and_then(|d| d.keep_open),
            name_prefix: self.dashboard.as_ref().and_then(|d| d.name_prefix.clone()),
            log_dir: self.dashboard.as_ref().and_then(|d| d.log_dir.clone()),
        }
    }
}

/// Fully-resolved runtime configuration. All fields have values.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub python: String,
    pub script: PathBuf,
    pub worker_config: PathBuf,
    pub workdir: PathBuf,
    pub restart: bool,
    pub max_restarts: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    pub stable_uptime: Duration,
    pub grace_period: Duration,
    pub tick_interval: Duration,
    pub keep_open: bool,
    pub name_prefix: String,
    pub log_dir: Option<PathBuf>,
}

/// Partial config used during merge. All fields are Option so that
/// missing fields don't override lower-priority values.
#[derive(Debug, Clone, Default)]
pub struct PartialConfig {
    pub python: Option<String>,
    pub script: Option<PathBuf>,
    pub worker_config: Option<PathBuf>,
    pub workdir: Option<PathBuf>,
    pub restart: Option<bool>,
    pub max_restarts: Option<u32>,
    pub backoff_base_ms: Option<u64>,
    pub backoff_cap_ms: Option<u64>,
    pub stable_uptime_secs: Option<u64>,
    pub grace_period_ms: Option<u64>,
    pub tick_ms: Option<u64>,
    pub keep_open: Option<bool>,
    pub name_prefix: Option<String>,
    pub log_dir: Option<PathBuf>,
}
