use super::schema::{AppConfig, PartialConfig};
use std::path::PathBuf;
use std::time::Duration;

impl PartialConfig {
    /// Merge self with a lower-priority fallback.
    /// Self's non-None values take precedence.
    pub fn with_fallback(self, fallback: PartialConfig) -> PartialConfig {
        PartialConfig {
            python: self.python.or(fallback.python),
            script: self.script.or(fallback.script),
            worker_config: self.worker_config.or(fallback.worker_config),
            workdir: self.workdir.or(fallback.workdir),
            restart: self.restart.or(fallback.restart),
            max_restarts: self.max_restarts.or(fallback.max_restarts),
            backoff_base_ms: self.backoff_base_ms.or(fallback.backoff_base_ms),
            backoff_cap_ms: self.backoff_cap_ms.or(fallback.backoff_cap_ms),
            stable_uptime_secs: self.stable_uptime_secs.or(fallback.stable_uptime_secs),
            grace_period_ms: self.grace_period_ms.or(fallback.grace_period_ms),
            tick_ms: self.tick_ms.or(fallback.tick_ms),
            keep_open: self.keep_open.or(fallback.keep_open),
            name_prefix: self.name_prefix.or(fallback.name_prefix),
            log_dir: self.log_dir.or(fallback.log_dir),
        }
    }

    /// Convert to AppConfig, filling any remaining gaps with defaults.
    pub fn finalize(self) -> AppConfig {
        AppConfig {
            python: self.python.unwrap_or_else(|| "python3".to_string()),
            script: self.script.unwrap_or_else(|| PathBuf::from("growcastle.py")),
            worker_config: self
                .worker_config
                .unwrap_or_else(|| PathBuf::from("config.json")),
            workdir: self.workdir.unwrap_or_else(|| PathBuf::from(".")),
            restart: self.restart.unwrap_or(true),
            max_restarts: self.max_restarts.unwrap_or(3),
            backoff_base: Duration::from_millis(self.backoff_base_ms.unwrap_or(2_000)),
            backoff_cap: Duration::from_millis(self.backoff_cap_ms.unwrap_or(30_000)),
            stable_uptime: Duration::from_secs(self.stable_uptime_secs.unwrap_or(60)),
            grace_period: Duration::from_millis(self.grace_period_ms.unwrap_or(5_000)),
            tick_interval: Duration::from_millis(self.tick_ms.unwrap_or(250)),
            keep_open: self.keep_open.unwrap_or(false),
            name_prefix: self.name_prefix.unwrap_or_else(|| "bot".to_string()),
            log_dir: self.log_dir,
        }
    }
}
