//! Headless runner: supervision without the dashboard.
//!
//! Same lifecycle as TUI mode minus the terminal. Notices go to the tracing
//! log (the supervisor falls back to that when it has no notice channel),
//! the aggregation tick still drains status inboxes so restart policy and
//! auto-exit behave identically, and Ctrl+C triggers a graceful shutdown of
//! every worker.

use crate::config::AppConfig;
use crate::supervisor::Supervisor;

pub async fn run_headless(supervisor: Supervisor, config: &AppConfig) -> anyhow::Result<()> {
    supervisor.start_all();

    let mut tick_interval = tokio::time::interval(config.tick_interval);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupt received, stopping workers");
                break;
            }
            _ = tick_interval.tick() => {
                supervisor.drain_status();
                if supervisor.all_terminal() && !config.keep_open {
                    tracing::info!("all workers terminal, exiting");
                    break;
                }
            }
        }
    }

    supervisor.shutdown().await;
    Ok(())
}
