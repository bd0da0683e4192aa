//! TUI main loop: terminal lifecycle, event multiplexing, and render tick.
//!
//! [`run_tui`] is the entry point for dashboard mode. It initializes the
//! terminal, launches every supervision task, and runs a `tokio::select!`
//! loop that multiplexes supervisor notices, keyboard input, and render
//! ticks.

use crossterm::event::EventStream;
use futures::StreamExt;
use ratatui::Terminal;
use ratatui::backend::Backend;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::config::AppConfig;
use crate::supervisor::{Notice, Supervisor};
use crate::tui::app_state::DashboardState;
use crate::tui::input::{Action, handle_key_event};
use crate::tui::ui::render_ui;

/// Run the dashboard.
///
/// Launches all supervision tasks, then enters the main loop that
/// multiplexes:
/// 1. Notices from the supervisor (mpsc channel)
/// 2. Keyboard input (crossterm EventStream)
/// 3. Render ticks (the aggregation interval)
///
/// Each tick drains queued status events into the snapshots, replaces the
/// dashboard rows, and redraws. When every instance is terminal and
/// `keep_open` is off, the dashboard exits on its own.
///
/// The terminal is restored before worker teardown so shutdown logging
/// lands on a sane screen.
pub async fn run_tui(
    supervisor: Supervisor,
    notice_rx: UnboundedReceiver<Notice>,
    config: &AppConfig,
) -> anyhow::Result<()> {
    let mut terminal = ratatui::init();

    supervisor.start_all();

    let result = event_loop(&mut terminal, &supervisor, notice_rx, config).await;

    ratatui::restore();
    supervisor.shutdown().await;

    result
}

async fn event_loop<B: Backend<Error: Send + Sync + 'static>>(
    terminal: &mut Terminal<B>,
    supervisor: &Supervisor,
    mut notice_rx: UnboundedReceiver<Notice>,
    config: &AppConfig,
) -> anyhow::Result<()> {
    let mut state = DashboardState::new();
    let mut key_stream = EventStream::new();
    let mut tick_interval = tokio::time::interval(config.tick_interval);

    loop {
        tokio::select! {
            // Supervisor notices for the event feed.
            Some(notice) = notice_rx.recv() => {
                state.push_notice(notice);
            }

            // Keyboard events from crossterm.
            Some(Ok(crossterm_event)) = key_stream.next() => {
                if let crossterm::event::Event::Key(key) = crossterm_event {
                    match handle_key_event(key, &mut state) {
                        Action::None => {}
                        Action::Stop(name) => {
                            supervisor.stop(&name);
                        }
                        Action::Restart(name) => {
                            supervisor.restart(&name);
                        }
                        Action::Quit => break,
                    }
                }
                // Resize events are handled automatically by ratatui on next draw.
            }

            // Render tick: drain, recompute, redraw.
            _ = tick_interval.tick() => {
                supervisor.drain_status();
                state.set_rows(supervisor.snapshots());
                terminal.draw(|frame| {
                    render_ui(&state, frame);
                })?;

                if supervisor.all_terminal() && !config.keep_open {
                    tracing::info!("all workers terminal, exiting");
                    break;
                }
            }
        }
    }

    Ok(())
}
