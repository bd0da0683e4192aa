//! Two-line status bar widget.
//!
//! Renders persistent status information at the bottom of the TUI:
//! - Line 1: fleet counts by lifecycle state, recomputed from the rows
//! - Line 2: keybind hints

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Widget};

use crate::supervisor::{ExitReason, WorkerState};
use crate::tui::app_state::DashboardState;

/// Per-state row counts for the summary line.
#[derive(Debug, Default, PartialEq, Eq)]
struct FleetCounts {
    running: usize,
    starting: usize,
    restarting: usize,
    stopped: usize,
    failed: usize,
}

fn count_states(state: &DashboardState) -> FleetCounts {
    let mut counts = FleetCounts::default();
    for row in &state.rows {
        match row.state {
            WorkerState::Pending | WorkerState::Starting => counts.starting += 1,
            WorkerState::Running => counts.running += 1,
            WorkerState::Restarting => counts.restarting += 1,
            WorkerState::Exited(ExitReason::Code(0)) | WorkerState::Exited(ExitReason::Stopped) => {
                counts.stopped += 1
            }
            WorkerState::Exited(_) => counts.failed += 1,
        }
    }
    counts
}

/// Render the two-line status bar into the given area.
///
/// Line 1: ` N instances | R running | S starting | B restarting | F failed`
/// Line 2: ` ↑↓/jk: select | s: stop | r: restart | q: quit`
pub fn render_status_bar(state: &DashboardState, area: Rect, buf: &mut Buffer) {
    if area.height == 0 || area.width == 0 {
        return;
    }

    let sep = Span::styled(" | ", Style::default().fg(Color::DarkGray));
    let counts = count_states(state);

    // -- Line 1: fleet counts --
    let mut line1_spans: Vec<Span<'static>> = vec![Span::styled(
        format!(" {} instances", state.rows.len()),
        Style::default().add_modifier(Modifier::BOLD),
    )];

    line1_spans.push(sep.clone());
    line1_spans.push(Span::styled(
        format!("{} running", counts.running),
        Style::default().fg(Color::Green),
    ));

    line1_spans.push(sep.clone());
    line1_spans.push(Span::styled(
        format!("{} starting", counts.starting),
        Style::default().fg(Color::Yellow),
    ));

    line1_spans.push(sep.clone());
    line1_spans.push(Span::styled(
        format!("{} restarting", counts.restarting),
        Style::default().fg(Color::Yellow),
    ));

    line1_spans.push(sep.clone());
    line1_spans.push(Span::styled(
        format!("{} stopped", counts.stopped),
        Style::default().fg(Color::DarkGray),
    ));

    line1_spans.push(sep.clone());
    line1_spans.push(Span::styled(
        format!("{} failed", counts.failed),
        if counts.failed > 0 {
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        },
    ));

    // Visible only in keep-open mode (otherwise the dashboard exits first).
    let all_stopped = !state.rows.is_empty() && state.rows.iter().all(|r| r.state.is_exited());
    if all_stopped {
        line1_spans.push(sep.clone());
        line1_spans.push(Span::styled(
            "all instances have stopped",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ));
    }

    let line1 = Line::from(line1_spans);

    // -- Line 2: keybind hints --
    let hint_style = Style::default().fg(Color::DarkGray);
    let key_style = Style::default().fg(Color::White);

    let line2 = Line::from(vec![
        Span::raw(" "),
        Span::styled("\u{2191}\u{2193}/jk", key_style),
        Span::styled(": select", hint_style),
        Span::styled(" | ", hint_style),
        Span::styled("s", key_style),
        Span::styled(": stop", hint_style),
        Span::styled(" | ", hint_style),
        Span::styled("r", key_style),
        Span::styled(": restart", hint_style),
        Span::styled(" | ", hint_style),
        Span::styled("q", key_style),
        Span::styled(": quit", hint_style),
    ]);

    let paragraph = Paragraph::new(vec![line1, line2]);
    paragraph.render(area, buf);
}
