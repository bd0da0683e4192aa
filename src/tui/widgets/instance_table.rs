//! Instance table widget.
//!
//! One row per configured instance, in registry order: lifecycle state,
//! worker-reported phase, derived uptime/staleness, restart count, last exit,
//! generic counters, and the last output line. All cells are recomputed from
//! the row snapshots each frame.

use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Row, StatefulWidget, Table, TableState};

use super::super::{format_age, format_duration, truncate_str};
use crate::supervisor::{ExitReason, WorkerSnapshot, WorkerState};
use crate::tui::app_state::DashboardState;

/// One-glyph state indicator for the table's leftmost state cell.
pub fn state_symbol(state: WorkerState) -> &'static str {
    match state {
        WorkerState::Pending => "○",
        WorkerState::Starting => "◔",
        WorkerState::Running => "●",
        WorkerState::Restarting => "↻",
        WorkerState::Exited(ExitReason::Code(0)) => "✓",
        WorkerState::Exited(ExitReason::Stopped) => "⊘",
        WorkerState::Exited(_) => "✗",
    }
}

/// Style for the lifecycle state cell.
pub fn state_style(state: WorkerState) -> Style {
    let color = match state {
        WorkerState::Pending => Color::DarkGray,
        WorkerState::Starting => Color::Yellow,
        WorkerState::Running => Color::Green,
        WorkerState::Restarting => Color::Yellow,
        WorkerState::Exited(ExitReason::Code(0)) | WorkerState::Exited(ExitReason::Stopped) => {
            Color::DarkGray
        }
        WorkerState::Exited(_) => Color::Red,
    };
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}

/// Style for the worker-reported phase cell, keyed on well-known phase names.
pub fn phase_style(phase: &str) -> Style {
    let color = match phase {
        "connected" => Color::Green,
        "battle" | "farming" => Color::LightGreen,
        "menu" => Color::Yellow,
        "idle" => Color::DarkGray,
        "captcha_solving" | "captcha_wait" => Color::Magenta,
        "captcha_failed" => Color::Red,
        "home" | "connecting" | "login" => Color::Cyan,
        "stopped" => Color::Red,
        _ => Color::White,
    };
    Style::default().fg(color)
}

/// Render the instance table with the current selection highlighted.
pub fn render_instance_table(state: &DashboardState, area: Rect, buf: &mut Buffer) {
    let header = Row::new(vec![
        "#", "Name", "Device", "State", "Phase", "Up", "Age", "R", "Exit", "Counters", "Last",
    ])
    .style(
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    );

    let rows: Vec<Row<'_>> = state
        .rows
        .iter()
        .enumerate()
        .map(|(index, snapshot)| build_row(index, snapshot))
        .collect();

    let widths = [
        Constraint::Length(3),  // #
        Constraint::Length(10), // Name
        Constraint::Length(16), // Device
        Constraint::Length(14), // State (symbol + text)
        Constraint::Length(12), // Phase
        Constraint::Length(7),  // Up
        Constraint::Length(6),  // Age
        Constraint::Length(3),  // R
        Constraint::Length(12), // Exit
        Constraint::Min(12),    // Counters
        Constraint::Min(20),    // Last
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Instances ")
                .border_style(Style::default().fg(Color::Blue)),
        )
        .column_spacing(1)
        .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("▶ ");

    let mut table_state = TableState::default().with_selected(state.selected);
    StatefulWidget::render(table, area, buf, &mut table_state);
}

/// Build one data row from an instance snapshot.
fn build_row<'a>(index: usize, snapshot: &'a WorkerSnapshot) -> Row<'a> {
    let state_text = format!("{} {}", state_symbol(snapshot.state), snapshot.state);

    let phase = snapshot.phase().unwrap_or_default();
    let phase_cell = Cell::from(truncate_str(&phase, 12)).style(phase_style(&phase));

    let uptime = snapshot.uptime().map(format_duration).unwrap_or_default();
    let age = snapshot.age().map(format_age).unwrap_or_default();
    let exit = snapshot
        .last_exit
        .map(|reason| reason.to_string())
        .unwrap_or_default();

    let counters = snapshot
        .counters()
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(" ");

    // Errors outrank plain output in the Last column.
    let (last, last_style) = match &snapshot.last_error {
        Some(error) => (error.clone(), Style::default().fg(Color::Red)),
        None => {
            let text = snapshot.message().unwrap_or_else(|| snapshot.last_line.clone());
            (text, Style::default().fg(Color::DarkGray))
        }
    };

    Row::new(vec![
        Cell::from(format!("{:>2}", index + 1)),
        Cell::from(snapshot.name.as_str()).style(Style::default().add_modifier(Modifier::BOLD)),
        Cell::from(snapshot.device.as_str()),
        Cell::from(state_text).style(state_style(snapshot.state)),
        phase_cell,
        Cell::from(uptime),
        Cell::from(age),
        Cell::from(format!("{:>2}", snapshot.restarts)),
        Cell::from(exit),
        Cell::from(truncate_str(&counters, 40)),
        Cell::from(truncate_str(&last, 60)).style(last_style),
    ])
}
