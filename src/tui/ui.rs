//! Top-level TUI render function.
//!
//! [`render_ui`] is the single entry point called each frame by the main
//! loop. It stacks the instance table, the notice feed, and the status bar
//! into a complete frame.

use ratatui::Frame;
use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Widget};

use crate::tui::app_state::DashboardState;
use crate::tui::widgets::{instance_table, notices, status_bar};

/// Render the complete TUI from the current dashboard state.
///
/// Layout (top to bottom):
/// 1. Instance table (all remaining space)
/// 2. Notice feed (8 lines)
/// 3. Status bar (2 lines): fleet counts, keybinds
///
/// If `quit_pending` is true, a centered confirmation dialog overlays the
/// content.
pub fn render_ui(state: &DashboardState, frame: &mut Frame) {
    let area = frame.area();

    let chunks = Layout::vertical([
        Constraint::Min(7),    // Instance table
        Constraint::Length(8), // Notice feed
        Constraint::Length(2), // Status bar
    ])
    .split(area);

    instance_table::render_instance_table(state, chunks[0], frame.buffer_mut());
    notices::render_notices(state, chunks[1], frame.buffer_mut());
    status_bar::render_status_bar(state, chunks[2], frame.buffer_mut());

    if state.quit_pending {
        render_quit_dialog(area, frame.buffer_mut());
    }
}

/// Render a centered quit confirmation dialog.
fn render_quit_dialog(area: Rect, buf: &mut Buffer) {
    let dialog_width: u16 = 30;
    let dialog_height: u16 = 3;

    let x = area.x + area.width.saturating_sub(dialog_width) / 2;
    let y = area.y + area.height.saturating_sub(dialog_height) / 2;

    let dialog_area = Rect::new(
        x,
        y,
        dialog_width.min(area.width),
        dialog_height.min(area.height),
    );

    // Clear the area behind the dialog
    Clear.render(dialog_area, buf);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Confirm ")
        .style(Style::default().fg(Color::Red));

    let inner = block.inner(dialog_area);
    block.render(dialog_area, buf);

    if inner.width > 0 && inner.height > 0 {
        let prompt = Paragraph::new(Line::from(vec![
            Span::raw("  Stop all and quit? ("),
            Span::styled(
                "y",
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            ),
            Span::raw("/"),
            Span::styled(
                "n",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ),
            Span::raw(")"),
        ]));
        prompt.render(inner, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    use crate::supervisor::{ExitReason, NoticeLevel, Notice, WorkerSnapshot, WorkerState};

    /// Helper to render state to a test terminal and extract buffer content.
    fn render_to_string(state: &DashboardState, width: u16, height: u16) -> String {
        let backend = TestBackend::new(width, height);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal
            .draw(|frame| {
                render_ui(state, frame);
            })
            .unwrap();
        let buf = terminal.backend().buffer().clone();
        buf.content().iter().map(|c| c.symbol().to_string()).collect()
    }

    fn snapshot(name: &str, state: WorkerState) -> WorkerSnapshot {
        let mut snap = WorkerSnapshot::new(name, "127.0.0.1:5555");
        snap.state = state;
        snap
    }

    #[test]
    fn render_ui_default_state() {
        let state = DashboardState::new();
        let content = render_to_string(&state, 170, 24);
        assert!(content.contains("Instances"));
        assert!(content.contains("Events"));
        assert!(content.contains("0 instances"));
        assert!(content.contains("quit"));
    }

    #[test]
    fn render_ui_shows_rows_and_notices() {
        let mut state = DashboardState::new();
        state.set_rows(vec![
            snapshot("bot-01", WorkerState::Running),
            snapshot("bot-02", WorkerState::Exited(ExitReason::Code(1))),
        ]);
        state.push_notice(Notice::new(
            NoticeLevel::Error,
            Some("bot-02"),
            "gave up after 3 consecutive restarts",
        ));

        let content = render_to_string(&state, 170, 30);
        assert!(content.contains("bot-01"));
        assert!(content.contains("bot-02"));
        assert!(content.contains("gave up after 3 consecutive restarts"));
        assert!(content.contains("1 running"));
        assert!(content.contains("1 failed"));
    }

    #[test]
    fn render_ui_quit_pending_shows_dialog() {
        let mut state = DashboardState::new();
        state.quit_pending = true;
        let content = render_to_string(&state, 80, 24);
        assert!(content.contains("Stop all and quit?"));
        assert!(content.contains("Confirm"));
    }

    #[test]
    fn render_ui_small_terminal() {
        // Should not panic even with a tiny terminal.
        let mut state = DashboardState::new();
        state.set_rows(vec![snapshot("bot-01", WorkerState::Starting)]);
        let content = render_to_string(&state, 20, 5);
        assert!(!content.is_empty());
    }

    #[test]
    fn quit_dialog_renders_centered() {
        let area = Rect::new(0, 0, 80, 24);
        let mut buf = Buffer::empty(area);
        render_quit_dialog(area, &mut buf);
        let content: String = buf.content().iter().map(|c| c.symbol().to_string()).collect();
        assert!(content.contains("Stop all and quit?"));
    }
}
