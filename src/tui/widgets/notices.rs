//! Notice feed widget.
//!
//! Renders the tail of the operator notice feed: lifecycle transitions,
//! restart scheduling, protocol warnings, and give-up alerts. The feed
//! always follows the newest notices; row navigation stays in the table.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};

use crate::supervisor::{Notice, NoticeLevel};
use crate::tui::app_state::DashboardState;

/// Icon/prefix symbol for each notice level.
fn level_prefix(level: NoticeLevel) -> &'static str {
    match level {
        NoticeLevel::Info => "·",
        NoticeLevel::Warn => "!",
        NoticeLevel::Error => "✗",
    }
}

/// Style for the notice text based on level.
fn level_style(level: NoticeLevel) -> Style {
    match level {
        NoticeLevel::Info => Style::default().fg(Color::Gray),
        NoticeLevel::Warn => Style::default().fg(Color::Yellow),
        NoticeLevel::Error => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
    }
}

/// Build the display line for one notice.
fn notice_line(notice: &Notice) -> Line<'_> {
    let style = level_style(notice.level);
    let mut spans = vec![
        Span::styled(
            format!("{} ", notice.timestamp),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(format!("{} ", level_prefix(notice.level)), style),
    ];
    if let Some(instance) = &notice.instance {
        spans.push(Span::styled(
            format!("[{instance}] "),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ));
    }
    spans.push(Span::styled(notice.text.as_str(), style));
    Line::from(spans)
}

/// Render the newest notices that fit in the area, oldest first.
pub fn render_notices(state: &DashboardState, area: Rect, buf: &mut Buffer) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Events ")
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);
    block.render(area, buf);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let visible = inner.height as usize;
    let skip = state.notices.len().saturating_sub(visible);
    let lines: Vec<Line<'_>> = state.notices.iter().skip(skip).map(notice_line).collect();

    Paragraph::new(lines).render(inner, buf);
}
