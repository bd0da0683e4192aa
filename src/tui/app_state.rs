//! Dashboard state for the TUI.
//!
//! [`DashboardState`] is the single source of truth for everything a frame
//! renders. The render tick replaces the row snapshots wholesale via
//! [`DashboardState::set_rows`]; notices append via
//! [`DashboardState::push_notice`]; key handling mutates the selection and
//! quit flag. Each frame reads from this struct (immediate-mode rendering).

use std::collections::VecDeque;

use crate::supervisor::{Notice, WorkerSnapshot};

/// Maximum notices retained in the feed.
const NOTICE_CAPACITY: usize = 200;

/// All TUI-visible state.
pub struct DashboardState {
    // -- Instance table --
    /// Current row snapshots, in registry order. Replaced every tick.
    pub rows: Vec<WorkerSnapshot>,
    /// Index of the selected row, if any rows exist.
    pub selected: Option<usize>,

    // -- Notice feed --
    /// Recent operator notices (oldest at front).
    pub notices: VecDeque<Notice>,

    // -- Quit confirmation --
    /// True after the first 'q' press; a second 'q' (or 'y') confirms.
    pub quit_pending: bool,
}

impl DashboardState {
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            selected: None,
            notices: VecDeque::new(),
            quit_pending: false,
        }
    }

    /// Replace the row snapshots with this tick's aggregation output.
    ///
    /// Selection is positional (registry order is fixed for a run) and is
    /// clamped if the row count shrinks.
    pub fn set_rows(&mut self, rows: Vec<WorkerSnapshot>) {
        self.rows = rows;
        if self.rows.is_empty() {
            self.selected = None;
        } else {
            let last = self.rows.len() - 1;
            self.selected = Some(self.selected.map_or(0, |s| s.min(last)));
        }
    }

    /// Move the selection up one row, clamping at the top.
    pub fn select_previous(&mut self) {
        if let Some(selected) = self.selected {
            self.selected = Some(selected.saturating_sub(1));
        }
    }

    /// Move the selection down one row, clamping at the bottom.
    pub fn select_next(&mut self) {
        if let Some(selected) = self.selected {
            self.selected = Some((selected + 1).min(self.rows.len().saturating_sub(1)));
        }
    }

    /// Name of the selected instance, for dispatching stop/restart.
    pub fn selected_name(&self) -> Option<&str> {
        self.selected
            .and_then(|index| self.rows.get(index))
            .map(|row| row.name.as_str())
    }

    /// Append a notice, dropping the oldest beyond capacity.
    pub fn push_notice(&mut self, notice: Notice) {
        if self.notices.len() >= NOTICE_CAPACITY {
            self.notices.pop_front();
        }
        self.notices.push_back(notice);
    }
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::new()
    }
}
