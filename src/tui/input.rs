//! Keyboard event handler for the TUI.
//!
//! Maps key events to [`DashboardState`] mutations and supervisor actions.
//! Called by the main loop in [`super::runner`] whenever a keyboard event
//! arrives from the crossterm `EventStream`.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use super::app_state::DashboardState;

/// What the main loop should do with the supervisor after a key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    /// Gracefully stop the named instance.
    Stop(String),
    /// Restart the named instance.
    Restart(String),
    /// Tear everything down and exit.
    Quit,
}

/// Process a keyboard event, mutating dashboard state and returning the
/// action for the main loop to dispatch.
///
/// Only `KeyEventKind::Press` events are processed. This avoids duplicate
/// handling on Windows where key-up events would otherwise trigger actions
/// twice.
pub fn handle_key_event(key: KeyEvent, state: &mut DashboardState) -> Action {
    // Filter: only handle key press events (not release/repeat).
    if key.kind != KeyEventKind::Press {
        return Action::None;
    }

    // Ctrl+C: immediate quit, no confirmation, even mid-confirmation.
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Action::Quit;
    }

    // -- Quit confirmation mode: intercept keys before normal handling.
    if state.quit_pending {
        return match key.code {
            KeyCode::Char('q') | KeyCode::Char('y') => Action::Quit,
            _ => {
                // 'n', Esc, or any other key cancels.
                state.quit_pending = false;
                Action::None
            }
        };
    }

    // -- Normal key handling.
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => {
            state.select_previous();
        }
        KeyCode::Down | KeyCode::Char('j') => {
            state.select_next();
        }
        KeyCode::Char('s') => {
            if let Some(name) = state.selected_name() {
                return Action::Stop(name.to_string());
            }
        }
        KeyCode::Char('r') => {
            if let Some(name) = state.selected_name() {
                return Action::Restart(name.to_string());
            }
        }
        KeyCode::Char('q') => {
            // First press: enter quit confirmation mode.
            state.quit_pending = true;
        }
        _ => {
            // Unbound key: no action.
        }
    }

    Action::None
}
