//! Terminal dashboard.
//!
//! [`runner::run_tui`] owns the terminal lifecycle and the main
//! `tokio::select!` loop; [`app_state::DashboardState`] holds everything the
//! renderer reads; [`input`] maps keys to supervisor actions; [`ui`] and
//! [`widgets`] draw the frame.

pub mod app_state;
pub mod input;
pub mod runner;
pub mod ui;
pub mod widgets;

pub use runner::run_tui;

use std::time::Duration;

/// Truncate a string to fit within a maximum display width, adding an
/// ellipsis if needed. Cuts at a char boundary.
pub(crate) fn truncate_str(s: &str, max_width: usize) -> String {
    if max_width == 0 {
        return String::new();
    }
    if s.len() <= max_width {
        return s.to_string();
    }
    let end = s
        .char_indices()
        .take_while(|&(i, _)| i < max_width.saturating_sub(1))
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    format!("{}…", &s[..end])
}

/// Compact duration for the uptime column: `45s`, `3m12s`, `4h02m`.
pub(crate) fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 3600 {
        format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}

/// Staleness display for the age column: sub-second precision while fresh,
/// compact units once stale.
pub(crate) fn format_age(d: Duration) -> String {
    if d < Duration::from_secs(100) {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format_duration(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_leaves_short_strings_alone() {
        assert_eq!(truncate_str("farming", 20), "farming");
        assert_eq!(truncate_str("", 5), "");
    }

    #[test]
    fn truncate_cuts_with_ellipsis() {
        assert_eq!(truncate_str("abcdefghij", 5), "abcd…");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        // Multi-byte content must not be split mid-char.
        let s = "wave 42 — привет мир";
        let out = truncate_str(s, 12);
        assert!(out.ends_with('…'));
        assert!(out.len() <= s.len());
    }

    #[test]
    fn truncate_zero_width_is_empty() {
        assert_eq!(truncate_str("anything", 0), "");
    }

    #[test]
    fn durations_format_compactly() {
        assert_eq!(format_duration(Duration::from_secs(45)), "45s");
        assert_eq!(format_duration(Duration::from_secs(192)), "3m12s");
        assert_eq!(format_duration(Duration::from_secs(14_520)), "4h02m");
    }

    #[test]
    fn age_is_fractional_while_fresh() {
        assert_eq!(format_age(Duration::from_millis(4_100)), "4.1s");
        assert_eq!(format_age(Duration::from_secs(200)), "3m20s");
    }
}
