//! Reusable widgets composed by [`super::ui`].

pub mod instance_table;
pub mod notices;
pub mod status_bar;
