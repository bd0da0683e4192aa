pub mod cli;
pub mod config;
pub mod error;
pub mod headless;
pub mod protocol;
pub mod registry;
pub mod supervisor;
pub mod tui;
