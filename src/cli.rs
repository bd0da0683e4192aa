use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "castellan", version, about = "Supervising dashboard for game-automation workers")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the configured instances and the dashboard
    Run {
        /// Instances file (default: castellan.toml)
        #[arg(short, long)]
        instances: Option<PathBuf>,

        /// Device addresses to run instead of the instances file,
        /// e.g. --devices 127.0.0.1:5555,127.0.0.1:5556
        #[arg(short, long, value_delimiter = ',')]
        devices: Vec<String>,

        /// Bot config forwarded to workers that don't set their own
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Worker script path
        #[arg(long)]
        script: Option<PathBuf>,

        /// Python interpreter used to run the worker script
        #[arg(long)]
        python: Option<String>,

        /// Prefix for auto-generated instance names
        #[arg(long)]
        name_prefix: Option<String>,

        /// Render tick interval in milliseconds
        #[arg(long)]
        tick_ms: Option<u64>,

        /// Keep the dashboard open after every instance has stopped
        #[arg(long)]
        keep_open: bool,

        /// Disable automatic restarts of exited workers
        #[arg(long)]
        no_restart: bool,

        /// Mirror each instance's raw output to <dir>/<name>.log
        #[arg(long)]
        log_dir: Option<PathBuf>,

        /// Run without TUI (log lifecycle transitions to stderr)
        #[arg(long)]
        headless: bool,

        /// Extra arguments forwarded verbatim to every worker
        /// that doesn't define its own extra_args
        #[arg(last = true)]
        extra_args: Vec<String>,
    },
    /// Validate the instances file and print the resolved registry
    Check {
        /// Instances file (default: castellan.toml)
        #[arg(short, long)]
        instances: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_parses_device_list() {
        let cli = Cli::try_parse_from([
            "castellan",
            "run",
            "--devices",
            "127.0.0.1:5555,127.0.0.1:5556",
        ])
        .unwrap();
        match cli.command {
            Commands::Run { devices, .. } => {
                assert_eq!(devices, vec!["127.0.0.1:5555", "127.0.0.1:5556"]);
            }
            other => panic!("expected run, got {other:?}"),
        }
    }

    #[test]
    fn run_collects_trailing_extra_args() {
        let cli = Cli::try_parse_from([
            "castellan",
            "run",
            "-d",
            "emulator-5554",
            "--",
            "--no-upgrades",
            "--waves",
            "40",
        ])
        .unwrap();
        match cli.command {
            Commands::Run { extra_args, .. } => {
                assert_eq!(extra_args, vec!["--no-upgrades", "--waves", "40"]);
            }
            other => panic!("expected run, got {other:?}"),
        }
    }

    #[test]
    fn check_takes_instances_path() {
        let cli = Cli::try_parse_from(["castellan", "check", "-i", "fleet.toml"]).unwrap();
        match cli.command {
            Commands::Check { instances } => {
                assert_eq!(instances, Some(PathBuf::from("fleet.toml")));
            }
            other => panic!("expected check, got {other:?}"),
        }
    }
}
