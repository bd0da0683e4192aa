pub mod merge;
pub mod schema;

pub use schema::*;

use crate::cli::{Cli, Commands};
use crate::error::ConfigError;
use crate::registry::{InstanceDefaults, Registry, RegistrySource};
use std::path::{Path, PathBuf};

/// Load configuration and the instance registry for one run.
/// Precedence: CLI > instances file > global config > defaults.
///
/// A missing global config or missing default-path instances file is fine
/// (defaults apply); an explicitly passed instances file must exist, and any
/// parse failure of the instances file is fatal.
pub fn load_config(cli: &Cli) -> Result<(AppConfig, Registry), ConfigError> {
    // Layer 1: Global config (~/.config/castellan/castellan.toml or platform equivalent)
    let global = load_global_config();

    // Layer 2: the instances file
    let (path, explicit) = instances_path(cli);
    let file = load_instances_file(&path, explicit)?;
    let file_partial = file
        .as_ref()
        .map(ConfigFile::to_partial)
        .unwrap_or_default();

    // Layer 3: CLI args (converted to PartialConfig)
    let cli_partial = cli_to_partial(cli);

    // Merge: CLI > instances file > global > defaults
    let config = cli_partial
        .with_fallback(file_partial)
        .with_fallback(global)
        .finalize();

    // The registry comes from the CLI device list when one is given,
    // otherwise from the file's [[instances]] entries.
    let defaults = InstanceDefaults {
        name_prefix: config.name_prefix.clone(),
        config: config.worker_config.clone(),
        extra_args: cli_extra_args(cli),
    };
    let devices = cli_devices(cli);
    let source = if devices.is_empty() {
        RegistrySource::Entries(file.map(|f| f.instances).unwrap_or_default())
    } else {
        RegistrySource::Devices(devices)
    };
    let registry = Registry::load(source, &defaults)?;

    Ok((config, registry))
}

/// Load global config from the platform-specific config directory.
/// Returns empty PartialConfig if the file is missing or malformed.
fn load_global_config() -> PartialConfig {
    let path = global_config_path();
    match path {
        Some(p) => match std::fs::read_to_string(&p) {
            Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
                Ok(file) => {
                    tracing::info!("Loaded global config from {}", p.display());
                    file.to_partial()
                }
                Err(e) => {
                    tracing::warn!("Ignoring malformed global config {}: {}", p.display(), e);
                    PartialConfig::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => PartialConfig::default(),
            Err(e) => {
                tracing::warn!("Failed to read global config {}: {}", p.display(), e);
                PartialConfig::default()
            }
        },
        None => {
            tracing::debug!("Could not determine global config directory");
            PartialConfig::default()
        }
    }
}

/// Load and parse the instances file.
///
/// `explicit` marks a path the operator passed with --instances: it must
/// exist. The default path may be absent (the device list or an empty
/// registry error takes over from there).
fn load_instances_file(path: &Path, explicit: bool) -> Result<Option<ConfigFile>, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
            Ok(file) => {
                tracing::info!("Loaded instances from {}", path.display());
                Ok(Some(file))
            }
            Err(e) => Err(ConfigError::ParseError {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if explicit {
                Err(ConfigError::MissingFile {
                    path: path.to_path_buf(),
                })
            } else {
                tracing::debug!("No instances file at {}, using defaults", path.display());
                Ok(None)
            }
        }
        Err(e) => Err(ConfigError::IoError(e)),
    }
}

/// Resolve the platform-specific global config path.
/// Linux: ~/.config/castellan/castellan.toml
/// macOS: ~/Library/Application Support/castellan/castellan.toml
fn global_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "castellan")
        .map(|dirs| dirs.config_dir().join("castellan.toml"))
}

/// The instances file path and whether the operator chose it explicitly.
fn instances_path(cli: &Cli) -> (PathBuf, bool) {
    let instances = match &cli.command {
        Commands::Run { instances, .. } => instances,
        Commands::Check { instances } => instances,
    };
    match instances {
        Some(p) => (p.clone(), true),
        None => (PathBuf::from("castellan.toml"), false),
    }
}

fn cli_devices(cli: &Cli) -> Vec<String> {
    match &cli.command {
        Commands::Run { devices, .. } => devices.clone(),
        Commands::Check { .. } => vec![],
    }
}

fn cli_extra_args(cli: &Cli) -> Vec<String> {
    match &cli.command {
        Commands::Run { extra_args, .. } => extra_args.clone(),
        Commands::Check { .. } => vec![],
    }
}

/// Convert CLI arguments to a PartialConfig for merging.
fn cli_to_partial(cli: &Cli) -> PartialConfig {
    match &cli.command {
        Commands::Run {
            config,
            script,
            python,
            name_prefix,
            tick_ms,
            keep_open,
            no_restart,
            log_dir,
            ..
        } => PartialConfig {
            worker_config: config.clone(),
            script: script.clone(),
            python: python.clone(),
            name_prefix: name_prefix.clone(),
            tick_ms: *tick_ms,
            keep_open: keep_open.then_some(true),
            restart: no_restart.then_some(false),
            log_dir: log_dir.clone(),
            ..Default::default()
        },
        Commands::Check { .. } => PartialConfig::default(),
    }
}
