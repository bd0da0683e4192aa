use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

use castellan::cli::Cli;
use castellan::config::load_config;
use castellan::error::ConfigError;

fn setup_dir() -> TempDir {
    tempfile::tempdir().expect("failed to create temp dir")
}

fn write_instances(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("castellan.toml");
    std::fs::write(&path, contents).expect("failed to write instances file");
    path
}

fn cli(args: &[&str]) -> Cli {
    let mut argv = vec!["castellan"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).expect("failed to parse test argv")
}

// ============================================================
// Instances file loading
// ============================================================

#[test]
fn file_sections_resolve_into_config_and_registry() {
    let dir = setup_dir();
    let path = write_instances(
        &dir,
        r#"
[worker]
python = "python3.11"
script = "bots/growcastle.py"
config = "configs/default.json"

[supervisor]
max_restarts = 5
backoff_base_ms = 1000
stable_uptime_secs = 120

[dashboard]
tick_ms = 100
name_prefix = "gc"

[[instances]]
name = "main"
device = "127.0.0.1:5555"
config = "configs/main.json"

[[instances]]
device = "127.0.0.1:5565"
extra_args = ["--no-upgrades"]
"#,
    );

    let cli = cli(&["run", "-i", path.to_str().unwrap()]);
    let (config, registry) = load_config(&cli).unwrap();

    assert_eq!(config.python, "python3.11");
    assert_eq!(config.script, PathBuf::from("bots/growcastle.py"));
    assert_eq!(config.max_restarts, 5);
    assert_eq!(config.backoff_base, Duration::from_secs(1));
    assert_eq!(config.stable_uptime, Duration::from_secs(120));
    assert_eq!(config.tick_interval, Duration::from_millis(100));
    // Unset fields fall back to defaults.
    assert_eq!(config.backoff_cap, Duration::from_secs(30));
    assert!(config.restart);

    assert_eq!(registry.len(), 2);
    let main = registry.get("main").unwrap();
    assert_eq!(main.device, "127.0.0.1:5555");
    assert_eq!(main.config, PathBuf::from("configs/main.json"));

    // Second entry auto-names with the configured prefix and inherits the
    // worker-level config.
    let second = registry.get("gc-02").unwrap();
    assert_eq!(second.device, "127.0.0.1:5565");
    assert_eq!(second.config, PathBuf::from("configs/default.json"));
    assert_eq!(second.extra_args, vec!["--no-upgrades".to_string()]);
}

#[test]
fn cli_flags_override_file_values() {
    let dir = setup_dir();
    let path = write_instances(
        &dir,
        r#"
[worker]
python = "python3.10"

[dashboard]
tick_ms = 500

[[instances]]
device = "emulator-5554"
"#,
    );

    let cli = cli(&[
        "run",
        "-i",
        path.to_str().unwrap(),
        "--python",
        "python3.12",
        "--tick-ms",
        "100",
        "--no-restart",
        "--keep-open",
    ]);
    let (config, _registry) = load_config(&cli).unwrap();

    assert_eq!(config.python, "python3.12");
    assert_eq!(config.tick_interval, Duration::from_millis(100));
    assert!(!config.restart);
    assert!(config.keep_open);
}

#[test]
fn device_list_overrides_file_instances() {
    let dir = setup_dir();
    let path = write_instances(
        &dir,
        r#"
[[instances]]
name = "from-file"
device = "127.0.0.1:5555"
"#,
    );

    let cli = cli(&[
        "run",
        "-i",
        path.to_str().unwrap(),
        "--devices",
        "127.0.0.1:6000,127.0.0.1:6001",
    ]);
    let (_config, registry) = load_config(&cli).unwrap();

    assert_eq!(registry.len(), 2);
    assert!(registry.get("from-file").is_none());
    assert_eq!(registry.get("bot-01").unwrap().device, "127.0.0.1:6000");
    assert_eq!(registry.get("bot-02").unwrap().device, "127.0.0.1:6001");
}

#[test]
fn trailing_args_become_worker_extra_args() {
    let cli = cli(&[
        "run",
        "--devices",
        "emulator-5554",
        "--",
        "--waves",
        "40",
    ]);
    let (_config, registry) = load_config(&cli).unwrap();

    let instance = registry.get("bot-01").unwrap();
    assert_eq!(instance.extra_args, vec!["--waves", "40"]);
}

// ============================================================
// Validation failures
// ============================================================

#[test]
fn explicit_missing_instances_file_is_fatal() {
    let dir = setup_dir();
    let path = dir.path().join("nope.toml");

    let cli = cli(&["run", "-i", path.to_str().unwrap()]);
    let result = load_config(&cli);
    assert!(matches!(result, Err(ConfigError::MissingFile { .. })));
}

#[test]
fn malformed_instances_file_is_fatal() {
    let dir = setup_dir();
    let path = write_instances(&dir, "[[instances\ndevice = ");

    let cli = cli(&["run", "-i", path.to_str().unwrap()]);
    let result = load_config(&cli);
    assert!(matches!(result, Err(ConfigError::ParseError { .. })));
}

#[test]
fn entry_without_device_is_fatal() {
    let dir = setup_dir();
    let path = write_instances(
        &dir,
        r#"
[[instances]]
name = "main"
"#,
    );

    let cli = cli(&["run", "-i", path.to_str().unwrap()]);
    let result = load_config(&cli);
    assert!(matches!(
        result,
        Err(ConfigError::MissingDevice { name }) if name == "main"
    ));
}

#[test]
fn duplicate_instance_names_are_fatal() {
    let dir = setup_dir();
    let path = write_instances(
        &dir,
        r#"
[[instances]]
name = "main"
device = "a"

[[instances]]
name = "main"
device = "b"
"#,
    );

    let cli = cli(&["run", "-i", path.to_str().unwrap()]);
    let result = load_config(&cli);
    assert!(matches!(
        result,
        Err(ConfigError::DuplicateName { name }) if name == "main"
    ));
}

#[test]
fn file_without_instances_and_no_devices_is_fatal() {
    let dir = setup_dir();
    let path = write_instances(
        &dir,
        r#"
[worker]
python = "python3"
"#,
    );

    let cli = cli(&["run", "-i", path.to_str().unwrap()]);
    let result = load_config(&cli);
    assert!(matches!(result, Err(ConfigError::EmptyRegistry)));
}

// ============================================================
// Check subcommand path
// ============================================================

#[test]
fn check_resolves_the_same_registry() {
    let dir = setup_dir();
    let path = write_instances(
        &dir,
        r#"
[[instances]]
name = "main"
device = "127.0.0.1:5555"
"#,
    );

    let cli = cli(&["check", "-i", path.to_str().unwrap()]);
    let (config, registry) = load_config(&cli).unwrap();

    assert_eq!(registry.len(), 1);
    assert!(registry.get("main").is_some());
    // Check uses defaults for everything not in the file.
    assert_eq!(config.python, "python3");
}
