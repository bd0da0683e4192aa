use clap::Parser;
use tokio_util::sync::CancellationToken;

use castellan::registry::Registry;
use castellan::supervisor::Supervisor;
use castellan::{cli, config, headless, tui};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing. Logs go to stderr: stdout belongs to the dashboard.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::Cli::parse();

    let (config, registry) = config::load_config(&cli)?;

    match &cli.command {
        cli::Commands::Run {
            headless: headless_mode,
            ..
        } => {
            tracing::info!(
                instances = registry.len(),
                worker = %config.script.display(),
                "castellan starting"
            );

            if *headless_mode {
                let supervisor = Supervisor::new(
                    &registry,
                    config.clone(),
                    None,
                    CancellationToken::new(),
                );
                headless::run_headless(supervisor, &config).await?;
            } else {
                let (notice_tx, notice_rx) = tokio::sync::mpsc::unbounded_channel();
                let supervisor = Supervisor::new(
                    &registry,
                    config.clone(),
                    Some(notice_tx),
                    CancellationToken::new(),
                );
                tui::run_tui(supervisor, notice_rx, &config).await?;
            }
        }
        cli::Commands::Check { .. } => {
            print_check(&config, &registry);
        }
    }

    Ok(())
}

/// Print the resolved configuration and instance set for `castellan check`.
fn print_check(config: &config::AppConfig, registry: &Registry) {
    println!("Configuration OK: {} instance(s)", registry.len());
    for instance in registry.iter() {
        let extras = if instance.extra_args.is_empty() {
            String::new()
        } else {
            format!(" [{}]", instance.extra_args.join(" "))
        };
        println!(
            "  {:<12} device {:<18} config {}{}",
            instance.name,
            instance.device,
            instance.config.display(),
            extras
        );
    }
    println!(
        "Worker: {} {} (cwd {})",
        config.python,
        config.script.display(),
        config.workdir.display()
    );
    if config.restart {
        println!(
            "Restart: up to {} consecutive, backoff {}ms..{}ms, stable after {}s",
            config.max_restarts,
            config.backoff_base.as_millis(),
            config.backoff_cap.as_millis(),
            config.stable_uptime.as_secs()
        );
    } else {
        println!("Restart: disabled");
    }
    if let Some(log_dir) = &config.log_dir {
        println!("Log mirror: {}/<instance>.log", log_dir.display());
    }
}
