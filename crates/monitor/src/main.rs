//! Space-weather risk monitor.
//!
//! Polls the configured NOAA SWPC and Kyoto WDC feeds, classifies each index
//! and alerts operators through Slack, Telegram and email when risk escalates.

mod manual;
mod output;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use notify::Notifier;
use swx_engine::{Engine, MonitorConfig, RiskLevel};
use swx_feeds::HttpFetcher;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Space-weather risk monitor.
#[derive(Parser)]
#[command(name = "swx-monitor")]
#[command(about = "Monitor space-weather feeds and alert on risk escalations")]
#[command(version)]
pub struct Cli {
    /// Configuration file (TOML, or JSON by extension)
    #[arg(short, long, global = true, env = "SWX_CONFIG", default_value = "swx-monitor.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Poll continuously at the configured interval
    Run,

    /// Run a single polling cycle and print the resulting status (for cron use)
    Poll {
        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the status file written by a running monitor
    Status {
        /// Status file (defaults to engine.status_file)
        #[arg(long)]
        file: Option<PathBuf>,

        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate the configuration and show what would be monitored
    CheckConfig,

    /// Send a test alert through every configured channel
    TestAlert {
        /// Index to build the alert for (defaults to the first configured)
        #[arg(long)]
        index: Option<String>,

        /// Level of the test alert
        #[arg(long, value_enum, default_value_t = AlertLevel::Warning)]
        level: AlertLevel,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AlertLevel {
    Watch,
    Warning,
    Severe,
}

impl From<AlertLevel> for RiskLevel {
    fn from(level: AlertLevel) -> Self {
        match level {
            AlertLevel::Watch => Self::Watch,
            AlertLevel::Warning => Self::Warning,
            AlertLevel::Severe => Self::Severe,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_format);

    match cli.command {
        Commands::Run => run_monitor(&cli.config).await,
        Commands::Poll { json } => run_poll(&cli.config, json).await,
        Commands::Status { file, json } => run_status(&cli.config, file, json).await,
        Commands::CheckConfig => run_check_config(&cli.config),
        Commands::TestAlert { index, level } => {
            run_test_alert(&cli.config, index.as_deref(), level.into()).await
        }
    }
}

fn init_tracing(verbose: bool, format: LogFormat) {
    // Directive targets are prefixes: "swx" covers every swx_* crate.
    let default = if verbose {
        "swx=debug,notify=debug,info"
    } else {
        "swx=info,notify=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}

fn load_config(path: &Path) -> Result<MonitorConfig> {
    MonitorConfig::load(path).with_context(|| format!("Failed to load config {}", path.display()))
}

fn build_engine(config: &MonitorConfig) -> Result<Engine> {
    let registry = config.registry().context("Invalid index registry")?;
    let fetcher = HttpFetcher::new().context("Failed to create HTTP fetcher")?;
    let notifier = Notifier::from_settings(&config.notify);

    Ok(Engine::new(
        registry,
        Arc::new(fetcher),
        Arc::new(notifier),
        config.engine_options(),
    ))
}

async fn run_monitor(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let engine = build_engine(&config)?;

    info!(
        config = %config_path.display(),
        interval_secs = config.engine.poll_interval_secs,
        indices = engine.registry().len(),
        "Starting monitor"
    );

    let mut ticker = tokio::time::interval(config.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                engine.run_cycle().await;
                if let Some(path) = &config.engine.status_file {
                    let snapshot = engine.current_status().await;
                    if let Err(e) = output::write_status_file(path, &snapshot).await {
                        error!(error = %e, path = %path.display(), "Failed to write status file");
                    }
                }
            }
            () = async { tokio::signal::ctrl_c().await.ok(); } => {
                info!("Received SIGINT, shutting down");
                break;
            }
        }
    }

    Ok(())
}

async fn run_poll(config_path: &Path, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let engine = build_engine(&config)?;

    info!(indices = engine.registry().len(), "Starting poll cycle");
    let report = engine.run_cycle().await;
    let snapshot = engine.current_status().await;

    if let Some(path) = &config.engine.status_file {
        output::write_status_file(path, &snapshot).await?;
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "cycle": report,
                "status": snapshot,
            }))?
        );
    } else {
        print!("{}", output::status_table(&snapshot));
        let summary = output::cycle_summary(&report);
        if !summary.is_empty() {
            println!();
            print!("{summary}");
        }
    }
    Ok(())
}

async fn run_status(config_path: &Path, file: Option<PathBuf>, json: bool) -> Result<()> {
    let path = match file {
        Some(path) => path,
        None => load_config(config_path)?
            .engine
            .status_file
            .context("No --file given and engine.status_file is not configured")?,
    };

    // The writer may have stopped; judge staleness now, not when it wrote.
    let snapshot = output::read_status_file(&path).await?.as_of(Utc::now());
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print!("{}", output::status_table(&snapshot));
    }
    Ok(())
}

fn run_check_config(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let registry = config.registry()?;

    println!("{} {}", "✓".green(), config_path.display());
    println!(
        "  Poll every {}s, fetch timeout {}s, dispatch timeout {}s",
        config.engine.poll_interval_secs,
        config.engine.fetch_timeout_secs,
        config.engine.dispatch_timeout_secs
    );

    println!("\n{}", "Indices".bold());
    for def in registry.all() {
        let bands: Vec<String> = def
            .thresholds
            .iter()
            .map(|band| format!("{} {}", band.level, def.render_value(band.boundary)))
            .collect();
        println!(
            "  {:<14} {:<12} {}",
            def.name,
            def.source,
            if bands.is_empty() { "no bands".dimmed().to_string() } else { bands.join(", ") }
        );
    }

    let notifier = Notifier::from_settings(&config.notify);
    let channels = notifier.channel_names();
    println!("\n{}", "Channels".bold());
    if channels.is_empty() {
        println!("  {}", "none (alerts are only logged)".yellow());
    } else {
        println!("  {}", channels.join(", "));
    }
    Ok(())
}

async fn run_test_alert(config_path: &Path, index: Option<&str>, level: RiskLevel) -> Result<()> {
    let config = load_config(config_path)?;
    let registry = config.registry()?;
    let event = manual::test_alert(&registry, index, level, Utc::now())?;

    let notifier = Notifier::from_settings(&config.notify);
    if !notifier.has_channels() {
        warn!("No notification channels configured");
        bail!("no notification channels configured, nothing to test");
    }

    info!(title = %event.title(), "Sending test alert");
    let reports = notifier.notify_and_wait(&event).await;

    let mut delivered = 0;
    for report in &reports {
        match &report.result {
            Ok(()) => {
                delivered += 1;
                println!("{} {}", "✓".green(), report.channel);
            }
            Err(e) => println!("{} {}: {}", "✗".red(), report.channel, e.to_string().red()),
        }
    }

    if delivered == 0 {
        bail!("test alert was not delivered by any channel");
    }
    println!("\nTest alert sent via {delivered}/{} channels", reports.len());
    Ok(())
}
