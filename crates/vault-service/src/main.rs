use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use vault_core::alert::{alert_channel, AlertEvent};
use vault_core::settings::Settings;
use vault_core::VaultError;
use vault_service::{supervise, Engine};

#[derive(Parser, Debug)]
#[command(author, version, about = "SecureVault ransomware detection", long_about = None)]
struct Cli {
    /// Directory tree to baseline and monitor (defaults to the settings value)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Where the baseline and activity log are kept
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Settings file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Hash the monitored tree and store the baseline
    Baseline,
    /// Compare the tree against the stored baseline once
    Scan,
    /// Place the decoy file at the monitored root
    Honeypot,
    /// Watch the tree for changes in real time
    Watch,
    /// Watch for processes with sustained high CPU
    Cpu,
    /// Run the file and process monitors together
    Run,
    /// Print recent activity log lines
    Log {
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let engine = Engine::new(load_settings(&cli)?)?;
    match cli.command {
        Commands::Baseline => baseline_command(&engine),
        Commands::Scan => scan_command(&engine),
        Commands::Honeypot => {
            match engine.create_honeypot(None) {
                Some(path) => println!("📦 Honeypot in place: {}", path.display()),
                None => println!("⚠️ Honeypot could not be created; see the activity log"),
            }
            Ok(())
        }
        Commands::Watch => monitor_command(&engine, true, false).await,
        Commands::Cpu => monitor_command(&engine, false, true).await,
        Commands::Run => monitor_command(&engine, true, true).await,
        Commands::Log { limit } => {
            for line in engine.activity_log().read_recent(limit)? {
                println!("{line}");
            }
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let path = match &cli.config {
        Some(p) => p.clone(),
        None => Settings::default_path()?,
    };
    let mut settings = Settings::load(&path)
        .with_context(|| format!("cannot read settings from {}", path.display()))?;
    if let Some(root) = &cli.root {
        settings.root = root.clone();
    }
    if let Some(dir) = &cli.data_dir {
        settings.data_dir = dir.clone();
    }
    Ok(settings)
}

fn baseline_command(engine: &Engine) -> Result<()> {
    let snapshot = engine.build_baseline()?;
    println!(
        "✅ Baseline created at {} ({} files)",
        engine.settings().baseline_path().display(),
        snapshot.len()
    );
    Ok(())
}

fn scan_command(engine: &Engine) -> Result<()> {
    let report = match engine.scan_once() {
        Ok(report) => report,
        Err(e)
            if e
                .downcast_ref::<VaultError>()
                .is_some_and(VaultError::is_baseline_missing) =>
        {
            println!("❌ Baseline file not found! Please run baseline first.");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    if report.is_clean() {
        println!("✅ No changes detected. {} files intact.", report.checked);
    } else {
        println!("⚠️ ALERT! Modified or deleted files:");
        for d in &report.discrepancies {
            println!(" - {d}");
        }
    }
    Ok(())
}

fn print_alert(alert: &AlertEvent) {
    println!(
        "[{}] {:<8} {}",
        alert.timestamp.with_timezone(&Local).format("%H:%M:%S"),
        alert.severity,
        alert.message
    );
}

async fn monitor_command(engine: &Engine, files: bool, processes: bool) -> Result<()> {
    let (alerts, rx) = alert_channel(engine.settings().alert_capacity);
    let (stop_tx, stop_rx) = watch::channel(false);

    let mut tasks = Vec::new();
    if files {
        tasks.push(engine.start_file_monitor(alerts.clone(), stop_rx.clone()));
    }
    if processes {
        tasks.push(engine.start_process_monitor(alerts.clone(), stop_rx.clone()));
    }
    // Only the monitors hold senders now; the channel closes when they finish.
    drop(alerts);

    supervise(rx, tasks, stop_tx, signal::ctrl_c(), print_alert).await
}
