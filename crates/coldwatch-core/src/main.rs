//! Coldwatch CLI
//!
//! Command-line interface for the Coldwatch compliance engine.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use coldwatch::api::HttpServer;
use coldwatch::compliance::{resolve_period, ComplianceEngine};
use coldwatch::config::Config;
use coldwatch::db::{ComplianceStore, Database, MemoryStore};
use coldwatch::models::TemperatureUnit;

/// Coldwatch - HACCP temperature compliance
#[derive(Parser)]
#[command(name = "coldwatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "COLDWATCH_CONFIG")]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Address to bind
        #[arg(long, env = "COLDWATCH_HOST")]
        host: Option<String>,

        /// HTTP API port
        #[arg(long, env = "COLDWATCH_HTTP_PORT")]
        http_port: Option<u16>,

        /// Keep data in memory instead of PostgreSQL
        #[arg(long)]
        memory: bool,
    },

    /// Run database migrations
    Migrate,

    /// Show the threshold policy, or the range for one equipment type
    Thresholds {
        /// Equipment type to resolve
        equipment_type: Option<String>,

        /// Unit to express the range in (F or C)
        #[arg(long, default_value = "F")]
        unit: String,
    },

    /// Resolve a period token ("24h", "7d", "30d" or hours) to a cutoff time
    Period {
        /// Period token
        token: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = Cli::parse();

    let _ = dotenvy::dotenv();

    // Load configuration
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config, cli.verbose);

    // Execute command
    let result = match cli.command {
        Commands::Serve {
            host,
            http_port,
            memory,
        } => run_serve(config, host, http_port, memory).await,
        Commands::Migrate => run_migrate(config).await,
        Commands::Thresholds {
            equipment_type,
            unit,
        } => run_thresholds(&config, equipment_type.as_deref(), &unit),
        Commands::Period { token } => {
            run_period(&token);
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(config: &Config, verbose: bool) {
    let level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if config.logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn install_metrics_exporter(config: &Config) -> anyhow::Result<()> {
    if !config.metrics.enabled {
        return Ok(());
    }

    let addr: SocketAddr = config
        .metrics
        .listen
        .parse()
        .with_context(|| format!("invalid metrics listen address '{}'", config.metrics.listen))?;

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("failed to install Prometheus exporter")?;

    info!("Prometheus metrics on http://{}/metrics", addr);
    Ok(())
}

async fn run_serve(
    config: Config,
    host: Option<String>,
    http_port: Option<u16>,
    memory: bool,
) -> anyhow::Result<()> {
    install_metrics_exporter(&config)?;

    let store: Arc<dyn ComplianceStore> = if memory {
        warn!("Using in-memory store, data is lost on shutdown");
        Arc::new(MemoryStore::new())
    } else {
        let db = Database::new(&config).await?;
        if config.database.migrate_on_start {
            db.migrate().await?;
        }
        db.health_check().await?;
        Arc::new(db.store())
    };

    let engine = ComplianceEngine::new(store, &config)?;
    info!(
        equipment_types = engine.thresholds().entries().len(),
        channels = config.alerting.channels.len(),
        "Compliance engine ready"
    );

    let addr = format!(
        "{}:{}",
        host.unwrap_or(config.server.host),
        http_port.unwrap_or(config.server.http_port)
    );

    HttpServer::new(Arc::new(engine)).serve(&addr).await?;
    Ok(())
}

async fn run_migrate(config: Config) -> anyhow::Result<()> {
    let db = Database::new(&config).await?;
    db.migrate().await?;
    println!("Migrations applied");
    Ok(())
}

fn run_thresholds(config: &Config, equipment_type: Option<&str>, unit: &str) -> anyhow::Result<()> {
    let unit: TemperatureUnit = unit.parse().map_err(anyhow::Error::msg)?;
    let engine = ComplianceEngine::new(Arc::new(MemoryStore::new()), config)?;

    if let Some(equipment_type) = equipment_type {
        let threshold = engine.resolve_threshold(Some(equipment_type), None, None, unit)?;
        let source = if engine.thresholds().is_known(equipment_type) {
            "policy"
        } else {
            "default"
        };
        println!("{equipment_type}: {threshold} °{} ({source})", unit.as_str());
        return Ok(());
    }

    for (equipment_type, _) in engine.thresholds().entries() {
        let threshold = engine.resolve_threshold(Some(equipment_type), None, None, unit)?;
        println!("{equipment_type:<16} {threshold} °{}", unit.as_str());
    }
    let default = engine.resolve_threshold(None, None, None, unit)?;
    println!("{:<16} {default} °{}", "(default)", unit.as_str());
    Ok(())
}

fn run_period(token: &str) {
    match resolve_period(Some(token)) {
        Some(cutoff) => println!("{}", cutoff.to_rfc3339()),
        None => println!("no filter"),
    }
}
