use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stat_tracker::analyze::{Analyzer, AnalyzerSettings, PgMatchStore};
use stat_tracker::api::state::AppState;
use stat_tracker::cache::{CacheStore, RedisCache, TargetRepository, TrackerStatus};
use stat_tracker::config::AppConfig;
use stat_tracker::models::{DataKind, GameMode};
use stat_tracker::parse_duration;
use stat_tracker::schedule::{AdmissionController, Intervals, TaskQueue};
use stat_tracker::storage::{AuditLog, StorageConfig};

#[derive(Parser)]
#[command(name = "stat-tracker")]
#[command(about = "Gameplay stats tracker: update admission, aggregation and co-occurrence analysis")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: String,

    /// Data directory path (overrides the config file)
    #[arg(long)]
    data_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Bind address (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Port number (overrides the config file)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Request a refresh for one target
    Update {
        /// Player uno or group name
        uno: String,

        /// Game mode (all, mw_mp, mw_wz, cw_mp, vg_mp)
        game_mode: String,

        /// Data kind (matches, matches_history, stats, fullmatches_pars, all)
        data_kind: String,
    },

    /// Rebuild "most play with" rankings
    MostPlayWith {
        /// Run continuously at interval
        #[arg(long)]
        watch: bool,

        /// Run interval (e.g., "24h", "1w")
        #[arg(long, default_value = "24h")]
        interval: String,
    },

    /// Inspect or reset the task queue
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },

    /// Set the global fetch switch (active, inactive, break)
    TrackerStatus { status: String },
}

#[derive(Subcommand)]
enum QueueAction {
    /// List queued tasks, head first
    List,
    /// Drop every task that is not running
    Clear,
    /// Remove one task by name
    Delete { name: String },
    /// Claim the head task for a worker
    Start,
    /// Complete the running head task
    Finish {
        /// Mark the task as failed
        #[arg(long)]
        failed: bool,

        /// Number of records the refresh fetched
        #[arg(long, default_value_t = 0)]
        records: u64,
    },
}

/// Shared handles built from the configuration.
struct Components {
    config: AppConfig,
    repo: TargetRepository,
    audit: AuditLog,
    admission: AdmissionController,
}

impl Components {
    fn build(config: AppConfig) -> Result<Self> {
        let cache: Arc<dyn CacheStore> = Arc::new(RedisCache::new(&config.cache.redis_url)?);
        let repo = TargetRepository::new(cache.clone());
        let audit = AuditLog::from_config(&StorageConfig::new(config.data_dir.clone()));
        let queue = TaskQueue::new(cache).with_archive(audit.clone());
        let admission = AdmissionController::new(
            repo.clone(),
            queue,
            Intervals::from(&config.intervals),
            config.limits.logs_cache_limit,
        )
        .with_logs_cap(config.limits.logs_games_limit);
        Ok(Self {
            config,
            repo,
            audit,
            admission,
        })
    }

    fn analyzer(&self) -> Result<Analyzer> {
        let database = &self.config.database;
        let store = PgMatchStore::connect_lazy(
            &database.url,
            database.max_connections,
            database.mode_tables()?,
        )?;
        let settings = AnalyzerSettings::new(&self.config.analyzer, &self.config.limits);
        Ok(Analyzer::new(Arc::new(store), settings)
            .with_cache(self.repo.clone())
            .with_audit(self.audit.clone()))
    }
}

fn init_tracing(log_level: &str, json_logs: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs);

    tracing::info!("Starting stat-tracker v{}", env!("CARGO_PKG_VERSION"));

    let mut config = AppConfig::from_file(Path::new(&cli.config))?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = PathBuf::from(dir);
    }
    let components = Components::build(config)?;

    match cli.command {
        Commands::Serve { host, port } => {
            let server = &components.config.server;
            let addr = format!(
                "{}:{}",
                host.unwrap_or_else(|| server.host.clone()),
                port.unwrap_or(server.port)
            );
            let state = AppState::new(components.admission.clone(), components.analyzer()?);
            let app = stat_tracker::api::build_router(state);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!("API: http://{}", addr);
            axum::serve(listener, app).await?;
        }
        Commands::Update {
            uno,
            game_mode,
            data_kind,
        } => {
            let game_mode: GameMode = game_mode.parse().map_err(anyhow::Error::msg)?;
            let data_kind: DataKind = data_kind.parse().map_err(anyhow::Error::msg)?;
            let message = components
                .admission
                .request_update(&uno, game_mode, data_kind)
                .await?;
            println!("{}", message);
        }
        Commands::MostPlayWith { watch, interval } => {
            let analyzer = components.analyzer()?;
            if !watch {
                let summary = analyzer.run().await?;
                println!(
                    "{} targets, {} matches, {} repairs in {} ms",
                    summary.targets, summary.matches_resolved, summary.repairs, summary.duration_ms
                );
                return Ok(());
            }

            let period = parse_duration(&interval)
                .ok_or_else(|| anyhow::anyhow!("Invalid --interval: {}", interval))?;
            tracing::info!("Running most play with every {}...", interval);
            loop {
                if let Err(e) = analyzer.run().await {
                    tracing::error!("Most play with failed: {}", e);
                }
                tokio::time::sleep(period).await;
            }
        }
        Commands::Queue { action } => {
            let queue = components.admission.queue();
            match action {
                QueueAction::List => {
                    for task in queue.all().await? {
                        println!("{}\t{}\t{}", task.name, task.status, task.created_at);
                    }
                }
                QueueAction::Clear => {
                    let dropped = queue.clear(Utc::now()).await?;
                    println!("Dropped {} tasks", dropped.len());
                }
                QueueAction::Delete { name } => {
                    let task = queue.remove(&name, Utc::now()).await?;
                    println!("Deleted {}", task.name);
                }
                QueueAction::Start => {
                    let task = queue.mark_running(Utc::now()).await?;
                    println!("{}\t{}", task.name, task.status);
                }
                QueueAction::Finish { failed, records } => {
                    let task = components
                        .admission
                        .finish_task(!failed, records, Utc::now())
                        .await?;
                    println!("{}\t{}", task.name, task.status);
                }
            }
        }
        Commands::TrackerStatus { status } => {
            let status: TrackerStatus = status.parse().map_err(anyhow::Error::msg)?;
            components.repo.set_tracker_status(status).await?;
            println!("Tracker status: {}", status);
        }
    }

    Ok(())
}
