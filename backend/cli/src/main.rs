mod api;
mod store_cmd;
mod terminal_output;
mod wiring;

use std::future::{Future, IntoFuture};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use trackwatch_channels::{ChannelAdapter, DiscordAdapter, DiscordBot};
use trackwatch_config::TrackwatchConfig;
use trackwatch_core::{Component, TrackerBus};
use trackwatch_engine::Tracker;
use trackwatch_logging::{init_logger, presence};
use trackwatch_scheduler::{CheckScheduler, RunLog};

use api::AppState;

#[derive(Parser)]
#[command(name = "trackwatch")]
#[command(about = "trackwatch: reminds Discord members to keep posting audio")]
#[command(version)]
struct Cli {
    /// Path to the YAML config file
    #[arg(long, global = true, env = "TRACKWATCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to Discord and serve the health/API endpoints
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print every tracked member from the data file
    Status,
    /// Delete all tracking data
    Reset {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Print the effective configuration with secrets masked
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = wiring::resolve_config_path(cli.config);
    let (config, rejected_env) = trackwatch_config::load_unvalidated(&config_path).await?;

    init_logger(config.logging.dir.as_ref(), &config.logging.level);
    trackwatch_config::ensure_valid(&config, rejected_env)?;

    match cli.command {
        Commands::Serve { port } => {
            let mut config = config;
            if let Some(port) = port {
                config.http.port = port;
            }
            run_server(config).await?;
        }
        Commands::Status => store_cmd::status(&config)?,
        Commands::Reset { yes } => store_cmd::reset(&config, yes)?,
        Commands::Config => {
            print!("{}", serde_yaml::to_string(&config.redacted())?);
        }
    }

    Ok(())
}

async fn run_server(config: TrackwatchConfig) -> Result<()> {
    info!(
        bot_token = presence(config.discord.bot_token.as_deref()),
        target_days = config.tracking.target_days,
        check_interval_minutes = config.tracking.check_interval_minutes,
        data_file = %config.storage.data_file.display(),
        "Starting trackwatch"
    );
    let token = config
        .discord
        .bot_token
        .clone()
        .context("BOT_TOKEN is not set; cannot connect to Discord")?;

    let store = wiring::open_store(&config);
    info!(tracked = store.len(), "Loaded activity data");

    let platform = Arc::new(DiscordAdapter::new(&token));
    let tracker = Arc::new(Tracker::with_platform(
        store,
        wiring::build_policy(&config),
        wiring::build_classifier(&config),
        platform,
    ));

    let mut bus = TrackerBus::new();
    let scheduler_rx = bus
        .take_scheduler_rx()
        .context("scheduler receiver already taken")?;
    let run_log = Arc::new(RunLog::default());
    let scheduler = CheckScheduler::new(
        Arc::clone(&tracker),
        wiring::scheduler_timing(&config),
        Arc::clone(&run_log),
    );
    tokio::spawn(async move {
        if let Err(e) = scheduler.start(scheduler_rx).await {
            error!(error = %e, "Scheduler task failed");
        }
    });

    let bot = DiscordBot::new(token, Arc::clone(&tracker), wiring::command_settings(&config));
    let bot_task = tokio::spawn(async move {
        let result = bot.start().await;
        if let Err(e) = &result {
            error!(adapter = bot.name(), error = %e, "Discord adapter stopped");
        }
        result
    });

    let state = Arc::new(AppState {
        tracker,
        scheduler_tx: bus.scheduler_tx.clone(),
        run_log,
        config: wiring::ConfigSummary::from(&config),
        started_at: Utc::now(),
    });
    let app = api::build_router(state).layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.http.bind_address, config.http.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, "HTTP server listening");

    serve_until_stopped(axum::serve(listener, app).into_future(), bot_task).await
}

/// Run until either the HTTP server or the Discord adapter stops. Losing the
/// gateway is fatal so the process exits instead of reporting healthy.
async fn serve_until_stopped<S>(server: S, bot: JoinHandle<Result<()>>) -> Result<()>
where
    S: Future<Output = std::io::Result<()>>,
{
    tokio::select! {
        served = server => served.context("HTTP server failed"),
        joined = bot => match joined {
            Ok(Ok(())) => Err(anyhow!("Discord adapter exited")),
            Ok(Err(e)) => Err(e.context("Discord adapter failed")),
            Err(e) => Err(anyhow!(e).context("Discord adapter task failed")),
        },
    }
}
