use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use sunsync_core::{Config, ConfigError, LocationConfig};
use sunsync_weather::{
    CompanionListener, CompanionMirror, HttpCompanionChannel, HttpWeatherFetcher, InboundMessage,
    LogNotifier, NotificationThrottle, OwmJsonParser, SharedPreferences, SqliteWeatherStore,
    SyncOrchestrator, SyncOutcome,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval};

const USAGE: &str = "Usage: sunsync [--once] [--config <path>]";

#[derive(Debug, Default)]
struct Args {
    once: bool,
    config: Option<PathBuf>,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Option<Self>> {
        let mut parsed = Self::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--once" => parsed.once = true,
                "--config" => {
                    let path = args.next().context("--config needs a path")?;
                    parsed.config = Some(PathBuf::from(path));
                }
                "-h" | "--help" => return Ok(None),
                other => anyhow::bail!("Unknown argument: {}\n{}", other, USAGE),
            }
        }
        Ok(Some(parsed))
    }
}

fn build_orchestrator(config: &Config) -> Result<SyncOrchestrator> {
    std::fs::create_dir_all(&config.config_dir).context("Failed to create config directory")?;
    let store = Arc::new(
        SqliteWeatherStore::new(config.store_path()).context("Failed to open weather store")?,
    );
    tracing::info!("Weather store at {}", config.store_path().display());

    let fetcher = HttpWeatherFetcher::new(&config.weather).context("Failed to build fetcher")?;
    let channel =
        HttpCompanionChannel::new(&config.companion).context("Failed to build companion channel")?;
    let mirror = CompanionMirror::new(
        Arc::new(channel),
        Duration::from_secs(config.companion.timeout_secs),
    );

    Ok(SyncOrchestrator::new(
        Arc::new(fetcher),
        Arc::new(OwmJsonParser::new()),
        store.clone(),
        mirror,
        NotificationThrottle::new(store),
        Arc::new(LogNotifier::new(config.weather.units)),
        Arc::new(SharedPreferences::new(config.notifications.enabled)),
    ))
}

/// Forward each non-empty stdin line to the listener as a message path.
fn spawn_stdin_bridge(tx: mpsc::Sender<InboundMessage>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let path = line.trim();
                    if path.is_empty() {
                        continue;
                    }
                    if tx.send(InboundMessage::new(path)).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("Stopped reading companion messages from stdin: {}", e);
                    break;
                }
            }
        }
    });
}

fn spawn_sync(orchestrator: &Arc<SyncOrchestrator>, location: &LocationConfig) {
    let orchestrator = Arc::clone(orchestrator);
    let location = location.clone();
    tokio::spawn(async move {
        orchestrator.sync_weather(&location).await;
    });
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn run_service(config: &Config, orchestrator: Arc<SyncOrchestrator>) -> Result<()> {
    let location = config.weather.location.clone();

    let (tx, rx) = mpsc::channel(16);
    let listener = CompanionListener::new(Arc::clone(&orchestrator), location.clone());
    tokio::spawn(listener.run(rx));
    spawn_stdin_bridge(tx);

    spawn_sync(&orchestrator, &location);

    let mut ticker = match config.weather.refresh_minutes {
        0 => {
            tracing::info!("Periodic refresh disabled");
            None
        }
        minutes => {
            let period = Duration::from_secs(u64::from(minutes) * 60);
            tracing::info!("Refreshing every {} minutes", minutes);
            Some(tokio::time::interval_at(Instant::now() + period, period))
        }
    };

    loop {
        tokio::select! {
            _ = next_tick(&mut ticker) => spawn_sync(&orchestrator, &location),
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                tracing::info!("Shutting down");
                return Ok(());
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let Some(args) = Args::parse(std::env::args().skip(1))? else {
        println!("{}", USAGE);
        return Ok(());
    };

    sunsync_core::init()?;

    let (config, _) = Config::load_validated(args.config.as_deref()).map_err(|err| {
        if let Some(config_err) = err.downcast_ref::<ConfigError>() {
            tracing::error!("{}", config_err.user_message());
        }
        err
    })?;
    let orchestrator = Arc::new(build_orchestrator(&config)?);
    tracing::info!("sunsync started for {}", config.weather.location.describe());

    if args.once {
        return match orchestrator.sync_weather(&config.weather.location).await {
            SyncOutcome::Failed(failure) => Err(anyhow::anyhow!("Weather sync {}", failure)),
            outcome => {
                tracing::info!("Single sync finished: {:?}", outcome);
                Ok(())
            }
        };
    }

    run_service(&config, orchestrator).await
}
