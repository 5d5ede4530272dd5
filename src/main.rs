use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use tasalert::config::Config;
use tasalert::feed::{Feed, FeedEntry};
use tasalert::manager::{Callbacks, FeedManager, StatusUpdate};
use tasalert::tas::{TasIncidentEntry, TasIncidents};
use tasalert::util::strip_control_chars;

/// Get the config directory path (~/.config/tasalert/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("tasalert"))
}

#[derive(Parser, Debug)]
#[command(
    name = "tasalert",
    about = "Watch TasALERT incidents near a location"
)]
struct Args {
    /// Config file (default: ~/.config/tasalert/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Home latitude in decimal degrees
    #[arg(long, allow_hyphen_values = true)]
    latitude: Option<f64>,

    /// Home longitude in decimal degrees
    #[arg(long, allow_hyphen_values = true)]
    longitude: Option<f64>,

    /// Only report incidents within this many kilometres
    #[arg(long, value_name = "KM")]
    radius: Option<f64>,

    /// Allowed feed type (repeatable), e.g. warning or incident
    #[arg(long = "feed-type", value_name = "TYPE")]
    feed_types: Vec<String>,

    /// Allowed alert level (repeatable), e.g. emergency_warning
    #[arg(long = "alert-level", value_name = "LEVEL")]
    alert_levels: Vec<String>,

    /// Poll once and exit
    #[arg(long)]
    once: bool,
}

impl Args {
    fn apply_to(&self, config: &mut Config) {
        if let Some(latitude) = self.latitude {
            config.latitude = latitude;
        }
        if let Some(longitude) = self.longitude {
            config.longitude = longitude;
        }
        if self.radius.is_some() {
            config.radius_km = self.radius;
        }
        if !self.feed_types.is_empty() {
            config.feed_types = Some(self.feed_types.clone());
        }
        if !self.alert_levels.is_empty() {
            config.alert_levels = Some(self.alert_levels.clone());
        }
    }
}

/// Config file with command-line overrides applied, validated as a whole.
fn settings(args: &Args, config_path: &Path) -> Result<Config> {
    let mut config = Config::load(config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    args.apply_to(&mut config);
    config.validate().context("Invalid settings")?;
    Ok(config)
}

/// Lifecycle events forwarded from the manager's callbacks to the main loop.
#[derive(Debug)]
enum Event {
    Generated(String),
    Updated(String),
    Removed(String),
}

fn callbacks(tx: mpsc::UnboundedSender<Event>) -> Callbacks {
    let generate_tx = tx.clone();
    let update_tx = tx.clone();
    let remove_tx = tx;
    Callbacks::new(
        move |id| {
            let sent = generate_tx.send(Event::Generated(id));
            async move { sent.map_err(|_| anyhow::anyhow!("event receiver dropped")) }
        },
        move |id| {
            let sent = update_tx.send(Event::Updated(id));
            async move { sent.map_err(|_| anyhow::anyhow!("event receiver dropped")) }
        },
        move |id| {
            let sent = remove_tx.send(Event::Removed(id));
            async move { sent.map_err(|_| anyhow::anyhow!("event receiver dropped")) }
        },
    )
    .with_status(|update: StatusUpdate| async move {
        tracing::info!(
            status = %update.status,
            total = update.total,
            created = update.created,
            updated = update.updated,
            removed = update.removed,
            last_timestamp = ?update.last_timestamp,
            "Poll finished"
        );
    })
}

fn describe(entry: &TasIncidentEntry) -> String {
    let title = entry.title().unwrap_or("(untitled)");
    let mut line = strip_control_chars(title).into_owned();
    if let Some(level) = entry.alert_level() {
        line.push_str(&format!(" [{}]", strip_control_chars(level)));
    }
    if let Some(distance) = entry.distance_to_home() {
        line.push_str(&format!(" {distance:.1} km"));
    }
    line
}

fn report(manager: &FeedManager<TasIncidents>, events: &mut mpsc::UnboundedReceiver<Event>) {
    while let Ok(event) = events.try_recv() {
        match event {
            Event::Generated(id) => match manager.entry(&id) {
                Some(entry) => tracing::info!(id = %id, "New: {}", describe(entry)),
                None => tracing::info!(id = %id, "New"),
            },
            Event::Updated(id) => {
                if let Some(entry) = manager.entry(&id) {
                    tracing::debug!(id = %id, status = ?entry.status(), "Still active: {}", describe(entry));
                }
            }
            Event::Removed(id) => tracing::info!(id = %id, "Removed"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => get_config_dir()?.join("config.toml"),
    };
    let config = settings(&args, &config_path)?;

    let client = reqwest::Client::builder()
        .user_agent(concat!("tasalert/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    let filters = config.filters();
    let mut source = TasIncidents::new(filters.feed_types, filters.alert_levels);
    if let Some(url) = &config.feed_url {
        source = source.with_url(url.as_str());
    }
    let feed = Feed::new(client, config.home(), source)
        .with_radius(filters.radius)
        .with_timeout(config.request_timeout());

    let (tx, mut events) = mpsc::unbounded_channel();
    let mut manager = FeedManager::new(feed, callbacks(tx));
    tracing::info!(manager = %manager, "Starting");

    if args.once {
        manager.update().await;
        report(&manager, &mut events);
        return Ok(());
    }

    let mut ticker = tokio::time::interval(config.refresh_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                manager.update().await;
                report(&manager, &mut events);
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down");
                break;
            }
        }
    }

    Ok(())
}
