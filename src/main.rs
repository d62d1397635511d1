mod account;
mod channel;
mod config;
mod notifications;
mod session;
mod storage;
mod strategies;
mod types;

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use account::{ChainedTokens, StaticToken, StoredToken, SubscriptionClient, SubscriptionStatus, TokenStore};
use channel::{optimizer_endpoint, ChannelEvent, Disconnected, OptimizerChannel, Transport};
use config::AppConfig;
use notifications::NotificationManager;
use session::{SessionError, SessionEvent, SessionManager};
use storage::{KeyValueStore, SessionStore, SledStore};
use strategies::StrategyRegistry;
use types::{print_results, SweepSettings, TimeFrame};

#[derive(Parser)]
#[command(name = "optimizer-client")]
#[command(version = "0.1.0")]
#[command(about = "Client for the strategy parameter optimizer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one parameter sweep with the saved settings
    Sweep {
        #[command(flatten)]
        overrides: SettingsArgs,
    },
    /// Sweep every strategy back to back (paid plans)
    Chain,
    /// Show stored results, best return first
    Results {
        /// Number of rows to print
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Delete stored results
    Clear,
    /// Show or change the saved sweep settings
    Settings {
        #[command(flatten)]
        overrides: SettingsArgs,
    },
    /// List strategies and their presets
    Strategies,
}

#[derive(Args, Debug, Default)]
struct SettingsArgs {
    /// Strategy name, e.g. "SMA Crossover"
    #[arg(short, long)]
    strategy: Option<String>,
    /// Use the ranges and trial count of a named preset
    #[arg(short, long)]
    preset: Option<String>,
    /// Market symbol, e.g. BTC/USDT
    #[arg(long)]
    symbol: Option<String>,
    /// Candle timeframe (1m, 5m, 15m, 1h, 4h, 1d)
    #[arg(short = 'f', long)]
    timeframe: Option<String>,
    /// Lookback window in days
    #[arg(short, long)]
    days: Option<u32>,
    #[arg(short, long)]
    leverage: Option<f64>,
    /// Number of trials
    #[arg(short = 'n', long)]
    trials: Option<u32>,
}

impl SettingsArgs {
    fn is_empty(&self) -> bool {
        self.strategy.is_none()
            && self.preset.is_none()
            && self.symbol.is_none()
            && self.timeframe.is_none()
            && self.days.is_none()
            && self.leverage.is_none()
            && self.trials.is_none()
    }

    fn apply(&self, registry: &StrategyRegistry, mut settings: SweepSettings) -> Result<SweepSettings> {
        if let Some(name) = &self.strategy {
            let def = registry
                .get(name)
                .ok_or_else(|| anyhow!("Unknown strategy: {} (known: {})", name, registry.names().join(", ")))?;
            if def.name != settings.strategy {
                settings.strategy = def.name.clone();
                settings.param_ranges = def.initial_ranges();
            }
        }
        if let Some(preset_name) = &self.preset {
            let def = registry
                .get(&settings.strategy)
                .ok_or_else(|| anyhow!("Unknown strategy: {}", settings.strategy))?;
            let preset = def
                .presets
                .iter()
                .find(|p| p.name.eq_ignore_ascii_case(preset_name))
                .ok_or_else(|| anyhow!("{} has no preset named {}", def.name, preset_name))?;
            settings.param_ranges = preset.ranges.clone();
            settings.trial_count = preset.trials;
        }
        if let Some(symbol) = &self.symbol {
            settings.symbol = symbol.clone();
        }
        if let Some(timeframe) = &self.timeframe {
            settings.timeframe = TimeFrame::from_str(timeframe)?;
        }
        if let Some(days) = self.days {
            settings.lookback_days = days;
        }
        if let Some(leverage) = self.leverage {
            settings.leverage = leverage;
        }
        if let Some(trials) = self.trials {
            settings.trial_count = trials;
        }
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = AppConfig::load(&cli.config)?;
    let kv: Arc<dyn KeyValueStore> = Arc::new(SledStore::open(&config.store_path)?);
    let store = SessionStore::new(Arc::clone(&kv));
    let registry = Arc::new(StrategyRegistry::builtin());
    let token_sources: Vec<Arc<dyn TokenStore>> = vec![
        Arc::new(StoredToken::new(Arc::clone(&kv))),
        Arc::new(StaticToken::new(config.token.clone())),
    ];
    let tokens: Arc<dyn TokenStore> = Arc::new(ChainedTokens(token_sources));

    match cli.command {
        Commands::Sweep { overrides } => {
            let (channel, mut events) = connect(&config).await?;
            let mut session = open_session(channel.clone(), &tokens, &store, &registry, &config);

            let settings = overrides.apply(&registry, session.settings().clone())?;
            session.update_settings(settings)?;
            let mut updates = session.subscribe();
            session.run_configured_sweep().await?;
            drive_session(&mut session, &mut events, &mut updates).await;

            report(&session);
            channel.close().await;
        }
        Commands::Chain => {
            let subscription = fetch_subscription(&config, tokens.as_ref()).await;
            let (channel, mut events) = connect(&config).await?;
            let mut session = open_session(channel.clone(), &tokens, &store, &registry, &config);

            let mut updates = session.subscribe();
            match session.run_chain(&subscription).await {
                Ok(()) => {
                    drive_session(&mut session, &mut events, &mut updates).await;
                    report(&session);
                }
                // The upgrade notice has already been shown.
                Err(SessionError::EntitlementDenied { .. }) => {}
                Err(e) => {
                    channel.close().await;
                    return Err(e.into());
                }
            }
            channel.close().await;
        }
        Commands::Results { limit } => {
            print_results(&store.load_results(), limit);
        }
        Commands::Clear => {
            let mut session = open_session(Arc::new(Disconnected), &tokens, &store, &registry, &config);
            session.clear_results().await;
        }
        Commands::Settings { overrides } => {
            let mut session = open_session(Arc::new(Disconnected), &tokens, &store, &registry, &config);
            if !overrides.is_empty() {
                let settings = overrides.apply(&registry, session.settings().clone())?;
                session.update_settings(settings)?;
            }
            show_settings(session.settings());
        }
        Commands::Strategies => {
            show_strategies(&registry);
        }
    }

    Ok(())
}

async fn connect(config: &AppConfig) -> Result<(Arc<OptimizerChannel>, mpsc::Receiver<ChannelEvent>)> {
    let endpoint = optimizer_endpoint(&config.origin, &config.optimizer_path)?;
    let (channel, events) = OptimizerChannel::connect(&endpoint).await?;
    Ok((Arc::new(channel), events))
}

fn open_session(
    transport: Arc<dyn Transport>,
    tokens: &Arc<dyn TokenStore>,
    store: &SessionStore,
    registry: &Arc<StrategyRegistry>,
    config: &AppConfig,
) -> SessionManager {
    SessionManager::new(
        transport,
        Arc::clone(tokens),
        store.clone(),
        Arc::clone(registry),
        Arc::new(NotificationManager::new()),
        config.sweep_timeout(),
    )
}

/// Entitlement lookup. An unreachable account service counts as the free plan.
async fn fetch_subscription(config: &AppConfig, tokens: &dyn TokenStore) -> SubscriptionStatus {
    let client = SubscriptionClient::new(config.api_base_url.clone());
    let token = tokens.get_token();
    match client.fetch_status(token.as_deref()).await {
        Ok(status) => {
            info!("Subscription: {} ({})", status.plan, status.status);
            status
        }
        Err(e) => {
            warn!("Could not fetch subscription status: {}", e);
            SubscriptionStatus::free()
        }
    }
}

/// Feed channel events into the session until the sweep (or chain) ends.
async fn drive_session(
    session: &mut SessionManager,
    events: &mut mpsc::Receiver<ChannelEvent>,
    updates: &mut broadcast::Receiver<SessionEvent>,
) {
    let mut timeout_check = tokio::time::interval(Duration::from_secs(1));

    while session.is_optimizing() {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(ChannelEvent::Frame(frame)) => session.handle_frame(frame).await,
                    Some(ChannelEvent::Error(e)) => error!("Optimizer channel error: {}", e),
                    Some(ChannelEvent::Closed) | None => session.handle_channel_closed().await,
                }
            }
            update = updates.recv() => {
                match update {
                    Ok(SessionEvent::Progress(p)) => match session.chain_position() {
                        Some((done, total)) => {
                            info!("[{}/{}] {} trials ({:.0}%)", done + 1, total, p, p.percent())
                        }
                        None => info!("{} trials ({:.0}%)", p, p.percent()),
                    },
                    Ok(SessionEvent::StateChanged(status)) => debug!("Session {}", status),
                    Ok(SessionEvent::ResultsUpdated(count)) => debug!("{} results stored", count),
                    Ok(SessionEvent::SettingsUpdated) => debug!("Sweep settings saved"),
                    Err(RecvError::Lagged(skipped)) => debug!("Skipped {} session updates", skipped),
                    Err(RecvError::Closed) => break,
                }
            }
            _ = timeout_check.tick() => {
                session.check_timeout(Instant::now()).await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, the optimizer may keep running server-side");
                break;
            }
        }
    }
}

fn report(session: &SessionManager) {
    if let Some(e) = session.last_error() {
        let detail = session.state().error_message().unwrap_or_default();
        match e {
            SessionError::Backend(_) => error!("Optimizer reported an error: {}", detail),
            _ => error!("Optimization ended early: {}", detail),
        }
    } else if session.is_optimizing() {
        let channel = if session.channel_connected() { "open" } else { "closed" };
        warn!(
            "Stopped while {} at {} trials (optimizer channel {})",
            session.state().status(),
            session.progress().unwrap_or_default(),
            channel
        );
    } else {
        info!("Optimization finished");
    }
    print_results(session.results(), 20);
}

fn show_settings(settings: &SweepSettings) {
    println!("\n=== Sweep Settings ===");
    println!("Strategy:  {}", settings.strategy);
    println!("Market:    {} {}", settings.symbol, settings.timeframe);
    println!("Lookback:  {} days", settings.lookback_days);
    println!("Leverage:  {}x", settings.leverage);
    println!("Trials:    {}", settings.trial_count);
    for (param, range) in &settings.param_ranges {
        println!("  {:<14} {} ({} values)", param, range, range.grid_points());
    }
}

fn show_strategies(registry: &StrategyRegistry) {
    println!("\n=== Strategies ===");
    for def in registry.iter() {
        println!("{} ({})", def.name, def.params.join(", "));
        for preset in &def.presets {
            println!("  {:<10} {} trials", preset.name, preset.trials);
        }
    }
}
