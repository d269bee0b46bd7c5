use clap::{Parser, Subcommand};
use rust_decimal_macros::dec;
use spotarb_book::BookRegistry;
use spotarb_channels::ChannelHub;
use spotarb_core::{Clock, FeeSchedule, Symbol, SystemClock, VenueId};
use spotarb_detection::{DetectionService, SymbolUniverse};
use spotarb_dispatch::TradeDispatcher;
use spotarb_execution::Executor;
use spotarb_inventory::InventoryController;
use spotarb_safety::SafetyMonitor;
use spotarb_settings::{EngineConfig, EngineConfigLoader, SettingsStore};
use spotarb_strategy::{NoopRollingStatsSource, SmartStrategy};
use spotarb_venue::{SandboxVenueAdapter, VenueAdapter};
use std::collections::HashMap;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const EXIT_CLEAN: u8 = 0;
const EXIT_CONFIG_INVALID: u8 = 2;
const EXIT_STATE_CORRUPT: u8 = 3;

#[derive(Parser)]
#[command(name = "spotarb")]
#[command(about = "Cross-venue spot arbitrage engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine: adapters, detection, dispatch, execution, inventory and safety.
    Serve {
        /// Engine config TOML path.
        #[arg(long, default_value = "config/engine.toml")]
        config: String,
        /// Force every venue adapter into sandbox mode regardless of the settings file.
        #[arg(long)]
        sandbox: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve { config, sandbox } => serve(&config, sandbox).await,
    }
}

/// Splits a `"BASE/QUOTE"` config entry into its parts and the `Symbol` the rest
/// of the engine identifies the pair by. Entries missing the separator are
/// skipped with a warning rather than treated as a fatal config error.
fn parse_pair(entry: &str) -> Option<(Symbol, String, String)> {
    let (base, quote) = entry.split_once('/')?;
    Some((Symbol::new(format!("{base}{quote}")), base.to_string(), quote.to_string()))
}

async fn serve(config_path: &str, force_sandbox: bool) -> ExitCode {
    let config = match EngineConfigLoader::load(config_path) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("invalid engine config at {config_path}: {error}");
            return ExitCode::from(EXIT_CONFIG_INVALID);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_filter.clone())),
        )
        .init();

    let store = match SettingsStore::load_or_default(&config.settings_path) {
        Ok(store) => Arc::new(store),
        Err(error) => {
            tracing::error!(%error, "failed to load persistent settings");
            return ExitCode::from(EXIT_STATE_CORRUPT);
        }
    };

    if force_sandbox {
        if let Err(error) = store.mutate(|settings| settings.sandbox_mode = true) {
            tracing::error!(%error, "failed to force sandbox mode");
            return ExitCode::from(EXIT_STATE_CORRUPT);
        }
    }

    let clock = Arc::new(SystemClock);
    let books = Arc::new(BookRegistry::new(chrono::Duration::milliseconds(
        config.book_staleness_ms as i64,
    )));

    let mut universe: SymbolUniverse = HashMap::new();
    let mut assets = Vec::new();
    for entry in &config.symbols {
        match parse_pair(entry) {
            Some((symbol, base, quote)) => {
                if !assets.contains(&base) {
                    assets.push(base.clone());
                }
                universe.insert(symbol, (base, quote));
            }
            None => tracing::warn!(entry, "skipping malformed symbol entry, expected BASE/QUOTE"),
        }
    }

    let mut venues: HashMap<VenueId, Arc<dyn VenueAdapter>> = HashMap::new();
    for venue_id in &config.venue_ids {
        let adapter = SandboxVenueAdapter::new(
            venue_id.as_str(),
            FeeSchedule::new(dec!(0.001), dec!(0.001), clock.now()),
        );
        venues.insert(VenueId::new(venue_id.clone()), Arc::new(adapter));
    }

    let initial_symbol = universe
        .keys()
        .next()
        .cloned()
        .unwrap_or_else(|| Symbol::new("UNKNOWN"));
    let channels = Arc::new(ChannelHub::new(spotarb_channels::StrategyUpdate {
        symbol: initial_symbol,
        threshold_pct: store.snapshot().global_min_profit_pct,
        reason: "startup".to_string(),
    }));

    let detection = Arc::new(DetectionService::new(
        books.clone(),
        venues.clone(),
        universe,
        store.subscribe(),
        channels.clone(),
    ));

    let executor = Arc::new(Executor::new(venues.clone(), clock.clone()));
    let dispatcher = Arc::new(TradeDispatcher::new(
        store.subscribe(),
        books.clone(),
        executor,
        channels.clone(),
        clock.clone(),
    ));

    let inventory = Arc::new(
        InventoryController::new(
            venues.clone(),
            assets,
            store.subscribe(),
            channels.clone(),
            dispatcher.clone(),
            clock.clone(),
        )
        .with_poll_interval(std::time::Duration::from_secs(config.inventory_poll_interval_secs)),
    );

    let safety = Arc::new(
        SafetyMonitor::new(store.clone(), channels.clone(), clock.clone())
            .with_poll_interval(std::time::Duration::from_secs(config.safety_check_interval_secs)),
    );

    let strategy = Arc::new(SmartStrategy::new(
        store.clone(),
        channels.clone(),
        Arc::new(NoopRollingStatsSource),
        clock.clone(),
        universe_symbols(&config.symbols),
    ));

    let shutdown = CancellationToken::new();

    let mut tasks = Vec::new();
    tasks.push(tokio::spawn(detection.run(books.subscribe(), shutdown.clone())));
    tasks.push(tokio::spawn(dispatcher.run(shutdown.clone())));
    tasks.push(tokio::spawn(inventory.run(shutdown.clone())));
    tasks.push(tokio::spawn(
        safety.run(channels.take_execution_results_receiver(), shutdown.clone()),
    ));
    tasks.push(tokio::spawn(strategy.run(shutdown.clone())));
    let watcher_store = store.clone();
    let watcher_shutdown = shutdown.clone();
    tasks.push(tokio::spawn(async move {
        if let Err(error) = spotarb_settings::watch_settings_file(watcher_store, watcher_shutdown).await {
            tracing::error!(%error, "settings file watcher exited");
        }
    }));

    tracing::info!("engine started, press ctrl-c to shut down");
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::error!("failed to install ctrl-c handler");
    }
    tracing::info!("shutdown requested");
    shutdown.cancel();
    for task in tasks {
        if let Err(error) = task.await {
            tracing::error!(%error, "engine task panicked during shutdown");
        }
    }

    ExitCode::from(EXIT_CLEAN)
}

fn universe_symbols(entries: &[String]) -> Vec<Symbol> {
    entries.iter().filter_map(|entry| parse_pair(entry).map(|(symbol, _, _)| symbol)).collect()
}
