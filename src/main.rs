// Curve Replay - Valuation Report
// Replays every curve in the event log and prints the ATH leaderboard.
// Ingestion (websocket discovery, signature collection) runs elsewhere;
// this binary only consumes the event log those collaborators fill.

use anyhow::Result;
use curve_replay::config::Config;
use curve_replay::oracle::SolUsdOracle;
use curve_replay::replay::ReplayParams;
use curve_replay::runner;
use curve_replay::summary::format_duration;
use curve_replay::EventStore;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    info!("🚀 Curve Replay starting...");

    let config = Config::load_or_default()?;
    info!("⚙️  Configuration loaded");

    let store = Arc::new(Mutex::new(EventStore::new(
        &config.database.path,
        config.database.wal_mode,
    )?));
    info!("✅ Event store opened: {}", config.database.path);

    let mut oracle = SolUsdOracle::new(&config.oracle.endpoint, config.oracle.fallback_usd)?;
    let sol_usd = oracle.refresh().await;
    info!("💱 SOL/USD rate: {:.2}", sol_usd);

    let params = ReplayParams {
        token_decimals: config.replay.token_decimals,
        sol_usd,
    };

    let outcome =
        runner::replay_all(store, params, config.replay.max_concurrent_curves).await?;

    if outcome.failed_curves > 0 {
        warn!("⚠️  {} curve(s) failed to replay", outcome.failed_curves);
    }

    info!("📊 ATH leaderboard ({} curves):", outcome.summaries.len());
    for (i, s) in outcome.summaries.iter().enumerate() {
        info!(
            "{:>3}. {} | ATH ${:.2} ({:.2} SOL) | now ${:.2} | from ATH {:+.2}% | from launch {:+.2}% | time to ATH {}",
            i + 1,
            s.curve_address,
            s.all_time_high.market_cap_usd,
            s.all_time_high.market_cap_sol,
            s.current.market_cap_usd,
            s.percent_from_ath,
            s.percent_from_launch,
            format_duration(s.time_to_ath_secs),
        );
    }

    Ok(())
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();
}
