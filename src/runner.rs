//! Batch driver: replays every curve in the event log.
//!
//! Replay within one curve is an inherently sequential fold, but distinct
//! curves share no state, so the batch fans out one bounded task per curve.
//! A curve that fails (missing or invalid seed, corrupt rows) is reported
//! and dropped; it never takes the batch down with it.

use anyhow::Result;
use futures::stream::{self, StreamExt};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::db::EventStore;
use crate::replay::{self, ReplayParams};
use crate::summary;
use crate::types::CurveValuationSummary;

#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Summaries ordered by ATH market cap (USD), highest first.
    pub summaries: Vec<CurveValuationSummary>,
    pub failed_curves: u32,
}

pub async fn replay_all(
    store: Arc<Mutex<EventStore>>,
    params: ReplayParams,
    max_concurrent: usize,
) -> Result<BatchOutcome> {
    let curves = store.lock().unwrap().list_curves()?;
    debug!("replaying {} curves", curves.len());

    let results: Vec<Option<CurveValuationSummary>> = stream::iter(curves)
        .map(|curve| {
            let store = store.clone();
            async move { replay_curve(&store, &curve, params) }
        })
        .buffer_unordered(max_concurrent.max(1))
        .collect()
        .await;

    let mut outcome = BatchOutcome::default();
    for result in results {
        match result {
            Some(summary) => outcome.summaries.push(summary),
            None => outcome.failed_curves += 1,
        }
    }

    outcome
        .summaries
        .sort_by(|a, b| {
            b.all_time_high
                .market_cap_usd
                .total_cmp(&a.all_time_high.market_cap_usd)
        });

    Ok(outcome)
}

fn replay_curve(
    store: &Mutex<EventStore>,
    curve: &str,
    params: ReplayParams,
) -> Option<CurveValuationSummary> {
    // Hold the store lock only for the reads; the fold itself is pure CPU.
    let (seed, events) = {
        let store = store.lock().unwrap();
        let seed = match store.load_seed(curve) {
            Ok(Some(seed)) => seed,
            Ok(None) => {
                warn!("no seed snapshot for curve {}, skipping", curve);
                return None;
            }
            Err(e) => {
                warn!("failed to load seed for {}: {}", curve, e);
                return None;
            }
        };
        let events = match store.load_events(curve) {
            Ok(events) => events,
            Err(e) => {
                warn!("failed to load events for {}: {}", curve, e);
                return None;
            }
        };
        (seed, events)
    };

    let series = match replay::replay(curve, &seed, &events, params) {
        Ok(series) => series,
        Err(e) => {
            warn!("replay aborted for {}: {}", curve, e);
            return None;
        }
    };

    if series.skipped > 0 || series.ignored > 0 {
        debug!(
            "curve {}: {} points, {} skipped, {} ignored",
            curve,
            series.points.len(),
            series.skipped,
            series.ignored
        );
    }

    summary::summarize(&series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CurveSnapshot, TradeEvent};
    use tempfile::tempdir;

    fn snapshot() -> CurveSnapshot {
        CurveSnapshot {
            virtual_token_reserves: 1_000_000_000_000,
            virtual_sol_reserves: 30_000_000_000,
            real_token_reserves: 0,
            real_sol_reserves: 0,
            token_total_supply: 1_000_000_000_000_000,
            complete: false,
            creator: None,
        }
    }

    fn event(curve: &str, sig: &str, block_time: i64, diff: i128) -> TradeEvent {
        TradeEvent {
            signature: sig.to_string(),
            curve_address: curve.to_string(),
            slot: 1,
            block_time: Some(block_time),
            pre_token_amount: 0,
            post_token_amount: 0,
            token_diff: diff,
        }
    }

    #[tokio::test]
    async fn test_batch_replays_multiple_curves() {
        let dir = tempdir().unwrap();
        let store = Arc::new(Mutex::new(
            EventStore::new(dir.path().join("events.db"), false).unwrap(),
        ));

        {
            let mut s = store.lock().unwrap();
            for curve in ["curveA", "curveB"] {
                s.upsert_seed(curve, &snapshot()).unwrap();
                s.upsert_event(&event(curve, &format!("{curve}-buy"), 1_000, 10_000_000_000))
                    .unwrap();
            }
        }

        let params = ReplayParams {
            token_decimals: 9,
            sol_usd: 1.0,
        };
        let outcome = replay_all(store, params, 4).await.unwrap();
        assert_eq!(outcome.summaries.len(), 2);
        assert_eq!(outcome.failed_curves, 0);
    }

    #[tokio::test]
    async fn test_bad_curve_does_not_poison_batch() {
        let dir = tempdir().unwrap();
        let store = Arc::new(Mutex::new(
            EventStore::new(dir.path().join("events.db"), false).unwrap(),
        ));

        {
            let mut s = store.lock().unwrap();
            // Healthy curve.
            s.upsert_seed("good", &snapshot()).unwrap();
            s.upsert_event(&event("good", "g1", 1_000, 10_000_000_000))
                .unwrap();
            // Curve with a reserve-violating seed.
            let mut bad = snapshot();
            bad.virtual_sol_reserves = 0;
            s.upsert_seed("bad", &bad).unwrap();
            s.upsert_event(&event("bad", "b1", 1_000, 10_000_000_000))
                .unwrap();
            // Curve with events but no seed at all.
            s.upsert_event(&event("seedless", "s1", 1_000, 10_000_000_000))
                .unwrap();
        }

        let params = ReplayParams {
            token_decimals: 9,
            sol_usd: 1.0,
        };
        let outcome = replay_all(store, params, 2).await.unwrap();
        assert_eq!(outcome.summaries.len(), 1);
        assert_eq!(outcome.summaries[0].curve_address, "good");
        assert_eq!(outcome.failed_curves, 2);
    }

    #[tokio::test]
    async fn test_summaries_sorted_by_ath() {
        let dir = tempdir().unwrap();
        let store = Arc::new(Mutex::new(
            EventStore::new(dir.path().join("events.db"), false).unwrap(),
        ));

        {
            let mut s = store.lock().unwrap();
            s.upsert_seed("small", &snapshot()).unwrap();
            s.upsert_event(&event("small", "s1", 1_000, 1_000_000_000))
                .unwrap();
            s.upsert_seed("large", &snapshot()).unwrap();
            s.upsert_event(&event("large", "l1", 1_000, 100_000_000_000))
                .unwrap();
        }

        let params = ReplayParams {
            token_decimals: 9,
            sol_usd: 1.0,
        };
        let outcome = replay_all(store, params, 2).await.unwrap();
        assert_eq!(outcome.summaries[0].curve_address, "large");
    }
}
