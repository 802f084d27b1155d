//! Deterministic replay of a curve's trade history.
//!
//! Seeds running virtual reserves from one decoded snapshot, then folds an
//! ordered stream of trade events over them, emitting a price/market-cap
//! observation after every applied event.
//!
//! Each trade is priced at the pre-trade marginal price
//! (`solDelta = |tokenDiff| * priceBefore`) instead of integrating across the
//! constant-product curve. That understates impact for large trades, but all
//! historical series were produced this way, so it is a compatibility
//! contract: changing it to the true integral would silently shift every
//! stored ATH.

use thiserror::Error;
use tracing::{debug, warn};

use crate::types::{
    CurveSnapshot, PricePoint, TradeEvent, ValuationSeries, LAMPORTS_PER_SOL,
};

#[derive(Debug, Error, PartialEq)]
pub enum ReplayError {
    #[error("invalid reserve state for {curve}: sol={sol} token={token}")]
    InvalidReserveState {
        curve: String,
        sol: u64,
        token: u64,
    },
    #[error("out-of-order event {signature} on {curve}: {key:?} < {last:?}")]
    OutOfOrderEvent {
        curve: String,
        signature: String,
        key: (i64, u64),
        last: (i64, u64),
    },
}

/// Per-replay knobs. Token decimals vary by mint generation (6 or 9), so the
/// caller must supply them; assuming one constant skews every derived price.
#[derive(Debug, Clone, Copy)]
pub struct ReplayParams {
    pub token_decimals: u8,
    /// SOL -> USD rate used for `market_cap_usd`. Stale-but-present is fine.
    pub sol_usd: f64,
}

impl ReplayParams {
    fn token_scale(&self) -> f64 {
        10f64.powi(self.token_decimals as i32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Active,
    /// Curve migrated off this mechanism; no further events are applied.
    Completed,
}

/// Running reserve accumulators for one curve, alive only for the duration
/// of a replay run. The persisted output is the derived series, never this.
pub struct ReplayEngine {
    params: ReplayParams,
    phase: Phase,
    /// Lamports; floating because trade deltas are priced fractionally.
    running_virtual_sol: f64,
    /// Raw token units.
    running_virtual_token: f64,
    token_total_supply: u64,
    last_key: Option<(i64, u64)>,
    series: ValuationSeries,
}

impl ReplayEngine {
    /// Seed the engine from a decoded snapshot and emit the launch point.
    ///
    /// A snapshot with non-positive virtual reserves is rejected outright:
    /// it must never be price-computed, and the error aborts only this
    /// curve's replay.
    pub fn seed(
        curve_address: &str,
        snapshot: &CurveSnapshot,
        launch_time: i64,
        params: ReplayParams,
    ) -> Result<Self, ReplayError> {
        if !snapshot.has_valid_reserves() {
            return Err(ReplayError::InvalidReserveState {
                curve: curve_address.to_string(),
                sol: snapshot.virtual_sol_reserves,
                token: snapshot.virtual_token_reserves,
            });
        }

        let mut engine = Self {
            params,
            phase: if snapshot.complete {
                Phase::Completed
            } else {
                Phase::Active
            },
            running_virtual_sol: snapshot.virtual_sol_reserves as f64,
            running_virtual_token: snapshot.virtual_token_reserves as f64,
            token_total_supply: snapshot.token_total_supply,
            last_key: None,
            series: ValuationSeries::new(curve_address.to_string()),
        };

        let launch = engine.observe(launch_time);
        engine.series.points.push(launch);
        Ok(engine)
    }

    /// Apply one event, returning the emitted point (None when the event was
    /// skipped or ignored). Guards degrade gracefully: a bad event costs one
    /// observation, never the whole curve.
    pub fn apply(&mut self, event: &TradeEvent) -> Option<PricePoint> {
        if self.phase == Phase::Completed {
            debug!(
                "curve {} completed, ignoring {}",
                self.series.curve_address, event.signature
            );
            self.series.ignored += 1;
            return None;
        }

        let key = event.ordering_key();
        if let Some(last) = self.last_key {
            if key < last {
                // Caller contract violation: logged and skipped, never fatal.
                warn!(
                    "skipping event: {}",
                    ReplayError::OutOfOrderEvent {
                        curve: self.series.curve_address.clone(),
                        signature: event.signature.clone(),
                        key,
                        last,
                    }
                );
                self.series.skipped += 1;
                return None;
            }
        }

        if self.running_virtual_sol <= 0.0 || self.running_virtual_token <= 0.0 {
            warn!(
                "non-positive running reserves on {} at {}, skipping event",
                self.series.curve_address, event.signature
            );
            self.series.skipped += 1;
            return None;
        }

        let timestamp = event
            .block_time
            .unwrap_or_else(|| self.series.points.last().map_or(0, |p| p.timestamp));

        // Classifier already drops zero diffs; if one slips through it is a
        // no-op that still records an observation.
        if event.token_diff != 0 {
            let scale = self.params.token_scale();
            let price_before =
                (self.running_virtual_sol / LAMPORTS_PER_SOL) / (self.running_virtual_token / scale);

            let diff_tokens = event.token_diff.unsigned_abs() as f64 / scale;
            let sol_delta = diff_tokens * price_before * LAMPORTS_PER_SOL;
            let token_delta = event.token_diff.unsigned_abs() as f64;

            let (next_sol, next_token) = if event.is_buy() {
                (
                    self.running_virtual_sol + sol_delta,
                    self.running_virtual_token - token_delta,
                )
            } else {
                (
                    self.running_virtual_sol - sol_delta,
                    self.running_virtual_token + token_delta,
                )
            };

            if next_sol <= 0.0 || next_token <= 0.0 {
                warn!(
                    "event {} on {} would drive reserves negative (sol={:.0} token={:.0}), skipping",
                    event.signature, self.series.curve_address, next_sol, next_token
                );
                self.series.skipped += 1;
                return None;
            }

            self.running_virtual_sol = next_sol;
            self.running_virtual_token = next_token;
        }

        self.last_key = Some(key);
        let point = self.observe(timestamp);
        self.series.points.push(point);
        Some(point)
    }

    pub fn finish(self) -> ValuationSeries {
        self.series
    }

    /// Price and market cap from the current running reserves.
    fn observe(&self, timestamp: i64) -> PricePoint {
        let scale = self.params.token_scale();
        let sol = self.running_virtual_sol / LAMPORTS_PER_SOL;
        let tokens = self.running_virtual_token / scale;
        let supply = self.token_total_supply as f64 / scale;

        let price_sol = if sol > 0.0 && tokens > 0.0 {
            sol / tokens
        } else {
            0.0
        };
        let market_cap_sol = price_sol * supply;

        PricePoint {
            timestamp,
            price_sol,
            market_cap_sol,
            market_cap_usd: market_cap_sol * self.params.sol_usd,
        }
    }
}

/// Replay a full event list for one curve.
///
/// Events are re-sorted by `(block_time, slot)` before the fold, so the
/// result is deterministic regardless of the order the caller collected
/// them in. Re-invoking with a superset of previously seen events leaves
/// already-replayed ranges unchanged.
pub fn replay(
    curve_address: &str,
    seed: &CurveSnapshot,
    events: &[TradeEvent],
    params: ReplayParams,
) -> Result<ValuationSeries, ReplayError> {
    let mut ordered: Vec<&TradeEvent> = events.iter().collect();
    ordered.sort_by_key(|e| e.ordering_key());

    // The seed read carries no timestamp of its own; the earliest event's
    // block time stands in for the launch instant.
    let launch_time = ordered
        .iter()
        .find_map(|e| e.block_time)
        .unwrap_or(0);

    let mut engine = ReplayEngine::seed(curve_address, seed, launch_time, params)?;
    for event in ordered {
        engine.apply(event);
    }
    Ok(engine.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_snapshot() -> CurveSnapshot {
        CurveSnapshot {
            virtual_token_reserves: 1_000_000_000_000, // 1000 tokens @ 9 decimals
            virtual_sol_reserves: 30_000_000_000,      // 30 SOL
            real_token_reserves: 800_000_000_000,
            real_sol_reserves: 0,
            token_total_supply: 1_000_000_000_000_000, // 1,000,000 tokens
            complete: false,
            creator: None,
        }
    }

    fn params() -> ReplayParams {
        ReplayParams {
            token_decimals: 9,
            sol_usd: 1.0,
        }
    }

    fn event(sig: &str, block_time: i64, slot: u64, token_diff: i128) -> TradeEvent {
        TradeEvent {
            signature: sig.to_string(),
            curve_address: "curve1".to_string(),
            slot,
            block_time: Some(block_time),
            pre_token_amount: 0,
            post_token_amount: 0,
            token_diff,
        }
    }

    #[test]
    fn test_launch_point_from_seed() {
        let series = replay("curve1", &seed_snapshot(), &[], params()).unwrap();
        assert_eq!(series.points.len(), 1);
        let launch = series.launch().unwrap();
        assert!((launch.price_sol - 0.03).abs() < 1e-12);
        assert!((launch.market_cap_sol - 30_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_single_buy_moves_price_up() {
        // 10 tokens bought at the 0.03 pre-trade price: +0.3 SOL, -10 tokens.
        let events = vec![event("s1", 1_000, 1, 10_000_000_000)];
        let series = replay("curve1", &seed_snapshot(), &events, params()).unwrap();
        assert_eq!(series.points.len(), 2);

        let after = series.current().unwrap();
        let expected_price = 30.3 / 990.0;
        assert!((after.price_sol - expected_price).abs() < 1e-12);
        assert!((after.market_cap_sol - expected_price * 1_000_000.0).abs() < 1e-6);
        assert!(after.market_cap_sol > 30_000.0);
    }

    #[test]
    fn test_buy_then_sell_symmetry() {
        let events = vec![
            event("s1", 1_000, 1, 10_000_000_000),
            event("s2", 1_001, 2, -10_000_000_000),
        ];
        let series = replay("curve1", &seed_snapshot(), &events, params()).unwrap();
        assert_eq!(series.points.len(), 3);
        // Sell is priced at the post-buy marginal price, so the curve gives
        // back slightly more SOL than the buy added; price ends below launch.
        assert!(series.current().unwrap().price_sol < series.launch().unwrap().price_sol);
    }

    #[test]
    fn test_determinism() {
        let events = vec![
            event("s1", 1_000, 1, 10_000_000_000),
            event("s2", 1_005, 2, -3_000_000_000),
            event("s3", 1_010, 3, 42_000_000_000),
        ];
        let a = replay("curve1", &seed_snapshot(), &events, params()).unwrap();
        let b = replay("curve1", &seed_snapshot(), &events, params()).unwrap();
        assert_eq!(a.points, b.points);
    }

    #[test]
    fn test_unsorted_input_is_resorted() {
        let sorted = vec![
            event("s1", 1_000, 1, 10_000_000_000),
            event("s2", 1_005, 2, -3_000_000_000),
        ];
        let shuffled = vec![sorted[1].clone(), sorted[0].clone()];
        let a = replay("curve1", &seed_snapshot(), &sorted, params()).unwrap();
        let b = replay("curve1", &seed_snapshot(), &shuffled, params()).unwrap();
        assert_eq!(a.points, b.points);
        assert_eq!(a.skipped, 0);
        assert_eq!(b.skipped, 0);
    }

    #[test]
    fn test_out_of_order_stream_skipped() {
        let mut engine =
            ReplayEngine::seed("curve1", &seed_snapshot(), 1_000, params()).unwrap();
        assert!(engine.apply(&event("s2", 1_005, 2, 10_000_000_000)).is_some());
        // Earlier ordering key arriving late is a caller contract violation.
        assert!(engine.apply(&event("s1", 1_000, 1, 5_000_000_000)).is_none());
        let series = engine.finish();
        assert_eq!(series.skipped, 1);
        assert_eq!(series.points.len(), 2);
    }

    #[test]
    fn test_invalid_seed_rejected() {
        let mut snapshot = seed_snapshot();
        snapshot.virtual_sol_reserves = 0;
        let err = replay("curve1", &snapshot, &[], params()).unwrap_err();
        assert!(matches!(err, ReplayError::InvalidReserveState { .. }));
    }

    #[test]
    fn test_oversized_sell_skipped_not_fatal() {
        // Selling more tokens than would keep SOL reserves positive.
        let events = vec![
            event("s1", 1_000, 1, -2_000_000_000_000_000),
            event("s2", 1_001, 2, 10_000_000_000),
        ];
        let series = replay("curve1", &seed_snapshot(), &events, params()).unwrap();
        assert_eq!(series.skipped, 1);
        // Replay kept going: launch + the valid buy.
        assert_eq!(series.points.len(), 2);
    }

    #[test]
    fn test_completed_curve_ignores_events() {
        let mut snapshot = seed_snapshot();
        snapshot.complete = true;
        let events = vec![event("s1", 1_000, 1, 10_000_000_000)];
        let series = replay("curve1", &snapshot, &events, params()).unwrap();
        assert_eq!(series.ignored, 1);
        assert_eq!(series.points.len(), 1);
    }

    #[test]
    fn test_zero_diff_emits_duplicate_point() {
        let mut engine =
            ReplayEngine::seed("curve1", &seed_snapshot(), 1_000, params()).unwrap();
        let before = *engine.series.points.last().unwrap();
        let point = engine.apply(&event("s1", 1_005, 1, 0)).unwrap();
        assert_eq!(point.price_sol, before.price_sol);
        assert_eq!(point.market_cap_usd, before.market_cap_usd);
    }

    #[test]
    fn test_six_decimal_mint() {
        // Same curve shape expressed in 6-decimal raw units.
        let snapshot = CurveSnapshot {
            virtual_token_reserves: 1_000_000_000, // 1000 tokens @ 6 decimals
            virtual_sol_reserves: 30_000_000_000,
            real_token_reserves: 0,
            real_sol_reserves: 0,
            token_total_supply: 1_000_000_000_000, // 1,000,000 tokens
            complete: false,
            creator: None,
        };
        let p = ReplayParams {
            token_decimals: 6,
            sol_usd: 1.0,
        };
        let series = replay("curve1", &snapshot, &[], p).unwrap();
        assert!((series.launch().unwrap().price_sol - 0.03).abs() < 1e-12);
    }

    #[test]
    fn test_usd_rate_applied() {
        let p = ReplayParams {
            token_decimals: 9,
            sol_usd: 172.0,
        };
        let series = replay("curve1", &seed_snapshot(), &[], p).unwrap();
        let launch = series.launch().unwrap();
        assert!((launch.market_cap_usd - launch.market_cap_sol * 172.0).abs() < 1e-6);
    }
}
