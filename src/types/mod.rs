use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

pub const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// Decoded bonding-curve account state at one point in time.
///
/// Reserve and supply fields are raw on-chain integers (lamports for SOL,
/// mint-decimal units for tokens). Nothing here is floating point;
/// conversion happens only at price-computation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurveSnapshot {
    pub virtual_token_reserves: u64,
    pub virtual_sol_reserves: u64,
    pub real_token_reserves: u64,
    pub real_sol_reserves: u64,
    pub token_total_supply: u64,
    pub complete: bool,
    /// Present only in the newer (>= 150 byte) account layout.
    pub creator: Option<Pubkey>,
}

impl CurveSnapshot {
    /// Snapshots with non-positive virtual reserves must never be priced.
    pub fn has_valid_reserves(&self) -> bool {
        self.virtual_token_reserves > 0 && self.virtual_sol_reserves > 0
    }
}

/// One economically meaningful balance change on a curve's token account.
///
/// `token_diff` is pre minus post in raw token units: positive means tokens
/// left the curve (buy side), negative means tokens returned (sell side).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub signature: String,
    pub curve_address: String,
    pub slot: u64,
    pub block_time: Option<i64>,
    pub pre_token_amount: u64,
    pub post_token_amount: u64,
    pub token_diff: i128,
}

impl TradeEvent {
    /// Replay ordering key: block time first, slot breaks ties and stands in
    /// when block time is missing.
    pub fn ordering_key(&self) -> (i64, u64) {
        (self.block_time.unwrap_or(i64::MIN), self.slot)
    }

    pub fn is_buy(&self) -> bool {
        self.token_diff > 0
    }
}

/// One derived valuation observation, emitted after each applied event
/// (plus the launch point from the seed snapshot).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: i64,
    pub price_sol: f64,
    pub market_cap_sol: f64,
    pub market_cap_usd: f64,
}

/// Time-ordered valuation history for one curve, plus replay accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationSeries {
    pub curve_address: String,
    pub points: Vec<PricePoint>,
    /// Events dropped by replay guards (bad reserves, out of order).
    pub skipped: u32,
    /// Events seen after the curve completed.
    pub ignored: u32,
}

impl ValuationSeries {
    pub fn new(curve_address: String) -> Self {
        Self {
            curve_address,
            points: Vec::new(),
            skipped: 0,
            ignored: 0,
        }
    }

    pub fn launch(&self) -> Option<&PricePoint> {
        self.points.first()
    }

    pub fn current(&self) -> Option<&PricePoint> {
        self.points.last()
    }
}

/// Reduction of a `ValuationSeries` into the numbers the reports care about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveValuationSummary {
    pub curve_address: String,
    pub launch: PricePoint,
    pub all_time_high: PricePoint,
    pub all_time_low: PricePoint,
    pub current: PricePoint,
    pub percent_from_ath: f64,
    pub percent_from_launch: f64,
    pub time_to_ath_secs: i64,
}
