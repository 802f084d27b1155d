//! Trade classification from pre/post token-balance readings.
//!
//! A transaction touching the curve is a trade only if the curve's own token
//! account balance moved by more than dust. Errored transactions and
//! transactions where the curve was not a balance-change party are dropped
//! before they ever reach the replay engine.

use tracing::debug;

use crate::types::TradeEvent;

/// Raw per-transaction observation handed over by the chain-data collaborator.
#[derive(Debug, Clone)]
pub struct BalanceReading {
    pub signature: String,
    pub slot: u64,
    pub block_time: Option<i64>,
    /// Transaction carried an execution error.
    pub failed: bool,
    /// Curve token-account balance before the transaction, if listed.
    pub pre_token_amount: Option<u64>,
    /// Curve token-account balance after the transaction, if listed.
    pub post_token_amount: Option<u64>,
}

/// A |diff| of 0 or 1 raw units is rounding noise, not a trade.
pub const DUST_THRESHOLD: i128 = 1;

/// Classify one balance reading into a `TradeEvent`, or `None` when the
/// transaction is not a meaningful trade on this curve.
///
/// Pure function of its inputs: the same signature always classifies the same
/// way, which is what lets the event log upsert by signature.
pub fn classify(curve_address: &str, reading: &BalanceReading) -> Option<TradeEvent> {
    if reading.failed {
        debug!("skipping errored tx {}", reading.signature);
        return None;
    }

    // Curve must appear on both sides of the balance-change list, otherwise
    // it was not a party to a token movement in this transaction.
    let pre = reading.pre_token_amount?;
    let post = reading.post_token_amount?;

    let diff = pre as i128 - post as i128;
    if diff.abs() <= DUST_THRESHOLD {
        debug!(
            "dust diff {} for {} on {}, dropping",
            diff, reading.signature, curve_address
        );
        return None;
    }

    Some(TradeEvent {
        signature: reading.signature.clone(),
        curve_address: curve_address.to_string(),
        slot: reading.slot,
        block_time: reading.block_time,
        pre_token_amount: pre,
        post_token_amount: post,
        token_diff: diff,
    })
}
