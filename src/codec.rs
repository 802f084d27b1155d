//! Binary codec for the bonding-curve state account.
//!
//! The account comes in two layouts: the original 49-byte fixed layout and a
//! newer one (>= 150 bytes) that appends a 32-byte creator address at offset
//! 49. Layout selection is a length threshold, not a fixed-size assumption,
//! because both versions coexist on chain.

use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

use crate::types::CurveSnapshot;

/// Account discriminator for the bonding-curve state account.
pub const CURVE_STATE_DISCRIMINATOR: u64 = 6966180631402821399;

/// Fixed layout: 8-byte discriminator, five u64 fields, one completion byte.
pub const MIN_ACCOUNT_LEN: usize = 49;

/// Accounts at or above this length carry the trailing creator pubkey.
pub const CREATOR_LAYOUT_LEN: usize = 150;

const CREATOR_OFFSET: usize = 49;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("account data truncated: {len} bytes, need at least {need}")]
    TruncatedData { len: usize, need: usize },
    #[error("curve state discriminator mismatch: got {0:#018x}")]
    DiscriminatorMismatch(u64),
}

/// Decode raw account bytes into a `CurveSnapshot`.
///
/// Pure function of its input; never touches the network or clock.
pub fn decode(data: &[u8]) -> Result<CurveSnapshot, DecodeError> {
    if data.len() < MIN_ACCOUNT_LEN {
        return Err(DecodeError::TruncatedData {
            len: data.len(),
            need: MIN_ACCOUNT_LEN,
        });
    }

    let discriminator = read_u64_le(data, 0);
    if discriminator != CURVE_STATE_DISCRIMINATOR {
        return Err(DecodeError::DiscriminatorMismatch(discriminator));
    }

    let creator = if data.len() >= CREATOR_LAYOUT_LEN {
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&data[CREATOR_OFFSET..CREATOR_OFFSET + 32]);
        Some(Pubkey::new_from_array(bytes))
    } else {
        None
    };

    Ok(CurveSnapshot {
        virtual_token_reserves: read_u64_le(data, 8),
        virtual_sol_reserves: read_u64_le(data, 16),
        real_token_reserves: read_u64_le(data, 24),
        real_sol_reserves: read_u64_le(data, 32),
        token_total_supply: read_u64_le(data, 40),
        complete: data[48] != 0,
        creator,
    })
}

/// Encode a snapshot back into account bytes.
///
/// Produces the short layout when `creator` is absent and the long layout
/// (padded to the threshold length) when present. Mainly used by tests and
/// fixtures; the chain is the real source of these bytes.
pub fn encode(snapshot: &CurveSnapshot) -> Vec<u8> {
    let len = if snapshot.creator.is_some() {
        CREATOR_LAYOUT_LEN
    } else {
        MIN_ACCOUNT_LEN
    };
    let mut data = vec![0u8; len];

    data[0..8].copy_from_slice(&CURVE_STATE_DISCRIMINATOR.to_le_bytes());
    data[8..16].copy_from_slice(&snapshot.virtual_token_reserves.to_le_bytes());
    data[16..24].copy_from_slice(&snapshot.virtual_sol_reserves.to_le_bytes());
    data[24..32].copy_from_slice(&snapshot.real_token_reserves.to_le_bytes());
    data[32..40].copy_from_slice(&snapshot.real_sol_reserves.to_le_bytes());
    data[40..48].copy_from_slice(&snapshot.token_total_supply.to_le_bytes());
    data[48] = snapshot.complete as u8;

    if let Some(creator) = &snapshot.creator {
        data[CREATOR_OFFSET..CREATOR_OFFSET + 32].copy_from_slice(creator.as_ref());
    }

    data
}

fn read_u64_le(data: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}
