//! SQLite-backed trade-event log.
//!
//! This is collaborator glue, not engine logic: it gives classified events a
//! durable home keyed by signature (so re-ingesting a window of transactions
//! is a harmless upsert) and hands the replay engine plain ordered vectors.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use solana_sdk::pubkey::Pubkey;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

use crate::types::{CurveSnapshot, TradeEvent};

pub struct EventStore {
    conn: Connection,
}

impl EventStore {
    pub fn new<P: AsRef<Path>>(path: P, wal_mode: bool) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create database directory")?;
        }

        let conn = Connection::open(path)
            .context("Failed to open database connection")?;

        if wal_mode {
            conn.execute_batch("PRAGMA journal_mode=WAL;")
                .context("Failed to enable WAL mode")?;
        }

        let mut store = Self { conn };
        store.initialize_schema()?;

        info!("✅ Event store initialized");
        Ok(store)
    }

    fn initialize_schema(&mut self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
            -- Classified trade events, one row per signature
            CREATE TABLE IF NOT EXISTS trade_events (
                signature TEXT PRIMARY KEY,
                curve_address TEXT NOT NULL,
                slot INTEGER NOT NULL,
                block_time INTEGER,
                pre_token_amount INTEGER NOT NULL,
                post_token_amount INTEGER NOT NULL,
                token_diff TEXT NOT NULL
            );

            -- Seed snapshot per curve (latest decoded account read)
            CREATE TABLE IF NOT EXISTS curve_states (
                curve_address TEXT PRIMARY KEY,
                virtual_token_reserves INTEGER NOT NULL,
                virtual_sol_reserves INTEGER NOT NULL,
                real_token_reserves INTEGER NOT NULL,
                real_sol_reserves INTEGER NOT NULL,
                token_total_supply INTEGER NOT NULL,
                complete INTEGER NOT NULL,
                creator TEXT,
                updated_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_events_curve_time
                ON trade_events(curve_address, block_time, slot);
            "#,
            )
            .context("Failed to initialize event store schema")?;

        Ok(())
    }

    /// Insert or refresh one classified event. Keyed by signature, so
    /// re-processing the same transaction is idempotent.
    pub fn upsert_event(&mut self, event: &TradeEvent) -> Result<()> {
        self.conn
            .execute(
                r#"
            INSERT OR REPLACE INTO trade_events (
                signature, curve_address, slot, block_time,
                pre_token_amount, post_token_amount, token_diff
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
                params![
                    event.signature,
                    event.curve_address,
                    event.slot as i64,
                    event.block_time,
                    event.pre_token_amount as i64,
                    event.post_token_amount as i64,
                    event.token_diff.to_string(),
                ],
            )
            .context("Failed to upsert trade event")?;
        Ok(())
    }

    /// Load one curve's events ordered by `(block_time, slot)`, ready for
    /// replay.
    pub fn load_events(&self, curve_address: &str) -> Result<Vec<TradeEvent>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT signature, curve_address, slot, block_time,
                   pre_token_amount, post_token_amount, token_diff
            FROM trade_events
            WHERE curve_address = ?1
            ORDER BY block_time ASC, slot ASC
            "#,
        )?;

        let rows = stmt
            .query_map(params![curve_address], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut events = Vec::with_capacity(rows.len());
        for (signature, curve, slot, block_time, pre, post, diff) in rows {
            let token_diff: i128 = diff
                .parse()
                .with_context(|| format!("Corrupt token_diff for {}", signature))?;
            events.push(TradeEvent {
                signature,
                curve_address: curve,
                slot: slot as u64,
                block_time,
                pre_token_amount: pre as u64,
                post_token_amount: post as u64,
                token_diff,
            });
        }

        Ok(events)
    }

    /// Distinct curve addresses that have at least one event.
    pub fn list_curves(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT curve_address FROM trade_events")?;
        let curves = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(curves)
    }

    /// Store the latest decoded account state for a curve.
    pub fn upsert_seed(&mut self, curve_address: &str, snapshot: &CurveSnapshot) -> Result<()> {
        self.conn
            .execute(
                r#"
            INSERT OR REPLACE INTO curve_states (
                curve_address, virtual_token_reserves, virtual_sol_reserves,
                real_token_reserves, real_sol_reserves, token_total_supply,
                complete, creator, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
                params![
                    curve_address,
                    snapshot.virtual_token_reserves as i64,
                    snapshot.virtual_sol_reserves as i64,
                    snapshot.real_token_reserves as i64,
                    snapshot.real_sol_reserves as i64,
                    snapshot.token_total_supply as i64,
                    snapshot.complete as i32,
                    snapshot.creator.map(|c| c.to_string()),
                    chrono::Utc::now().timestamp(),
                ],
            )
            .context("Failed to upsert curve state")?;
        Ok(())
    }

    pub fn load_seed(&self, curve_address: &str) -> Result<Option<CurveSnapshot>> {
        let row = self
            .conn
            .query_row(
                r#"
            SELECT virtual_token_reserves, virtual_sol_reserves,
                   real_token_reserves, real_sol_reserves, token_total_supply,
                   complete, creator
            FROM curve_states WHERE curve_address = ?1
            "#,
                params![curve_address],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, i32>(5)? != 0,
                        row.get::<_, Option<String>>(6)?,
                    ))
                },
            )
            .optional()
            .context("Failed to load curve state")?;

        let Some((vt, vs, rt, rs, supply, complete, creator)) = row else {
            return Ok(None);
        };

        let creator = creator
            .map(|s| Pubkey::from_str(&s))
            .transpose()
            .context("Corrupt creator pubkey in curve_states")?;

        Ok(Some(CurveSnapshot {
            virtual_token_reserves: vt as u64,
            virtual_sol_reserves: vs as u64,
            real_token_reserves: rt as u64,
            real_sol_reserves: rs as u64,
            token_total_supply: supply as u64,
            complete,
            creator,
        }))
    }
}
