// Curve Replay - Bonding-Curve Decode & Replay Engine
// Decodes on-chain curve state and reconstructs valuation history from
// a persisted trade-event log.

pub mod classifier;
pub mod codec;
pub mod config;
pub mod db;
pub mod oracle;
pub mod replay;
pub mod runner;
pub mod summary;
pub mod types;

pub use db::EventStore;
