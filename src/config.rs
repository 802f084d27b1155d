use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub oracle: OracleConfig,
    pub replay: ReplayConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub wal_mode: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OracleConfig {
    pub endpoint: String,
    /// Rate used until the first successful fetch (and after failed ones).
    pub fallback_usd: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReplayConfig {
    /// Mint decimals for token amounts; 6 for old mints, 9 for new ones.
    pub token_decimals: u8,
    pub max_concurrent_curves: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitoringConfig {
    pub log_level: String,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        Ok(config)
    }

    pub fn load_or_default() -> Result<Self> {
        // Try config.toml first, then config.example.toml
        Self::load("config.toml")
            .or_else(|_| Self::load("config.example.toml"))
            .context("Failed to load configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [database]
            path = "data/events.db"
            wal_mode = true

            [oracle]
            endpoint = "https://api.coingecko.com/api/v3/simple/price?ids=solana&vs_currencies=usd"
            fallback_usd = 172.0

            [replay]
            token_decimals = 9
            max_concurrent_curves = 8

            [monitoring]
            log_level = "info"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.replay.token_decimals, 9);
        assert_eq!(config.replay.max_concurrent_curves, 8);
        assert!(config.database.wal_mode);
    }
}
