//! Centralized configuration (environment variables + defaults).

use crate::app::links::LinkIssuer;
use anyhow::{anyhow, Context};
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use tracing::info;

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string (required, no default).
    pub database_url: String,
    pub bind_addr: String,
    pub db_max_connections: u32,
    /// Header the upstream auth proxy uses to forward the session user id.
    pub session_header: String,
    pub link_issuer: LinkIssuer,
    pub daily_reward: i64,
    /// Tickets granted by the daily spin ticket claim.
    pub spins_per_day: i64,
}

impl Config {
    /// Loads `.env` (if present) and reads the environment.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let database_url = env::var("DATABASE_URL").map_err(|_| anyhow!("DATABASE_URL must be set"))?;

        let config = Self {
            database_url,
            bind_addr: try_load("BIND_ADDR", "0.0.0.0:3000")?,
            db_max_connections: try_load("DB_MAX_CONNECTIONS", "5")?,
            session_header: try_load::<String>("SESSION_HEADER", "x-user-id")?.to_lowercase(),
            link_issuer: link_issuer_from_env()?,
            daily_reward: try_load("DAILY_REWARD", "50")?,
            spins_per_day: try_load("SPINS_PER_DAY", "1")?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that would break the balance and ticket invariants.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.daily_reward <= 0 {
            return Err(anyhow!("invalid DAILY_REWARD {}: must be positive", self.daily_reward));
        }
        if self.spins_per_day < 1 {
            return Err(anyhow!("invalid SPINS_PER_DAY {}: must be at least 1", self.spins_per_day));
        }
        if self.db_max_connections == 0 {
            return Err(anyhow!("invalid DB_MAX_CONNECTIONS: must be at least 1"));
        }
        Ok(())
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.parse::<T>()
        .map_err(|e| anyhow!("invalid {key} value '{raw}': {e}"))
}

fn link_issuer_from_env() -> anyhow::Result<LinkIssuer> {
    let mode: String = try_load("LINK_MODE", "direct")?;
    match mode.trim().to_lowercase().as_str() {
        "direct" => Ok(LinkIssuer::Direct),
        "linkvertise" => {
            let publisher_id = env::var("LINKVERTISE_PUBLISHER_ID")
                .context("LINKVERTISE_PUBLISHER_ID must be set when LINK_MODE=linkvertise")?;
            Ok(LinkIssuer::Linkvertise {
                base_url: try_load("LINKVERTISE_BASE_URL", "https://direct-link.net")?,
                publisher_id,
            })
        }
        other => Err(anyhow!("invalid LINK_MODE '{}': expected direct or linkvertise", other)),
    }
}
