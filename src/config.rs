//! Environment-driven configuration, loaded once at process start.
//!
//! Follows the reference stack's `from_env()` convention: read each variable,
//! parse it, and fall back to a documented default with a `tracing::warn!` if
//! parsing fails. Nothing here panics on a missing or malformed variable.

use crate::domain::Difficulty;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub presence_ttl: Duration,
    pub ticket_ttl: Duration,
    pub ticket_sweep_interval: Duration,
    pub default_question_time_limit_seconds: u32,
    pub points_for: HashMap<Difficulty, i64>,
    pub db_pool_size: u32,
    pub db_pool_recycle: Duration,
    pub db_connect_timeout: Duration,
    pub bind_addr: SocketAddr,
}

fn env_u64(name: &str, default: u64) -> u64 {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("{name}={raw:?} is not a valid integer, using default {default}");
                default
            }
        },
        Err(_) => default,
    }
}

fn env_u32(name: &str, default: u32) -> u32 {
    env_u64(name, default as u64) as u32
}

impl EngineConfig {
    /// Load configuration from environment variables, loading a local `.env`
    /// first if present (same convention the reference stack uses at boot).
    pub fn from_env() -> Self {
        if dotenvy::dotenv().is_err() {
            tracing::debug!("no .env file found, reading configuration from the environment only");
        }

        let bind_addr = std::env::var("BIND_ADDR")
            .ok()
            .and_then(|raw| match raw.parse() {
                Ok(addr) => Some(addr),
                Err(_) => {
                    tracing::warn!("BIND_ADDR={raw:?} is not a valid socket address, using default");
                    None
                }
            })
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8080)));

        let mut points_for = HashMap::new();
        points_for.insert(Difficulty::Easy, crate::score::points_for(Difficulty::Easy));
        points_for.insert(Difficulty::Medium, crate::score::points_for(Difficulty::Medium));
        points_for.insert(Difficulty::Hard, crate::score::points_for(Difficulty::Hard));

        Self {
            presence_ttl: Duration::from_secs(env_u64("PRESENCE_TTL_SECONDS", 15)),
            ticket_ttl: Duration::from_secs(env_u64("TICKET_TTL_SECONDS", 60)),
            ticket_sweep_interval: Duration::from_secs(env_u64("TICKET_SWEEP_INTERVAL_SECONDS", 30)),
            default_question_time_limit_seconds: env_u32("DEFAULT_QUESTION_TIME_LIMIT", 30),
            points_for,
            db_pool_size: env_u32("DB_POOL_SIZE", 5),
            db_pool_recycle: Duration::from_secs(env_u64("DB_POOL_RECYCLE_SECONDS", 30 * 60)),
            db_connect_timeout: Duration::from_secs(env_u64("DB_CONNECT_TIMEOUT_SECONDS", 5)),
            bind_addr,
        }
    }

    pub fn points_for(&self, difficulty: Difficulty) -> i64 {
        self.points_for
            .get(&difficulty)
            .copied()
            .unwrap_or_else(|| crate::score::points_for(difficulty))
    }

    /// The `tracing-subscriber` `EnvFilter` string, read from `RUST_LOG`/`ENGINE_LOG`.
    pub fn log_filter() -> String {
        std::env::var("RUST_LOG")
            .or_else(|_| std::env::var("ENGINE_LOG"))
            .unwrap_or_else(|_| "trivia_engine=debug,tower_http=debug,axum=info".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn defaults_when_unset() {
        std::env::remove_var("PRESENCE_TTL_SECONDS");
        std::env::remove_var("BIND_ADDR");
        let config = EngineConfig::from_env();
        assert_eq!(config.presence_ttl, Duration::from_secs(15));
        assert_eq!(config.bind_addr, SocketAddr::from(([0, 0, 0, 0], 8080)));
    }

    #[test]
    #[serial]
    fn reads_overrides() {
        std::env::set_var("PRESENCE_TTL_SECONDS", "45");
        let config = EngineConfig::from_env();
        assert_eq!(config.presence_ttl, Duration::from_secs(45));
        std::env::remove_var("PRESENCE_TTL_SECONDS");
    }

    #[test]
    #[serial]
    fn falls_back_on_malformed_value() {
        std::env::set_var("PRESENCE_TTL_SECONDS", "not-a-number");
        let config = EngineConfig::from_env();
        assert_eq!(config.presence_ttl, Duration::from_secs(15));
        std::env::remove_var("PRESENCE_TTL_SECONDS");
    }
}
