//! The game-session engine: owns the repositories, the event hub, and the
//! configuration, and exposes the command surface of §6. Each command group
//! is implemented in its own module (mirroring the reference stack's split
//! of `AppState`'s methods across `state/game.rs`, `state/player.rs`, etc.)
//! but all land on the single `Engine` type so a transport adapter only
//! needs to hold one handle.

pub mod answer;
pub mod lifeline;
pub mod presence;
pub mod ranking;
pub mod session;

use crate::config::EngineConfig;
use crate::hub::Hub;
use crate::repo::traits::Repositories;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[derive(Clone)]
pub struct Engine {
    pub(crate) repos: Arc<Repositories>,
    pub(crate) hub: Hub,
    pub(crate) config: Arc<EngineConfig>,
}

impl Engine {
    pub fn new(repos: Repositories, hub: Hub, config: EngineConfig) -> Self {
        Self {
            repos: Arc::new(repos),
            hub,
            config: Arc::new(config),
        }
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Exposes the repositories directly, for tests that seed fixture data
    /// (trivias, questions, options, bindings) ahead of driving commands.
    pub fn repos(&self) -> &Repositories {
        &self.repos
    }
}

/// `present = last-seen-at is not null AND (now - last-seen-at) <= PRESENCE_TTL` (§4.2).
pub(crate) fn is_present(last_seen_at: Option<DateTime<Utc>>, now: DateTime<Utc>, ttl: std::time::Duration) -> bool {
    match last_seen_at {
        Some(last_seen_at) => (now - last_seen_at).num_seconds() <= ttl.as_secs() as i64,
        None => false,
    }
}
