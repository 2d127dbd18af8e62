//! The lobby/presence manager (§4.2): heartbeats and the derived lobby view.

use super::Engine;
use crate::domain::ParticipationStatus;
use crate::error::{EngineError, EngineResult};
use crate::ids::{TriviaId, UserId};
use crate::protocol::{AdminLobbySnapshot, EngineEvent, LobbyRow, LobbySnapshot};
use chrono::{DateTime, Utc};

impl Engine {
    pub async fn heartbeat(&self, trivia_id: TriviaId, user_id: UserId) -> EngineResult<()> {
        let mut participation = self
            .repos
            .participations
            .get_by_trivia_and_user(trivia_id, user_id)
            .await?
            .ok_or_else(|| EngineError::not_found("participation not found"))?;

        participation.last_seen_at = Some(Utc::now());
        self.repos.participations.update(participation).await?;
        Ok(())
    }

    async fn lobby_rows(&self, trivia_id: TriviaId) -> EngineResult<Vec<LobbyRow>> {
        let now = Utc::now();
        let presence_ttl = self.config.presence_ttl;
        let mut participations = self.repos.participations.list_by_trivia(trivia_id).await?;
        // Player lists are deterministic: sorted by name, ties by user id.
        let mut rows = Vec::with_capacity(participations.len());
        participations.sort_by(|a, b| a.user_id.as_uuid().cmp(&b.user_id.as_uuid()));
        for participation in participations.drain(..) {
            let display_name = self
                .repos
                .users
                .get(participation.user_id)
                .await?
                .map(|u| u.display_name)
                .unwrap_or_else(|| participation.user_id.to_string());
            rows.push(LobbyRow {
                user_id: participation.user_id,
                display_name,
                present: super::is_present(participation.last_seen_at, now, presence_ttl),
                ready: participation.status == ParticipationStatus::Ready,
            });
        }
        rows.sort_by(|a, b| a.display_name.cmp(&b.display_name).then(a.user_id.as_uuid().cmp(&b.user_id.as_uuid())));
        Ok(rows)
    }

    pub async fn lobby(&self, trivia_id: TriviaId) -> EngineResult<LobbySnapshot> {
        Ok(LobbySnapshot {
            rows: self.lobby_rows(trivia_id).await?,
        })
    }

    pub async fn admin_lobby(&self, trivia_id: TriviaId) -> EngineResult<AdminLobbySnapshot> {
        let rows = self.lobby_rows(trivia_id).await?;
        let present_count = rows.iter().filter(|r| r.present).count() as u32;
        let ready_count = rows.iter().filter(|r| r.ready).count() as u32;
        Ok(AdminLobbySnapshot {
            assigned_count: rows.len() as u32,
            present_count,
            ready_count,
            rows,
        })
    }

    /// Publish both the player-view and admin-view lobby snapshots. Called
    /// after every command that changes who's present/ready (join, ready).
    pub(super) async fn broadcast_lobby(&self, trivia_id: TriviaId) -> EngineResult<()> {
        let lobby = self.lobby(trivia_id).await?;
        self.hub.broadcast(trivia_id, EngineEvent::LobbyUpdated(lobby)).await;
        let admin_lobby = self.admin_lobby(trivia_id).await?;
        self.hub
            .broadcast(trivia_id, EngineEvent::AdminLobbyUpdated(admin_lobby))
            .await;
        Ok(())
    }
}
