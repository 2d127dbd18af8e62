//! The session state machine (§4.1): Join, Start, Advance, Reset.
//!
//! Grounded on the reference stack's `state/game.rs`: an explicit
//! precondition check per target state, a single mutation point, and a
//! broadcast fired only after the mutation is visible.

use super::Engine;
use crate::domain::{ParticipationStatus, TriviaStatus};
use crate::error::{EngineError, EngineResult};
use crate::ids::{TriviaId, UserId};
use crate::protocol::{AdvanceResult, EngineEvent, JoinResult, StartResult};
use chrono::Utc;

impl Engine {
    pub async fn join(&self, trivia_id: TriviaId, user_id: UserId) -> EngineResult<JoinResult> {
        let mut trivia = self
            .repos
            .trivias
            .get(trivia_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("trivia {trivia_id} not found")))?;

        if !matches!(trivia.status, TriviaStatus::Draft | TriviaStatus::Lobby) {
            return Err(EngineError::invalid_state(format!(
                "cannot join trivia in status {:?}",
                trivia.status
            )));
        }

        let now = Utc::now();
        let transitioned_to_lobby = matches!(trivia.status, TriviaStatus::Draft);
        if transitioned_to_lobby {
            trivia.status = TriviaStatus::Lobby;
            trivia = self.repos.trivias.update(trivia).await?;
        }

        let existing = self
            .repos
            .participations
            .get_by_trivia_and_user(trivia_id, user_id)
            .await?;

        let participation = match existing {
            Some(mut participation) => {
                participation.joined_at = Some(now);
                participation.ready_at = Some(now);
                participation.last_seen_at = Some(now);
                participation.status = ParticipationStatus::Ready;
                self.repos.participations.update(participation).await?
            }
            None => {
                let mut participation = crate::domain::Participation::invited(trivia_id, user_id);
                participation.joined_at = Some(now);
                participation.ready_at = Some(now);
                participation.last_seen_at = Some(now);
                participation.status = ParticipationStatus::Ready;
                self.repos.participations.create(participation).await?
            }
        };

        tracing::info!(%trivia_id, %user_id, "player joined trivia");

        if transitioned_to_lobby {
            self.hub
                .broadcast(
                    trivia_id,
                    EngineEvent::StatusUpdated {
                        state: trivia.status.into(),
                        current_question_index: trivia.current_question_index,
                    },
                )
                .await;
        }
        self.broadcast_lobby(trivia_id).await?;

        Ok(JoinResult {
            trivia_id,
            participation_id: participation.id,
            participation_status: participation.status,
            trivia_status: trivia.status,
        })
    }

    /// Kept as an alias for backward compatibility (§9 open question #1):
    /// on an existing participation this is a no-op once already READY.
    pub async fn set_ready(
        &self,
        trivia_id: TriviaId,
        user_id: UserId,
    ) -> EngineResult<crate::protocol::SetReadyResult> {
        let mut participation = self
            .repos
            .participations
            .get_by_trivia_and_user(trivia_id, user_id)
            .await?
            .ok_or_else(|| EngineError::not_found("participation not found"))?;

        if participation.status != ParticipationStatus::Ready {
            participation.status = ParticipationStatus::Ready;
            participation.ready_at = Some(Utc::now());
            participation = self.repos.participations.update(participation).await?;
            self.broadcast_lobby(trivia_id).await?;
        }

        Ok(crate::protocol::SetReadyResult {
            participation_id: participation.id,
            participation_status: participation.status,
        })
    }

    pub async fn start(&self, trivia_id: TriviaId, admin_user_id: UserId) -> EngineResult<StartResult> {
        let mut trivia = self
            .repos
            .trivias
            .get(trivia_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("trivia {trivia_id} not found")))?;

        if trivia.creator_user_id != admin_user_id {
            return Err(EngineError::forbidden("only the trivia creator can start it"));
        }
        if trivia.status != TriviaStatus::Lobby {
            return Err(EngineError::invalid_state(format!(
                "cannot start trivia in status {:?}",
                trivia.status
            )));
        }

        let participations = self.repos.participations.list_by_trivia(trivia_id).await?;
        if participations.is_empty() {
            return Err(EngineError::conflict("cannot start a trivia with no participants"));
        }

        let now = Utc::now();
        let presence_ttl = self.config.presence_ttl;
        let ready_count = participations
            .iter()
            .filter(|p| p.status == ParticipationStatus::Ready)
            .count();
        let present_count = participations
            .iter()
            .filter(|p| super::is_present(p.last_seen_at, now, presence_ttl))
            .count();
        let all_present_and_ready = participations.iter().all(|p| {
            p.status == ParticipationStatus::Ready && super::is_present(p.last_seen_at, now, presence_ttl)
        });

        if !all_present_and_ready {
            return Err(EngineError::conflict(format!(
                "cannot start: {ready_count}/{} participants ready, {present_count}/{} present",
                participations.len(),
                participations.len()
            )));
        }

        trivia.status = TriviaStatus::InProgress;
        trivia.started_at = Some(now);
        trivia.current_question_index = 0;
        trivia.question_started_at = Some(now);
        trivia = self.repos.trivias.update(trivia).await?;

        tracing::info!(%trivia_id, %admin_user_id, "trivia started");

        self.hub
            .broadcast(
                trivia_id,
                EngineEvent::StatusUpdated {
                    state: trivia.status.into(),
                    current_question_index: trivia.current_question_index,
                },
            )
            .await;
        self.broadcast_current_question(trivia_id).await?;
        self.broadcast_ranking(trivia_id).await?;

        Ok(StartResult {
            trivia_id,
            trivia_status: trivia.status,
            started_at: now,
            current_question_index: trivia.current_question_index,
        })
    }

    pub async fn advance(&self, trivia_id: TriviaId, admin_user_id: UserId) -> EngineResult<AdvanceResult> {
        let mut trivia = self
            .repos
            .trivias
            .get(trivia_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("trivia {trivia_id} not found")))?;

        if trivia.creator_user_id != admin_user_id {
            return Err(EngineError::forbidden("only the trivia creator can advance it"));
        }
        if trivia.status != TriviaStatus::InProgress {
            return Err(EngineError::invalid_state(format!(
                "cannot advance trivia in status {:?}",
                trivia.status
            )));
        }

        let total_questions = self.repos.trivia_questions.count_by_trivia(trivia_id).await?;
        let now = Utc::now();

        if trivia.current_question_index + 1 < total_questions {
            trivia.current_question_index += 1;
            trivia.question_started_at = Some(now);
        } else {
            trivia.status = TriviaStatus::Finished;
            trivia.question_started_at = None;
            trivia.finished_at = Some(now);
        }
        trivia = self.repos.trivias.update(trivia).await?;

        tracing::info!(%trivia_id, %admin_user_id, status = ?trivia.status, "trivia advanced");

        self.hub
            .broadcast(
                trivia_id,
                EngineEvent::StatusUpdated {
                    state: trivia.status.into(),
                    current_question_index: trivia.current_question_index,
                },
            )
            .await;
        if trivia.status == TriviaStatus::InProgress {
            self.broadcast_current_question(trivia_id).await?;
        }
        self.broadcast_ranking(trivia_id).await?;

        Ok(AdvanceResult {
            trivia_id,
            status: trivia.status,
            current_question_index: trivia.current_question_index,
            total_questions,
        })
    }

    pub async fn reset(&self, trivia_id: TriviaId) -> EngineResult<()> {
        let mut trivia = self
            .repos
            .trivias
            .get(trivia_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("trivia {trivia_id} not found")))?;

        self.repos.answers.delete_by_trivia(trivia_id).await?;

        let participations = self.repos.participations.list_by_trivia(trivia_id).await?;
        for mut participation in participations {
            participation.score = 0;
            participation.fifty_fifty_used = false;
            participation.fifty_fifty_question_id = None;
            self.repos.participations.update(participation).await?;
        }

        trivia.status = TriviaStatus::Lobby;
        trivia.current_question_index = 0;
        trivia.question_started_at = None;
        trivia.started_at = None;
        trivia.finished_at = None;
        trivia = self.repos.trivias.update(trivia).await?;

        tracing::info!(%trivia_id, "trivia reset");

        self.hub
            .broadcast(
                trivia_id,
                EngineEvent::StatusUpdated {
                    state: trivia.status.into(),
                    current_question_index: trivia.current_question_index,
                },
            )
            .await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Role, Trivia, TriviaQuestion, User};
    use crate::hub::Hub;
    use crate::repo::MemoryStore;
    use crate::score;
    use crate::{config::EngineConfig, domain::Difficulty, engine::Engine, ids::*};

    fn config() -> EngineConfig {
        EngineConfig::from_env()
    }

    async fn new_engine() -> Engine {
        let store = MemoryStore::new();
        Engine::new(store.into_repositories(), Hub::new(), config())
    }

    async fn seed_trivia(engine: &Engine, admin: UserId) -> TriviaId {
        let trivia = Trivia::new("quiz".into(), "desc".into(), admin, Utc::now());
        let trivia = engine.repos.trivias.create(trivia).await.unwrap();
        trivia.id
    }

    async fn bind_question(engine: &Engine, trivia_id: TriviaId, position: u32, difficulty: Difficulty) {
        let admin = UserId::new();
        let question = crate::domain::Question {
            id: QuestionId::new(),
            text: format!("question {position}"),
            difficulty,
            creator_user_id: admin,
        };
        let question = engine.repos.questions.create(question).await.unwrap();
        let binding = TriviaQuestion {
            id: TriviaQuestionId::new(),
            trivia_id,
            question_id: question.id,
            position,
            time_limit_seconds: 30,
        };
        engine.repos.trivia_questions.create(binding).await.unwrap();
    }

    #[tokio::test]
    async fn join_creates_ready_participation_and_flips_draft_to_lobby() {
        let engine = new_engine().await;
        let admin = UserId::new();
        let trivia_id = seed_trivia(&engine, admin).await;
        let player = UserId::new();

        let result = engine.join(trivia_id, player).await.unwrap();
        assert_eq!(result.participation_status, ParticipationStatus::Ready);
        assert_eq!(result.trivia_status, TriviaStatus::Lobby);
    }

    #[tokio::test]
    async fn join_twice_is_idempotent_on_participation_id() {
        let engine = new_engine().await;
        let admin = UserId::new();
        let trivia_id = seed_trivia(&engine, admin).await;
        let player = UserId::new();

        let first = engine.join(trivia_id, player).await.unwrap();
        let second = engine.join(trivia_id, player).await.unwrap();
        assert_eq!(first.participation_id, second.participation_id);
        assert_eq!(second.participation_status, ParticipationStatus::Ready);
    }

    #[tokio::test]
    async fn start_fails_when_not_all_ready() {
        let engine = new_engine().await;
        let admin = UserId::new();
        let trivia_id = seed_trivia(&engine, admin).await;
        bind_question(&engine, trivia_id, 0, Difficulty::Easy).await;

        let ready_player = UserId::new();
        engine.join(trivia_id, ready_player).await.unwrap();

        let joined_only = crate::domain::Participation::invited(trivia_id, UserId::new());
        engine.repos.participations.create(joined_only).await.unwrap();

        let result = engine.start(trivia_id, admin).await;
        assert!(matches!(result, Err(EngineError::Conflict(_))));

        let trivia = engine.repos.trivias.get(trivia_id).await.unwrap().unwrap();
        assert_eq!(trivia.status, TriviaStatus::Lobby);
    }

    #[tokio::test]
    async fn start_rejects_non_creator() {
        let engine = new_engine().await;
        let admin = UserId::new();
        let trivia_id = seed_trivia(&engine, admin).await;
        bind_question(&engine, trivia_id, 0, Difficulty::Easy).await;
        let player = UserId::new();
        engine.join(trivia_id, player).await.unwrap();

        let result = engine.start(trivia_id, player).await;
        assert!(matches!(result, Err(EngineError::Forbidden(_))));
    }

    #[tokio::test]
    async fn concurrent_start_attempts_linearize() {
        let engine = new_engine().await;
        let admin = UserId::new();
        let trivia_id = seed_trivia(&engine, admin).await;
        bind_question(&engine, trivia_id, 0, Difficulty::Easy).await;
        let player = UserId::new();
        engine.join(trivia_id, player).await.unwrap();

        // Two callers read the LOBBY trivia before either writes back; only
        // one compare-and-swap may win (§4.1, §5).
        let (first, second) = tokio::join!(engine.start(trivia_id, admin), engine.start(trivia_id, admin));
        let outcomes = [first, second];
        let successes = outcomes.iter().filter(|r| r.is_ok()).count();
        let conflicts = outcomes
            .iter()
            .filter(|r| matches!(r, Err(EngineError::Conflict(_)) | Err(EngineError::InvalidState(_))))
            .count();
        assert_eq!(successes, 1, "exactly one concurrent Start must succeed");
        assert_eq!(conflicts, 1, "the loser must fail, never silently no-op");

        let trivia = engine.repos.trivias.get(trivia_id).await.unwrap().unwrap();
        assert_eq!(trivia.status, TriviaStatus::InProgress);
        assert_eq!(trivia.version, 1);
    }

    #[tokio::test]
    async fn advance_terminates_after_n_calls() {
        let engine = new_engine().await;
        let admin = UserId::new();
        let trivia_id = seed_trivia(&engine, admin).await;
        for i in 0..3 {
            bind_question(&engine, trivia_id, i, Difficulty::Easy).await;
        }
        let player = UserId::new();
        engine.join(trivia_id, player).await.unwrap();
        engine.start(trivia_id, admin).await.unwrap();

        engine.advance(trivia_id, admin).await.unwrap();
        engine.advance(trivia_id, admin).await.unwrap();
        let last = engine.advance(trivia_id, admin).await.unwrap();

        assert_eq!(last.status, TriviaStatus::Finished);
    }

    #[tokio::test]
    async fn reset_clears_score_and_lifeline_flags() {
        let engine = new_engine().await;
        let admin = UserId::new();
        let trivia_id = seed_trivia(&engine, admin).await;
        bind_question(&engine, trivia_id, 0, Difficulty::Easy).await;
        let player = UserId::new();
        engine.join(trivia_id, player).await.unwrap();
        engine.start(trivia_id, admin).await.unwrap();

        let mut participation = engine
            .repos
            .participations
            .get_by_trivia_and_user(trivia_id, player)
            .await
            .unwrap()
            .unwrap();
        participation.score = score::points_for(Difficulty::Easy);
        participation.fifty_fifty_used = true;
        engine.repos.participations.update(participation).await.unwrap();

        engine.reset(trivia_id).await.unwrap();

        let trivia = engine.repos.trivias.get(trivia_id).await.unwrap().unwrap();
        assert_eq!(trivia.status, TriviaStatus::Lobby);
        assert!(trivia.question_started_at.is_none());

        let participation = engine
            .repos
            .participations
            .get_by_trivia_and_user(trivia_id, player)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(participation.score, 0);
        assert!(!participation.fifty_fifty_used);
    }
}
