//! The answer & scoring pipeline (§4.3): current-question view and the
//! idempotent submit path.
//!
//! Grounded on the reference stack's `state/submission.rs` for the overall
//! shape (validate → persist → broadcast derived views), with the
//! duplicate-rejection idiom replaced by the idempotent read-back §4.3
//! requires instead.

use super::Engine;
use crate::domain::{TriviaQuestion, TriviaStatus};
use crate::error::{EngineError, EngineResult};
use crate::ids::{OptionId, TriviaId, UserId};
use crate::protocol::{CurrentQuestionResult, EngineEvent, OptionView, SubmitAnswerResult};
use chrono::{DateTime, Utc};

impl Engine {
    /// Looks up the trivia-question bound at the trivia's current index, and
    /// the question it refers to. Shared by `current_question`, `submit`,
    /// and the 50/50 lifeline.
    pub(super) async fn current_binding(
        &self,
        trivia_id: TriviaId,
    ) -> EngineResult<(crate::domain::Trivia, TriviaQuestion, crate::domain::Question)> {
        let trivia = self
            .repos
            .trivias
            .get(trivia_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("trivia {trivia_id} not found")))?;

        if trivia.status != TriviaStatus::InProgress {
            return Err(EngineError::invalid_state(format!(
                "trivia {trivia_id} is not in progress"
            )));
        }
        if trivia.question_started_at.is_none() {
            return Err(EngineError::invalid_state("current question has no clock started"));
        }

        let binding = self
            .repos
            .trivia_questions
            .get_by_trivia_and_position(trivia_id, trivia.current_question_index)
            .await?
            .ok_or_else(|| EngineError::not_found("no question bound at the current index"))?;

        let question = self
            .repos
            .questions
            .get(binding.question_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("question {} not found", binding.question_id)))?;

        Ok((trivia, binding, question))
    }

    /// Seconds elapsed since `question_started_at`, clamped to zero and
    /// logged if negative (clock skew; §4.3 "defensive check").
    fn elapsed_seconds(question_started_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
        let raw = (now - question_started_at).num_seconds();
        if raw < 0 {
            tracing::warn!(raw_elapsed = raw, "negative elapsed time, clamping to zero (clock skew)");
            0
        } else {
            raw
        }
    }

    /// Broadcasts `current_question_updated` (§4.6) to every subscriber of
    /// `trivia_id`. The event is not addressed to one player, so
    /// `fifty_fifty_available` — which depends on a specific participation's
    /// lifeline/answer state — is always `false` here; clients needing that
    /// flag call `GetCurrentQuestion` themselves after reconnecting.
    pub(super) async fn broadcast_current_question(&self, trivia_id: TriviaId) -> EngineResult<()> {
        let (trivia, binding, question) = self.current_binding(trivia_id).await?;
        let options = self.repos.options.list_by_question(question.id).await?;
        let total_questions = self.repos.trivia_questions.count_by_trivia(trivia_id).await?;

        let now = Utc::now();
        let question_started_at = trivia.question_started_at.expect("checked in current_binding");
        let elapsed = Self::elapsed_seconds(question_started_at, now);
        let remaining = (binding.time_limit_seconds as i64 - elapsed).max(0);

        let result = CurrentQuestionResult {
            question_id: question.id,
            text: question.text,
            options: options.into_iter().map(|o| OptionView { id: o.id, text: o.text }).collect(),
            time_remaining_seconds: remaining,
            fifty_fifty_available: false,
            question_index: trivia.current_question_index,
            total_questions,
        };
        self.hub.broadcast(trivia_id, EngineEvent::CurrentQuestionUpdated(result)).await;
        Ok(())
    }

    pub async fn current_question(&self, trivia_id: TriviaId, user_id: UserId) -> EngineResult<CurrentQuestionResult> {
        let (trivia, binding, question) = self.current_binding(trivia_id).await?;
        let options = self.repos.options.list_by_question(question.id).await?;
        let total_questions = self.repos.trivia_questions.count_by_trivia(trivia_id).await?;

        let now = Utc::now();
        let question_started_at = trivia.question_started_at.expect("checked in current_binding");
        let elapsed = Self::elapsed_seconds(question_started_at, now);
        let remaining = (binding.time_limit_seconds as i64 - elapsed).max(0);

        let participation = self
            .repos
            .participations
            .get_by_trivia_and_user(trivia_id, user_id)
            .await?;
        let already_answered = match &participation {
            Some(p) => self
                .repos
                .answers
                .get_by_participation_and_trivia_question(p.id, binding.id)
                .await?
                .is_some(),
            None => false,
        };
        let fifty_fifty_available = participation
            .as_ref()
            .map(|p| !p.fifty_fifty_used && !already_answered)
            .unwrap_or(false)
            && options.len() >= 4;

        Ok(CurrentQuestionResult {
            question_id: question.id,
            text: question.text,
            options: options.into_iter().map(|o| OptionView { id: o.id, text: o.text }).collect(),
            time_remaining_seconds: remaining,
            fifty_fifty_available,
            question_index: trivia.current_question_index,
            total_questions,
        })
    }

    pub async fn submit(
        &self,
        trivia_id: TriviaId,
        user_id: UserId,
        selected_option_id: OptionId,
        answered_at: Option<DateTime<Utc>>,
    ) -> EngineResult<SubmitAnswerResult> {
        let (trivia, binding, question) = self.current_binding(trivia_id).await?;

        let participation = self
            .repos
            .participations
            .get_by_trivia_and_user(trivia_id, user_id)
            .await?
            .ok_or_else(|| EngineError::not_found("participation not found"))?;

        let option = self
            .repos
            .options
            .get(selected_option_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("option {selected_option_id} not found")))?;
        if option.question_id != question.id {
            return Err(EngineError::not_found("selected option does not belong to the current question"));
        }

        // Idempotence (§4.3): a prior answer for this (participation, trivia-question)
        // is the authoritative guard, checked before any write is attempted.
        if let Some(existing) = self
            .repos
            .answers
            .get_by_participation_and_trivia_question(participation.id, binding.id)
            .await?
        {
            return Ok(SubmitAnswerResult {
                trivia_id,
                question_id: question.id,
                selected_option_id: existing.selected_option_id,
                is_correct: existing.is_correct,
                earned_points: existing.earned_points,
                total_score: participation.score,
                time_remaining_seconds: 0,
            });
        }

        let now = answered_at.unwrap_or_else(Utc::now);
        let question_started_at = trivia.question_started_at.expect("checked in current_binding");
        let elapsed = Self::elapsed_seconds(question_started_at, now);
        let remaining = (binding.time_limit_seconds as i64 - elapsed).max(0);

        let (is_correct, earned_points) = if remaining <= 0 {
            (false, 0)
        } else if option.is_correct {
            (true, self.config.points_for(question.difficulty))
        } else {
            (false, 0)
        };

        let answer = crate::domain::Answer {
            id: crate::ids::AnswerId::new(),
            participation_id: participation.id,
            trivia_question_id: binding.id,
            selected_option_id: option.id,
            is_correct,
            earned_points,
            answered_at: now,
        };

        let created = match self.repos.answers.create(answer).await {
            Ok(created) => created,
            Err(EngineError::Conflict(_)) => {
                // Lost the race to a concurrent submit; read back the winner's answer.
                let existing = self
                    .repos
                    .answers
                    .get_by_participation_and_trivia_question(participation.id, binding.id)
                    .await?
                    .ok_or_else(|| EngineError::internal("answer conflict but no answer found on read-back"))?;
                let refreshed = self
                    .repos
                    .participations
                    .get(participation.id)
                    .await?
                    .ok_or_else(|| EngineError::not_found("participation not found"))?;
                return Ok(SubmitAnswerResult {
                    trivia_id,
                    question_id: question.id,
                    selected_option_id: existing.selected_option_id,
                    is_correct: existing.is_correct,
                    earned_points: existing.earned_points,
                    total_score: refreshed.score,
                    time_remaining_seconds: 0,
                });
            }
            Err(other) => return Err(other),
        };

        let total_score = self.repos.participations.recompute_score(trivia_id, user_id).await?;

        tracing::info!(
            %trivia_id, %user_id, is_correct, earned_points, "answer submitted"
        );

        self.broadcast_ranking(trivia_id).await?;

        Ok(SubmitAnswerResult {
            trivia_id,
            question_id: question.id,
            selected_option_id: created.selected_option_id,
            is_correct: created.is_correct,
            earned_points: created.earned_points,
            total_score,
            time_remaining_seconds: remaining,
        })
    }
}
