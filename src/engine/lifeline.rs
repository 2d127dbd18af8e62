//! The 50/50 lifeline (§4.4).
//!
//! No counterpart in the reference stack (it has no lifeline mechanic); this
//! module follows `original_source`'s `use_fifty_fifty_lifeline` use case
//! precondition-by-precondition, expressed with `rand` in place of Python's
//! `random.choice`/`random.shuffle`.

use super::Engine;
use crate::domain::TriviaStatus;
use crate::error::{EngineError, EngineResult};
use crate::ids::{QuestionId, TriviaId, UserId};
use crate::protocol::{FiftyFiftyResult, OptionView};
use rand::seq::SliceRandom;

impl Engine {
    pub async fn use_fifty_fifty(
        &self,
        trivia_id: TriviaId,
        question_id: QuestionId,
        user_id: UserId,
    ) -> EngineResult<FiftyFiftyResult> {
        let trivia = self
            .repos
            .trivias
            .get(trivia_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("trivia {trivia_id} not found")))?;

        if trivia.status != TriviaStatus::InProgress {
            return Err(EngineError::invalid_state(format!(
                "cannot use lifeline when trivia is in status {:?}",
                trivia.status
            )));
        }

        let participation = self
            .repos
            .participations
            .get_by_trivia_and_user(trivia_id, user_id)
            .await?
            .ok_or_else(|| EngineError::not_found("participation not found"))?;

        if participation.fifty_fifty_used {
            return Err(EngineError::conflict("50/50 lifeline has already been used for this trivia"));
        }

        self.repos
            .questions
            .get(question_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("question {question_id} not found")))?;

        let binding = self
            .repos
            .trivia_questions
            .get_by_trivia_and_position(trivia_id, trivia.current_question_index)
            .await?
            .ok_or_else(|| EngineError::not_found("no question bound at the current index"))?;

        if binding.question_id != question_id {
            return Err(EngineError::invalid_state(format!(
                "question {question_id} is not the current question"
            )));
        }

        if self
            .repos
            .answers
            .get_by_participation_and_trivia_question(participation.id, binding.id)
            .await?
            .is_some()
        {
            return Err(EngineError::invalid_state("cannot use lifeline on an already answered question"));
        }

        let options = self.repos.options.list_by_question(question_id).await?;
        if options.len() < 4 {
            return Err(EngineError::invalid_state("question must have at least 4 options to use 50/50"));
        }

        let correct = options
            .iter()
            .find(|o| o.is_correct)
            .ok_or_else(|| EngineError::invalid_state("question must have exactly one correct option"))?
            .clone();
        let incorrect: Vec<_> = options.into_iter().filter(|o| !o.is_correct).collect();
        if incorrect.is_empty() {
            return Err(EngineError::invalid_state("question must have at least one incorrect option"));
        }

        let chosen_incorrect = incorrect
            .choose(&mut rand::rng())
            .expect("non-empty, checked above")
            .clone();

        let mut allowed = vec![correct, chosen_incorrect];
        allowed.shuffle(&mut rand::rng());

        let mut participation = participation;
        participation.fifty_fifty_used = true;
        participation.fifty_fifty_question_id = Some(question_id);
        self.repos.participations.update(participation).await?;

        tracing::info!(%trivia_id, %user_id, %question_id, "50/50 lifeline used");

        Ok(FiftyFiftyResult {
            allowed_options: allowed.into_iter().map(|o| OptionView { id: o.id, text: o.text }).collect(),
            fifty_fifty_used: true,
        })
    }
}
