//! The in-memory reference adapter (§10.2): one `RwLock<HashMap<_, _>>` per
//! entity, guarded independently so unrelated entities don't contend, the
//! same shape as the reference stack's `AppState`.

use crate::domain::{Answer, AnswerOption, Participation, Question, Trivia, TriviaQuestion, User};
use crate::error::{EngineError, EngineResult};
use crate::ids::{AnswerId, OptionId, ParticipationId, QuestionId, TriviaId, TriviaQuestionId, UserId};
use crate::repo::traits::{
    AnswerRepository, OptionRepository, ParticipationRepository, QuestionRepository, Repositories,
    TriviaQuestionRepository, TriviaRepository, UserRepository,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default, Clone)]
pub struct MemoryStore {
    users: Arc<RwLock<HashMap<UserId, User>>>,
    trivias: Arc<RwLock<HashMap<TriviaId, Trivia>>>,
    questions: Arc<RwLock<HashMap<QuestionId, Question>>>,
    options: Arc<RwLock<HashMap<OptionId, AnswerOption>>>,
    trivia_questions: Arc<RwLock<HashMap<TriviaQuestionId, TriviaQuestion>>>,
    participations: Arc<RwLock<HashMap<ParticipationId, Participation>>>,
    answers: Arc<RwLock<HashMap<AnswerId, Answer>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a `Repositories` bundle where every port is backed by this store.
    pub fn into_repositories(self) -> Repositories {
        Repositories {
            users: Box::new(self.clone()),
            trivias: Box::new(self.clone()),
            questions: Box::new(self.clone()),
            options: Box::new(self.clone()),
            trivia_questions: Box::new(self.clone()),
            participations: Box::new(self.clone()),
            answers: Box::new(self),
        }
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn get(&self, id: UserId) -> EngineResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn create(&self, user: User) -> EngineResult<User> {
        self.users.write().await.insert(user.id, user.clone());
        Ok(user)
    }
}

#[async_trait]
impl TriviaRepository for MemoryStore {
    async fn get(&self, id: TriviaId) -> EngineResult<Option<Trivia>> {
        Ok(self.trivias.read().await.get(&id).cloned())
    }

    async fn create(&self, trivia: Trivia) -> EngineResult<Trivia> {
        self.trivias.write().await.insert(trivia.id, trivia.clone());
        Ok(trivia)
    }

    async fn update(&self, trivia: Trivia) -> EngineResult<Trivia> {
        let mut trivias = self.trivias.write().await;
        let stored = trivias
            .get(&trivia.id)
            .ok_or_else(|| EngineError::not_found(format!("trivia {} not found", trivia.id)))?;
        if stored.version != trivia.version {
            return Err(EngineError::conflict(format!(
                "trivia {} was modified concurrently (expected version {}, stored version {})",
                trivia.id, trivia.version, stored.version
            )));
        }
        let mut updated = trivia;
        updated.version += 1;
        trivias.insert(updated.id, updated.clone());
        Ok(updated)
    }
}

#[async_trait]
impl QuestionRepository for MemoryStore {
    async fn get(&self, id: QuestionId) -> EngineResult<Option<Question>> {
        Ok(self.questions.read().await.get(&id).cloned())
    }

    async fn create(&self, question: Question) -> EngineResult<Question> {
        self.questions.write().await.insert(question.id, question.clone());
        Ok(question)
    }
}

#[async_trait]
impl OptionRepository for MemoryStore {
    async fn get(&self, id: OptionId) -> EngineResult<Option<AnswerOption>> {
        Ok(self.options.read().await.get(&id).cloned())
    }

    async fn list_by_question(&self, question_id: QuestionId) -> EngineResult<Vec<AnswerOption>> {
        Ok(self
            .options
            .read()
            .await
            .values()
            .filter(|o| o.question_id == question_id)
            .cloned()
            .collect())
    }

    async fn create(&self, option: AnswerOption) -> EngineResult<AnswerOption> {
        self.options.write().await.insert(option.id, option.clone());
        Ok(option)
    }
}

#[async_trait]
impl TriviaQuestionRepository for MemoryStore {
    async fn get(&self, id: TriviaQuestionId) -> EngineResult<Option<TriviaQuestion>> {
        Ok(self.trivia_questions.read().await.get(&id).cloned())
    }

    async fn create(&self, binding: TriviaQuestion) -> EngineResult<TriviaQuestion> {
        self.trivia_questions.write().await.insert(binding.id, binding.clone());
        Ok(binding)
    }

    async fn count_by_trivia(&self, trivia_id: TriviaId) -> EngineResult<u32> {
        Ok(self
            .trivia_questions
            .read()
            .await
            .values()
            .filter(|tq| tq.trivia_id == trivia_id)
            .count() as u32)
    }

    async fn get_by_trivia_and_position(
        &self,
        trivia_id: TriviaId,
        position: u32,
    ) -> EngineResult<Option<TriviaQuestion>> {
        Ok(self
            .trivia_questions
            .read()
            .await
            .values()
            .find(|tq| tq.trivia_id == trivia_id && tq.position == position)
            .cloned())
    }
}

#[async_trait]
impl ParticipationRepository for MemoryStore {
    async fn get(&self, id: ParticipationId) -> EngineResult<Option<Participation>> {
        Ok(self.participations.read().await.get(&id).cloned())
    }

    async fn get_by_trivia_and_user(
        &self,
        trivia_id: TriviaId,
        user_id: UserId,
    ) -> EngineResult<Option<Participation>> {
        Ok(self
            .participations
            .read()
            .await
            .values()
            .find(|p| p.trivia_id == trivia_id && p.user_id == user_id)
            .cloned())
    }

    async fn create(&self, participation: Participation) -> EngineResult<Participation> {
        let mut participations = self.participations.write().await;
        let clash = participations
            .values()
            .any(|p| p.trivia_id == participation.trivia_id && p.user_id == participation.user_id);
        if clash {
            return Err(EngineError::conflict(format!(
                "participation already exists for trivia {} and user {}",
                participation.trivia_id, participation.user_id
            )));
        }
        participations.insert(participation.id, participation.clone());
        Ok(participation)
    }

    async fn update(&self, participation: Participation) -> EngineResult<Participation> {
        let mut participations = self.participations.write().await;
        if !participations.contains_key(&participation.id) {
            return Err(EngineError::not_found(format!(
                "participation {} not found",
                participation.id
            )));
        }
        participations.insert(participation.id, participation.clone());
        Ok(participation)
    }

    async fn list_by_trivia(&self, trivia_id: TriviaId) -> EngineResult<Vec<Participation>> {
        let mut rows: Vec<Participation> = self
            .participations
            .read()
            .await
            .values()
            .filter(|p| p.trivia_id == trivia_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.score.cmp(&a.score));
        Ok(rows)
    }

    async fn recompute_score(&self, trivia_id: TriviaId, user_id: UserId) -> EngineResult<i64> {
        let participation_id = {
            let participations = self.participations.read().await;
            participations
                .values()
                .find(|p| p.trivia_id == trivia_id && p.user_id == user_id)
                .map(|p| p.id)
                .ok_or_else(|| {
                    EngineError::not_found(format!(
                        "participation for trivia {trivia_id} and user {user_id} not found"
                    ))
                })?
        };

        let total: i64 = {
            let answers = self.answers.read().await;
            answers
                .values()
                .filter(|a| a.participation_id == participation_id)
                .map(|a| a.earned_points)
                .sum()
        };

        let mut participations = self.participations.write().await;
        let participation = participations
            .get_mut(&participation_id)
            .ok_or_else(|| EngineError::not_found(format!("participation {participation_id} not found")))?;
        participation.score = total;
        Ok(total)
    }

    async fn recompute_scores_for_trivia(&self, trivia_id: TriviaId) -> EngineResult<()> {
        let user_ids: Vec<UserId> = {
            let participations = self.participations.read().await;
            participations
                .values()
                .filter(|p| p.trivia_id == trivia_id)
                .map(|p| p.user_id)
                .collect()
        };
        for user_id in user_ids {
            self.recompute_score(trivia_id, user_id).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl AnswerRepository for MemoryStore {
    async fn get_by_participation_and_trivia_question(
        &self,
        participation_id: ParticipationId,
        trivia_question_id: TriviaQuestionId,
    ) -> EngineResult<Option<Answer>> {
        Ok(self
            .answers
            .read()
            .await
            .values()
            .find(|a| a.participation_id == participation_id && a.trivia_question_id == trivia_question_id)
            .cloned())
    }

    async fn create(&self, answer: Answer) -> EngineResult<Answer> {
        let mut answers = self.answers.write().await;
        let clash = answers.values().any(|a| {
            a.participation_id == answer.participation_id
                && a.trivia_question_id == answer.trivia_question_id
        });
        if clash {
            return Err(EngineError::conflict(
                "answer already submitted for this question",
            ));
        }
        answers.insert(answer.id, answer.clone());
        Ok(answer)
    }

    async fn list_by_participation(&self, participation_id: ParticipationId) -> EngineResult<Vec<Answer>> {
        Ok(self
            .answers
            .read()
            .await
            .values()
            .filter(|a| a.participation_id == participation_id)
            .cloned()
            .collect())
    }

    async fn delete_by_trivia(&self, trivia_id: TriviaId) -> EngineResult<()> {
        let participation_ids: Vec<ParticipationId> = self
            .participations
            .read()
            .await
            .values()
            .filter(|p| p.trivia_id == trivia_id)
            .map(|p| p.id)
            .collect();
        self.answers
            .write()
            .await
            .retain(|_, a| !participation_ids.contains(&a.participation_id));
        Ok(())
    }
}
