//! Persistence interfaces (§6). Plain trait abstractions; `memory.rs` ships
//! the one in-memory reference implementation this crate requires. A
//! SQL-backed implementation is a separate concern, out of scope here.

use crate::domain::{Answer, AnswerOption, Participation, Question, Trivia, TriviaQuestion, User};
use crate::error::EngineResult;
use crate::ids::{AnswerId, OptionId, ParticipationId, QuestionId, TriviaId, TriviaQuestionId, UserId};
use async_trait::async_trait;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get(&self, id: UserId) -> EngineResult<Option<User>>;
    async fn create(&self, user: User) -> EngineResult<User>;
}

#[async_trait]
pub trait TriviaRepository: Send + Sync {
    async fn get(&self, id: TriviaId) -> EngineResult<Option<Trivia>>;
    async fn create(&self, trivia: Trivia) -> EngineResult<Trivia>;
    /// Optimistic compare-and-swap on `trivia.version` (§4.1 "Concurrent
    /// Start attempts must be linearized"; §5). Implementations must reject
    /// with `Conflict` when the stored row's version no longer matches the
    /// version carried on `trivia` (i.e. someone else updated it since it was
    /// read), rather than unconditionally overwriting. On success the
    /// returned `Trivia` carries the bumped version.
    async fn update(&self, trivia: Trivia) -> EngineResult<Trivia>;
}

#[async_trait]
pub trait QuestionRepository: Send + Sync {
    async fn get(&self, id: QuestionId) -> EngineResult<Option<Question>>;
    async fn create(&self, question: Question) -> EngineResult<Question>;
}

#[async_trait]
pub trait OptionRepository: Send + Sync {
    async fn get(&self, id: OptionId) -> EngineResult<Option<AnswerOption>>;
    async fn list_by_question(&self, question_id: QuestionId) -> EngineResult<Vec<AnswerOption>>;
    async fn create(&self, option: AnswerOption) -> EngineResult<AnswerOption>;
}

#[async_trait]
pub trait TriviaQuestionRepository: Send + Sync {
    async fn get(&self, id: TriviaQuestionId) -> EngineResult<Option<TriviaQuestion>>;
    async fn create(&self, binding: TriviaQuestion) -> EngineResult<TriviaQuestion>;
    async fn count_by_trivia(&self, trivia_id: TriviaId) -> EngineResult<u32>;
    async fn get_by_trivia_and_position(
        &self,
        trivia_id: TriviaId,
        position: u32,
    ) -> EngineResult<Option<TriviaQuestion>>;
}

#[async_trait]
pub trait ParticipationRepository: Send + Sync {
    async fn get(&self, id: ParticipationId) -> EngineResult<Option<Participation>>;
    async fn get_by_trivia_and_user(
        &self,
        trivia_id: TriviaId,
        user_id: UserId,
    ) -> EngineResult<Option<Participation>>;
    async fn create(&self, participation: Participation) -> EngineResult<Participation>;
    async fn update(&self, participation: Participation) -> EngineResult<Participation>;
    /// Ordered by score descending; ties keep insertion/storage order.
    async fn list_by_trivia(&self, trivia_id: TriviaId) -> EngineResult<Vec<Participation>>;
    /// `recompute-score` (§6): derive `(trivia_id, user_id)`'s participation
    /// score as `COALESCE(SUM(earned_points), 0)` over its answer log,
    /// persist it, and return the new score. The canonical scoring rule —
    /// scores are never incremented in place.
    async fn recompute_score(&self, trivia_id: TriviaId, user_id: UserId) -> EngineResult<i64>;
    /// `recompute-scores-for-trivia` (§6): apply `recompute_score` to every
    /// participation of a trivia. Called before any ranking read (§4.5).
    async fn recompute_scores_for_trivia(&self, trivia_id: TriviaId) -> EngineResult<()>;
}

#[async_trait]
pub trait AnswerRepository: Send + Sync {
    async fn get_by_participation_and_trivia_question(
        &self,
        participation_id: ParticipationId,
        trivia_question_id: TriviaQuestionId,
    ) -> EngineResult<Option<Answer>>;
    async fn create(&self, answer: Answer) -> EngineResult<Answer>;
    async fn list_by_participation(&self, participation_id: ParticipationId) -> EngineResult<Vec<Answer>>;
    /// Deletes every answer belonging to participations of this trivia. Part of Reset (§4.1).
    async fn delete_by_trivia(&self, trivia_id: TriviaId) -> EngineResult<()>;
}

/// Bundles one implementation of each port. Command handlers take `&Repositories`
/// rather than six separate parameters, mirroring how the reference stack's
/// handlers take a single `AppState`.
pub struct Repositories {
    pub users: Box<dyn UserRepository>,
    pub trivias: Box<dyn TriviaRepository>,
    pub questions: Box<dyn QuestionRepository>,
    pub options: Box<dyn OptionRepository>,
    pub trivia_questions: Box<dyn TriviaQuestionRepository>,
    pub participations: Box<dyn ParticipationRepository>,
    pub answers: Box<dyn AnswerRepository>,
}
