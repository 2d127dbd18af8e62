//! Entities of the data model: users, trivias, questions, options, the
//! trivia-question binding, participations, and answers.

use crate::ids::{AnswerId, OptionId, ParticipationId, QuestionId, TriviaId, TriviaQuestionId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Player,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    pub email: String,
    pub password_digest: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriviaStatus {
    Draft,
    Lobby,
    InProgress,
    Finished,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trivia {
    pub id: TriviaId,
    pub title: String,
    pub description: String,
    pub creator_user_id: UserId,
    pub status: TriviaStatus,
    pub current_question_index: u32,
    pub question_started_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Optimistic-concurrency version (§4.1, §5): bumped on every successful
    /// `TriviaRepository::update`. A caller's `update` is rejected with
    /// `Conflict` unless the version it read is still current, so two
    /// concurrent read-then-write commands (e.g. two `Start` calls) cannot
    /// both commit.
    pub version: u64,
}

impl Trivia {
    pub fn new(title: String, description: String, creator_user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: TriviaId::new(),
            title,
            description,
            creator_user_id,
            status: TriviaStatus::Draft,
            current_question_index: 0,
            question_started_at: None,
            created_at: now,
            started_at: None,
            finished_at: None,
            version: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    pub difficulty: Difficulty,
    pub creator_user_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: OptionId,
    pub question_id: QuestionId,
    pub text: String,
    pub is_correct: bool,
}

/// The ordered attachment of a `Question` to a `Trivia`, with its own time limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriviaQuestion {
    pub id: TriviaQuestionId,
    pub trivia_id: TriviaId,
    pub question_id: QuestionId,
    pub position: u32,
    pub time_limit_seconds: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParticipationStatus {
    Invited,
    Joined,
    Ready,
    Finished,
    Disconnected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participation {
    pub id: ParticipationId,
    pub trivia_id: TriviaId,
    pub user_id: UserId,
    pub status: ParticipationStatus,
    pub score: i64,
    pub joined_at: Option<DateTime<Utc>>,
    pub ready_at: Option<DateTime<Utc>>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub fifty_fifty_used: bool,
    pub fifty_fifty_question_id: Option<QuestionId>,
}

impl Participation {
    pub fn invited(trivia_id: TriviaId, user_id: UserId) -> Self {
        Self {
            id: ParticipationId::new(),
            trivia_id,
            user_id,
            status: ParticipationStatus::Invited,
            score: 0,
            joined_at: None,
            ready_at: None,
            last_seen_at: None,
            finished_at: None,
            fifty_fifty_used: false,
            fifty_fifty_question_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub id: AnswerId,
    pub participation_id: ParticipationId,
    pub trivia_question_id: TriviaQuestionId,
    pub selected_option_id: OptionId,
    pub is_correct: bool,
    pub earned_points: i64,
    pub answered_at: DateTime<Utc>,
}
