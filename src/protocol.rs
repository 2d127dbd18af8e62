//! Command result DTOs (§6) and the event envelope the fan-out hub (§4.6)
//! delivers to subscribers. Tagged-enum wire style, same as the reference
//! stack's `ServerMessage`.

use crate::domain::{ParticipationStatus, TriviaStatus};
use crate::ids::{OptionId, ParticipationId, QuestionId, TriviaId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinResult {
    pub trivia_id: TriviaId,
    pub participation_id: ParticipationId,
    pub participation_status: ParticipationStatus,
    pub trivia_status: TriviaStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetReadyResult {
    pub participation_id: ParticipationId,
    pub participation_status: ParticipationStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartResult {
    pub trivia_id: TriviaId,
    pub trivia_status: TriviaStatus,
    pub started_at: DateTime<Utc>,
    pub current_question_index: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvanceResult {
    pub trivia_id: TriviaId,
    pub status: TriviaStatus,
    pub current_question_index: u32,
    pub total_questions: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionView {
    pub id: OptionId,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentQuestionResult {
    pub question_id: QuestionId,
    pub text: String,
    pub options: Vec<OptionView>,
    pub time_remaining_seconds: i64,
    pub fifty_fifty_available: bool,
    pub question_index: u32,
    pub total_questions: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAnswerResult {
    pub trivia_id: TriviaId,
    pub question_id: QuestionId,
    pub selected_option_id: OptionId,
    pub is_correct: bool,
    pub earned_points: i64,
    pub total_score: i64,
    pub time_remaining_seconds: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiftyFiftyResult {
    pub allowed_options: Vec<OptionView>,
    pub fifty_fifty_used: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyRow {
    pub user_id: UserId,
    pub display_name: String,
    pub present: bool,
    pub ready: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbySnapshot {
    pub rows: Vec<LobbyRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminLobbySnapshot {
    pub rows: Vec<LobbyRow>,
    pub assigned_count: u32,
    pub present_count: u32,
    pub ready_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingRow {
    pub position: u32,
    pub user_id: UserId,
    pub user_name: String,
    pub score: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingResult {
    pub trivia_status: TriviaStatus,
    pub rows: Vec<RankingRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketResult {
    pub ticket: String,
    pub expires_in_seconds: u64,
}

/// The `status_updated` event's wire-facing state (§4.6/§6: `{state: WAITING
/// | IN_PROGRESS | FINISHED, ...}`). Distinct from the internal 4-state
/// `TriviaStatus` (§3): DRAFT and LOBBY are both pre-game waiting-room states
/// from a subscriber's point of view and collapse to a single `WAITING`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventTriviaState {
    Waiting,
    InProgress,
    Finished,
}

impl From<TriviaStatus> for EventTriviaState {
    fn from(status: TriviaStatus) -> Self {
        match status {
            TriviaStatus::Draft | TriviaStatus::Lobby => Self::Waiting,
            TriviaStatus::InProgress => Self::InProgress,
            TriviaStatus::Finished => Self::Finished,
        }
    }
}

/// Events the hub (§4.6) fans out to subscribers of a trivia.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum EngineEvent {
    LobbyUpdated(LobbySnapshot),
    AdminLobbyUpdated(AdminLobbySnapshot),
    StatusUpdated {
        state: EventTriviaState,
        current_question_index: u32,
    },
    CurrentQuestionUpdated(CurrentQuestionResult),
    RankingUpdated(RankingResult),
}

impl EngineEvent {
    /// The frame name used on the wire (`event: <name>` in the SSE format of §6).
    pub fn frame_name(&self) -> &'static str {
        match self {
            Self::LobbyUpdated(_) => "lobby_updated",
            Self::AdminLobbyUpdated(_) => "admin_lobby_updated",
            Self::StatusUpdated { .. } => "status_updated",
            Self::CurrentQuestionUpdated(_) => "current_question_updated",
            Self::RankingUpdated(_) => "ranking_updated",
        }
    }
}
