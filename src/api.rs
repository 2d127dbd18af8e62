//! The minimal command-surface transport (§10.5): one JSON HTTP route per
//! command in §6, plus the server-sent-events subscription route that
//! implements §4.6's wire format. Intentionally thin — request validation,
//! auth, and full REST resource modeling stay out of scope per §1.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};

use crate::engine::Engine;
use crate::error::EngineError;
use crate::ids::{OptionId, QuestionId, TriviaId, UserId};

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = axum::http::StatusCode::from_u16(self.status_code()).unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            error: status.canonical_reason().unwrap_or("error").to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

type ApiResult<T> = Result<Json<T>, EngineError>;

#[derive(Debug, Deserialize)]
pub struct UserIdBody {
    pub user_id: UserId,
}

pub async fn join(
    State(engine): State<Engine>,
    Path(trivia_id): Path<TriviaId>,
    Json(body): Json<UserIdBody>,
) -> ApiResult<crate::protocol::JoinResult> {
    Ok(Json(engine.join(trivia_id, body.user_id).await?))
}

pub async fn set_ready(
    State(engine): State<Engine>,
    Path(trivia_id): Path<TriviaId>,
    Json(body): Json<UserIdBody>,
) -> ApiResult<crate::protocol::SetReadyResult> {
    Ok(Json(engine.set_ready(trivia_id, body.user_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct AdminUserIdBody {
    pub admin_user_id: UserId,
}

pub async fn start(
    State(engine): State<Engine>,
    Path(trivia_id): Path<TriviaId>,
    Json(body): Json<AdminUserIdBody>,
) -> ApiResult<crate::protocol::StartResult> {
    Ok(Json(engine.start(trivia_id, body.admin_user_id).await?))
}

pub async fn advance(
    State(engine): State<Engine>,
    Path(trivia_id): Path<TriviaId>,
    Json(body): Json<AdminUserIdBody>,
) -> ApiResult<crate::protocol::AdvanceResult> {
    Ok(Json(engine.advance(trivia_id, body.admin_user_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct CurrentQuestionQuery {
    pub user_id: UserId,
}

pub async fn current_question(
    State(engine): State<Engine>,
    Path(trivia_id): Path<TriviaId>,
    Query(query): Query<CurrentQuestionQuery>,
) -> ApiResult<crate::protocol::CurrentQuestionResult> {
    Ok(Json(engine.current_question(trivia_id, query.user_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct SubmitAnswerBody {
    pub user_id: UserId,
    pub selected_option_id: OptionId,
    pub answered_at: Option<DateTime<Utc>>,
}

pub async fn submit_answer(
    State(engine): State<Engine>,
    Path(trivia_id): Path<TriviaId>,
    Json(body): Json<SubmitAnswerBody>,
) -> ApiResult<crate::protocol::SubmitAnswerResult> {
    Ok(Json(
        engine
            .submit(trivia_id, body.user_id, body.selected_option_id, body.answered_at)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct UseFiftyFiftyBody {
    pub question_id: QuestionId,
    pub user_id: UserId,
}

pub async fn use_fifty_fifty(
    State(engine): State<Engine>,
    Path(trivia_id): Path<TriviaId>,
    Json(body): Json<UseFiftyFiftyBody>,
) -> ApiResult<crate::protocol::FiftyFiftyResult> {
    Ok(Json(
        engine.use_fifty_fifty(trivia_id, body.question_id, body.user_id).await?,
    ))
}

pub async fn heartbeat(
    State(engine): State<Engine>,
    Path(trivia_id): Path<TriviaId>,
    Json(body): Json<UserIdBody>,
) -> Result<axum::http::StatusCode, EngineError> {
    engine.heartbeat(trivia_id, body.user_id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

pub async fn lobby(
    State(engine): State<Engine>,
    Path(trivia_id): Path<TriviaId>,
) -> ApiResult<crate::protocol::LobbySnapshot> {
    Ok(Json(engine.lobby(trivia_id).await?))
}

pub async fn admin_lobby(
    State(engine): State<Engine>,
    Path(trivia_id): Path<TriviaId>,
) -> ApiResult<crate::protocol::AdminLobbySnapshot> {
    Ok(Json(engine.admin_lobby(trivia_id).await?))
}

pub async fn ranking(
    State(engine): State<Engine>,
    Path(trivia_id): Path<TriviaId>,
) -> ApiResult<crate::protocol::RankingResult> {
    Ok(Json(engine.ranking(trivia_id).await?))
}

pub async fn reset(
    State(engine): State<Engine>,
    Path(trivia_id): Path<TriviaId>,
) -> Result<axum::http::StatusCode, EngineError> {
    engine.reset(trivia_id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct CreateTicketBody {
    pub user_id: Option<UserId>,
}

pub async fn create_ticket(
    State(engine): State<Engine>,
    Path(trivia_id): Path<TriviaId>,
    Json(body): Json<CreateTicketBody>,
) -> ApiResult<crate::protocol::TicketResult> {
    let ttl = engine.config().ticket_ttl;
    let ticket = engine.hub().create_ticket(trivia_id, body.user_id, ttl).await;
    Ok(Json(crate::protocol::TicketResult {
        ticket,
        expires_in_seconds: ttl.as_secs(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct SubscribeQuery {
    pub ticket: String,
}

/// `GET /trivias/:id/events`: validates the ticket against `trivia_id`, then
/// streams every `EngineEvent` published to that trivia as an SSE frame
/// (`event: <type>` / `data: <json>`), with a synthetic keepalive comment
/// every 30s of silence per §4.6.
pub async fn subscribe_events(
    State(engine): State<Engine>,
    Path(trivia_id): Path<TriviaId>,
    Query(query): Query<SubscribeQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, EngineError> {
    let (ticket_trivia, _user_id) = engine
        .hub()
        .validate_ticket(&query.ticket)
        .await
        .ok_or_else(|| EngineError::forbidden("invalid or expired ticket"))?;
    if ticket_trivia != trivia_id {
        return Err(EngineError::forbidden("ticket is not valid for this trivia"));
    }

    let receiver = engine.hub().subscribe(trivia_id).await;
    let events = stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let frame = Event::default()
                        .event(event.frame_name())
                        .json_data(&event)
                        .unwrap_or_else(|_| Event::default().event("error").data("serialization failed"));
                    return Some((Ok(frame), receiver));
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return None,
            }
        }
    });

    Ok(Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    ))
}
