mod api;
mod config;
mod domain;
mod engine;
mod error;
mod hub;
mod ids;
mod protocol;
mod repo;
mod score;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::hub::Hub;
use crate::repo::MemoryStore;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| EngineConfig::log_filter().into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = EngineConfig::from_env();
    tracing::info!("starting trivia engine...");

    let bind_addr = config.bind_addr;
    let sweep_interval = config.ticket_sweep_interval;

    let hub = Hub::new();
    hub::spawn_ticket_sweep(hub.clone(), sweep_interval);

    let engine = Engine::new(MemoryStore::new().into_repositories(), hub, config);

    let app = Router::new()
        .route("/trivias/{id}/join", post(api::join))
        .route("/trivias/{id}/ready", post(api::set_ready))
        .route("/trivias/{id}/start", post(api::start))
        .route("/trivias/{id}/advance", post(api::advance))
        .route("/trivias/{id}/current_question", get(api::current_question))
        .route("/trivias/{id}/submit", post(api::submit_answer))
        .route("/trivias/{id}/fifty_fifty", post(api::use_fifty_fifty))
        .route("/trivias/{id}/heartbeat", post(api::heartbeat))
        .route("/trivias/{id}/lobby", get(api::lobby))
        .route("/trivias/{id}/admin_lobby", get(api::admin_lobby))
        .route("/trivias/{id}/ranking", get(api::ranking))
        .route("/trivias/{id}/reset", post(api::reset))
        .route("/trivias/{id}/ticket", post(api::create_ticket))
        .route("/trivias/{id}/events", get(api::subscribe_events))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(engine);

    tracing::info!("listening on http://{bind_addr}");
    let listener = tokio::net::TcpListener::bind(bind_addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
