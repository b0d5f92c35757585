//! Monggle HTTP API
//!
//! Axum-based HTTP server exposing the interpret boundary and the in-memory
//! journal, routines, reports and chat.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to an
//! inner function returning `(StatusCode, serde_json::Value)`. The inner
//! functions are directly testable without axum dispatch machinery.
//!
//! Endpoints:
//! - GET  /health, GET /version
//! - POST /api/interpret                   — nightmare interpretation (POST only)
//! - GET|POST /api/records                 — list / upsert sleep records
//! - GET  /api/records/latest
//! - GET  /api/records/by-date/:date
//! - GET  /api/analytics?period=&anchor=
//! - GET|POST /api/routines                — list / add custom routine
//! - GET  /api/routines/recommendations
//! - POST /api/routines/recommended        — add from the recommendation list
//! - GET|PUT /api/routines/goal
//! - POST /api/routines/:id/toggle
//! - DELETE /api/routines/:id
//! - GET|POST /api/chat                    — hosted chat session

use std::sync::Arc;

use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use monggle_core::analytics::{self, Period};
use monggle_core::models::{Recommendation, DATE_FORMAT, RECOMMENDED_ROUTINES};
use monggle_core::wire::{ErrorBody, InterpretRequest};
use monggle_core::{
    ChatError, InterpretPrompt, MonggleError, NewRecord, RecommendationOutcome, SleepGoal,
    FALLBACK_TEXT,
};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::state::AppState;

/// Returned by `/api/interpret` when the provider fails; details stay in the log.
pub const UPSTREAM_FAILURE_MESSAGE: &str = "Something went wrong while interpreting the dream.";

type Reply = (StatusCode, serde_json::Value);

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route(
            "/api/interpret",
            post(interpret_handler).fallback(method_not_allowed_handler),
        )
        .route("/api/records", get(list_records_handler).post(upsert_record_handler))
        .route("/api/records/latest", get(latest_record_handler))
        .route("/api/records/by-date/:date", get(record_by_date_handler))
        .route("/api/analytics", get(analytics_handler))
        .route("/api/routines", get(list_routines_handler).post(add_routine_handler))
        .route("/api/routines/recommendations", get(recommendations_handler))
        .route("/api/routines/recommended", post(add_recommended_handler))
        .route("/api/routines/goal", get(goal_handler).put(set_goal_handler))
        .route("/api/routines/:id/toggle", post(toggle_routine_handler))
        .route("/api/routines/:id", delete(remove_routine_handler))
        .route("/api/chat", get(chat_transcript_handler).post(chat_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(state: Arc<AppState>, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
    let addr = format!("{}:{}", state.config.http.host, state.config.http.port);

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Monggle HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct AnalyticsQuery {
    pub period: Option<String>,
    pub anchor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CustomRoutineRequest {
    pub name: String,
    pub icon: Option<String>,
    pub time: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecommendedRoutineRequest {
    pub name: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct ChatRequest {
    pub text: Option<String>,
}

fn error(status: StatusCode, msg: impl Into<String>) -> Reply {
    (status, json!(ErrorBody::new(msg)))
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

pub async fn health_inner(state: &AppState) -> Reply {
    let records = state.records.read().await.len();
    let routines = state.routines.read().await.all().len();
    (
        StatusCode::OK,
        json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "generator": state.generator.name(),
            "records": records,
            "routines": routines,
        }),
    )
}

/// Inner version — returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "monggle/1",
    })
}

/// Validate the request, build the prompt, call the provider once.
pub async fn interpret_inner(state: &AppState, req: InterpretRequest) -> Reply {
    let text = match req.nightmare_text {
        Some(t) if !t.trim().is_empty() => t,
        _ => return error(StatusCode::BAD_REQUEST, "nightmareText is required"),
    };

    let prompt = InterpretPrompt::new(&text).with_temperature(state.config.generation.temperature);

    match state.generator.generate(&prompt).await {
        Ok(reply) => (StatusCode::OK, json!({ "text": reply })),
        Err(e) => {
            tracing::error!(backend = state.generator.name(), error = %e, "Interpretation upstream error");
            error(StatusCode::INTERNAL_SERVER_ERROR, UPSTREAM_FAILURE_MESSAGE)
        }
    }
}

pub async fn list_records_inner(state: &AppState) -> Reply {
    let records = state.records.read().await;
    (
        StatusCode::OK,
        json!({
            "records": records.all(),
            "count": records.len(),
        }),
    )
}

pub async fn upsert_record_inner(state: &AppState, draft: NewRecord) -> Reply {
    let record = match draft.into_record() {
        Ok(r) => r,
        Err(e) => return error(StatusCode::BAD_REQUEST, MonggleError::from(e).to_string()),
    };

    let mut records = state.records.write().await;
    let replaced = records.upsert(record.clone());
    tracing::info!(id = %record.id, date = %record.date, replaced, "Sleep record saved");

    (
        StatusCode::OK,
        json!({
            "record": record,
            "replaced": replaced,
            "count": records.len(),
        }),
    )
}

pub async fn latest_record_inner(state: &AppState) -> Reply {
    match state.records.read().await.latest() {
        Some(record) => (StatusCode::OK, json!({ "record": record })),
        None => error(StatusCode::NOT_FOUND, "no records yet"),
    }
}

pub async fn record_by_date_inner(state: &AppState, date: &str) -> Reply {
    let records = state.records.read().await;
    match records.find_by_date(date) {
        Some(record) => (
            StatusCode::OK,
            json!({
                "record": record,
                "shadowed": records.find_all_by_date(date).len() - 1,
            }),
        ),
        None => error(StatusCode::NOT_FOUND, format!("no record for {date}")),
    }
}

pub async fn analytics_inner(state: &AppState, query: AnalyticsQuery) -> Reply {
    let period = match query.period.as_deref() {
        None => Period::default(),
        Some(p) => match p.parse::<Period>() {
            Ok(p) => p,
            Err(e) => return error(StatusCode::BAD_REQUEST, e),
        },
    };
    let anchor = match query.anchor.as_deref() {
        None => None,
        Some(a) => match NaiveDate::parse_from_str(a, DATE_FORMAT) {
            Ok(d) => Some(d),
            Err(_) => return error(StatusCode::BAD_REQUEST, format!("anchor must be YYYY-MM-DD, got {a:?}")),
        },
    };

    // Snapshot both stores before aggregating.
    let records = state.records.read().await.all().to_vec();
    let goal = state.routines.read().await.goal().clone();

    let report = analytics::summarize(&records, period, anchor, &goal);
    (StatusCode::OK, json!(report))
}

pub async fn list_routines_inner(state: &AppState) -> Reply {
    let routines = state.routines.read().await;
    (
        StatusCode::OK,
        json!({
            "routines": routines.all(),
            "goal": routines.goal(),
        }),
    )
}

pub async fn add_routine_inner(state: &AppState, req: CustomRoutineRequest) -> Reply {
    let mut routines = state.routines.write().await;
    match routines.add_custom(&req.name, req.icon.as_deref(), req.time.as_deref()) {
        Ok(item) => (StatusCode::OK, json!({ "routine": item })),
        Err(e) => error(StatusCode::BAD_REQUEST, MonggleError::from(e).to_string()),
    }
}

pub fn recommendations_inner() -> Reply {
    (StatusCode::OK, json!({ "recommendations": RECOMMENDED_ROUTINES }))
}

pub async fn add_recommended_inner(state: &AppState, req: RecommendedRoutineRequest) -> Reply {
    let Some(rec) = Recommendation::find(&req.name) else {
        return error(StatusCode::NOT_FOUND, format!("unknown recommendation {:?}", req.name));
    };
    match state.routines.write().await.add_from_recommendation(rec) {
        RecommendationOutcome::Added(item) => (StatusCode::OK, json!({ "routine": item })),
        RecommendationOutcome::Duplicate => error(StatusCode::CONFLICT, "This routine is already added"),
    }
}

pub async fn toggle_routine_inner(state: &AppState, id: &str) -> Reply {
    match state.routines.write().await.toggle(id) {
        Some(enabled) => (StatusCode::OK, json!({ "id": id, "enabled": enabled })),
        None => error(StatusCode::NOT_FOUND, format!("no routine {id}")),
    }
}

pub async fn remove_routine_inner(state: &AppState, id: &str) -> Reply {
    match state.routines.write().await.remove(id) {
        Some(item) => (StatusCode::OK, json!({ "removed": item })),
        None => error(StatusCode::NOT_FOUND, format!("no routine {id}")),
    }
}

pub async fn set_goal_inner(state: &AppState, goal: SleepGoal) -> Reply {
    let mut routines = state.routines.write().await;
    match routines.set_goal(goal) {
        Ok(()) => (StatusCode::OK, json!({ "goal": routines.goal() })),
        Err(e) => error(StatusCode::BAD_REQUEST, MonggleError::from(e).to_string()),
    }
}

pub async fn chat_transcript_inner(state: &AppState) -> Reply {
    let session = state.chat.lock().await;
    (
        StatusCode::OK,
        json!({
            "state": session.state(),
            "messages": session.transcript(),
        }),
    )
}

/// One chat turn. The user message lands immediately; the reply is produced
/// on a spawned task so a dropped connection cannot strand the session.
pub async fn chat_inner(state: Arc<AppState>, req: ChatRequest) -> Reply {
    let text = req.text.unwrap_or_default();
    let (turn, user_message) = {
        let mut session = state.chat.lock().await;
        match session.begin_turn(&text) {
            Ok(turn) => {
                let user_message = session.transcript().last().cloned();
                (turn, user_message)
            }
            Err(ChatError::RequestInFlight) => {
                return error(StatusCode::CONFLICT, "A reply is still on its way");
            }
            Err(e) => return error(StatusCode::BAD_REQUEST, e.to_string()),
        }
    };

    let task_state = state.clone();
    let task = tokio::spawn(async move {
        let reply = task_state
            .interpreter
            .interpret(turn.text())
            .await
            .into_text()
            .unwrap_or_else(|| FALLBACK_TEXT.to_string());
        let mut session = task_state.chat.lock().await;
        let reply = session.complete_turn(turn, reply).cloned();
        reply
    });

    match task.await {
        Ok(Ok(reply)) => (
            StatusCode::OK,
            json!({
                "message": user_message,
                "reply": reply,
                "state": state.chat.lock().await.state(),
            }),
        ),
        Ok(Err(e)) => error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        Err(e) => {
            tracing::error!(error = %e, "Chat turn task failed");
            error(StatusCode::INTERNAL_SERVER_ERROR, "chat turn failed")
        }
    }
}

// ============================================================================
// Axum handler wrappers (thin — delegate to inner functions)
// ============================================================================

fn bad_json(rejection: JsonRejection) -> (StatusCode, Json<serde_json::Value>) {
    let (status, body) = error(StatusCode::BAD_REQUEST, rejection.body_text());
    (status, Json(body))
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn method_not_allowed_handler() -> impl IntoResponse {
    let (status, body) = error(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
    (status, Json(body))
}

pub async fn interpret_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<InterpretRequest>, JsonRejection>,
) -> impl IntoResponse {
    let req = match payload {
        Ok(Json(req)) => req,
        // Malformed bodies count as a missing field.
        Err(_) => InterpretRequest::default(),
    };
    let (status, body) = interpret_inner(&state, req).await;
    (status, Json(body))
}

pub async fn list_records_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status, body) = list_records_inner(&state).await;
    (status, Json(body))
}

pub async fn upsert_record_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewRecord>, JsonRejection>,
) -> impl IntoResponse {
    let draft = match payload {
        Ok(Json(draft)) => draft,
        Err(rejection) => return bad_json(rejection),
    };
    let (status, body) = upsert_record_inner(&state, draft).await;
    (status, Json(body))
}

pub async fn latest_record_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status, body) = latest_record_inner(&state).await;
    (status, Json(body))
}

pub async fn record_by_date_handler(
    State(state): State<Arc<AppState>>,
    Path(date): Path<String>,
) -> impl IntoResponse {
    let (status, body) = record_by_date_inner(&state, &date).await;
    (status, Json(body))
}

pub async fn analytics_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AnalyticsQuery>,
) -> impl IntoResponse {
    let (status, body) = analytics_inner(&state, query).await;
    (status, Json(body))
}

pub async fn list_routines_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status, body) = list_routines_inner(&state).await;
    (status, Json(body))
}

pub async fn add_routine_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CustomRoutineRequest>, JsonRejection>,
) -> impl IntoResponse {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return bad_json(rejection),
    };
    let (status, body) = add_routine_inner(&state, req).await;
    (status, Json(body))
}

pub async fn recommendations_handler() -> impl IntoResponse {
    let (status, body) = recommendations_inner();
    (status, Json(body))
}

pub async fn add_recommended_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RecommendedRoutineRequest>, JsonRejection>,
) -> impl IntoResponse {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return bad_json(rejection),
    };
    let (status, body) = add_recommended_inner(&state, req).await;
    (status, Json(body))
}

pub async fn goal_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let goal = state.routines.read().await.goal().clone();
    (StatusCode::OK, Json(json!({ "goal": goal })))
}

pub async fn set_goal_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SleepGoal>, JsonRejection>,
) -> impl IntoResponse {
    let goal = match payload {
        Ok(Json(goal)) => goal,
        Err(rejection) => return bad_json(rejection),
    };
    let (status, body) = set_goal_inner(&state, goal).await;
    (status, Json(body))
}

pub async fn toggle_routine_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = toggle_routine_inner(&state, &id).await;
    (status, Json(body))
}

pub async fn remove_routine_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = remove_routine_inner(&state, &id).await;
    (status, Json(body))
}

pub async fn chat_transcript_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status, body) = chat_transcript_inner(&state).await;
    (status, Json(body))
}

pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> impl IntoResponse {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return bad_json(rejection),
    };
    let (status, body) = chat_inner(state, req).await;
    (status, Json(body))
}

// ============================================================================
// Unit Tests — call inner functions directly
// ============================================================================
