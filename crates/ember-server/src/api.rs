//! HTTP API: swipes, the candidate feed, the match list, and messaging.
//!
//! Every authenticated route reads the caller's user id from the
//! `x-user-id` header.  Authentication itself happens upstream; by the time
//! a request reaches these handlers the identity is trusted as-is.
//!
//! Real-time side effects (`newMatch`, `newMessage`) are dispatched only
//! after the corresponding write has committed, so a client can never see a
//! pushed event with no durable backing.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use ember_shared::{Gender, GenderPreference, MatchSummary, ProfileSummary, ServerEvent, UserId};
use ember_store::{Database, Message, StoreError, User};

use crate::config::ServerConfig;
use crate::dispatch::Dispatcher;
use crate::error::ApiError;
use crate::presence::PresenceRegistry;
use crate::ws;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub presence: PresenceRegistry,
    pub dispatcher: Dispatcher,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        .route("/users", post(create_user))
        .route("/users/{id}/block", post(block_user))
        .route("/users/{id}/mute", post(mute_user))
        .route("/profiles", get(list_candidates))
        .route("/swipes/right/{id}", post(swipe_right))
        .route("/swipes/left/{id}", post(swipe_left))
        .route("/matches", get(list_matches))
        .route("/messages", post(send_message))
        .route("/messages/{id}", get(get_conversation))
        .route("/messages/{id}/seen", post(mark_seen))
        .route("/ws", get(ws::ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Extract the trusted caller identity from the `x-user-id` header.
fn caller_id(headers: &HeaderMap) -> Result<UserId, ApiError> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| UserId::parse(s).ok())
        .ok_or(ApiError::MissingIdentity)
}

/// Map a store lookup of `id` so a missing row reads as "user not found"
/// rather than a bare 404.
fn require_user(db: &Database, id: UserId) -> Result<User, ApiError> {
    db.get_user(id).map_err(|e| match e {
        StoreError::NotFound => ApiError::NotFound(format!("user {id} not found")),
        other => ApiError::Store(other),
    })
}

// ---------------------------------------------------------------------------
// Health / info
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
    require_match_to_message: bool,
    online_users: usize,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        require_match_to_message: state.config.require_match_to_message,
        online_users: state.presence.online_count().await,
    })
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateUserRequest {
    name: String,
    image: String,
    gender: Gender,
    gender_preference: GenderPreference,
}

async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name must not be empty".into()));
    }

    let user = User::new(req.name, req.image, req.gender, req.gender_preference);
    state.db.lock().await.create_user(&user)?;

    info!(user = %user.id, "user created");
    Ok((StatusCode::CREATED, Json(user)))
}

async fn block_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(target): Path<UserId>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let actor = caller_id(&headers)?;
    let db = state.db.lock().await;
    require_user(&db, target)?;
    db.record_block(actor, target)?;
    Ok(Json(serde_json::json!({ "blocked": true })))
}

async fn mute_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(target): Path<UserId>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let actor = caller_id(&headers)?;
    let db = state.db.lock().await;
    require_user(&db, target)?;
    db.record_mute(actor, target)?;
    Ok(Json(serde_json::json!({ "muted": true })))
}

// ---------------------------------------------------------------------------
// Swipes & matches
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct SwipeResponse {
    matched: bool,
    user: ProfileSummary,
}

async fn swipe_right(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(target): Path<UserId>,
) -> Result<Json<SwipeResponse>, ApiError> {
    let actor = caller_id(&headers)?;
    if actor == target {
        return Err(ApiError::BadRequest("cannot swipe on yourself".into()));
    }

    let (outcome, actor_summary, target_summary) = {
        let mut db = state.db.lock().await;
        let actor_user = require_user(&db, actor)?;
        let target_user = require_user(&db, target)?;
        let outcome = db.record_like(actor, target)?;
        (outcome, actor_user.summary(), target_user.summary())
    };

    if outcome.matched {
        // Each party receives the *other* side's profile.  Dispatch is
        // best-effort: offline parties catch up on their next fetch.
        state
            .dispatcher
            .dispatch(target, ServerEvent::NewMatch(actor_summary))
            .await;
        state
            .dispatcher
            .dispatch(actor, ServerEvent::NewMatch(target_summary.clone()))
            .await;
    }

    Ok(Json(SwipeResponse {
        matched: outcome.matched,
        user: target_summary,
    }))
}

async fn swipe_left(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(target): Path<UserId>,
) -> Result<Json<SwipeResponse>, ApiError> {
    let actor = caller_id(&headers)?;
    if actor == target {
        return Err(ApiError::BadRequest("cannot swipe on yourself".into()));
    }

    let db = state.db.lock().await;
    let target_user = require_user(&db, target)?;
    db.record_dislike(actor, target)?;

    Ok(Json(SwipeResponse {
        matched: false,
        user: target_user.summary(),
    }))
}

async fn list_candidates(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<User>>, ApiError> {
    let viewer = caller_id(&headers)?;
    let users = state.db.lock().await.candidate_profiles(viewer)?;
    Ok(Json(users))
}

async fn list_matches(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<MatchSummary>>, ApiError> {
    let viewer = caller_id(&headers)?;
    let db = state.db.lock().await;

    let mut matches = Vec::new();
    for counterpart in db.matches_of(viewer)? {
        let user = db.get_user(counterpart)?;
        // Flags are computed fresh on every fetch; no caching across
        // requests.
        let flags = db.unread_flags(viewer, counterpart)?;
        matches.push(MatchSummary {
            id: user.id,
            name: user.name,
            image: user.image,
            has_new_message: flags.has_new_message,
            has_unseen_by_counterpart: flags.has_unseen_by_counterpart,
        });
    }

    Ok(Json(matches))
}

// ---------------------------------------------------------------------------
// Messaging
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageRequest {
    receiver_id: UserId,
    content: String,
}

async fn send_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let sender = caller_id(&headers)?;
    if req.content.trim().is_empty() {
        return Err(ApiError::BadRequest("message content must not be empty".into()));
    }
    if sender == req.receiver_id {
        return Err(ApiError::BadRequest("cannot message yourself".into()));
    }

    let message = {
        let db = state.db.lock().await;
        require_user(&db, req.receiver_id)?;

        if state.config.require_match_to_message && !db.are_matched(sender, req.receiver_id)? {
            return Err(ApiError::NotMatched);
        }

        let message = Message::new(sender, req.receiver_id, req.content);
        db.insert_message(&message)?;
        message
    };

    // Only after a successful persist; the receiver reconciles via fetch if
    // they are offline right now.
    let delivered = state
        .dispatcher
        .dispatch(
            message.receiver_id,
            ServerEvent::NewMessage {
                message: message.clone(),
            },
        )
        .await;

    info!(
        id = %message.id,
        sender = %message.sender_id,
        receiver = %message.receiver_id,
        delivered,
        "message sent"
    );

    Ok((StatusCode::CREATED, Json(message)))
}

async fn get_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(other): Path<UserId>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let viewer = caller_id(&headers)?;
    let messages = state.db.lock().await.conversation(viewer, other)?;
    Ok(Json(messages))
}

async fn mark_seen(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(counterpart): Path<UserId>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let viewer = caller_id(&headers)?;
    state
        .db
        .lock()
        .await
        .mark_seen_both_directions(viewer, counterpart)?;
    // No push for seen updates; the counterpart picks the change up on
    // their next match-list fetch.
    Ok(Json(serde_json::json!({ "success": true })))
}

// ---------------------------------------------------------------------------
// Serving
// ---------------------------------------------------------------------------

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
