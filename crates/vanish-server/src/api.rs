use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    extract::State,
    http::{HeaderMap, Method},
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use vanish_shared::api::*;
use vanish_shared::types::UserId;
use vanish_store::Database;

use crate::auth;
use crate::broadcast::Broadcaster;
use crate::config::ServerConfig;
use crate::conversations;
use crate::error::ApiError;
use crate::messages;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::social;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub hub: Broadcaster,
    pub rate_limiter: RateLimiter,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    fn db(&self) -> Result<MutexGuard<'_, Database>, ApiError> {
        self.db
            .lock()
            .map_err(|_| ApiError::Internal("database lock poisoned".into()))
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(register))
        .route("/fn/get-conversations", post(get_conversations))
        .route("/fn/create-conversation", post(create_conversation))
        .route("/fn/leave-conversation", post(leave_conversation))
        .route("/fn/accept-invitation", post(accept_invitation))
        .route("/fn/decline-invitation", post(decline_invitation))
        .route("/fn/get-user-permissions", post(get_user_permissions))
        .route("/fn/get-messages", post(get_messages))
        .route("/fn/send-message", post(send_message))
        .route("/fn/edit-message", post(edit_message))
        .route("/fn/delete-message", post(delete_message))
        .route("/fn/mark-read", post(mark_read))
        .route("/fn/flag-screenshot", post(flag_screenshot))
        .route("/fn/get-notifications", post(get_notifications))
        .route("/fn/mark-notification-read", post(mark_notification_read))
        .route("/fn/delete-notification", post(delete_notification))
        .route("/fn/create-post", post(create_post))
        .route("/fn/get-feed", post(get_feed))
        .route("/fn/create-comment", post(create_comment))
        .route("/fn/follow", post(follow))
        .route("/fn/unfollow", post(unfollow))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    instance: String,
    version: &'static str,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        instance: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let db = state.db()?;
    Ok(Json(auth::register(&db, req)?))
}

fn authed(db: &Database, headers: &HeaderMap) -> Result<UserId, ApiError> {
    auth::authenticate(db, headers)
}

// ─── Conversations ───

async fn get_conversations(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<GetConversationsRequest>,
) -> Result<Json<ConversationsResponse>, ApiError> {
    let db = state.db()?;
    let user = authed(&db, &headers)?;
    let conversations = conversations::list_conversations(&db, user, req.status)?;
    Ok(Json(ConversationsResponse { conversations }))
}

async fn create_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateConversationRequest>,
) -> Result<Json<CreateConversationResponse>, ApiError> {
    let mut db = state.db()?;
    let user = authed(&db, &headers)?;
    let conversation = conversations::create_conversation(&mut db, &state.hub, user, req)?;
    Ok(Json(CreateConversationResponse { conversation }))
}

async fn leave_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ConversationIdRequest>,
) -> Result<Json<LeaveConversationResponse>, ApiError> {
    let db = state.db()?;
    let user = authed(&db, &headers)?;
    let out = conversations::leave_conversation(&db, &state.hub, user, req.conversation_id)?;
    Ok(Json(out))
}

async fn accept_invitation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ConversationIdRequest>,
) -> Result<Json<AckResponse>, ApiError> {
    let db = state.db()?;
    let user = authed(&db, &headers)?;
    conversations::respond_to_invitation(&db, &state.hub, user, req.conversation_id, true)?;
    Ok(Json(AckResponse { success: true }))
}

async fn decline_invitation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ConversationIdRequest>,
) -> Result<Json<AckResponse>, ApiError> {
    let db = state.db()?;
    let user = authed(&db, &headers)?;
    conversations::respond_to_invitation(&db, &state.hub, user, req.conversation_id, false)?;
    Ok(Json(AckResponse { success: true }))
}

async fn get_user_permissions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ConversationIdRequest>,
) -> Result<Json<PermissionsResponse>, ApiError> {
    let db = state.db()?;
    let user = authed(&db, &headers)?;
    let permissions = db.get_permissions(req.conversation_id, user)?;
    Ok(Json(PermissionsResponse { permissions }))
}

// ─── Messages ───

async fn get_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<GetMessagesRequest>,
) -> Result<Json<MessagesResponse>, ApiError> {
    let db = state.db()?;
    let user = authed(&db, &headers)?;
    let messages = messages::get_messages(&db, user, req.conversation_id, req.limit, req.offset)?;
    Ok(Json(MessagesResponse { messages }))
}

async fn send_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let db = state.db()?;
    let user = authed(&db, &headers)?;
    let message = messages::send_message(&db, &state.hub, user, req)?;
    Ok(Json(MessageResponse { message }))
}

async fn edit_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<EditMessageRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let db = state.db()?;
    let user = authed(&db, &headers)?;
    let message = messages::edit_message(&db, &state.hub, user, req.message_id, &req.content)?;
    Ok(Json(MessageResponse { message }))
}

async fn delete_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<DeleteMessageRequest>,
) -> Result<Json<AckResponse>, ApiError> {
    let db = state.db()?;
    let user = authed(&db, &headers)?;
    messages::delete_message(&db, &state.hub, user, req.message_id, req.user_id)?;
    Ok(Json(AckResponse { success: true }))
}

async fn mark_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<MessageIdRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let db = state.db()?;
    let user = authed(&db, &headers)?;
    let message = messages::mark_read(&db, &state.hub, user, req.message_id)?;
    Ok(Json(MessageResponse { message }))
}

async fn flag_screenshot(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<MessageIdRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let db = state.db()?;
    let user = authed(&db, &headers)?;
    let message = messages::flag_screenshot(&db, &state.hub, user, req.message_id)?;
    Ok(Json(MessageResponse { message }))
}

// ─── Notifications ───

async fn get_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<NotificationsResponse>, ApiError> {
    let db = state.db()?;
    let user = authed(&db, &headers)?;
    let notifications = db.list_notifications(user)?;
    Ok(Json(NotificationsResponse { notifications }))
}

async fn mark_notification_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<NotificationIdRequest>,
) -> Result<Json<AckResponse>, ApiError> {
    let db = state.db()?;
    let user = authed(&db, &headers)?;
    db.mark_notification_read(req.notification_id, user)?;
    Ok(Json(AckResponse { success: true }))
}

async fn delete_notification(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<NotificationIdRequest>,
) -> Result<Json<AckResponse>, ApiError> {
    let db = state.db()?;
    let user = authed(&db, &headers)?;
    db.delete_notification(req.notification_id, user)?;
    Ok(Json(AckResponse { success: true }))
}

// ─── Social ───

async fn create_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreatePostRequest>,
) -> Result<Json<PostResponse>, ApiError> {
    let db = state.db()?;
    let user = authed(&db, &headers)?;
    let post = social::create_post(&db, user, req)?;
    Ok(Json(PostResponse { post }))
}

async fn get_feed(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<GetFeedRequest>,
) -> Result<Json<FeedResponse>, ApiError> {
    let db = state.db()?;
    let user = authed(&db, &headers)?;
    let posts = social::get_feed(&db, user, req.limit)?;
    Ok(Json(FeedResponse { posts }))
}

async fn create_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateCommentRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let db = state.db()?;
    let user = authed(&db, &headers)?;
    let comment = social::create_comment(&db, user, req)?;
    Ok(Json(serde_json::json!({ "comment": comment })))
}

async fn follow(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<FollowRequest>,
) -> Result<Json<AckResponse>, ApiError> {
    let db = state.db()?;
    let user = authed(&db, &headers)?;
    social::follow_user(&db, &state.hub, user, req.user_id)?;
    Ok(Json(AckResponse { success: true }))
}

async fn unfollow(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<FollowRequest>,
) -> Result<Json<AckResponse>, ApiError> {
    let db = state.db()?;
    let user = authed(&db, &headers)?;
    social::unfollow_user(&db, user, req.user_id)?;
    Ok(Json(AckResponse { success: true }))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
