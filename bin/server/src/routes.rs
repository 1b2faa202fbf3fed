//! HTTP routes for onboarding, chatting and resetting a conversation.
//!
//! The session id travels in the `session` cookie. A request without a
//! known session gets a fresh one and the cookie is (re)issued on every
//! response.

use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spectrum_compass_conversation::{
    ConversationSession, Message, MessageRole, SharedSession, TurnOutcome, UserContext,
};
use spectrum_compass_core::ConversationSessionId;
use std::sync::Arc;
use time::Duration as TimeDuration;
use tower_http::trace::TraceLayer;

/// Session cookie name.
const SESSION_COOKIE: &str = "session";

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/session", get(get_session))
        .route("/api/onboarding", post(onboarding))
        .route("/api/chat", post(chat))
        .route("/api/suggestions/{index}", post(select_suggestion))
        .route("/api/reset", post(reset))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// A message as shown to the presentation layer.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageView {
    /// Who sent it.
    pub role: MessageRole,
    /// Message text.
    pub content: String,
    /// Rendered citations.
    pub sources: Vec<String>,
    /// When it was sent.
    pub timestamp: DateTime<Utc>,
}

impl From<&Message> for MessageView {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
            sources: message.sources.iter().map(|c| c.render()).collect(),
            timestamp: message.timestamp,
        }
    }
}

/// The whole visible state of a session.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionView {
    /// Messages, oldest first.
    pub messages: Vec<MessageView>,
    /// Pending suggestion chips.
    pub suggestions: Vec<String>,
    /// Onboarding answers, if given.
    pub user_context: Option<UserContext>,
}

impl From<&ConversationSession> for SessionView {
    fn from(session: &ConversationSession) -> Self {
        Self {
            messages: session.messages().iter().map(MessageView::from).collect(),
            suggestions: session.pending_suggestions().to_vec(),
            user_context: session.user_context().cloned(),
        }
    }
}

/// The result of one turn.
#[derive(Debug, Serialize, Deserialize)]
pub struct TurnView {
    /// The answer text.
    pub answer: String,
    /// Rendered citations.
    pub sources: Vec<String>,
    /// Follow-up suggestions.
    pub suggestions: Vec<String>,
}

impl From<TurnOutcome> for TurnView {
    fn from(outcome: TurnOutcome) -> Self {
        Self {
            answer: outcome.answer,
            sources: outcome.citations.iter().map(|c| c.render()).collect(),
            suggestions: outcome.suggestions,
        }
    }
}

/// Onboarding answers.
#[derive(Debug, Deserialize)]
pub struct OnboardingRequest {
    role: String,
    age: String,
    #[serde(default)]
    location: Option<String>,
}

/// A chat message from the user.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    message: String,
}

async fn health() -> &'static str {
    "ok"
}

/// Resolves the caller's session and refreshes its cookie.
async fn session_for(state: &AppState, jar: CookieJar) -> (CookieJar, SharedSession) {
    let known = jar
        .get(SESSION_COOKIE)
        .and_then(|c| c.value().parse::<ConversationSessionId>().ok());
    let (id, session) = state.store.get_or_create(known).await;

    let cookie = Cookie::build((SESSION_COOKIE, id.to_string()))
        .path("/")
        .http_only(true)
        .secure(state.session_config.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::minutes(
            state.session_config.idle_timeout_minutes,
        ));

    (jar.add(cookie), session)
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> (CookieJar, Json<SessionView>) {
    let (jar, session) = session_for(&state, jar).await;
    let session = session.lock().await;
    (jar, Json(SessionView::from(&*session)))
}

async fn onboarding(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(request): Json<OnboardingRequest>,
) -> (CookieJar, Result<Json<SessionView>, ApiError>) {
    let (jar, session) = session_for(&state, jar).await;
    let mut session = session.lock().await;

    let result = UserContext::new(request.role, request.age, request.location)
        .and_then(|context| session.set_user_context(context))
        .map(|()| {
            tracing::info!(session_id = %session.id, "Onboarding complete");
            Json(SessionView::from(&*session))
        })
        .map_err(ApiError::from);

    (jar, result)
}

async fn chat(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(request): Json<ChatRequest>,
) -> (CookieJar, Result<Json<TurnView>, ApiError>) {
    let (jar, session) = session_for(&state, jar).await;
    let mut session = session.lock().await;

    let result = state
        .executor
        .submit_turn(&mut session, &request.message)
        .await
        .map(|outcome| Json(TurnView::from(outcome)))
        .map_err(ApiError::from);

    (jar, result)
}

async fn select_suggestion(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(index): Path<usize>,
) -> (CookieJar, Result<Json<TurnView>, ApiError>) {
    let (jar, session) = session_for(&state, jar).await;
    let mut session = session.lock().await;

    let result = state
        .executor
        .select_suggestion(&mut session, index)
        .await
        .map(|outcome| Json(TurnView::from(outcome)))
        .map_err(ApiError::from);

    (jar, result)
}

async fn reset(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> (CookieJar, Json<SessionView>) {
    let (jar, session) = session_for(&state, jar).await;
    let mut session = session.lock().await;
    session.reset();
    tracing::info!(session_id = %session.id, "Session reset");
    (jar, Json(SessionView::from(&*session)))
}
