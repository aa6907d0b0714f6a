//! HTTP API over a [`SessionHost`].

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use game_maker_core::orchestrator::GameData;
use game_maker_core::records::BookFact;
use game_maker_core::session::SessionStart;
use game_maker_core::{HostError, Phase, SessionHost, SessionId, SessionSnapshot, TurnResponse};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

const SERVICE_NAME: &str = "the-game-maker";

#[derive(Clone)]
pub struct AppState {
    host: SessionHost,
}

pub fn build_router(host: SessionHost) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/start_session", post(start_session))
        .route("/api/message", post(message))
        .route("/api/session/{session_id}", get(session_state))
        .route("/api/game/{session_id}", get(game))
        .with_state(AppState { host })
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    success: bool,
    session_id: SessionId,
    message: String,
    phase: Phase,
}

impl From<SessionStart> for StartResponse {
    fn from(start: SessionStart) -> Self {
        Self {
            success: true,
            session_id: start.session_id,
            message: start.message,
            phase: start.phase,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    success: bool,
    message: String,
    phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    agent: Option<&'static str>,
    is_complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    book_info: Option<BookFact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    game_data: Option<GameData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<TurnResponse> for MessageResponse {
    fn from(response: TurnResponse) -> Self {
        Self {
            success: true,
            message: response.message,
            phase: response.phase,
            agent: response.agent_name,
            is_complete: response.is_complete,
            book_info: response.book_info,
            game_data: response.game_data,
            error: response.error,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    success: bool,
    #[serde(flatten)]
    snapshot: SessionSnapshot,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    /// Map a host error for routes where an unknown session is a bad request.
    fn from_message_error(error: HostError) -> Self {
        match error {
            HostError::EmptyMessage => Self::bad_request("Message is required"),
            HostError::NotFound(_) => {
                Self::bad_request("Invalid or expired session. Please start a new session.")
            }
            HostError::NotGenerated(_) => Self::bad_request(error.to_string()),
        }
    }
}

impl From<HostError> for ApiError {
    fn from(error: HostError) -> Self {
        match error {
            HostError::NotFound(_) => Self::not_found("Session not found"),
            HostError::NotGenerated(_) => Self::bad_request("Game not yet generated"),
            HostError::EmptyMessage => Self::bad_request("Message is required"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(status = %self.status, message = %self.message, "request failed");
        (
            self.status,
            Json(serde_json::json!({"success": false, "error": self.message})),
        )
            .into_response()
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn start_session(State(state): State<AppState>) -> Json<StartResponse> {
    Json(state.host.start_session().await.into())
}

async fn message(
    State(state): State<AppState>,
    Json(request): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let text = request.message.unwrap_or_default();
    if text.trim().is_empty() {
        return Err(ApiError::bad_request("Message is required"));
    }
    let session_id = request.session_id.unwrap_or_default();

    let response = state
        .host
        .send_message(&session_id, &text)
        .await
        .map_err(ApiError::from_message_error)?;
    Ok(Json(response.into()))
}

async fn session_state(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let snapshot = state.host.session_state(&session_id).await?;
    Ok(Json(SessionResponse {
        success: true,
        snapshot,
    }))
}

async fn game(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Html<String>, ApiError> {
    let artifact = state.host.artifact(&session_id).await?;
    Ok(Html(artifact.html))
}

#[cfg(test)]
mod tests {
    use super::*;
    use game_maker_core::testing::{Scripted, ScriptedGenerator};
    use game_maker_core::{Reply, StageAgents};
    use std::sync::Arc;

    fn state() -> (Arc<ScriptedGenerator>, AppState) {
        let generator = Arc::new(ScriptedGenerator::new());
        let host = SessionHost::new(Arc::new(StageAgents::new(generator.clone())));
        (generator, AppState { host })
    }

    fn request(session_id: &str, message: &str) -> Json<MessageRequest> {
        Json(MessageRequest {
            session_id: Some(session_id.to_string()),
            message: Some(message.to_string()),
        })
    }

    #[tokio::test]
    async fn test_start_session_shape() {
        let (_, state) = state();
        let Json(start) = start_session(State(state)).await;
        let value = serde_json::to_value(&start).unwrap();

        assert_eq!(value["success"], true);
        assert_eq!(value["phase"], "identifying");
        assert_eq!(value["session_id"].as_str().unwrap().len(), 32);
    }

    #[tokio::test]
    async fn test_message_round_trip() {
        let (generator, state) = state();
        let Json(start) = start_session(State(state.clone())).await;
        generator.push_reply(Scripted::Reply(Reply::from(
            "Is that \"Charlotte's Web\" by E.B. White?",
        )));

        let id = start.session_id.to_string();
        let Json(response) = message(State(state.clone()), request(&id, "Charlotte's Web"))
            .await
            .unwrap();
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["success"], true);
        assert_eq!(value["phase"], "discussing");
        assert_eq!(value["agent"], "story_analyst");
        assert_eq!(value["is_complete"], false);
        assert!(value.get("game_data").is_none());

        let Json(session) = session_state(State(state), Path(id)).await.unwrap();
        let value = serde_json::to_value(&session).unwrap();
        assert_eq!(value["conversation_count"], 2);
        assert_eq!(value["book_info"]["title"], "Charlotte's Web");
    }

    #[tokio::test]
    async fn test_message_errors_are_bad_requests() {
        let (_, state) = state();

        let missing = Json(MessageRequest {
            session_id: None,
            message: None,
        });
        let err = message(State(state.clone()), missing).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Message is required");

        let err = message(State(state), request("deadbeef", "hello"))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.starts_with("Invalid or expired session"));
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let (_, state) = state();

        let err = session_state(State(state.clone()), Path("missing".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err = game(State(state), Path("missing".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_game_not_generated() {
        let (_, state) = state();
        let Json(start) = start_session(State(state.clone())).await;

        let err = game(State(state), Path(start.session_id.to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Game not yet generated");
    }

    #[tokio::test]
    async fn test_health() {
        let Json(value) = health().await;
        assert_eq!(value["status"], "healthy");
        assert_eq!(value["service"], "the-game-maker");
    }

    #[test]
    fn test_error_response_status() {
        let response = ApiError::not_found("Session not found").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
