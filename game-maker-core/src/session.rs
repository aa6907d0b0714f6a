//! Session hosting - the primary public API for game making.
//!
//! A [`SessionHost`] creates sessions, routes messages to each session's
//! [`Orchestrator`], and hands out the finished game. Sessions run
//! concurrently; one session never processes two messages at once.

use crate::orchestrator::{Orchestrator, Phase, StageAgents, TurnResponse};
use crate::records::{BookFact, GeneratedArtifact};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info};
use uuid::Uuid;

const PROCESSING_FAILED: &str = "Oops! Something went wrong while I was thinking. Could you try that again?";

/// Errors from SessionHost operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("Invalid session ID: {0}")]
    NotFound(String),

    #[error("No message provided")]
    EmptyMessage,

    #[error("Game not generated yet for session {0}")]
    NotGenerated(SessionId),
}

/// Identifies one session. Rendered as 32 lowercase hex digits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", &self.to_string()[..8])
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for SessionId {
    type Error = uuid::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s.trim())?))
    }
}

/// A session's orchestrator, locked for the duration of a message.
pub type SharedSession = Arc<Mutex<Orchestrator>>;

/// Where sessions live between messages.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, id: SessionId, session: SharedSession);

    async fn get(&self, id: &SessionId) -> Option<SharedSession>;

    async fn len(&self) -> usize;
}

/// Sessions held in memory for the life of the process.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, SharedSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, id: SessionId, session: SharedSession) {
        self.sessions.write().await.insert(id, session);
    }

    async fn get(&self, id: &SessionId) -> Option<SharedSession> {
        self.sessions.read().await.get(id).cloned()
    }

    async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// What a client gets back when it opens a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStart {
    pub session_id: SessionId,
    pub message: String,
    pub phase: Phase,
}

/// A read-only view of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_info: Option<BookFact>,
    pub conversation_count: usize,
}

/// Creates sessions and routes messages to them.
#[derive(Clone)]
pub struct SessionHost {
    agents: Arc<StageAgents>,
    store: Arc<dyn SessionStore>,
}

impl SessionHost {
    /// A host keeping sessions in memory.
    pub fn new(agents: Arc<StageAgents>) -> Self {
        Self::with_store(agents, Arc::new(MemorySessionStore::new()))
    }

    pub fn with_store(agents: Arc<StageAgents>, store: Arc<dyn SessionStore>) -> Self {
        Self { agents, store }
    }

    pub async fn session_count(&self) -> usize {
        self.store.len().await
    }

    /// Open a new session and return its greeting.
    pub async fn start_session(&self) -> SessionStart {
        let id = SessionId::new();
        let orchestrator = Orchestrator::new(self.agents.clone());
        let start = SessionStart {
            session_id: id,
            message: orchestrator.greeting().to_string(),
            phase: orchestrator.phase(),
        };

        self.store.insert(id, Arc::new(Mutex::new(orchestrator))).await;
        info!(session = %id, "session started");
        start
    }

    /// Process one user message in a session.
    ///
    /// Processing runs on its own task, so a panic inside it becomes a
    /// response carrying an `error` instead of taking down the caller.
    pub async fn send_message(&self, id: &str, text: &str) -> Result<TurnResponse, HostError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(HostError::EmptyMessage);
        }
        let (id, session) = self.lookup(id).await?;

        let task_session = session.clone();
        let message = text.to_string();
        let task = tokio::spawn(async move {
            let mut orchestrator = task_session.lock().await;
            orchestrator.process_message(&message).await
        });

        match task.await {
            Ok(response) => Ok(response),
            Err(e) => {
                let detail = if e.is_panic() {
                    panic_message(e.into_panic())
                } else {
                    e.to_string()
                };
                error!(session = %id, error = %detail, "message processing failed");
                let mut orchestrator = session.lock().await;
                orchestrator.record_reply(PROCESSING_FAILED);
                Ok(TurnResponse::failure(PROCESSING_FAILED, orchestrator.phase(), detail))
            }
        }
    }

    /// Current phase, book and turn count of a session.
    pub async fn session_state(&self, id: &str) -> Result<SessionSnapshot, HostError> {
        let (id, session) = self.lookup(id).await?;
        let orchestrator = session.lock().await;
        Ok(SessionSnapshot {
            session_id: id,
            phase: orchestrator.phase(),
            book_info: orchestrator.book().cloned(),
            conversation_count: orchestrator.turns().len(),
        })
    }

    /// The finished game of a session.
    pub async fn artifact(&self, id: &str) -> Result<GeneratedArtifact, HostError> {
        let (id, session) = self.lookup(id).await?;
        let orchestrator = session.lock().await;
        orchestrator
            .artifact()
            .cloned()
            .ok_or(HostError::NotGenerated(id))
    }

    async fn lookup(&self, raw: &str) -> Result<(SessionId, SharedSession), HostError> {
        let id: SessionId = raw
            .parse()
            .map_err(|_| HostError::NotFound(raw.to_string()))?;
        let session = self
            .store
            .get(&id)
            .await
            .ok_or_else(|| HostError::NotFound(raw.to_string()))?;
        Ok((id, session))
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic while processing message".to_string()
    }
}
