//! Headless game-making interface for programmatic use.
//!
//! This module wraps a single session for running without the HTTP
//! service. It's designed for:
//! - Automated testing with real AI responses
//! - Script-driven sessions from a terminal
//!
//! # Example
//!
//! ```ignore
//! use game_maker_core::{ClaudeGenerator, HeadlessGame, StageAgents};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let generator = Arc::new(ClaudeGenerator::from_env()?);
//!     let game = HeadlessGame::new(Arc::new(StageAgents::new(generator))).await;
//!     println!("{}", game.greeting());
//!
//!     let response = game.send("I read Dragons Love Tacos!").await?;
//!     println!("{}", response.message);
//!
//!     game.save("tacos.html").await?;
//!     Ok(())
//! }
//! ```

use crate::orchestrator::{StageAgents, TurnResponse};
use crate::session::{HostError, SessionHost, SessionSnapshot};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Errors from headless operations.
#[derive(Debug, Error)]
pub enum HeadlessError {
    #[error(transparent)]
    Host(#[from] HostError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One game-making session driven from code.
pub struct HeadlessGame {
    host: SessionHost,
    session_id: String,
    greeting: String,
}

impl HeadlessGame {
    /// Start a new session.
    pub async fn new(agents: Arc<StageAgents>) -> Self {
        let host = SessionHost::new(agents);
        let start = host.start_session().await;
        Self {
            host,
            session_id: start.session_id.to_string(),
            greeting: start.message,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The opening question of the session.
    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    /// Send a user message.
    pub async fn send(&self, text: &str) -> Result<TurnResponse, HeadlessError> {
        Ok(self.host.send_message(&self.session_id, text).await?)
    }

    pub async fn status(&self) -> Result<SessionSnapshot, HeadlessError> {
        Ok(self.host.session_state(&self.session_id).await?)
    }

    /// Write the finished game page to `path`.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), HeadlessError> {
        let artifact = self.host.artifact(&self.session_id).await?;
        tokio::fs::write(path, artifact.html).await?;
        Ok(())
    }
}
