//! Conversational stage agents.
//!
//! Each stage of the pipeline is a chat with one agent: the story agent
//! identifies and discusses the book, the design agent turns that
//! discussion into a game design. Agents never fail a turn; generator
//! errors become a fixed apology and leave the stage where it was.

pub mod completion;
pub mod design;
pub mod generator;
pub mod story;

pub use completion::{CompletionPredicate, StageLimits};
pub use design::DesignAgent;
pub use generator::{ClaudeGenerator, GenerateError, Reply, ReplySegment, TextGenerator};
pub use story::StoryAgent;

use crate::records::{ConversationTurn, GameType};
use std::future::Future;
use std::time::Duration;

/// Most recent turns sent to the model on each call.
pub const HISTORY_WINDOW: usize = 20;

/// Configuration for one stage agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Model override. The generator's default is used when unset.
    pub model: Option<String>,

    /// Maximum tokens for responses.
    pub max_tokens: usize,

    /// Temperature for conversational replies.
    pub temperature: Option<f32>,

    /// How long a single generation call may take.
    pub timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 4096,
            temperature: Some(0.7),
            timeout: Duration::from_secs(120),
        }
    }
}

impl AgentConfig {
    pub fn story() -> Self {
        Self::default()
    }

    pub fn design() -> Self {
        Self {
            temperature: Some(0.8),
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// The result of one conversational turn with a stage agent.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome {
    pub reply: String,
    pub complete: bool,
    /// Game type mentioned in the reply, design stage only.
    pub game_type: Option<GameType>,
    /// The generator failed and `reply` is the stage's apology.
    pub failed: bool,
}

impl StageOutcome {
    fn apology(text: &str) -> Self {
        Self {
            reply: text.to_string(),
            complete: false,
            game_type: None,
            failed: true,
        }
    }
}

/// The trailing `HISTORY_WINDOW` turns of `history`.
pub fn recent(history: &[ConversationTurn]) -> &[ConversationTurn] {
    &history[history.len().saturating_sub(HISTORY_WINDOW)..]
}

/// Await a generator call, treating an elapsed timeout as a failure.
async fn with_deadline<T>(
    timeout: Duration,
    call: impl Future<Output = Result<T, GenerateError>>,
) -> Result<T, GenerateError> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(GenerateError::Timeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_window() {
        let history: Vec<_> = (0..25)
            .map(|i| ConversationTurn::user(i.to_string()))
            .collect();
        let window = recent(&history);
        assert_eq!(window.len(), HISTORY_WINDOW);
        assert_eq!(window[0].text, "5");

        assert_eq!(recent(&history[..3]).len(), 3);
    }

    #[test]
    fn test_stage_temperatures() {
        assert_eq!(AgentConfig::story().temperature, Some(0.7));
        assert_eq!(AgentConfig::design().temperature, Some(0.8));
        assert_eq!(AgentConfig::design().timeout, Duration::from_secs(120));
    }
}
