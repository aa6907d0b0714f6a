//! Text generation backends.
//!
//! The stage agents talk to a [`TextGenerator`] rather than to Claude
//! directly, so tests can script replies and failures.

use super::AgentConfig;
use crate::records::{ConversationTurn, Speaker};
use async_trait::async_trait;
use claude::{Claude, ContentBlock, Message, Request, Role};
use std::time::Duration;
use thiserror::Error;

/// Opening line used when a history window starts with an agent turn.
const RESUME_MARKER: &str = "(continuing our conversation)";

/// Errors from a text generation call.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("Claude API error: {0}")]
    Api(#[from] claude::Error),

    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Generation failed: {0}")]
    Failed(String),
}

/// One segment of a multi-part reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplySegment {
    Text(String),
    ToolUse { name: String },
    Thinking(String),
    Other,
}

/// A model reply: either plain text or tagged segments.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text(String),
    Segments(Vec<ReplySegment>),
}

impl Reply {
    /// The reply's text. Only text segments count, in order.
    pub fn into_text(self) -> String {
        match self {
            Reply::Text(text) => text,
            Reply::Segments(segments) => segments
                .into_iter()
                .filter_map(|segment| match segment {
                    ReplySegment::Text(text) => Some(text),
                    _ => None,
                })
                .collect(),
        }
    }
}

impl From<&str> for Reply {
    fn from(text: &str) -> Self {
        Reply::Text(text.to_string())
    }
}

/// Something that can produce conversational and structured text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Continue a conversation.
    async fn generate(
        &self,
        config: &AgentConfig,
        system_prompt: &str,
        history: &[ConversationTurn],
        user_text: &str,
    ) -> Result<Reply, GenerateError>;

    /// Answer a single self-contained prompt, expected to be JSON.
    async fn generate_structured(
        &self,
        config: &AgentConfig,
        prompt: &str,
    ) -> Result<String, GenerateError>;
}

/// [`TextGenerator`] backed by the Claude Messages API.
#[derive(Clone)]
pub struct ClaudeGenerator {
    client: Claude,
}

impl ClaudeGenerator {
    pub fn new(client: Claude) -> Self {
        Self { client }
    }

    /// Build a generator from the ANTHROPIC_API_KEY environment variable.
    pub fn from_env() -> Result<Self, GenerateError> {
        Ok(Self::new(Claude::from_env()?))
    }

    fn request(&self, config: &AgentConfig, messages: Vec<Message>) -> Request {
        let mut request = Request::new(messages).with_max_tokens(config.max_tokens);
        if let Some(ref model) = config.model {
            request = request.with_model(model.clone());
        }
        request
    }
}

#[async_trait]
impl TextGenerator for ClaudeGenerator {
    async fn generate(
        &self,
        config: &AgentConfig,
        system_prompt: &str,
        history: &[ConversationTurn],
        user_text: &str,
    ) -> Result<Reply, GenerateError> {
        let messages = to_messages(history, user_text);
        let mut request = self.request(config, messages).with_system(system_prompt);
        if let Some(temperature) = config.temperature {
            request = request.with_temperature(temperature);
        }

        let response = self.client.complete(request).await?;
        let segments = response
            .content
            .into_iter()
            .map(|block| match block {
                ContentBlock::Text { text } => ReplySegment::Text(text),
                ContentBlock::ToolUse { name } => ReplySegment::ToolUse { name },
                ContentBlock::Thinking { thinking } => ReplySegment::Thinking(thinking),
                ContentBlock::Other => ReplySegment::Other,
            })
            .collect();

        Ok(Reply::Segments(segments))
    }

    async fn generate_structured(
        &self,
        config: &AgentConfig,
        prompt: &str,
    ) -> Result<String, GenerateError> {
        // Deterministic for extraction
        let request = self
            .request(config, vec![Message::user(prompt)])
            .with_temperature(0.0);

        let response = self.client.complete(request).await?;
        Ok(response.text())
    }
}

/// Convert the turn log into API messages.
///
/// The API wants alternating roles starting with a user turn, so consecutive
/// same-role turns are merged and a window that opens on an agent turn gets
/// a short user marker in front.
fn to_messages(history: &[ConversationTurn], user_text: &str) -> Vec<Message> {
    let mut messages: Vec<Message> = Vec::with_capacity(history.len() + 2);

    let turns = history
        .iter()
        .map(|turn| (turn.role, turn.text.as_str()))
        .chain(std::iter::once((Speaker::User, user_text)));

    for (speaker, text) in turns {
        let role = match speaker {
            Speaker::User => Role::User,
            Speaker::Agent => Role::Assistant,
        };

        match messages.last_mut() {
            Some(last) if last.role == role => {
                last.text.push_str("\n\n");
                last.text.push_str(text);
            }
            None if role == Role::Assistant => {
                messages.push(Message::user(RESUME_MARKER));
                messages.push(Message::assistant(text));
            }
            _ => messages.push(Message { role, text: text.to_string() }),
        }
    }

    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_keep_only_text() {
        let reply = Reply::Segments(vec![
            ReplySegment::Thinking("hmm".to_string()),
            ReplySegment::Text("Is that ".to_string()),
            ReplySegment::ToolUse {
                name: "identify_book".to_string(),
            },
            ReplySegment::Other,
            ReplySegment::Text("the one?".to_string()),
        ]);
        assert_eq!(reply.into_text(), "Is that the one?");
    }

    #[test]
    fn test_to_messages_starts_with_user() {
        let history = vec![
            ConversationTurn::agent("What book did you read?"),
            ConversationTurn::user("Dragons Love Tacos"),
        ];
        let messages = to_messages(&history, "It's about tacos");

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0], Message::user(RESUME_MARKER));
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[2], Message::user("Dragons Love Tacos\n\nIt's about tacos"));
    }

    #[test]
    fn test_to_messages_merges_repeated_roles() {
        let history = vec![
            ConversationTurn::user("Hi"),
            ConversationTurn::agent("Hello!"),
            ConversationTurn::agent("What book?"),
        ];
        let messages = to_messages(&history, "Charlotte's Web");

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1], Message::assistant("Hello!\n\nWhat book?"));
        assert_eq!(messages[2], Message::user("Charlotte's Web"));
    }
}
