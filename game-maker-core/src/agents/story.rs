//! The story agent: identifies the book and talks about it.

use super::{recent, with_deadline, AgentConfig, CompletionPredicate, StageLimits, StageOutcome, TextGenerator};
use crate::extract::parse_structured;
use crate::records::{transcript, BookAnalysisRecord, BookFact, CharacterFact, ConversationTurn, GameElementFact};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

pub const STORY_GREETING: &str =
    "Hi! I'm so excited to help you create a game! What book did you just read?";

pub const STORY_APOLOGY: &str = "I had a little trouble there. Could you say that again?";

/// Fields the model fills in; the book itself comes from the conversation.
#[derive(Debug, Deserialize)]
struct AnalysisPayload {
    plot_summary: String,
    setting: String,
    themes: Vec<String>,
    characters: Vec<CharacterFact>,
    game_elements: Vec<GameElementFact>,
    tone: String,
    #[serde(default)]
    target_age: Option<String>,
}

/// Chats about the book until it knows enough to design a game.
pub struct StoryAgent {
    generator: Arc<dyn TextGenerator>,
    config: AgentConfig,
    completion: Box<dyn CompletionPredicate>,
}

impl StoryAgent {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            config: AgentConfig::story(),
            completion: Box::new(StageLimits::STORY),
        }
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the rule that ends the discussion.
    pub fn with_completion(mut self, predicate: impl CompletionPredicate + 'static) -> Self {
        self.completion = Box::new(predicate);
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn greeting(&self) -> &'static str {
        STORY_GREETING
    }

    /// Respond to the user. `history` excludes `user_text`.
    pub async fn process(&self, user_text: &str, history: &[ConversationTurn]) -> StageOutcome {
        let window = recent(history);
        let system_prompt = system_prompt();

        let call = self
            .generator
            .generate(&self.config, &system_prompt, window, user_text);

        match with_deadline(self.config.timeout, call).await {
            Ok(reply) => {
                let reply = reply.into_text();
                let complete = self.completion.is_complete(&reply, window.len());
                StageOutcome {
                    reply,
                    complete,
                    game_type: None,
                    failed: false,
                }
            }
            Err(e) => {
                warn!(error = %e, "story agent failed");
                StageOutcome::apology(STORY_APOLOGY)
            }
        }
    }

    /// Summarize the discussion into an analysis record.
    ///
    /// Never fails: any generator or parse problem yields
    /// [`BookAnalysisRecord::fallback`].
    pub async fn extract_analysis(
        &self,
        history: &[ConversationTurn],
        book: &BookFact,
    ) -> BookAnalysisRecord {
        let prompt = analysis_prompt(history, book);
        let call = self.generator.generate_structured(&self.config, &prompt);

        let raw = match with_deadline(self.config.timeout, call).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "analysis extraction failed, using fallback");
                return BookAnalysisRecord::fallback(book.clone());
            }
        };
        debug!(bytes = raw.len(), "analysis reply received");

        match parse_structured::<AnalysisPayload>(&raw) {
            Ok(payload) => {
                let record = BookAnalysisRecord {
                    book: book.clone(),
                    plot_summary: payload.plot_summary,
                    setting: payload.setting,
                    themes: payload.themes,
                    characters: payload.characters,
                    game_elements: payload.game_elements,
                    tone: payload.tone,
                    target_age: payload.target_age.unwrap_or_else(|| "5-10".to_string()),
                };
                match record.validate() {
                    Ok(()) => record,
                    Err(e) => {
                        warn!(error = %e, "analysis incomplete, using fallback");
                        BookAnalysisRecord::fallback(book.clone())
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "analysis reply was not valid JSON, using fallback");
                BookAnalysisRecord::fallback(book.clone())
            }
        }
    }
}

fn system_prompt() -> String {
    let mut prompt = String::new();
    prompt.push_str(include_str!("prompts/story_analyst.txt"));
    prompt.push_str("\n\n");
    prompt.push_str(include_str!("prompts/story_tools.txt"));
    prompt
}

fn analysis_prompt(history: &[ConversationTurn], book: &BookFact) -> String {
    format!(
        "Based on our conversation about \"{}\" by {}, please create a structured analysis for game design.\n\n{}\nConversation:\n{}\n",
        book.title,
        book.author,
        include_str!("prompts/analysis_request.txt"),
        transcript(history, "Agent"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_prompt_mentions_book_and_transcript() {
        let book = BookFact::new("Dragons Love Tacos", "Adam Rubin");
        let history = vec![
            ConversationTurn::user("I read Dragons Love Tacos"),
            ConversationTurn::agent("Is that \"Dragons Love Tacos\" by Adam Rubin?"),
        ];
        let prompt = analysis_prompt(&history, &book);

        assert!(prompt.contains("\"Dragons Love Tacos\" by Adam Rubin"));
        assert!(prompt.contains("User: I read Dragons Love Tacos"));
        assert!(prompt.contains("Agent: Is that"));
        assert!(prompt.contains("Return ONLY valid JSON"));
    }

    #[test]
    fn test_payload_target_age_optional() {
        let json = r#"{"plot_summary": "p", "setting": "s", "themes": [], "characters": [],
            "game_elements": [], "tone": "t"}"#;
        let payload: AnalysisPayload = serde_json::from_str(json).unwrap();
        assert!(payload.target_age.is_none());
    }
}
