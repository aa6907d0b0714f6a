//! Phase orchestration for one game-making session.
//!
//! The [`Orchestrator`] owns a session's conversation log and every record
//! produced along the way. Each user message is routed to the agent for the
//! current [`Phase`], and the phase advances when that agent says its stage
//! is done:
//!
//! ```text
//! Identifying -> Discussing -> Designing -> Generating -> Complete
//! ```
//!
//! The only step backwards is Discussing -> Identifying, taken when the
//! discussion ends without a known book.

use crate::agents::{DesignAgent, StoryAgent, TextGenerator};
use crate::assembler::{assemble, GameAssembler};
use crate::extract::extract_book_fact;
use crate::records::{
    BookAnalysisRecord, BookFact, ConversationTurn, GameDesignRecord, GameType, GeneratedArtifact,
    Speaker,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

pub const STORY_AGENT: &str = "story_analyst";
pub const DESIGN_AGENT: &str = "game_designer";
pub const BUILD_AGENT: &str = "code_generator";

const MISSING_BOOK: &str = "Hmm, I need to know which book we're discussing first. What book did you read?";
const GAME_READY: &str = "Your game is ready! Would you like to play it or create another one?";
const NO_DESIGN: &str = "Error: No game design available. Please start over.";

/// Where a session is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Identifying,
    Discussing,
    Designing,
    Generating,
    Complete,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Identifying => "identifying",
            Phase::Discussing => "discussing",
            Phase::Designing => "designing",
            Phase::Generating => "generating",
            Phase::Complete => "complete",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The agents shared by every session, plus the assembler that ends the
/// pipeline.
pub struct StageAgents {
    pub story: StoryAgent,
    pub design: DesignAgent,
    pub assembler: Box<dyn GameAssembler>,
}

impl StageAgents {
    /// Both agents over one generator, with default configuration.
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            story: StoryAgent::new(generator.clone()),
            design: DesignAgent::new(generator),
            assembler: Box::new(assemble),
        }
    }

    pub fn with_assembler(mut self, assembler: impl GameAssembler + 'static) -> Self {
        self.assembler = Box::new(assembler);
        self
    }
}

/// A finished game as returned to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameData {
    pub ready: bool,
    pub game_title: String,
    pub game_html: String,
}

impl From<&GeneratedArtifact> for GameData {
    fn from(artifact: &GeneratedArtifact) -> Self {
        Self {
            ready: true,
            game_title: artifact.game_title.clone(),
            game_html: artifact.html.clone(),
        }
    }
}

/// The result of one user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnResponse {
    pub message: String,
    pub phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<&'static str>,
    pub is_complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_info: Option<BookFact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_data: Option<GameData>,
    /// Operator-facing detail when something downstream failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TurnResponse {
    fn new(message: impl Into<String>, phase: Phase, agent_name: &'static str) -> Self {
        Self {
            message: message.into(),
            phase,
            agent_name: Some(agent_name),
            is_complete: false,
            book_info: None,
            game_data: None,
            error: None,
        }
    }

    /// A response for a turn that could not be processed at all.
    pub(crate) fn failure(message: &str, phase: Phase, error: String) -> Self {
        Self {
            message: message.to_string(),
            phase,
            agent_name: None,
            is_complete: false,
            book_info: None,
            game_data: None,
            error: Some(error),
        }
    }
}

/// One session's state machine.
pub struct Orchestrator {
    agents: Arc<StageAgents>,
    phase: Phase,
    turns: Vec<ConversationTurn>,
    /// Index of the first turn of the design stage.
    design_start: Option<usize>,
    book: Option<BookFact>,
    analysis: Option<BookAnalysisRecord>,
    game_type_hint: Option<GameType>,
    design: Option<GameDesignRecord>,
    artifact: Option<GeneratedArtifact>,
    phase_trail: Vec<Phase>,
}

impl Orchestrator {
    pub fn new(agents: Arc<StageAgents>) -> Self {
        Self {
            agents,
            phase: Phase::Identifying,
            turns: Vec::new(),
            design_start: None,
            book: None,
            analysis: None,
            game_type_hint: None,
            design: None,
            artifact: None,
            phase_trail: vec![Phase::Identifying],
        }
    }

    pub fn greeting(&self) -> &'static str {
        self.agents.story.greeting()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Every phase entered, starting with Identifying.
    pub fn phase_trail(&self) -> &[Phase] {
        &self.phase_trail
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn book(&self) -> Option<&BookFact> {
        self.book.as_ref()
    }

    pub fn analysis(&self) -> Option<&BookAnalysisRecord> {
        self.analysis.as_ref()
    }

    pub fn design(&self) -> Option<&GameDesignRecord> {
        self.design.as_ref()
    }

    pub fn artifact(&self) -> Option<&GeneratedArtifact> {
        self.artifact.as_ref()
    }

    pub fn game_type_hint(&self) -> Option<GameType> {
        self.game_type_hint
    }

    /// Handle one user message and advance the phase as far as it goes.
    pub async fn process_message(&mut self, user_text: &str) -> TurnResponse {
        self.turns.push(ConversationTurn::user(user_text));

        let response = match self.phase {
            Phase::Identifying | Phase::Discussing => self.handle_story(user_text).await,
            Phase::Designing => self.handle_design(user_text).await,
            Phase::Generating => self.handle_generation(),
            Phase::Complete => self.handle_complete(),
        };

        self.turns.push(ConversationTurn::agent(response.message.clone()));
        response
    }

    /// Log `text` as the agent's reply to a user turn left unanswered.
    ///
    /// Used when processing stopped before the reply could be logged.
    pub(crate) fn record_reply(&mut self, text: &str) {
        if self.turns.last().is_some_and(|turn| turn.role == Speaker::User) {
            self.turns.push(ConversationTurn::agent(text));
        }
    }

    async fn handle_story(&mut self, user_text: &str) -> TurnResponse {
        let agents = self.agents.clone();
        let history = &self.turns[..self.turns.len() - 1];
        let outcome = agents.story.process(user_text, history).await;

        let mut response = TurnResponse::new(outcome.reply, self.phase, STORY_AGENT);
        if outcome.failed {
            return response;
        }

        if self.phase == Phase::Identifying {
            if let Some(book) = extract_book_fact(&response.message) {
                info!(title = %book.title, author = %book.author, "book identified");
                response.book_info = Some(book.clone());
                self.book = Some(book);
                self.enter(Phase::Discussing);
            }
        }

        if outcome.complete {
            match self.book.clone() {
                Some(book) => {
                    let mut context = self.turns.clone();
                    context.push(ConversationTurn::agent(response.message.clone()));
                    let analysis = agents.story.extract_analysis(&context, &book).await;

                    let greeting = agents.design.greeting(&analysis);
                    response.message.push_str(&format!(
                        "\n\n✨ Awesome! I've learned so much about '{}'!\n\n\
                         Now let's switch gears and design your game! 🎮\n\n{greeting}",
                        book.title
                    ));
                    self.analysis = Some(analysis);
                    // The reply about to be logged opens the design stage.
                    self.design_start = Some(self.turns.len());
                    self.enter(Phase::Designing);
                }
                None => {
                    warn!("story stage ended without a book");
                    response.message.push_str("\n\n");
                    response.message.push_str(MISSING_BOOK);
                    self.enter(Phase::Identifying);
                }
            }
        }

        response.phase = self.phase;
        response
    }

    async fn handle_design(&mut self, user_text: &str) -> TurnResponse {
        let agents = self.agents.clone();
        let window = self.design_window();
        let outcome = agents
            .design
            .process(user_text, window, self.analysis.as_ref())
            .await;

        let mut response = TurnResponse::new(outcome.reply, self.phase, DESIGN_AGENT);
        if outcome.failed {
            return response;
        }
        if outcome.game_type.is_some() {
            self.game_type_hint = outcome.game_type;
        }

        if !outcome.complete {
            return response;
        }
        let Some(analysis) = self.analysis.clone() else {
            warn!("design stage ended without an analysis");
            return response;
        };

        let mut context = self.design_window().to_vec();
        context.push(ConversationTurn::user(user_text));
        context.push(ConversationTurn::agent(response.message.clone()));
        let design = agents
            .design
            .extract_design(&context, &analysis, self.game_type_hint)
            .await;

        self.design = Some(design);
        self.enter(Phase::Generating);
        response
            .message
            .push_str("\n\n🔨 Awesome! Now I'm going to build your game. This will take just a minute...");

        match self.build() {
            Ok(game_data) => {
                response.message.push_str(&format!(
                    "\n\n🎉 '{}' is ready! Your game has been generated and is ready to play!",
                    game_data.game_title
                ));
                response.is_complete = true;
                response.game_data = Some(game_data);
            }
            Err(detail) => {
                response
                    .message
                    .push_str("\n\n❌ Sorry, there was an error generating the game.");
                response.error = Some(detail);
            }
        }

        response.phase = self.phase;
        response
    }

    /// Only reached after an assembly failure: try again.
    fn handle_generation(&mut self) -> TurnResponse {
        if self.design.is_none() {
            warn!("generation phase without a design, starting over");
            self.book = None;
            self.analysis = None;
            self.game_type_hint = None;
            self.design_start = None;
            self.enter(Phase::Identifying);
            return TurnResponse::new(NO_DESIGN, self.phase, BUILD_AGENT);
        }

        match self.build() {
            Ok(game_data) => {
                let mut response = TurnResponse::new(
                    format!(
                        "🎉 '{}' is ready! Your game has been generated and is ready to play!",
                        game_data.game_title
                    ),
                    self.phase,
                    BUILD_AGENT,
                );
                response.is_complete = true;
                response.game_data = Some(game_data);
                response
            }
            Err(detail) => {
                let mut response = TurnResponse::new(
                    "Sorry, there was an error generating the game. Let me try again...",
                    self.phase,
                    BUILD_AGENT,
                );
                response.error = Some(detail);
                response
            }
        }
    }

    fn handle_complete(&self) -> TurnResponse {
        let mut response = TurnResponse::new(GAME_READY, self.phase, BUILD_AGENT);
        response.is_complete = true;
        response.game_data = self.artifact.as_ref().map(GameData::from);
        response
    }

    /// Assemble the stored design and move to Complete.
    fn build(&mut self) -> Result<GameData, String> {
        let design = self.design.as_ref().ok_or_else(|| "no design stored".to_string())?;
        match self.agents.assembler.assemble(design) {
            Ok(artifact) => {
                let game_data = GameData::from(&artifact);
                info!(title = %artifact.game_title, game_type = %artifact.game_type, "game assembled");
                self.artifact = Some(artifact);
                self.enter(Phase::Complete);
                Ok(game_data)
            }
            Err(e) => {
                warn!(error = %e, "game assembly failed");
                Err(e.to_string())
            }
        }
    }

    /// The design-stage turns given to the design agent.
    ///
    /// Starts at the first agent turn of the design stage that mentions the
    /// game, and excludes the user message being processed.
    fn design_window(&self) -> &[ConversationTurn] {
        let history = &self.turns[..self.turns.len().saturating_sub(1)];
        let from = self.design_start.unwrap_or(0).min(history.len());
        let start = history[from..]
            .iter()
            .position(|turn| turn.role == Speaker::Agent && turn.text.to_lowercase().contains("game"))
            .map_or(history.len(), |offset| from + offset);
        &history[start..]
    }

    fn enter(&mut self, phase: Phase) {
        if phase == self.phase {
            return;
        }
        info!(from = %self.phase, to = %phase, "phase transition");
        self.phase = phase;
        self.phase_trail.push(phase);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_wire_names() {
        assert_eq!(serde_json::to_string(&Phase::Identifying).unwrap(), "\"identifying\"");
        assert_eq!(Phase::Complete.to_string(), "complete");
    }

    #[test]
    fn test_turn_response_omits_empty_fields() {
        let response = TurnResponse::new("Hi!", Phase::Discussing, STORY_AGENT);
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["phase"], "discussing");
        assert_eq!(value["agent_name"], "story_analyst");
        assert!(value.get("game_data").is_none());
        assert!(value.get("error").is_none());
    }

    #[tokio::test]
    async fn test_generating_without_design_starts_over() {
        let generator = Arc::new(crate::testing::ScriptedGenerator::new());
        let agents = StageAgents::new(generator.clone()).with_assembler(
            |_: &GameDesignRecord| -> Result<GeneratedArtifact, crate::assembler::AssembleError> {
                panic!("nothing to assemble")
            },
        );
        let mut orchestrator = Orchestrator::new(Arc::new(agents));
        orchestrator.book = Some(BookFact {
            title: "Holes".to_string(),
            author: "Louis Sachar".to_string(),
            summary: None,
        });
        orchestrator.game_type_hint = Some(GameType::TopDown);
        orchestrator.design_start = Some(0);
        orchestrator.enter(Phase::Generating);

        let response = orchestrator.process_message("Is it ready?").await;

        assert_eq!(response.message, NO_DESIGN);
        assert_eq!(response.phase, Phase::Identifying);
        assert_eq!(response.agent_name.as_deref(), Some(BUILD_AGENT));
        assert!(response.game_data.is_none());
        assert_eq!(orchestrator.phase(), Phase::Identifying);
        assert!(orchestrator.book().is_none());
        assert!(orchestrator.game_type_hint().is_none());
        assert!(orchestrator.design_start.is_none());
        assert_eq!(orchestrator.turns().len(), 2);
        assert!(generator.calls().is_empty());
    }
}
