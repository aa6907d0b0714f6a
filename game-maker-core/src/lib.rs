//! Conversational pipeline that turns a chat about a children's book into a
//! playable browser game.
//!
//! This crate provides:
//! - Stage agents that identify and discuss a book, then design a game
//! - A phase orchestrator that moves each session through the pipeline
//! - A deterministic assembler that renders the design as a Phaser page
//! - A session host for running many sessions concurrently
//!
//! # Quick Start
//!
//! ```ignore
//! use game_maker_core::{ClaudeGenerator, SessionHost, StageAgents};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let generator = Arc::new(ClaudeGenerator::from_env()?);
//!     let host = SessionHost::new(Arc::new(StageAgents::new(generator)));
//!
//!     let start = host.start_session().await;
//!     println!("{}", start.message);
//!
//!     let id = start.session_id.to_string();
//!     let response = host.send_message(&id, "I read Charlotte's Web").await?;
//!     println!("[{}] {}", response.phase, response.message);
//!     Ok(())
//! }
//! ```

pub mod agents;
pub mod assembler;
pub mod extract;
pub mod headless;
pub mod orchestrator;
pub mod records;
pub mod session;
pub mod testing;

// Primary public API
pub use agents::{
    AgentConfig, ClaudeGenerator, CompletionPredicate, DesignAgent, GenerateError, Reply,
    ReplySegment, StageLimits, StageOutcome, StoryAgent, TextGenerator,
};
pub use assembler::{assemble, AssembleError, GameAssembler};
pub use extract::{extract_book_fact, extract_json};
pub use headless::{HeadlessError, HeadlessGame};
pub use orchestrator::{GameData, Orchestrator, Phase, StageAgents, TurnResponse};
pub use records::{
    BookAnalysisRecord, BookFact, ConversationTurn, GameDesignRecord, GameType, GeneratedArtifact,
    RecordError, Speaker,
};
pub use session::{HostError, MemorySessionStore, SessionHost, SessionId, SessionSnapshot, SessionStore};
pub use testing::{ScriptedGenerator, TestHarness};
