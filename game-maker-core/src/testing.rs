//! Testing utilities for the game-making pipeline.
//!
//! This module provides tools for integration testing:
//! - `ScriptedGenerator` for deterministic testing without API calls
//! - `TestHarness` for scripted conversations against one orchestrator
//! - Assertion helpers for verifying phases and records

use crate::agents::{AgentConfig, GenerateError, Reply, ReplySegment, TextGenerator};
use crate::assembler::{assemble, GameAssembler};
use crate::orchestrator::{Orchestrator, Phase, StageAgents, TurnResponse};
use crate::records::{ConversationTurn, GameDesignRecord};
use crate::{DesignAgent, StoryAgent};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// One scripted generator result.
#[derive(Debug, Clone)]
pub enum Scripted {
    Reply(Reply),
    /// Return an error.
    Fail(String),
    /// Never answer within any reasonable timeout.
    Stall,
    /// Panic inside the generator.
    Panic(String),
}

/// A conversational call the generator received.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system_prompt: String,
    pub history: Vec<ConversationTurn>,
    pub user_text: String,
}

#[derive(Default)]
struct Script {
    replies: VecDeque<Scripted>,
    structured: VecDeque<Scripted>,
    calls: Vec<RecordedCall>,
    structured_prompts: Vec<String>,
}

/// A text generator that plays back scripted results in order.
///
/// Conversational and structured calls have separate queues. An exhausted
/// conversational queue answers with a neutral line; an exhausted
/// structured queue fails, which sends extraction down its fallback path.
#[derive(Default)]
pub struct ScriptedGenerator {
    script: Mutex<Script>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue a conversational result.
    pub fn push_reply(&self, scripted: Scripted) {
        self.script().replies.push_back(scripted);
    }

    /// Queue a structured-extraction result.
    pub fn push_structured(&self, scripted: Scripted) {
        self.script().structured.push_back(scripted);
    }

    /// Every conversational call so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.script().calls.clone()
    }

    /// Every structured prompt so far.
    pub fn structured_prompts(&self) -> Vec<String> {
        self.script().structured_prompts.clone()
    }

    async fn play(next: Option<Scripted>, exhausted: Scripted) -> Result<Reply, GenerateError> {
        match next.unwrap_or(exhausted) {
            Scripted::Reply(reply) => Ok(reply),
            Scripted::Fail(message) => Err(GenerateError::Failed(message)),
            Scripted::Stall => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(GenerateError::Failed("stalled".to_string()))
            }
            Scripted::Panic(message) => panic!("{message}"),
        }
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        _config: &AgentConfig,
        system_prompt: &str,
        history: &[ConversationTurn],
        user_text: &str,
    ) -> Result<Reply, GenerateError> {
        let next = {
            let mut script = self.script();
            script.calls.push(RecordedCall {
                system_prompt: system_prompt.to_string(),
                history: history.to_vec(),
                user_text: user_text.to_string(),
            });
            script.replies.pop_front()
        };
        let exhausted = Scripted::Reply(Reply::from("Tell me more!"));
        Self::play(next, exhausted).await
    }

    async fn generate_structured(
        &self,
        _config: &AgentConfig,
        prompt: &str,
    ) -> Result<String, GenerateError> {
        let next = {
            let mut script = self.script();
            script.structured_prompts.push(prompt.to_string());
            script.structured.pop_front()
        };
        let exhausted = Scripted::Fail("no scripted structured reply".to_string());
        Self::play(next, exhausted).await.map(Reply::into_text)
    }
}

/// Test harness for running scripted conversations.
pub struct TestHarness {
    /// The scripted generator behind both agents.
    pub generator: Arc<ScriptedGenerator>,
    /// The session under test.
    pub orchestrator: Orchestrator,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_timeout(AgentConfig::default().timeout)
    }

    /// A harness whose agents give up on the generator after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::build(timeout, Box::new(assemble))
    }

    /// A harness that builds games with `assembler` instead of the templates.
    pub fn with_assembler(assembler: impl GameAssembler + 'static) -> Self {
        Self::build(AgentConfig::default().timeout, Box::new(assembler))
    }

    fn build(timeout: Duration, assembler: Box<dyn GameAssembler>) -> Self {
        let generator = Arc::new(ScriptedGenerator::new());
        let agents = StageAgents {
            story: StoryAgent::new(generator.clone())
                .with_config(AgentConfig::story().with_timeout(timeout)),
            design: DesignAgent::new(generator.clone())
                .with_config(AgentConfig::design().with_timeout(timeout)),
            assembler,
        };
        let orchestrator = Orchestrator::new(Arc::new(agents));
        Self {
            generator,
            orchestrator,
        }
    }

    /// Queue a plain-text agent reply.
    pub fn expect_reply(&mut self, text: impl Into<String>) -> &mut Self {
        self.generator
            .push_reply(Scripted::Reply(Reply::Text(text.into())));
        self
    }

    /// Queue a multi-segment agent reply.
    pub fn expect_segments(&mut self, segments: Vec<ReplySegment>) -> &mut Self {
        self.generator
            .push_reply(Scripted::Reply(Reply::Segments(segments)));
        self
    }

    /// Queue a generator failure for the next agent turn.
    pub fn expect_failure(&mut self, message: impl Into<String>) -> &mut Self {
        self.generator.push_reply(Scripted::Fail(message.into()));
        self
    }

    /// Queue a structured-extraction reply.
    pub fn expect_structured(&mut self, raw: impl Into<String>) -> &mut Self {
        self.generator
            .push_structured(Scripted::Reply(Reply::Text(raw.into())));
        self
    }

    /// Send a user message.
    pub async fn send(&mut self, text: &str) -> TurnResponse {
        self.orchestrator.process_message(text).await
    }

    pub fn phase(&self) -> Phase {
        self.orchestrator.phase()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert the session is in `expected`.
#[track_caller]
pub fn assert_phase(harness: &TestHarness, expected: Phase) {
    assert_eq!(
        harness.phase(),
        expected,
        "Expected phase {expected}, got {}",
        harness.phase()
    );
}

fn rank(phase: Phase) -> u8 {
    match phase {
        Phase::Identifying => 0,
        Phase::Discussing => 1,
        Phase::Designing => 2,
        Phase::Generating => 3,
        Phase::Complete => 4,
    }
}

/// Assert the phase trail only moves forward, except Discussing -> Identifying.
#[track_caller]
pub fn assert_monotonic(trail: &[Phase]) {
    for pair in trail.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        let allowed =
            rank(to) > rank(from) || (from == Phase::Discussing && to == Phase::Identifying);
        assert!(allowed, "Illegal phase move {from} -> {to} in {trail:?}");
    }
}

/// Assert a design has something to collect and something to avoid.
#[track_caller]
pub fn assert_playable(design: &GameDesignRecord) {
    assert!(
        !design.collectibles.is_empty(),
        "Expected design '{}' to have collectibles",
        design.game_title
    );
    assert!(
        !design.obstacles.is_empty(),
        "Expected design '{}' to have obstacles",
        design.game_title
    );
}
