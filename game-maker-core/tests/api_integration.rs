//! Integration tests that call the real Claude API.
//!
//! These tests require ANTHROPIC_API_KEY to be set (via .env file or environment).
//! Run with: `cargo test -p game-maker-core --test api_integration -- --ignored`
//!
//! These are marked #[ignore] by default to avoid:
//! - API costs in CI
//! - Test failures when no API key is available
//! - Slow test runs (API calls take seconds)

use game_maker_core::records::{BookFact, ConversationTurn};
use game_maker_core::{AgentConfig, ClaudeGenerator, DesignAgent, StoryAgent, TextGenerator};
use std::sync::Arc;

/// Load environment variables from .env file
fn setup() {
    let _ = dotenvy::dotenv();
}

/// Check if API key is available
fn has_api_key() -> bool {
    std::env::var("ANTHROPIC_API_KEY").is_ok()
}

fn generator() -> Arc<dyn TextGenerator> {
    Arc::new(ClaudeGenerator::from_env().expect("Failed to create generator"))
}

#[tokio::test]
#[ignore] // Run with: cargo test -p game-maker-core --test api_integration -- --ignored
async fn test_story_agent_confirms_book() {
    setup();
    if !has_api_key() {
        eprintln!("Skipping test: ANTHROPIC_API_KEY not set");
        return;
    }

    let agent = StoryAgent::new(generator());
    let outcome = agent
        .process("I just read Charlotte's Web! It's about a pig and a spider.", &[])
        .await;

    println!("Story agent: {}", outcome.reply);
    assert!(!outcome.failed, "Generator call should succeed");
    assert!(!outcome.reply.is_empty());
    assert!(
        outcome.reply.contains("Charlotte"),
        "Agent should mention the book: {}",
        outcome.reply
    );
}

#[tokio::test]
#[ignore]
async fn test_analysis_extraction_parses() {
    setup();
    if !has_api_key() {
        eprintln!("Skipping test: ANTHROPIC_API_KEY not set");
        return;
    }

    let agent = StoryAgent::new(generator());
    let book = BookFact::new("Dragons Love Tacos", "Adam Rubin");
    let history = vec![
        ConversationTurn::user("I read Dragons Love Tacos"),
        ConversationTurn::agent("Is that \"Dragons Love Tacos\" by Adam Rubin?"),
        ConversationTurn::user("Yes! The dragons eat tacos but spicy salsa makes them breathe fire"),
        ConversationTurn::agent("Oh no, the spicy salsa! What was your favorite part?"),
        ConversationTurn::user("When the house burned down and they rebuilt it"),
    ];

    let analysis = agent.extract_analysis(&history, &book).await;

    println!("Analysis: {analysis:#?}");
    assert_eq!(analysis.book, book);
    assert!(!analysis.plot_summary.is_empty());
    assert!(!analysis.themes.is_empty());
}

#[tokio::test]
#[ignore]
async fn test_design_agent_picks_up_game_type() {
    setup();
    if !has_api_key() {
        eprintln!("Skipping test: ANTHROPIC_API_KEY not set");
        return;
    }

    let agent = DesignAgent::new(generator()).with_config(AgentConfig {
        max_tokens: 1024,
        ..AgentConfig::design()
    });
    let analysis = game_maker_core::records::BookAnalysisRecord::fallback(BookFact::new(
        "Dragons Love Tacos",
        "Adam Rubin",
    ));

    let outcome = agent
        .process(
            "I want a platformer where the dragon jumps for tacos",
            &[ConversationTurn::agent(agent.greeting(&analysis))],
            Some(&analysis),
        )
        .await;

    println!("Design agent: {}", outcome.reply);
    assert!(!outcome.failed);
    assert!(!outcome.reply.is_empty());
}
