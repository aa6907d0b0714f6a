//! QA tests for the whole pipeline using the headless API.
//!
//! These tests walk a real conversation from the greeting to a finished game:
//! - Book identification
//! - Discussion until the design stage starts
//! - Design until the game is assembled
//!
//! Run with: `ANTHROPIC_API_KEY=$ANTHROPIC_API_KEY cargo test -p game-maker-core qa_basic_flow -- --ignored --nocapture`

use game_maker_core::{ClaudeGenerator, HeadlessGame, Phase, StageAgents};
use std::sync::Arc;

/// Load environment variables from .env file
fn setup() {
    let _ = dotenvy::dotenv();
}

/// Check if API key is available
fn has_api_key() -> bool {
    std::env::var("ANTHROPIC_API_KEY").is_ok()
}

async fn new_game() -> HeadlessGame {
    let generator = Arc::new(ClaudeGenerator::from_env().expect("Failed to create generator"));
    HeadlessGame::new(Arc::new(StageAgents::new(generator))).await
}

// =============================================================================
// BOOK IDENTIFICATION
// =============================================================================

#[tokio::test]
#[ignore]
async fn test_book_identified_from_title() {
    setup();
    if !has_api_key() {
        eprintln!("Skipping test: ANTHROPIC_API_KEY not set");
        return;
    }

    println!("\n=== Testing Book Identification ===\n");

    let game = new_game().await;
    println!("Agent: {}", game.greeting());

    let response = game
        .send("I just read Where the Wild Things Are by Maurice Sendak")
        .await
        .expect("message should be processed");
    println!("Agent [{}]: {}", response.phase, response.message);

    match response.book_info {
        Some(book) => {
            println!("SUCCESS: identified '{}' by {}", book.title, book.author);
            assert_eq!(response.phase, Phase::Discussing);
        }
        None => {
            // The agent may ask a clarifying question first.
            println!("NOTE: book not confirmed on the first turn");
            assert_eq!(response.phase, Phase::Identifying);
        }
    }
}

// =============================================================================
// FULL FLOW
// =============================================================================

#[tokio::test]
#[ignore]
async fn test_full_conversation_produces_game() {
    setup();
    if !has_api_key() {
        eprintln!("Skipping test: ANTHROPIC_API_KEY not set");
        return;
    }

    println!("\n=== Testing Full Conversation ===\n");

    let game = new_game().await;
    let script = [
        "I read Dragons Love Tacos by Adam Rubin!",
        "Yes, that's the one!",
        "The dragons love tacos but spicy salsa makes them breathe fire",
        "My favorite part is the taco party",
        "The dragons are big and friendly",
        "I think I've told you everything, let's design a game!",
        "That's all, let's design the game!",
        "A platformer please!",
        "The dragon should collect tacos",
        "Avoid the spicy salsa!",
        "That sounds perfect, let's build it!",
        "Yes, build your game now please",
        "Ready!",
        "Go!",
        "Please build it",
        "Build it!",
        "Make the game!",
        "Done!",
    ];

    let mut finished = None;
    for line in script {
        println!("User: {line}");
        let response = game.send(line).await.expect("message should be processed");
        println!("Agent [{}]: {}\n", response.phase, response.message);
        if response.is_complete {
            finished = response.game_data;
            break;
        }
    }

    let game_data = finished.expect("conversation should end with a game");
    assert!(game_data.ready);
    assert!(game_data.game_html.contains("<html"));
    assert!(game_data.game_html.contains("phaser.min.js"));

    let status = game.status().await.expect("session exists");
    assert_eq!(status.phase, Phase::Complete);
}
