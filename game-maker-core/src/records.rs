//! Structured records passed between conversational stages.
//!
//! These are the data contracts of the pipeline: the book identified in the
//! first phase, the analysis produced when discussion ends, and the game
//! design handed to the assembler. Wire names match the JSON the stage
//! agents ask the model to produce.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Errors from record validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("Required field `{0}` is empty")]
    EmptyField(&'static str),

    #[error("Design has no {0}")]
    EmptyCollection(&'static str),
}

/// Who said a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Agent,
}

/// One entry in a session's append-only conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Speaker,
    pub text: String,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Speaker::User,
            text: text.into(),
        }
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            role: Speaker::Agent,
            text: text.into(),
        }
    }
}

/// Render turns as `User: ...` / `<agent label>: ...` lines for a prompt.
pub fn transcript(turns: &[ConversationTurn], agent_label: &str) -> String {
    turns
        .iter()
        .map(|turn| match turn.role {
            Speaker::User => format!("User: {}", turn.text),
            Speaker::Agent => format!("{agent_label}: {}", turn.text),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// A book identified from the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookFact {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub summary: Option<String>,
}

impl BookFact {
    /// Create a book fact with the default summary line.
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        let author = author.into();
        Self {
            title: title.into(),
            summary: Some(format!("A wonderful book by {author}")),
            author,
        }
    }
}

/// A character from the book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterFact {
    pub name: String,
    pub description: String,
    pub role: String,
    #[serde(default)]
    pub traits: Vec<String>,
}

/// A story element that could become a game mechanic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameElementFact {
    /// collectible, obstacle, power-up or character. Free text.
    pub element_type: String,
    pub name: String,
    pub description: String,
    pub game_potential: String,
}

fn default_target_age() -> String {
    "5-10".to_string()
}

/// Analysis of the book, created once when discussion ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookAnalysisRecord {
    pub book: BookFact,
    pub plot_summary: String,
    pub setting: String,
    pub themes: Vec<String>,
    pub characters: Vec<CharacterFact>,
    pub game_elements: Vec<GameElementFact>,
    pub tone: String,
    #[serde(default = "default_target_age")]
    pub target_age: String,
}

impl BookAnalysisRecord {
    /// The fixed minimal analysis used when extraction fails.
    pub fn fallback(book: BookFact) -> Self {
        Self {
            book,
            plot_summary: "A wonderful story to turn into a game!".to_string(),
            setting: "A magical world".to_string(),
            themes: vec!["adventure".to_string(), "friendship".to_string()],
            characters: Vec::new(),
            game_elements: Vec::new(),
            tone: "fun and engaging".to_string(),
            target_age: default_target_age(),
        }
    }

    pub fn validate(&self) -> Result<(), RecordError> {
        if self.book.title.trim().is_empty() {
            return Err(RecordError::EmptyField("book.title"));
        }
        if self.plot_summary.trim().is_empty() {
            return Err(RecordError::EmptyField("plot_summary"));
        }
        Ok(())
    }
}

/// The three game layouts the assembler knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GameType {
    #[default]
    Platformer,
    TopDown,
    ObstacleAvoider,
}

impl GameType {
    /// Parse a game type leniently. Unrecognized text is a platformer.
    pub fn parse(s: &str) -> Self {
        Self::detect(s).unwrap_or_default()
    }

    /// Find a game type mentioned anywhere in free text.
    pub fn detect(text: &str) -> Option<Self> {
        let lower = text.to_lowercase();
        if lower.contains("platformer") {
            Some(GameType::Platformer)
        } else if lower.contains("top-down") || lower.contains("top down") || lower.contains("topdown") {
            Some(GameType::TopDown)
        } else if lower.contains("obstacle") || lower.contains("avoider") || lower.contains("dodg") {
            Some(GameType::ObstacleAvoider)
        } else {
            None
        }
    }

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            GameType::Platformer => "platformer",
            GameType::TopDown => "top-down",
            GameType::ObstacleAvoider => "obstacle-avoider",
        }
    }

    /// Display name shown to players.
    pub fn title(&self) -> &'static str {
        match self {
            GameType::Platformer => "Platformer",
            GameType::TopDown => "Top-Down Adventure",
            GameType::ObstacleAvoider => "Obstacle Avoider",
        }
    }
}

impl From<String> for GameType {
    fn from(s: String) -> Self {
        GameType::parse(&s)
    }
}

impl From<GameType> for String {
    fn from(t: GameType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_difficulty() -> String {
    "medium".to_string()
}

/// Core game rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameMechanics {
    pub player_movement: String,
    pub primary_action: String,
    pub win_condition: String,
    #[serde(default)]
    pub lose_condition: Option<String>,
    #[serde(default = "default_difficulty")]
    pub difficulty: String,
}

/// Shared shape for the player, collectibles, obstacles, enemies and power-ups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameObjectFact {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub appearance: String,
    pub behavior: String,
    pub story_connection: String,
}

impl GameObjectFact {
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        appearance: impl Into<String>,
        behavior: impl Into<String>,
        story_connection: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            appearance: appearance.into(),
            behavior: behavior.into(),
            story_connection: story_connection.into(),
        }
    }
}

/// Complete game design, created once when the design conversation ends.
///
/// `collectibles` and `obstacles` always hold at least one entry once the
/// record leaves the design agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameDesignRecord {
    pub game_title: String,
    pub game_type: GameType,
    pub book_title: String,
    pub theme: String,
    pub story_premise: String,
    pub mechanics: GameMechanics,
    pub player_character: GameObjectFact,
    pub collectibles: Vec<GameObjectFact>,
    pub obstacles: Vec<GameObjectFact>,
    #[serde(default)]
    pub enemies: Vec<GameObjectFact>,
    #[serde(default)]
    pub power_ups: Vec<GameObjectFact>,
    pub level_design: String,
    pub visual_style: String,
    pub scoring: BTreeMap<String, i64>,
}

impl GameDesignRecord {
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.game_title.trim().is_empty() {
            return Err(RecordError::EmptyField("game_title"));
        }
        if self.collectibles.is_empty() {
            return Err(RecordError::EmptyCollection("collectibles"));
        }
        if self.obstacles.is_empty() {
            return Err(RecordError::EmptyCollection("obstacles"));
        }
        Ok(())
    }
}

/// The playable output of the assembler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    pub game_title: String,
    pub game_type: GameType,
    /// The game script alone.
    pub game_code: String,
    /// The full page with the script embedded.
    pub html: String,
}
