//! The design agent: turns the book discussion into a game design.

use super::{recent, with_deadline, AgentConfig, CompletionPredicate, StageLimits, StageOutcome, TextGenerator};
use crate::extract::parse_structured;
use crate::records::{
    transcript, BookAnalysisRecord, ConversationTurn, GameDesignRecord, GameElementFact,
    GameMechanics, GameObjectFact, GameType, Speaker,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub const DESIGN_APOLOGY: &str = "Hmm, I had a little trouble there. Could you say that again?";

/// Design turns summarized for extraction.
const SUMMARY_TURNS: usize = 10;

/// Game elements considered by the fallback scan.
const SCANNED_ELEMENTS: usize = 5;

/// Entries per collection taken from the scan.
const SCANNED_PER_KIND: usize = 2;

const COLLECTIBLE_WORDS: &[&str] = &["collect", "find", "get", "treasure", "food", "item"];
const OBSTACLE_WORDS: &[&str] = &["danger", "avoid", "enemy", "bad", "scary"];

/// Chats about the game until the design is settled.
pub struct DesignAgent {
    generator: Arc<dyn TextGenerator>,
    config: AgentConfig,
    completion: Box<dyn CompletionPredicate>,
}

impl DesignAgent {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            config: AgentConfig::design(),
            completion: Box::new(StageLimits::DESIGN),
        }
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the rule that ends the design discussion.
    pub fn with_completion(mut self, predicate: impl CompletionPredicate + 'static) -> Self {
        self.completion = Box::new(predicate);
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn greeting(&self, analysis: &BookAnalysisRecord) -> String {
        format!(
            "🎮 Let's design your game for '{}'!\n\n\
             Which type: **platformer** (jump & collect), **top-down** (explore), or **obstacle-avoider** (dodge)?",
            analysis.book.title
        )
    }

    /// Respond to the user. `history` is the design window and excludes
    /// `user_text`. The first user message of the stage carries the book
    /// context.
    pub async fn process(
        &self,
        user_text: &str,
        history: &[ConversationTurn],
        analysis: Option<&BookAnalysisRecord>,
    ) -> StageOutcome {
        let window = recent(history);

        let input = match analysis {
            Some(analysis) if !window.iter().any(|t| t.role == Speaker::User) => {
                with_book_context(user_text, analysis)
            }
            _ => user_text.to_string(),
        };

        let system_prompt = system_prompt();
        let call = self
            .generator
            .generate(&self.config, &system_prompt, window, &input);

        match with_deadline(self.config.timeout, call).await {
            Ok(reply) => {
                let reply = reply.into_text();
                let complete = self.completion.is_complete(&reply, window.len());
                StageOutcome {
                    game_type: GameType::detect(&reply),
                    reply,
                    complete,
                    failed: false,
                }
            }
            Err(e) => {
                warn!(error = %e, "design agent failed");
                StageOutcome::apology(DESIGN_APOLOGY)
            }
        }
    }

    /// Summarize the design discussion into a design record.
    ///
    /// Never fails: generator or parse problems yield [`fallback_design`],
    /// and a parsed design with no collectibles or obstacles borrows them
    /// from it.
    pub async fn extract_design(
        &self,
        history: &[ConversationTurn],
        analysis: &BookAnalysisRecord,
        hint: Option<GameType>,
    ) -> GameDesignRecord {
        let prompt = design_prompt(history, analysis);
        let call = self.generator.generate_structured(&self.config, &prompt);

        let raw = match with_deadline(self.config.timeout, call).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "design extraction failed, using fallback");
                return fallback_design(analysis, hint);
            }
        };
        debug!(bytes = raw.len(), "design reply received");

        match parse_structured::<GameDesignRecord>(&raw) {
            Ok(design) => repair(design, analysis, hint),
            Err(e) => {
                let preview: String = raw.chars().take(200).collect();
                warn!(error = %e, %preview, "design reply was not valid JSON, using fallback");
                fallback_design(analysis, hint)
            }
        }
    }
}

fn system_prompt() -> String {
    let mut prompt = String::new();
    prompt.push_str(include_str!("prompts/game_designer.txt"));
    prompt.push_str("\n\n");
    prompt.push_str(include_str!("prompts/design_tools.txt"));
    prompt
}

/// Prefix the first design message with what we know about the book.
fn with_book_context(user_text: &str, analysis: &BookAnalysisRecord) -> String {
    let themes: Vec<&str> = analysis.themes.iter().take(3).map(String::as_str).collect();
    let elements: Vec<&str> = analysis
        .game_elements
        .iter()
        .take(5)
        .map(|e| e.name.as_str())
        .collect();

    format!(
        "Book: \"{}\" by {}\nThemes: {}\nMain elements: {}\n\nUser says: {}",
        analysis.book.title,
        analysis.book.author,
        themes.join(", "),
        elements.join(", "),
        user_text
    )
}

fn design_prompt(history: &[ConversationTurn], analysis: &BookAnalysisRecord) -> String {
    let title = &analysis.book.title;
    let characters: Vec<&str> = analysis
        .characters
        .iter()
        .take(3)
        .map(|c| c.name.as_str())
        .collect();
    let summary = &history[history.len().saturating_sub(SUMMARY_TURNS)..];

    let mut prompt = format!(
        "Based on our game design conversation for \"{title}\", create a complete game design.\n\n\
         Book context:\n\
         - Title: {title}\n\
         - Author: {}\n\
         - Themes: {}\n\
         - Characters: {}\n\n\
         Design conversation:\n{}\n\n",
        analysis.book.author,
        analysis.themes.join(", "),
        characters.join(", "),
        transcript(summary, "Designer"),
    );
    prompt.push_str(&include_str!("prompts/design_schema.txt").replace("{{book_title}}", title));
    prompt
}

/// Fill empty collections of a parsed design from the fallback scan.
fn repair(
    mut design: GameDesignRecord,
    analysis: &BookAnalysisRecord,
    hint: Option<GameType>,
) -> GameDesignRecord {
    if design.game_title.trim().is_empty() {
        design.game_title = format!("{} Adventure", analysis.book.title);
    }
    if design.collectibles.is_empty() || design.obstacles.is_empty() {
        warn!(game = %design.game_title, "design missing collectibles or obstacles, repairing");
        let fallback = fallback_design(analysis, hint);
        if design.collectibles.is_empty() {
            design.collectibles = fallback.collectibles;
        }
        if design.obstacles.is_empty() {
            design.obstacles = fallback.obstacles;
        }
    }
    design
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ElementKind {
    Collectible,
    Obstacle,
}

/// Classify a story element by its declared type, then by description.
fn classify(element: &GameElementFact) -> Option<ElementKind> {
    let element_type = element.element_type.to_lowercase();
    if element_type.contains("collect") {
        return Some(ElementKind::Collectible);
    }
    if element_type.contains("obstacle") || element_type.contains("enemy") {
        return Some(ElementKind::Obstacle);
    }

    let description = element.description.to_lowercase();
    if COLLECTIBLE_WORDS.iter().any(|w| description.contains(w)) {
        Some(ElementKind::Collectible)
    } else if OBSTACLE_WORDS.iter().any(|w| description.contains(w)) {
        Some(ElementKind::Obstacle)
    } else {
        None
    }
}

/// The deterministic design used when extraction fails.
pub fn fallback_design(analysis: &BookAnalysisRecord, hint: Option<GameType>) -> GameDesignRecord {
    let book_title = &analysis.book.title;
    let hero = analysis
        .characters
        .first()
        .map(|c| c.name.clone())
        .unwrap_or_else(|| "Hero".to_string());
    let theme = analysis
        .themes
        .first()
        .cloned()
        .unwrap_or_else(|| "adventure".to_string());

    let scanned: Vec<(ElementKind, &GameElementFact)> = analysis
        .game_elements
        .iter()
        .take(SCANNED_ELEMENTS)
        .filter_map(|e| classify(e).map(|kind| (kind, e)))
        .collect();
    let pick = |wanted: ElementKind| {
        scanned
            .iter()
            .filter(|(kind, _)| *kind == wanted)
            .map(|(_, e)| *e)
            .take(SCANNED_PER_KIND)
            .collect::<Vec<_>>()
    };

    let mut collectibles: Vec<GameObjectFact> = pick(ElementKind::Collectible)
        .into_iter()
        .map(|e| {
            GameObjectFact::new(
                &e.name,
                "collectible",
                format!("Golden {}", e.name.to_lowercase()),
                "Give points when collected",
                &e.description,
            )
        })
        .collect();
    if collectibles.is_empty() {
        collectibles.push(GameObjectFact::new(
            "Story Items",
            "collectible",
            "Glowing golden objects",
            "Give points when collected",
            format!("Important items from {book_title}"),
        ));
    }

    let mut obstacles: Vec<GameObjectFact> = pick(ElementKind::Obstacle)
        .into_iter()
        .map(|e| {
            GameObjectFact::new(
                &e.name,
                "obstacle",
                format!("Red {}", e.name.to_lowercase()),
                "End game on contact",
                &e.description,
            )
        })
        .collect();
    if obstacles.is_empty() {
        obstacles.push(GameObjectFact::new(
            "Hazards",
            "obstacle",
            "Red dangerous objects",
            "End game on contact",
            format!("Challenges from {book_title}"),
        ));
    }

    GameDesignRecord {
        game_title: format!("{book_title} Adventure"),
        game_type: hint.unwrap_or_default(),
        book_title: book_title.clone(),
        theme: format!("{} themed adventure", capitalize(&theme)),
        story_premise: format!(
            "Help {hero} collect items and avoid obstacles in this {theme} adventure!"
        ),
        mechanics: GameMechanics {
            player_movement: "Arrow keys to move left/right, UP to jump".to_string(),
            primary_action: "Jump and collect items".to_string(),
            win_condition: "Collect all items without hitting obstacles".to_string(),
            lose_condition: Some("Touch an obstacle".to_string()),
            difficulty: "medium".to_string(),
        },
        player_character: GameObjectFact::new(
            &hero,
            "player",
            format!("Friendly {hero}"),
            "Runs and jumps through the level",
            format!("The main character from {book_title}"),
        ),
        collectibles,
        obstacles,
        enemies: Vec::new(),
        power_ups: Vec::new(),
        level_design: "Multi-level platforms with items scattered throughout".to_string(),
        visual_style: "Colorful and playful".to_string(),
        scoring: BTreeMap::from([("item".to_string(), 10), ("complete".to_string(), 100)]),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
