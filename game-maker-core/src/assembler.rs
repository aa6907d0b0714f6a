//! Deterministic game assembly.
//!
//! A [`GameDesignRecord`] picks one of three Phaser layouts. Story names and
//! a fixed palette are substituted into `{{slot}}` placeholders, and the
//! script is wrapped in a page shell. Nothing here calls a model.

use crate::records::{GameDesignRecord, GameObjectFact, GameType, GeneratedArtifact};
use thiserror::Error;

const PAGE_SHELL: &str = include_str!("templates/page_shell.html");
const GAME_OVER: &str = include_str!("templates/game_over.js");
const PLATFORMER: &str = include_str!("templates/platformer.js");
const TOP_DOWN: &str = include_str!("templates/top_down.js");
const OBSTACLE_AVOIDER: &str = include_str!("templates/obstacle_avoider.js");

const DEFAULT_PLAYER: &str = "Hero";
const DEFAULT_COLLECTIBLE: &str = "Items";
const DEFAULT_OBSTACLE: &str = "Obstacles";

/// Errors from game assembly.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssembleError {
    /// The template references a slot nothing fills.
    #[error("Template slot `{0}` was left unfilled")]
    UnfilledSlot(String),
}

/// Colors for a layout, as Phaser hex literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background: &'static str,
    pub platform: Option<&'static str>,
    pub player: &'static str,
    pub collectible: &'static str,
    pub obstacle: &'static str,
}

/// Everything fixed about one game type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub template: &'static str,
    pub palette: Palette,
    pub collectible_count: Option<u32>,
    pub obstacle_count: Option<u32>,
    /// Round length in seconds.
    pub game_time: Option<u32>,
    pub initial_speed: Option<u32>,
}

impl Layout {
    pub fn for_type(game_type: GameType) -> Self {
        match game_type {
            GameType::Platformer => Layout {
                template: PLATFORMER,
                palette: Palette {
                    background: "0x87CEEB",
                    platform: Some("0x8B4513"),
                    player: "0x00FF00",
                    collectible: "0xFFD700",
                    obstacle: "0xFF0000",
                },
                collectible_count: Some(8),
                obstacle_count: Some(3),
                game_time: None,
                initial_speed: None,
            },
            GameType::TopDown => Layout {
                template: TOP_DOWN,
                palette: Palette {
                    background: "0x228B22",
                    platform: None,
                    player: "0x00FF00",
                    collectible: "0xFFD700",
                    obstacle: "0x800080",
                },
                collectible_count: Some(15),
                obstacle_count: Some(5),
                game_time: Some(60),
                initial_speed: None,
            },
            GameType::ObstacleAvoider => Layout {
                template: OBSTACLE_AVOIDER,
                palette: Palette {
                    background: "0x1E90FF",
                    platform: None,
                    player: "0x00FF00",
                    collectible: "0xFFD700",
                    obstacle: "0xFF0000",
                },
                collectible_count: None,
                obstacle_count: None,
                game_time: None,
                initial_speed: Some(200),
            },
        }
    }

    fn slots(&self) -> Vec<(&'static str, String)> {
        let palette = &self.palette;
        let mut slots = vec![
            ("background_color", palette.background.to_string()),
            ("player_color", palette.player.to_string()),
            ("collectible_color", palette.collectible.to_string()),
            ("obstacle_color", palette.obstacle.to_string()),
        ];
        let optional = [
            ("platform_color", palette.platform.map(str::to_string)),
            ("collectible_count", self.collectible_count.map(|n| n.to_string())),
            ("obstacle_count", self.obstacle_count.map(|n| n.to_string())),
            ("game_time", self.game_time.map(|n| n.to_string())),
            ("initial_speed", self.initial_speed.map(|n| n.to_string())),
        ];
        slots.extend(
            optional
                .into_iter()
                .filter_map(|(name, value)| value.map(|v| (name, v))),
        );
        slots
    }
}

/// Turns a finished design into a playable artifact.
///
/// [`assemble`] is the implementation used in production.
pub trait GameAssembler: Send + Sync {
    fn assemble(&self, design: &GameDesignRecord) -> Result<GeneratedArtifact, AssembleError>;
}

impl<F> GameAssembler for F
where
    F: Fn(&GameDesignRecord) -> Result<GeneratedArtifact, AssembleError> + Send + Sync,
{
    fn assemble(&self, design: &GameDesignRecord) -> Result<GeneratedArtifact, AssembleError> {
        self(design)
    }
}

/// Build the playable game for a design.
pub fn assemble(design: &GameDesignRecord) -> Result<GeneratedArtifact, AssembleError> {
    let layout = Layout::for_type(design.game_type);

    let mut slots = layout.slots();
    slots.extend([
        ("game_title", js_string(&design.game_title)),
        ("player_name", js_string(name_or(Some(&design.player_character), DEFAULT_PLAYER))),
        ("collectible_name", js_string(name_or(design.collectibles.first(), DEFAULT_COLLECTIBLE))),
        ("obstacle_name", js_string(name_or(design.obstacles.first(), DEFAULT_OBSTACLE))),
    ]);

    let mut game_code = render(layout.template, &slots)?;
    game_code.push_str(GAME_OVER);

    let html = render(
        PAGE_SHELL,
        &[
            ("game_title", html_text(&design.game_title)),
            ("game_type_title", html_text(design.game_type.title())),
            ("game_code", game_code.clone()),
        ],
    )?;

    Ok(GeneratedArtifact {
        game_title: design.game_title.clone(),
        game_type: design.game_type,
        game_code,
        html,
    })
}

fn name_or<'a>(object: Option<&'a GameObjectFact>, default: &'a str) -> &'a str {
    object
        .map(|o| o.name.trim())
        .filter(|name| !name.is_empty())
        .unwrap_or(default)
}

/// Replace every `{{name}}` in `template` with its slot value.
///
/// Values are inserted verbatim and never rescanned.
fn render(template: &str, slots: &[(&str, String)]) -> Result<String, AssembleError> {
    let mut out = String::with_capacity(template.len() + 512);
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let close = after
            .find("}}")
            .ok_or_else(|| AssembleError::UnfilledSlot(after.chars().take(32).collect()))?;
        let name = &after[..close];
        let value = slots
            .iter()
            .find(|(slot, _)| *slot == name)
            .map(|(_, value)| value)
            .ok_or_else(|| AssembleError::UnfilledSlot(name.to_string()))?;
        out.push_str(value);
        rest = &after[close + 2..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Escape text for a single-quoted JS string inside an HTML script block.
fn js_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '<' => out.push_str("\\u003C"),
            '>' => out.push_str("\\u003E"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

/// Escape text for HTML element content.
fn html_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::GameMechanics;
    use std::collections::BTreeMap;

    fn design(game_type: GameType) -> GameDesignRecord {
        GameDesignRecord {
            game_title: "Taco Quest".to_string(),
            game_type,
            book_title: "Dragons Love Tacos".to_string(),
            theme: "Party".to_string(),
            story_premise: "Collect tacos".to_string(),
            mechanics: GameMechanics {
                player_movement: "Arrows".to_string(),
                primary_action: "Jump".to_string(),
                win_condition: "Collect all".to_string(),
                lose_condition: None,
                difficulty: "easy".to_string(),
            },
            player_character: GameObjectFact::new("Dragon", "player", "Green", "Runs", "Hero"),
            collectibles: vec![GameObjectFact::new("Tacos", "collectible", "", "", "")],
            obstacles: vec![GameObjectFact::new("Spicy Salsa", "obstacle", "", "", "")],
            enemies: vec![],
            power_ups: vec![],
            level_design: "Platforms".to_string(),
            visual_style: "Cartoon".to_string(),
            scoring: BTreeMap::new(),
        }
    }

    #[test]
    fn test_every_layout_fills_all_slots() {
        for game_type in [GameType::Platformer, GameType::TopDown, GameType::ObstacleAvoider] {
            let artifact = assemble(&design(game_type)).unwrap();
            assert!(!artifact.html.contains("{{"), "{game_type} left a slot");
            assert!(artifact.html.contains("Taco Quest"));
            assert!(artifact.html.contains(game_type.title()));
            assert!(artifact.html.contains(&artifact.game_code));
            assert_eq!(artifact.game_type, game_type);
        }
    }

    #[test]
    fn test_palette_and_counts() {
        let platformer = assemble(&design(GameType::Platformer)).unwrap().game_code;
        assert!(platformer.contains("0x87CEEB"));
        assert!(platformer.contains("0x8B4513"));
        assert!(platformer.contains("const COLLECTIBLE_COUNT = 8;"));
        assert!(platformer.contains("const OBSTACLE_COUNT = 3;"));

        let top_down = assemble(&design(GameType::TopDown)).unwrap().game_code;
        assert!(top_down.contains("0x800080"));
        assert!(top_down.contains("const COLLECTIBLE_COUNT = 15;"));
        assert!(top_down.contains("let gameTime = 60;"));

        let avoider = assemble(&design(GameType::ObstacleAvoider)).unwrap().game_code;
        assert!(avoider.contains("0x1E90FF"));
        assert!(avoider.contains("let speed = 200;"));
    }

    #[test]
    fn test_names_substituted_with_defaults() {
        let code = assemble(&design(GameType::Platformer)).unwrap().game_code;
        assert!(code.contains("const PLAYER_NAME = 'Dragon';"));
        assert!(code.contains("const COLLECTIBLE_NAME = 'Tacos';"));
        assert!(code.contains("const OBSTACLE_NAME = 'Spicy Salsa';"));

        let mut bare = design(GameType::Platformer);
        bare.player_character.name = "  ".to_string();
        bare.collectibles.clear();
        bare.obstacles.clear();
        let code = assemble(&bare).unwrap().game_code;
        assert!(code.contains("const PLAYER_NAME = 'Hero';"));
        assert!(code.contains("const COLLECTIBLE_NAME = 'Items';"));
        assert!(code.contains("const OBSTACLE_NAME = 'Obstacles';"));
    }

    #[test]
    fn test_names_are_escaped() {
        let mut tricky = design(GameType::TopDown);
        tricky.game_title = "Charlotte's <Web>".to_string();
        tricky.collectibles[0].name = "It's </script>".to_string();
        let artifact = assemble(&tricky).unwrap();

        assert!(artifact.game_code.contains("const GAME_TITLE = 'Charlotte\\'s \\u003CWeb\\u003E';"));
        assert!(artifact.game_code.contains("'It\\'s \\u003C/script\\u003E'"));
        assert!(artifact.html.contains("<title>Charlotte&#39;s &lt;Web&gt;</title>"));
        assert_eq!(artifact.html.matches("</script>").count(), 2);
    }

    #[test]
    fn test_slot_values_are_not_rescanned() {
        let mut braces = design(GameType::Platformer);
        braces.game_title = "{{player_name}}".to_string();
        let artifact = assemble(&braces).unwrap();
        assert!(artifact.game_code.contains("const GAME_TITLE = '{{player_name}}';"));
    }

    #[test]
    fn test_unfilled_slot_is_an_error() {
        let err = render("let x = {{missing}};", &[("other", "1".to_string())]).unwrap_err();
        assert_eq!(err, AssembleError::UnfilledSlot("missing".to_string()));
    }

    #[test]
    fn test_assembly_is_deterministic() {
        let d = design(GameType::ObstacleAvoider);
        assert_eq!(assemble(&d).unwrap(), assemble(&d).unwrap());
    }
}
