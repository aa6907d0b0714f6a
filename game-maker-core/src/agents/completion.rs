//! When a conversational stage has heard enough.

/// History length at which the story discussion ends regardless of content.
pub const STORY_TURN_CAP: usize = 12;

/// History length at which the design discussion ends regardless of content.
pub const DESIGN_TURN_CAP: usize = 10;

pub const STORY_COMPLETION_PHRASES: &[&str] = &[
    "enough information",
    "ready to design",
    "let's design",
    "create the game",
    "game design",
];

pub const DESIGN_COMPLETION_PHRASES: &[&str] = &[
    "design is complete",
    "ready to build",
    "let's make it",
    "generate the game",
    "build your game",
    "create the code",
];

/// Decides whether a stage is complete after an agent reply.
///
/// `history_len` is the length of the history the agent was given, not
/// counting the current exchange.
pub trait CompletionPredicate: Send + Sync {
    fn is_complete(&self, reply: &str, history_len: usize) -> bool;
}

impl<F> CompletionPredicate for F
where
    F: Fn(&str, usize) -> bool + Send + Sync,
{
    fn is_complete(&self, reply: &str, history_len: usize) -> bool {
        self(reply, history_len)
    }
}

/// A turn cap plus a list of phrases that signal the agent is done.
#[derive(Debug, Clone, Copy)]
pub struct StageLimits {
    pub turn_cap: usize,
    pub phrases: &'static [&'static str],
}

impl StageLimits {
    pub const STORY: StageLimits = StageLimits {
        turn_cap: STORY_TURN_CAP,
        phrases: STORY_COMPLETION_PHRASES,
    };

    pub const DESIGN: StageLimits = StageLimits {
        turn_cap: DESIGN_TURN_CAP,
        phrases: DESIGN_COMPLETION_PHRASES,
    };
}

impl CompletionPredicate for StageLimits {
    fn is_complete(&self, reply: &str, history_len: usize) -> bool {
        if history_len >= self.turn_cap {
            return true;
        }
        let lower = reply.to_lowercase();
        self.phrases.iter().any(|phrase| lower.contains(phrase))
    }
}
