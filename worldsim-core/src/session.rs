//! Session configuration and the immutable per-turn state.

use crate::context::{Context, DEFAULT_WORD_CAP};

/// The synthetic input that opens a fresh session before the player has
/// typed anything.
pub const OPENING_INPUT: &str = "Let's explore!";

/// Configuration for a simulation session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// World the story is set in.
    pub setting: String,

    /// Language the narrator speaks.
    pub language: String,

    /// Hard cap on context length, in words.
    pub context_word_cap: usize,
}

impl SessionConfig {
    /// Create a config with the default setting and language.
    pub fn new() -> Self {
        Self {
            setting: "Forgotten Realms".to_string(),
            language: "English".to_string(),
            context_word_cap: DEFAULT_WORD_CAP,
        }
    }

    /// Set the world the story is set in.
    pub fn with_setting(mut self, setting: impl Into<String>) -> Self {
        self.setting = setting.into();
        self
    }

    /// Set the language the narrator speaks.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Set the hard cap on context length.
    pub fn with_context_word_cap(mut self, words: usize) -> Self {
        self.context_word_cap = words;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// The state of a session between turns.
///
/// States are immutable: a turn consumes one state and produces a successor
/// via [`SessionState::advanced`]. The context is the only narrative state
/// carried forward; everything else is fixed at session start.
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Validated world summary.
    pub context: Context,

    /// Completed turns. Zero before the first exchange.
    pub turn: u32,

    /// Language the narrator speaks.
    pub language: String,

    /// World the story is set in.
    pub setting: String,
}

impl SessionState {
    /// The starting state for a session: seed context, no completed turns.
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            context: Context::seed(),
            turn: 0,
            language: config.language.clone(),
            setting: config.setting.clone(),
        }
    }

    /// The successor state after one completed turn.
    pub fn advanced(&self, context: Context) -> Self {
        Self {
            context,
            turn: self.turn + 1,
            language: self.language.clone(),
            setting: self.setting.clone(),
        }
    }
}
