//! The validated world context.
//!
//! The context is the compact free-text summary of the world carried between
//! turns. It is the only narrative state the loop keeps, so every candidate
//! replacement produced by the model passes through [`Context::apply_update`]
//! before it is stored.

use std::fmt;

/// Default hard cap on context length, in words.
///
/// The compaction prompt asks for at most 900 words; the cap leaves headroom
/// above that before truncation kicks in.
pub const DEFAULT_WORD_CAP: usize = 1200;

const SEED: &str = "Character possessions and skills are designed appropriate to setting.";

/// The world summary carried between turns.
///
/// Values only come from [`Context::seed`] or [`Context::apply_update`], so a
/// stored context is always trimmed, non-empty and within the word cap it was
/// built with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context(String);

/// What [`Context::apply_update`] did with one round of compactor output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextUpdate {
    /// Output was usable and replaced the context wholesale.
    Replaced,
    /// Output exceeded the word cap and was cut at a word boundary.
    Truncated,
    /// Output was empty after cleaning; the previous context was kept.
    KeptPrevious,
}

impl Context {
    /// The fixed opening context for a fresh session.
    pub fn seed() -> Self {
        Self(SEED.to_string())
    }

    /// The context text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Build the next turn's context from raw compactor output.
    ///
    /// Cleaning trims surrounding whitespace and drops a trailing
    /// `</New context>` tag if the model closed its prefill. Empty output
    /// keeps `self` unchanged; output over `word_cap` words is truncated at
    /// the cap, preserving the original whitespace of what remains. Anything
    /// else replaces the context totally.
    pub fn apply_update(&self, raw: &str, word_cap: usize) -> (Context, ContextUpdate) {
        let mut cleaned = raw.trim();
        if let Some(stripped) = cleaned.strip_suffix("</New context>") {
            cleaned = stripped.trim_end();
        }

        if cleaned.is_empty() {
            return (self.clone(), ContextUpdate::KeptPrevious);
        }

        match word_cap_excess(cleaned, word_cap) {
            Some(cut) => (
                Context(cleaned[..cut].trim_end().to_string()),
                ContextUpdate::Truncated,
            ),
            None => (Context(cleaned.to_string()), ContextUpdate::Replaced),
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Byte index at which `text` exceeds `cap` words, if it does.
fn word_cap_excess(text: &str, cap: usize) -> Option<usize> {
    let mut words = 0;
    let mut in_word = false;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            in_word = false;
        } else if !in_word {
            in_word = true;
            words += 1;
            if words > cap {
                return Some(i);
            }
        }
    }
    None
}
