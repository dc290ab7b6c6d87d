//! The AI game master.
//!
//! [`GameMaster`] is the production [`Storyteller`]: it renders the prompt
//! templates and streams both roles of a turn from the Anthropic API. The
//! narration call runs hot and short; the compaction call runs cool with a
//! larger budget, since it rewrites the whole context every turn.

mod prompts;

pub use prompts::{COMPACTOR_PREFILL, NARRATOR_PREFILL};

use crate::engine::{CompactionCall, NarrationCall, Storyteller};
use async_trait::async_trait;
use claude::{Claude, Message, Request, TextStream};
use tracing::debug;

/// Configuration for the game master's two calls per turn.
#[derive(Debug, Clone)]
pub struct GmConfig {
    /// Model for both calls (defaults to the client's model).
    pub model: Option<String>,

    /// Output budget for a narration call.
    pub narration_max_tokens: usize,

    /// Temperature for narration.
    pub narration_temperature: f32,

    /// Output budget for a compaction call.
    pub compaction_max_tokens: usize,

    /// Temperature for compaction.
    pub compaction_temperature: f32,
}

impl Default for GmConfig {
    fn default() -> Self {
        Self {
            model: None,
            narration_max_tokens: 600,
            narration_temperature: 0.7,
            compaction_max_tokens: 1500,
            compaction_temperature: 0.2,
        }
    }
}

impl GmConfig {
    /// Set the model used for both calls.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// The AI game master.
pub struct GameMaster {
    client: Claude,
    config: GmConfig,
}

impl GameMaster {
    /// Create a game master with an API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Claude::new(api_key),
            config: GmConfig::default(),
        }
    }

    /// Create a game master from the `ANTHROPIC_API_KEY` environment
    /// variable.
    pub fn from_env() -> Result<Self, claude::Error> {
        Ok(Self {
            client: Claude::from_env()?,
            config: GmConfig::default(),
        })
    }

    /// Replace the call configuration.
    pub fn with_config(mut self, config: GmConfig) -> Self {
        self.config = config;
        self
    }

    fn apply_model(&self, request: Request) -> Request {
        match &self.config.model {
            Some(model) => request.with_model(model.clone()),
            None => request,
        }
    }
}

#[async_trait]
impl Storyteller for GameMaster {
    async fn narrate(&self, call: NarrationCall) -> Result<TextStream, claude::Error> {
        let system = prompts::narrator_system(&call.setting, &call.language, &call.context);
        debug!(
            interaction = call.interaction,
            system_len = system.len(),
            "narration request"
        );

        let request = Request::new(vec![
            Message::user(prompts::narrator_user(&call.input, call.interaction)),
            Message::assistant(NARRATOR_PREFILL),
        ])
        .with_system(system)
        .with_max_tokens(self.config.narration_max_tokens)
        .with_temperature(self.config.narration_temperature);

        self.client.stream_text(self.apply_model(request)).await
    }

    async fn compact(&self, call: CompactionCall) -> Result<TextStream, claude::Error> {
        let user = prompts::compactor_user(&call.context, &call.narration, &call.input);
        debug!(user_len = user.len(), "compaction request");

        let request = Request::new(vec![
            Message::user(user),
            Message::assistant(COMPACTOR_PREFILL),
        ])
        .with_system(prompts::compactor_system())
        .with_max_tokens(self.config.compaction_max_tokens)
        .with_temperature(self.config.compaction_temperature);

        self.client.stream_text(self.apply_model(request)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_split_the_roles() {
        let config = GmConfig::default();
        assert_eq!(config.narration_max_tokens, 600);
        assert_eq!(config.narration_temperature, 0.7);
        assert_eq!(config.compaction_max_tokens, 1500);
        assert_eq!(config.compaction_temperature, 0.2);
        assert!(config.model.is_none());
    }

    #[test]
    fn test_config_with_model() {
        let config = GmConfig::default().with_model("claude-opus-4-20250514");
        assert_eq!(config.model.as_deref(), Some("claude-opus-4-20250514"));
    }
}
