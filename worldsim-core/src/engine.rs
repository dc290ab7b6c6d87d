//! The turn engine.
//!
//! One turn takes a [`SessionState`] and a line of player input, streams a
//! narration and then a compacted context from the [`Storyteller`], and
//! returns the successor state. The engine never prints: streamed chunks are
//! forwarded to a caller-supplied [`TurnSink`], so the whole loop runs under
//! test with a scripted storyteller and a collecting sink.

use crate::context::ContextUpdate;
use crate::session::{SessionConfig, SessionState};
use async_trait::async_trait;
use claude::TextStream;
use futures::StreamExt;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from advancing a turn.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("player input is empty")]
    EmptyInput,

    #[error("provider error: {0}")]
    Provider(#[from] claude::Error),
}

/// Arguments for one narration call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrationCall {
    /// Current world context.
    pub context: String,
    /// Trimmed player input.
    pub input: String,
    /// 1-based interaction number quoted to the model.
    pub interaction: u32,
    /// World the story is set in.
    pub setting: String,
    /// Language the narrator speaks.
    pub language: String,
}

/// Arguments for one compaction call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionCall {
    /// Context the narration was produced against.
    pub context: String,
    /// The full narration of this turn.
    pub narration: String,
    /// Trimmed player input of this turn.
    pub input: String,
}

/// A provider that streams both roles of the loop.
///
/// Each method returns a lazy, finite stream of text chunks; the stream is
/// not restartable. [`GameMaster`](crate::gm::GameMaster) implements this
/// against the Anthropic API; tests use a scripted implementation.
#[async_trait]
pub trait Storyteller: Send + Sync {
    /// Stream the narration for one turn.
    async fn narrate(&self, call: NarrationCall) -> Result<TextStream, claude::Error>;

    /// Stream the replacement context for one turn.
    async fn compact(&self, call: CompactionCall) -> Result<TextStream, claude::Error>;
}

/// Which of the two streams a chunk belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamRole {
    Narration,
    Context,
}

/// Receives streamed text as it is produced.
///
/// The interactive loop prints chunks in role-specific styles; tests collect
/// them.
pub trait TurnSink: Send {
    /// A chunk of text from one of the roles, in arrival order.
    fn chunk(&mut self, role: StreamRole, text: &str);

    /// The given role's stream ended for this turn.
    fn finished(&mut self, role: StreamRole);
}

/// What one completed turn produced.
#[derive(Debug)]
pub struct TurnOutcome {
    /// Successor session state.
    pub state: SessionState,

    /// Full narration shown to the player this turn.
    pub narration: String,

    /// What the validation boundary did with the compactor's output.
    pub context_update: ContextUpdate,
}

/// Drives the per-turn cycle: narrate, compact, replace context.
pub struct TurnEngine<S> {
    storyteller: S,
    config: SessionConfig,
}

impl<S: Storyteller> TurnEngine<S> {
    pub fn new(storyteller: S, config: SessionConfig) -> Self {
        Self { storyteller, config }
    }

    /// The storyteller backing this engine.
    pub fn storyteller(&self) -> &S {
        &self.storyteller
    }

    /// Advance the session by one turn.
    ///
    /// `state` is not modified; the successor state is in the returned
    /// outcome. Empty or whitespace-only input fails with
    /// [`EngineError::EmptyInput`] before any provider call. Provider errors
    /// propagate, leaving the caller's state usable for a retry.
    pub async fn advance(
        &self,
        state: &SessionState,
        input: &str,
        sink: &mut dyn TurnSink,
    ) -> Result<TurnOutcome, EngineError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(EngineError::EmptyInput);
        }

        let interaction = state.turn + 1;
        debug!(interaction, input_len = input.len(), "advancing turn");

        let narration_stream = self
            .storyteller
            .narrate(NarrationCall {
                context: state.context.as_str().to_string(),
                input: input.to_string(),
                interaction,
                setting: state.setting.clone(),
                language: state.language.clone(),
            })
            .await?;
        let narration = drain_into(StreamRole::Narration, narration_stream, sink).await?;

        let context_stream = self
            .storyteller
            .compact(CompactionCall {
                context: state.context.as_str().to_string(),
                narration: narration.clone(),
                input: input.to_string(),
            })
            .await?;
        let raw_context = drain_into(StreamRole::Context, context_stream, sink).await?;

        let (context, context_update) = state
            .context
            .apply_update(&raw_context, self.config.context_word_cap);
        match context_update {
            ContextUpdate::Replaced => {}
            ContextUpdate::Truncated => warn!(
                cap = self.config.context_word_cap,
                "compactor output exceeded the word cap; truncated"
            ),
            ContextUpdate::KeptPrevious => {
                warn!("compactor produced no usable context; keeping the previous one")
            }
        }

        Ok(TurnOutcome {
            state: state.advanced(context),
            narration,
            context_update,
        })
    }
}

/// Forward a role's stream to the sink chunk by chunk, returning the
/// accumulated text.
async fn drain_into(
    role: StreamRole,
    mut stream: TextStream,
    sink: &mut dyn TurnSink,
) -> Result<String, EngineError> {
    let mut full = String::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        sink.chunk(role, &chunk);
        full.push_str(&chunk);
    }
    sink.finished(role);
    Ok(full)
}
