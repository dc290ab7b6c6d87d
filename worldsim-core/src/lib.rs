//! Turn engine for an AI-narrated world simulator.
//!
//! This crate provides:
//! - An immutable session state whose only carried value is a compact,
//!   validated world-context string
//! - A turn engine that streams a narration and then a compacted context
//!   from a pluggable [`Storyteller`]
//! - A production storyteller backed by the Anthropic Messages API
//! - Scripted-storyteller test tooling
//!
//! # Quick Start
//!
//! ```ignore
//! use worldsim_core::{GameMaster, SessionConfig, SessionState, TurnEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SessionConfig::new().with_setting("Ancient Greece");
//!     let engine = TurnEngine::new(GameMaster::from_env()?, config.clone());
//!
//!     let mut state = SessionState::new(&config);
//!     let mut sink = my_terminal_sink();
//!
//!     let outcome = engine.advance(&state, "Let's explore!", &mut sink).await?;
//!     state = outcome.state;
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod engine;
pub mod gm;
pub mod session;
pub mod testing;

// Primary public API
pub use context::{Context, ContextUpdate, DEFAULT_WORD_CAP};
pub use engine::{
    CompactionCall, EngineError, NarrationCall, Storyteller, StreamRole, TurnEngine, TurnOutcome,
    TurnSink,
};
pub use gm::{GameMaster, GmConfig};
pub use session::{OPENING_INPUT, SessionConfig, SessionState};
pub use testing::{CollectingSink, ScriptedStoryteller, TestHarness};
