//! Testing utilities for the turn loop.
//!
//! This module provides tools for integration testing:
//! - `ScriptedStoryteller` for deterministic turns without API calls
//! - `CollectingSink` for capturing streamed output
//! - `TestHarness` for multi-turn scenarios
//! - Assertion helpers for verifying session state

use crate::engine::{
    CompactionCall, EngineError, NarrationCall, Storyteller, StreamRole, TurnEngine, TurnOutcome,
    TurnSink,
};
use crate::session::{SessionConfig, SessionState};
use async_trait::async_trait;
use claude::TextStream;
use std::collections::VecDeque;
use std::sync::Mutex;

/// A storyteller that replays scripted responses and records every call it
/// receives.
///
/// Use this for deterministic tests without API calls. Responses stream in
/// small chunks so consumers exercise real accumulation.
pub struct ScriptedStoryteller {
    script: Mutex<Script>,
}

struct Script {
    narrations: VecDeque<String>,
    contexts: VecDeque<String>,
    narration_calls: Vec<NarrationCall>,
    compaction_calls: Vec<CompactionCall>,
    failure: Option<String>,
}

impl ScriptedStoryteller {
    /// Create a storyteller with an empty script.
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Script {
                narrations: VecDeque::new(),
                contexts: VecDeque::new(),
                narration_calls: Vec::new(),
                compaction_calls: Vec::new(),
                failure: None,
            }),
        }
    }

    /// Create a storyteller whose every call fails with an API error.
    pub fn failing(message: impl Into<String>) -> Self {
        let storyteller = Self::new();
        storyteller.script.lock().unwrap().failure = Some(message.into());
        storyteller
    }

    /// Queue the narration and replacement context for one turn.
    pub fn push_turn(&self, narration: impl Into<String>, context: impl Into<String>) {
        let mut script = self.script.lock().unwrap();
        script.narrations.push_back(narration.into());
        script.contexts.push_back(context.into());
    }

    /// All narration calls received so far, in order.
    pub fn narration_calls(&self) -> Vec<NarrationCall> {
        self.script.lock().unwrap().narration_calls.clone()
    }

    /// All compaction calls received so far, in order.
    pub fn compaction_calls(&self) -> Vec<CompactionCall> {
        self.script.lock().unwrap().compaction_calls.clone()
    }
}

impl Default for ScriptedStoryteller {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storyteller for ScriptedStoryteller {
    async fn narrate(&self, call: NarrationCall) -> Result<TextStream, claude::Error> {
        let mut script = self.script.lock().unwrap();
        if let Some(message) = &script.failure {
            return Err(claude::Error::Api {
                status: 500,
                message: message.clone(),
            });
        }
        script.narration_calls.push(call);
        let text = script
            .narrations
            .pop_front()
            .unwrap_or_else(|| "The narrator has run out of scripted lines.".to_string());
        Ok(chunked(text))
    }

    async fn compact(&self, call: CompactionCall) -> Result<TextStream, claude::Error> {
        let mut script = self.script.lock().unwrap();
        if let Some(message) = &script.failure {
            return Err(claude::Error::Api {
                status: 500,
                message: message.clone(),
            });
        }
        script.compaction_calls.push(call);
        let text = script
            .contexts
            .pop_front()
            .unwrap_or_else(|| "ITEMS: unchanged".to_string());
        Ok(chunked(text))
    }
}

/// Split scripted text into small chunks so consumers see a real stream.
fn chunked(text: String) -> TextStream {
    const CHUNK: usize = 16;
    let mut chunks = Vec::new();
    let mut rest = text.as_str();
    while !rest.is_empty() {
        let mut end = rest.len().min(CHUNK);
        while !rest.is_char_boundary(end) {
            end += 1;
        }
        chunks.push(Ok(rest[..end].to_string()));
        rest = &rest[end..];
    }
    Box::pin(futures::stream::iter(chunks))
}

/// A sink that collects streamed chunks for inspection.
#[derive(Debug, Default)]
pub struct CollectingSink {
    /// Narration text accumulated from chunks.
    pub narration: String,
    /// Context text accumulated from chunks.
    pub context: String,
    /// Roles whose streams have finished, in order.
    pub completions: Vec<StreamRole>,
}

impl TurnSink for CollectingSink {
    fn chunk(&mut self, role: StreamRole, text: &str) {
        match role {
            StreamRole::Narration => self.narration.push_str(text),
            StreamRole::Context => self.context.push_str(text),
        }
    }

    fn finished(&mut self, role: StreamRole) {
        self.completions.push(role);
    }
}

/// Test harness for running turn scenarios.
pub struct TestHarness {
    /// The engine under test, backed by a scripted storyteller.
    pub engine: TurnEngine<ScriptedStoryteller>,
    /// Current session state, updated after each successful turn.
    pub state: SessionState,
    /// Sink from the most recent turn.
    pub last_sink: CollectingSink,
}

impl TestHarness {
    /// Create a harness with the default session config.
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    /// Create a harness with a custom session config.
    pub fn with_config(config: SessionConfig) -> Self {
        let state = SessionState::new(&config);
        Self {
            engine: TurnEngine::new(ScriptedStoryteller::new(), config),
            state,
            last_sink: CollectingSink::default(),
        }
    }

    /// Queue the narration and replacement context for the next turn.
    pub fn expect_turn(
        &mut self,
        narration: impl Into<String>,
        context: impl Into<String>,
    ) -> &mut Self {
        self.engine.storyteller().push_turn(narration, context);
        self
    }

    /// Send player input through the engine and track the successor state.
    pub async fn input(&mut self, text: &str) -> Result<TurnOutcome, EngineError> {
        let mut sink = CollectingSink::default();
        let outcome = self.engine.advance(&self.state, text, &mut sink).await;
        self.last_sink = sink;
        if let Ok(outcome) = &outcome {
            self.state = outcome.state.clone();
        }
        outcome
    }

    /// Completed turns so far.
    pub fn turn(&self) -> u32 {
        self.state.turn
    }

    /// Current world context.
    pub fn context(&self) -> &str {
        self.state.context.as_str()
    }

    /// All narration calls the storyteller received so far.
    pub fn narration_calls(&self) -> Vec<NarrationCall> {
        self.engine.storyteller().narration_calls()
    }

    /// All compaction calls the storyteller received so far.
    pub fn compaction_calls(&self) -> Vec<CompactionCall> {
        self.engine.storyteller().compaction_calls()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert the number of completed turns.
#[track_caller]
pub fn assert_turn(harness: &TestHarness, expected: u32) {
    let actual = harness.turn();
    assert_eq!(actual, expected, "Expected turn {expected}, got {actual}");
}

/// Assert the current context exactly.
#[track_caller]
pub fn assert_context(harness: &TestHarness, expected: &str) {
    assert_eq!(
        harness.context(),
        expected,
        "Context mismatch after turn {}",
        harness.turn()
    );
}

/// Assert the current context contains a fragment.
#[track_caller]
pub fn assert_context_contains(harness: &TestHarness, needle: &str) {
    assert!(
        harness.context().contains(needle),
        "Expected context to contain '{needle}', got: {}",
        harness.context()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_chunked_respects_char_boundaries() {
        // Chunk boundaries land mid-emoji unless adjusted.
        let text = "x🍻🍻🍻🍻 tavern lights".to_string();
        let stream = chunked(text.clone());
        let chunks: Vec<_> = futures::executor::block_on(stream.collect::<Vec<_>>());
        assert!(chunks.len() > 1);
        let joined: String = chunks.into_iter().map(|c| c.unwrap()).collect();
        assert_eq!(joined, text);
    }
}
