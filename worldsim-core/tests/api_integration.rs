//! Integration tests that call the real Anthropic API.
//!
//! These tests require ANTHROPIC_API_KEY to be set (via .env file or environment).
//! Run with: `cargo test -p worldsim-core --test api_integration -- --ignored`
//!
//! These are marked #[ignore] by default to avoid:
//! - API costs in CI
//! - Test failures when no API key is available
//! - Slow test runs (API calls take seconds)

use worldsim_core::testing::CollectingSink;
use worldsim_core::{GameMaster, GmConfig, OPENING_INPUT, SessionConfig, SessionState, TurnEngine};

/// Load environment variables from .env file
fn setup() {
    let _ = dotenvy::dotenv();
}

/// Check if API key is available
fn has_api_key() -> bool {
    std::env::var("ANTHROPIC_API_KEY").is_ok()
}

fn live_engine(config: &SessionConfig) -> TurnEngine<GameMaster> {
    let gm = GameMaster::from_env()
        .expect("Failed to create game master")
        .with_config(GmConfig::default().with_model("claude-3-5-haiku-20241022"));
    TurnEngine::new(gm, config.clone())
}

#[tokio::test]
#[ignore] // Run with: cargo test -p worldsim-core --test api_integration -- --ignored
async fn test_full_turn_produces_narration_and_context() {
    setup();
    if !has_api_key() {
        eprintln!("Skipping test: ANTHROPIC_API_KEY not set");
        return;
    }

    let config = SessionConfig::new();
    let engine = live_engine(&config);
    let state = SessionState::new(&config);
    let mut sink = CollectingSink::default();

    let outcome = engine
        .advance(&state, OPENING_INPUT, &mut sink)
        .await
        .expect("Turn should complete");

    println!("Narration:\n{}\n", outcome.narration);
    println!("Context:\n{}\n", outcome.state.context.as_str());

    assert!(!outcome.narration.is_empty(), "Narrator should produce text");
    assert!(
        !outcome.state.context.as_str().is_empty(),
        "Compactor should produce a context"
    );
    assert_eq!(outcome.state.turn, 1);
    // Streamed chunks and the accumulated narration must agree.
    assert_eq!(sink.narration, outcome.narration);
}

#[tokio::test]
#[ignore]
async fn test_two_turns_chain_the_context() {
    setup();
    if !has_api_key() {
        eprintln!("Skipping test: ANTHROPIC_API_KEY not set");
        return;
    }

    let config = SessionConfig::new();
    let engine = live_engine(&config);
    let state = SessionState::new(&config);

    let mut sink = CollectingSink::default();
    let first = engine
        .advance(&state, OPENING_INPUT, &mut sink)
        .await
        .expect("First turn should complete");
    println!("Turn 1 context:\n{}\n", first.state.context.as_str());

    let mut sink = CollectingSink::default();
    let second = engine
        .advance(&first.state, "Enter the nearest building.", &mut sink)
        .await
        .expect("Second turn should complete");
    println!("Turn 2 context:\n{}\n", second.state.context.as_str());

    assert_eq!(second.state.turn, 2);
    assert!(!second.narration.is_empty());
    assert!(!second.state.context.as_str().is_empty());
}
