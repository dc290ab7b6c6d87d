//! AI-narrated world simulator.
//!
//! An open-ended, DnD-like text adventure in the terminal. Each turn makes
//! two model calls: one narrates the scene, a second rewrites the compact
//! world context that is the only state carried between turns.
//!
//! ```bash
//! export ANTHROPIC_API_KEY=your_key_here
//! cargo run -p worldsim -- --world "Ancient Greece" --language Greek
//! ```

mod repl;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};
use worldsim_core::{GameMaster, GmConfig, SessionConfig, TurnEngine};

/// Command-line options.
#[derive(Parser)]
#[command(name = "worldsim")]
#[command(about = "Open-ended AI-narrated world simulation in your terminal")]
struct Args {
    /// Anthropic model tier to use: "sonnet", "opus", or "haiku"
    #[arg(long, default_value = "sonnet")]
    model: String,

    /// API to use; only "anthropic" is supported
    #[arg(long, default_value = "anthropic")]
    api: String,

    /// Language for the narrator: for example "українська", or "Ukrainian"
    #[arg(long, default_value = "English")]
    language: String,

    /// World this is set in. Try, for example, "world of Harry Potter",
    /// "Ancient Greece", or "a generation ship drifting off course"
    #[arg(long, default_value = "Forgotten Realms")]
    world: String,
}

/// Map a model tier name to a concrete model ID.
fn resolve_model(tier: &str) -> Result<&'static str, String> {
    match tier {
        "sonnet" => Ok("claude-sonnet-4-20250514"),
        "opus" => Ok("claude-opus-4-20250514"),
        "haiku" => Ok("claude-3-5-haiku-20241022"),
        other => Err(format!(
            "Invalid model: {other}. Choose 'sonnet', 'opus', or 'haiku'."
        )),
    }
}

/// Reject APIs this build cannot talk to.
fn resolve_api(api: &str) -> Result<(), String> {
    if api == "anthropic" {
        Ok(())
    } else {
        Err(format!("Invalid API: {api}. Only 'anthropic' is supported."))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Diagnostics go to stderr so they never mix with the story.
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(message) = resolve_api(&args.api) {
        eprintln!("Error: {message}");
        std::process::exit(1);
    }
    let model = match resolve_model(&args.model) {
        Ok(model) => model,
        Err(message) => {
            eprintln!("Error: {message}");
            std::process::exit(1);
        }
    };

    // Check for API key
    if std::env::var("ANTHROPIC_API_KEY").is_err() {
        eprintln!("Error: ANTHROPIC_API_KEY environment variable not set.");
        eprintln!("Please set it in .env file or with: export ANTHROPIC_API_KEY=your_key_here");
        std::process::exit(1);
    }

    debug!(
        model,
        world = args.world.as_str(),
        language = args.language.as_str(),
        "starting session"
    );

    let config = SessionConfig::new()
        .with_setting(args.world)
        .with_language(args.language);
    let game_master = GameMaster::from_env()?.with_config(GmConfig::default().with_model(model));
    let engine = TurnEngine::new(game_master, config.clone());

    repl::run(engine, config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_model_tiers() {
        assert_eq!(resolve_model("sonnet").unwrap(), "claude-sonnet-4-20250514");
        assert_eq!(resolve_model("opus").unwrap(), "claude-opus-4-20250514");
        assert_eq!(resolve_model("haiku").unwrap(), "claude-3-5-haiku-20241022");
    }

    #[test]
    fn test_resolve_model_rejects_unknown_tier() {
        let err = resolve_model("gpt-4").unwrap_err();
        assert!(err.contains("Invalid model: gpt-4"));
        assert!(err.contains("'sonnet', 'opus', or 'haiku'"));
    }

    #[test]
    fn test_resolve_api_accepts_only_anthropic() {
        assert!(resolve_api("anthropic").is_ok());

        let err = resolve_api("google").unwrap_err();
        assert!(err.contains("Invalid API: google"));
        assert!(err.contains("Only 'anthropic' is supported"));
    }
}
