//! The interactive terminal loop.
//!
//! Presentation only: the engine produces the streams, this module colors
//! them, prompts for input, and clears stray keystrokes between turns. The
//! display scheme is fixed: narration in yellow, the context stream in black
//! on cyan, the input prompt in black on green.

use crossterm::style::Stylize;
use std::io::{self, BufRead, Write};
use std::time::Duration;
use worldsim_core::{
    GameMaster, OPENING_INPUT, SessionConfig, SessionState, StreamRole, TurnEngine, TurnSink,
};

/// Prints chunks as they arrive, styled by role.
struct TerminalSink;

impl TurnSink for TerminalSink {
    fn chunk(&mut self, role: StreamRole, text: &str) {
        match role {
            StreamRole::Narration => print!("{}", text.yellow()),
            StreamRole::Context => print!("{}", text.black().on_cyan()),
        }
        let _ = io::stdout().flush();
    }

    fn finished(&mut self, _role: StreamRole) {
        println!();
        println!();
    }
}

/// Run the interactive loop until stdin closes or the process is
/// interrupted.
pub async fn run(
    engine: TurnEngine<GameMaster>,
    config: SessionConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "Welcome to the AI-powered RPG game!".cyan());

    let mut state = SessionState::new(&config);
    let mut input = OPENING_INPUT.to_string();
    let mut sink = TerminalSink;

    loop {
        let outcome = engine.advance(&state, &input, &mut sink).await?;
        state = outcome.state;

        flush_stray_input().await;
        input = match read_player_input()? {
            Some(line) => line,
            None => break,
        };
    }

    println!("Thanks for playing!");
    Ok(())
}

/// Prompt until the player types something non-blank. Returns `None` when
/// stdin is closed.
fn read_player_input() -> io::Result<Option<String>> {
    let stdin = io::stdin();
    let mut line = String::new();

    loop {
        print!("{} ", "\n\nMe: ".black().on_green());
        io::stdout().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!();
            return Ok(None);
        }

        let trimmed = line.trim();
        if !trimmed.is_empty() {
            println!();
            println!();
            return Ok(Some(trimmed.to_string()));
        }
        println!("Please say something..");
        println!();
    }
}

/// Discard keystrokes typed while the model was streaming.
///
/// The flush fires half a second after the output ends; the one-second pause
/// lets it run before the prompt appears, then the task is cancelled.
async fn flush_stray_input() {
    let flusher = tokio::spawn(async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        discard_pending_stdin();
    });
    tokio::time::sleep(Duration::from_secs(1)).await;
    flusher.abort();
}

#[cfg(unix)]
fn discard_pending_stdin() {
    // TCIFLUSH drops input received by the terminal but not yet read.
    unsafe {
        libc::tcflush(libc::STDIN_FILENO, libc::TCIFLUSH);
    }
}

#[cfg(not(unix))]
fn discard_pending_stdin() {}
