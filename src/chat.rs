// Interactive terminal conversation with the car bot.

use anyhow::{Context, Result};
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::info;

use crate::conversation::{Conversation, SubmitOutcome};
use crate::render::message_to_terminal;

const PROMPT: &str = "Ask about a car> ";

/// Reads one question per line until EOF or `exit`/`quit`, printing each
/// answer as it arrives. Returns the number of questions answered.
pub async fn run_chat<R, W>(conversation: &Conversation, input: R, output: &mut W) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let mut answered = 0;

    loop {
        write!(output, "{}", PROMPT)?;
        output.flush()?;

        let Some(line) = lines.next_line().await.context("Failed to read question")? else {
            writeln!(output)?;
            break;
        };

        let question = line.trim();
        if matches!(question, "exit" | "quit") {
            break;
        }

        if let SubmitOutcome::Answered(reply) = conversation.submit(&line).await {
            writeln!(output, "{}", message_to_terminal(&reply))?;
            answered += 1;
        }
    }

    info!(answered, "chat session finished");
    Ok(answered)
}
