use std::time::Instant;

use tracing::{debug, info, warn};

use crate::process::ClaudeProcess;
use crate::relay::RelaySender;
use crate::types::{GenerateOptions, StreamEvent};
use crate::{GenerationError, Result};

/// Produce the full event sequence for one prompt into `relay`.
///
/// Emits `Status` events while the CLI runs, one `Content` event per chunk of
/// its output, then `Complete`; any failure along the way becomes a single
/// `Error` instead. Returns early without a terminal event only when the
/// consumer has already gone away.
pub async fn run(prompt: String, opts: GenerateOptions, relay: RelaySender) {
    let started = Instant::now();
    match produce(&prompt, &opts, &relay, started).await {
        Ok(()) => {}
        Err(GenerationError::Disconnected) => {
            debug!("consumer gone; generation abandoned");
        }
        Err(e) => {
            warn!(error = %e, elapsed_ms = started.elapsed().as_millis() as u64, "generation failed");
            relay.push(StreamEvent::error(e.to_string()));
        }
    }
}

async fn produce(
    prompt: &str,
    opts: &GenerateOptions,
    relay: &RelaySender,
    started: Instant,
) -> Result<()> {
    send(relay, StreamEvent::status("Connecting to Claude CLI..."))?;

    let mut process = ClaudeProcess::spawn(opts)?;
    info!(
        pid = ?process.id(),
        command = %opts.command,
        prompt_chars = prompt.chars().count(),
        "report generator started"
    );

    send(
        relay,
        StreamEvent::status("Analyzing incident and generating report..."),
    )?;

    let output = process.communicate(prompt, opts.timeout).await?;
    let generation_time = output.elapsed;
    let report = output.into_report()?;
    info!(
        elapsed_ms = generation_time.as_millis() as u64,
        chars = report.chars().count(),
        "report generated"
    );

    send(
        relay,
        StreamEvent::status(format!(
            "Generated in {:.1}s. Streaming output...",
            generation_time.as_secs_f64()
        )),
    )?;

    let chunks = chunk_report(&report, opts.chunk_size);
    let last = chunks.len().saturating_sub(1);
    for (i, (chunk, progress)) in chunks.into_iter().enumerate() {
        send(relay, StreamEvent::content(chunk, progress))?;
        if i < last && !opts.chunk_delay.is_zero() {
            tokio::time::sleep(opts.chunk_delay).await;
        }
    }

    send(relay, StreamEvent::complete(generation_time, started.elapsed()))
}

fn send(relay: &RelaySender, event: StreamEvent) -> Result<()> {
    if relay.push(event) {
        Ok(())
    } else {
        Err(GenerationError::Disconnected)
    }
}

/// Split `text` into pieces of `chunk_size` characters, each paired with the
/// percentage of the text delivered once that piece has been sent.
///
/// Chunks are cut on `char` boundaries, never inside a code point. Progress
/// is `ceil(sent * 100 / total)`, so it never decreases and the last chunk
/// is always 100. A `chunk_size` of zero is treated as one.
pub fn chunk_report(text: &str, chunk_size: usize) -> Vec<(String, u8)> {
    let size = chunk_size.max(1);
    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    let mut sent = 0;
    chars
        .chunks(size)
        .map(|piece| {
            sent += piece.len();
            (piece.iter().collect::<String>(), progress(sent, total))
        })
        .collect()
}

fn progress(sent: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (sent * 100).div_ceil(total).min(100) as u8
}

// ─── Tests ────────────────────────────────────────────────────────────────
