use crate::settings::{load_config, Overrides};
use anyhow::{bail, Context};
use futures::StreamExt;
use postmortem_agent::{GenerateOptions, GenerationSession, StreamEvent};
use postmortem_core::CoreError;
use std::io::{Read, Write};
use std::path::Path;

// ---------------------------------------------------------------------------
// generate
// ---------------------------------------------------------------------------

pub fn run(
    config_path: Option<&Path>,
    format: Option<&str>,
    notes_file: Option<&Path>,
    overrides: Overrides,
    json: bool,
) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    overrides.apply(&mut config);
    config.ensure_valid()?;

    let registry = config.registry()?;
    let template = match format {
        Some(key) => registry
            .lookup(key)
            .ok_or_else(|| CoreError::UnknownFormat(key.to_string()))?,
        None => registry.get(None),
    };

    let notes = read_notes(notes_file)?;
    let notes = notes.trim();
    if notes.is_empty() {
        bail!("No incident notes provided");
    }

    let prompt = template.render(notes);
    let opts = GenerateOptions::from_config(&config);
    tracing::info!(format = %template.key, command = %opts.command, "generating report");

    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(async move {
        let mut session = GenerationSession::start(prompt, opts);
        let mut last = None;
        while let Some(event) = session.next().await {
            if json {
                println!("{}", serde_json::to_string(&event)?);
            } else {
                print_event(&event)?;
            }
            last = Some(event);
        }
        Ok::<_, anyhow::Error>(last)
    })?;

    match outcome {
        Some(StreamEvent::Complete { .. }) => Ok(()),
        Some(StreamEvent::Error { error, .. }) => bail!("{error}"),
        _ => bail!("report stream ended without a result"),
    }
}

/// Notes come from `path`, or stdin when the path is `-` or omitted.
fn read_notes(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(p) if p != Path::new("-") => std::fs::read_to_string(p)
            .with_context(|| format!("failed to read notes from {}", p.display())),
        _ => {
            let mut notes = String::new();
            std::io::stdin()
                .read_to_string(&mut notes)
                .context("failed to read notes from stdin")?;
            Ok(notes)
        }
    }
}

/// Human output: progress on stderr, the report itself on stdout.
fn print_event(event: &StreamEvent) -> anyhow::Result<()> {
    match event {
        StreamEvent::Status { message, .. } | StreamEvent::Heartbeat { message, .. } => {
            eprintln!("{message}");
        }
        StreamEvent::Content { chunk, .. } => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(chunk.as_bytes())?;
            stdout.flush()?;
        }
        StreamEvent::Complete {
            generation_time,
            total_time,
            ..
        } => {
            println!();
            eprintln!("Done: generated in {generation_time:.1}s, {total_time:.1}s total.");
        }
        // Reported by the caller as the command's error.
        StreamEvent::Error { .. } => {}
    }
    Ok(())
}
