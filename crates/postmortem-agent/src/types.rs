use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use postmortem_core::Config;
use serde::{Deserialize, Serialize};

use crate::relay::RelaySettings;

// ─── StreamEvent ──────────────────────────────────────────────────────────

/// One message on a report stream, discriminated by the JSON `"type"` field.
///
/// `Complete` and `Error` are terminal: exactly one of them ends every
/// stream, and nothing follows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Status {
        message: String,
        timestamp: DateTime<Utc>,
    },
    /// A slice of the generated report. Chunks concatenate, in order, to the
    /// full output of the CLI.
    Content {
        chunk: String,
        /// Percentage of the report delivered so far, 1..=100.
        progress: u8,
        timestamp: DateTime<Utc>,
    },
    /// Keep-alive sent only while the stream is idle.
    Heartbeat {
        message: String,
        timestamp: DateTime<Utc>,
    },
    Complete {
        success: bool,
        /// Seconds spent waiting on the CLI.
        generation_time: f64,
        /// Seconds from the first status event to completion.
        total_time: f64,
        timestamp: DateTime<Utc>,
    },
    Error {
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl StreamEvent {
    pub fn status(message: impl Into<String>) -> Self {
        StreamEvent::Status {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn content(chunk: impl Into<String>, progress: u8) -> Self {
        StreamEvent::Content {
            chunk: chunk.into(),
            progress,
            timestamp: Utc::now(),
        }
    }

    pub fn heartbeat(message: impl Into<String>) -> Self {
        StreamEvent::Heartbeat {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn complete(generation_time: Duration, total_time: Duration) -> Self {
        StreamEvent::Complete {
            success: true,
            generation_time: tenths(generation_time),
            total_time: tenths(total_time),
            timestamp: Utc::now(),
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        StreamEvent::Error {
            error: error.into(),
            timestamp: Utc::now(),
        }
    }

    /// `true` for `Complete` and `Error`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete { .. } | StreamEvent::Error { .. })
    }

    /// The wire name of this event's `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Status { .. } => "status",
            StreamEvent::Content { .. } => "content",
            StreamEvent::Heartbeat { .. } => "heartbeat",
            StreamEvent::Complete { .. } => "complete",
            StreamEvent::Error { .. } => "error",
        }
    }

    pub fn as_chunk(&self) -> Option<&str> {
        if let StreamEvent::Content { chunk, .. } = self {
            Some(chunk)
        } else {
            None
        }
    }

    pub fn as_error(&self) -> Option<&str> {
        if let StreamEvent::Error { error, .. } = self {
            Some(error)
        } else {
            None
        }
    }
}

fn tenths(d: Duration) -> f64 {
    (d.as_secs_f64() * 10.0).round() / 10.0
}

/// Render a duration the way the user-facing messages do:
/// whole minutes as `5 minutes`, anything else in seconds.
pub fn humanize_duration(d: &Duration) -> String {
    let secs = d.as_secs();
    if secs >= 60 && secs % 60 == 0 && d.subsec_nanos() == 0 {
        match secs / 60 {
            1 => "1 minute".to_string(),
            n => format!("{n} minutes"),
        }
    } else if d.subsec_nanos() == 0 {
        format!("{secs}s")
    } else {
        format!("{:.1}s", d.as_secs_f64())
    }
}

// ─── GenerateOptions ──────────────────────────────────────────────────────

/// Options for a single report generation.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Executable to run. Defaults to `claude`.
    pub command: String,
    /// Arguments passed before the prompt is written to stdin.
    /// Defaults to `["--print"]` (non-interactive print mode).
    pub args: Vec<String>,
    /// Extra environment variables for the subprocess.
    pub env: HashMap<String, String>,
    /// Hard bound on the CLI call; the process is killed when it elapses.
    pub timeout: Duration,
    /// Characters per `Content` event.
    pub chunk_size: usize,
    /// Pause between `Content` events.
    pub chunk_delay: Duration,
    pub relay: RelaySettings,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            command: "claude".to_string(),
            args: vec!["--print".to_string()],
            env: HashMap::new(),
            timeout: Duration::from_secs(300),
            chunk_size: 20,
            chunk_delay: Duration::from_millis(20),
            relay: RelaySettings::default(),
        }
    }
}

impl GenerateOptions {
    /// Options for one run under `config`'s generator and relay sections.
    pub fn from_config(config: &Config) -> Self {
        let generator = &config.generator;
        Self {
            command: generator.command.clone(),
            args: generator.args.clone(),
            env: generator
                .env
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            timeout: generator.timeout(),
            chunk_size: generator.chunk_size,
            chunk_delay: generator.chunk_delay(),
            relay: RelaySettings {
                poll_interval: config.relay.poll_interval(),
                heartbeat_interval: config.relay.heartbeat_interval(),
                idle_timeout: config.relay.idle_timeout(),
            },
        }
    }
}
