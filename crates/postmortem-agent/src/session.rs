use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::task::JoinHandle;

use crate::relay;
use crate::types::{GenerateOptions, StreamEvent};

// ─── GenerationSession ────────────────────────────────────────────────────

/// One report generation, from first status event to terminal event.
///
/// Owns the background generator task and the consumer half of its relay.
/// Dropping the session (for instance because the HTTP client disconnected)
/// aborts the task; the subprocess it owns is killed on drop.
///
/// ```rust,ignore
/// use futures::StreamExt;
/// use postmortem_agent::{GenerateOptions, GenerationSession};
///
/// let events: Vec<_> = GenerationSession::start(prompt, GenerateOptions::default())
///     .collect()
///     .await;
/// assert!(events.last().unwrap().is_terminal());
/// ```
pub struct GenerationSession {
    events: Pin<Box<dyn Stream<Item = StreamEvent> + Send>>,
    task: Option<JoinHandle<()>>,
}

impl GenerationSession {
    /// Spawn the generator for `prompt` and return the draining side.
    pub fn start(prompt: impl Into<String>, opts: GenerateOptions) -> Self {
        let (tx, rx) = relay::channel();
        let settings = opts.relay;
        let task = tokio::spawn(crate::generator::run(prompt.into(), opts, tx));
        Self {
            events: Box::pin(relay::drain(rx, settings)),
            task: Some(task),
        }
    }

    /// A session that never started: yields a single `Error` and ends.
    pub fn rejected(message: impl Into<String>) -> Self {
        let event = StreamEvent::error(message);
        Self {
            events: Box::pin(futures::stream::iter([event])),
            task: None,
        }
    }

    /// `true` once the generator task has exited (or if there never was one).
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Stream for GenerationSession {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.as_mut().poll_next(cx)
    }
}

impl Drop for GenerationSession {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
