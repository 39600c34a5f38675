use std::time::Duration;

use futures::Stream;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::types::StreamEvent;
use crate::GenerationError;

// ─── RelaySettings ────────────────────────────────────────────────────────

/// Pacing for the consumer side of the relay.
///
/// Heartbeat and idle accounting are done in whole polls, so both intervals
/// are effectively rounded up to a multiple of `poll_interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelaySettings {
    /// How long a single `pop` waits before reporting the queue as empty.
    pub poll_interval: Duration,
    /// Accumulated idle time between heartbeats.
    pub heartbeat_interval: Duration,
    /// Accumulated idle time after which the relay gives up on the producer.
    pub idle_timeout: Duration,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            heartbeat_interval: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(300),
        }
    }
}

impl RelaySettings {
    fn polls(&self, span: Duration) -> u64 {
        let poll = self.poll_interval.as_millis().max(1);
        span.as_millis().div_ceil(poll).max(1) as u64
    }

    fn heartbeat_every(&self) -> u64 {
        self.polls(self.heartbeat_interval)
    }

    fn idle_limit(&self) -> u64 {
        self.polls(self.idle_timeout)
    }
}

// ─── Channel ──────────────────────────────────────────────────────────────

/// Create a fresh relay for one request.
pub fn channel() -> (RelaySender, RelayReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RelaySender { tx }, RelayReceiver { rx })
}

/// Producer half. Owned by the generator task.
#[derive(Debug, Clone)]
pub struct RelaySender {
    tx: mpsc::UnboundedSender<StreamEvent>,
}

impl RelaySender {
    /// Queue an event without blocking. Returns `false` once the consumer
    /// has gone away, which is the producer's cue to stop.
    pub fn push(&self, event: StreamEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Outcome of a single [`RelayReceiver::pop`].
#[derive(Debug, Clone, PartialEq)]
pub enum Pop {
    Event(StreamEvent),
    /// Nothing arrived within the timeout.
    Empty,
    /// Every sender is gone and the queue is drained.
    Closed,
}

/// Consumer half. Owned by the HTTP response stream.
#[derive(Debug)]
pub struct RelayReceiver {
    rx: mpsc::UnboundedReceiver<StreamEvent>,
}

impl RelayReceiver {
    pub async fn pop(&mut self, timeout: Duration) -> Pop {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(event)) => Pop::Event(event),
            Ok(None) => Pop::Closed,
            Err(_) => Pop::Empty,
        }
    }
}

// ─── Drain ────────────────────────────────────────────────────────────────

struct DrainState {
    rx: RelayReceiver,
    idle_polls: u64,
}

/// Turn a receiver into the client-facing event stream.
///
/// Events are forwarded as they arrive and the stream ends right after the
/// first terminal event. While the queue stays empty the drain counts idle
/// polls (cumulatively, never reset), emits a heartbeat every
/// `heartbeat_interval` of idle time, and ends with a timeout error once
/// `idle_timeout` of idle time has accumulated. A producer that disappears
/// without a terminal event is reported as an error too, so the stream
/// always ends with exactly one terminal event.
pub fn drain(rx: RelayReceiver, settings: RelaySettings) -> impl Stream<Item = StreamEvent> + Send {
    let heartbeat_every = settings.heartbeat_every();
    let idle_limit = settings.idle_limit();

    futures::stream::unfold(
        Some(DrainState { rx, idle_polls: 0 }),
        move |state| async move {
            let mut state = state?;
            loop {
                match state.rx.pop(settings.poll_interval).await {
                    Pop::Event(event) => {
                        let next = if event.is_terminal() { None } else { Some(state) };
                        return Some((event, next));
                    }
                    Pop::Closed => {
                        warn!("relay closed before a terminal event");
                        let err = GenerationError::Interrupted;
                        return Some((StreamEvent::error(err.to_string()), None));
                    }
                    Pop::Empty => {
                        state.idle_polls += 1;
                        if state.idle_polls >= idle_limit {
                            warn!(idle_polls = state.idle_polls, "relay idle timeout");
                            let err = GenerationError::RelayTimeout(settings.idle_timeout);
                            return Some((StreamEvent::error(err.to_string()), None));
                        }
                        if state.idle_polls % heartbeat_every == 0 {
                            let idle = settings.poll_interval * state.idle_polls as u32;
                            debug!(idle_secs = idle.as_secs(), "relay heartbeat");
                            let beat =
                                StreamEvent::heartbeat(format!("Processing... ({}s)", idle.as_secs()));
                            return Some((beat, Some(state)));
                        }
                    }
                }
            }
        },
    )
}

// ─── Tests ────────────────────────────────────────────────────────────────
