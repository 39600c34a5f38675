//! `postmortem-agent` — drives the Claude CLI as a one-shot report generator
//! and relays its output as a stream of typed events.
//!
//! # Architecture
//!
//! ```text
//! GenerateOptions
//!     │
//!     ▼
//! ClaudeProcess      ← spawns `claude --print`, writes the prompt to stdin,
//!     │                 waits for exit under a hard timeout
//!     ▼
//! generator::run     ← background task; status → content chunks → complete
//!     │                 (or a single error), pushed into the relay
//!     ▼
//! relay              ← unbounded SPSC queue; the drain side polls with a
//!     │                 timeout, injects heartbeats, enforces an idle ceiling
//!     ▼
//! GenerationSession  ← futures::Stream<Item = StreamEvent>; dropping it
//!                       aborts the task and kills the subprocess
//! ```
//!
//! # Quick start
//!
//! ```rust,ignore
//! use futures::StreamExt;
//! use postmortem_agent::{generate, GenerateOptions, StreamEvent};
//!
//! let mut session = generate("Summarise: db failover at 10:02", GenerateOptions::default());
//! while let Some(event) = session.next().await {
//!     if let StreamEvent::Content { chunk, .. } = &event {
//!         print!("{chunk}");
//!     }
//! }
//! ```

pub mod error;
pub mod generator;
pub mod relay;
pub mod session;
pub mod types;

pub(crate) mod process;

#[cfg(test)]
mod tests;

pub use error::GenerationError;
pub use relay::{RelayReceiver, RelaySender, RelaySettings};
pub use session::GenerationSession;
pub use types::{GenerateOptions, StreamEvent};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, GenerationError>;

/// Start generating a report for `prompt`.
///
/// Returns a [`GenerationSession`] that yields [`StreamEvent`]s as they are
/// produced. The sequence always ends with exactly one terminal event
/// (`Complete` or `Error`) and cannot be restarted.
pub fn generate(prompt: impl Into<String>, opts: GenerateOptions) -> GenerationSession {
    GenerationSession::start(prompt, opts)
}
