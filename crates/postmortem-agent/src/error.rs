use std::time::Duration;

use thiserror::Error;

use crate::types::humanize_duration;

/// Every way a generation can end without a `Complete` event.
///
/// The `Display` text is what the client sees in the terminal `error` event.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("{0}")]
    Validation(String),

    #[error("failed to launch '{command}': {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Claude CLI timed out after {}", humanize_duration(.0))]
    Timeout(Duration),

    #[error("{0}")]
    Process(String),

    #[error("Timeout after {}", humanize_duration(.0))]
    RelayTimeout(Duration),

    #[error("report generator stopped without a result")]
    Interrupted,

    /// The consumer went away; nothing is left to report to.
    #[error("client disconnected")]
    Disconnected,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
