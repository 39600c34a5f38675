use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("config file not found: {0}")]
    ConfigNotFound(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("unknown report format: {0}")]
    UnknownFormat(String),

    #[error("template '{0}' is missing the {{incident_notes}} slot")]
    MissingNotesSlot(String),

    #[error("refusing to overwrite existing file: {0}")]
    FileExists(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
