use postmortem_agent::GenerateOptions;
use postmortem_core::{Config, CoreError, TemplateRegistry};
use std::sync::Arc;

/// Shared application state passed to all route handlers.
///
/// Read-only after startup; every request gets its own generation session.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub templates: Arc<TemplateRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, CoreError> {
        config.ensure_valid()?;
        let templates = config.registry()?;
        Ok(Self {
            config: Arc::new(config),
            templates: Arc::new(templates),
        })
    }

    pub fn generate_options(&self) -> GenerateOptions {
        GenerateOptions::from_config(&self.config)
    }
}
