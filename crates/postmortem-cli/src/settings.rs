use anyhow::Context;
use postmortem_core::config::CONFIG_FILE;
use postmortem_core::Config;
use std::path::{Path, PathBuf};

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub command: Option<String>,
}

impl Overrides {
    pub fn apply(self, config: &mut Config) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(command) = self.command {
            config.generator.command = command;
        }
    }
}

/// Where the config file lives.
///
/// Priority:
/// 1. `--config` flag / `POSTMORTEM_CONFIG` env var (passed in as `explicit`)
/// 2. `postmortem.yaml` in the working directory
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(p) => p.to_path_buf(),
        None => std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(CONFIG_FILE),
    }
}

/// Load the effective config. An explicit path must exist; the implicit
/// `postmortem.yaml` is optional and defaults apply without it.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    let config = match explicit {
        Some(path) => Config::load(path),
        None => {
            let cwd = std::env::current_dir().context("failed to read working directory")?;
            Config::discover(&cwd)
        }
    };
    config.context("failed to load config")
}
