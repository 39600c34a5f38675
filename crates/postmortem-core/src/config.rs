use crate::error::{CoreError, Result};
use crate::template::{ReportFormat, TemplateRegistry, NOTES_SLOT};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// File picked up from the working directory when no `--config` is given.
pub const CONFIG_FILE: &str = "postmortem.yaml";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allow any origin. The browser frontend is usually served from a
    /// different port than the API.
    #[serde(default = "default_true")]
    pub cors: bool,
    /// Largest request body the report endpoint will buffer.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Page opened by `serve --open`, usually the browser frontend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_url: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_true() -> bool {
    true
}

fn default_max_body_bytes() -> usize {
    16 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors: true,
            max_body_bytes: default_max_body_bytes(),
            open_url: None,
        }
    }
}

// ---------------------------------------------------------------------------
// GeneratorConfig
// ---------------------------------------------------------------------------

/// How the external AI CLI is invoked and how its output is replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_command")]
    pub command: String,
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    /// Extra environment variables for the CLI.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Characters per `content` event.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Pause between `content` events. Zero disables pacing.
    #[serde(default = "default_chunk_delay_ms")]
    pub chunk_delay_ms: u64,
}

fn default_command() -> String {
    "claude".to_string()
}

fn default_args() -> Vec<String> {
    vec!["--print".to_string()]
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_chunk_size() -> usize {
    20
}

fn default_chunk_delay_ms() -> u64 {
    20
}

impl GeneratorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            args: default_args(),
            env: BTreeMap::new(),
            timeout_secs: default_timeout_secs(),
            chunk_size: default_chunk_size(),
            chunk_delay_ms: default_chunk_delay_ms(),
        }
    }
}

// ---------------------------------------------------------------------------
// RelayConfig
// ---------------------------------------------------------------------------

/// Consumer-side pacing of the per-request event queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_heartbeat_secs() -> u64 {
    10
}

fn default_idle_timeout_secs() -> u64 {
    300
}

impl RelayConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            heartbeat_secs: default_heartbeat_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// TemplateConfig
// ---------------------------------------------------------------------------

/// A prompt template supplied through config, keyed by format name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub body: String,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default = "default_format")]
    pub default_format: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub templates: BTreeMap<String, TemplateConfig>,
}

fn default_format() -> String {
    ReportFormat::default().as_str().to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            generator: GeneratorConfig::default(),
            relay: RelayConfig::default(),
            default_format: default_format(),
            templates: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load a config file. A missing file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound(path.display().to_string()));
        }
        let data = std::fs::read_to_string(path)?;
        Self::from_yaml(&data)
    }

    /// Load `postmortem.yaml` from `dir` if present, otherwise defaults.
    pub fn discover(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_yaml(data: &str) -> Result<Self> {
        // An empty file deserializes to unit, not an empty mapping.
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(data)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Write a new config file; refuses to clobber an existing one.
    pub fn save_new(&self, path: &Path) -> Result<()> {
        crate::io::write_new(path, self.to_yaml()?.as_bytes())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        crate::io::atomic_write(path, self.to_yaml()?.as_bytes())
    }

    /// Build the template registry this config describes.
    pub fn registry(&self) -> Result<TemplateRegistry> {
        TemplateRegistry::with_custom(&self.templates, &self.default_format)
    }

    /// Like [`Config::validate`], but fails on the first `Error`-level finding.
    pub fn ensure_valid(&self) -> Result<()> {
        match self
            .validate()
            .into_iter()
            .find(|w| w.level == WarnLevel::Error)
        {
            Some(w) => Err(CoreError::InvalidConfig(w.message)),
            None => Ok(()),
        }
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut error = |message: String| {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message,
            })
        };

        if self.generator.command.trim().is_empty() {
            error("generator.command is empty".to_string());
        }
        if self.generator.chunk_size == 0 {
            error("generator.chunk_size must be at least 1".to_string());
        }
        if self.generator.timeout_secs == 0 {
            error("generator.timeout_secs must be greater than 0".to_string());
        }
        if self.server.max_body_bytes == 0 {
            error("server.max_body_bytes must be greater than 0".to_string());
        }
        if self.relay.poll_interval_ms == 0 {
            error("relay.poll_interval_ms must be greater than 0".to_string());
        }
        if self.relay.idle_timeout_secs == 0 {
            error("relay.idle_timeout_secs must be greater than 0".to_string());
        }
        for (key, template) in &self.templates {
            if !template.body.contains(NOTES_SLOT) {
                error(format!(
                    "template '{key}' is missing the {NOTES_SLOT} slot"
                ));
            }
        }
        let known = ReportFormat::parse(&self.default_format).is_some()
            || self.templates.contains_key(&self.default_format);
        if !known {
            error(format!(
                "default_format '{}' is not a known format",
                self.default_format
            ));
        }

        if self.relay.heartbeat_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "relay.heartbeat_secs is 0; heartbeats are sent on every idle poll"
                    .to_string(),
            });
        } else if self.relay.heartbeat_secs >= self.relay.idle_timeout_secs {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "relay.heartbeat_secs ({}) >= relay.idle_timeout_secs ({}); \
                     no heartbeat will be sent before the idle timeout",
                    self.relay.heartbeat_secs, self.relay.idle_timeout_secs
                ),
            });
        }
        if self.relay.idle_timeout_secs > 0
            && self.generator.timeout_secs > self.relay.idle_timeout_secs
        {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "generator.timeout_secs ({}) exceeds relay.idle_timeout_secs ({}); \
                     the relay will give up first",
                    self.generator.timeout_secs, self.relay.idle_timeout_secs
                ),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
