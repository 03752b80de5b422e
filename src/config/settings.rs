//! Automation settings

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::core::codepage::CodepageRegistry;
use crate::core::error::{Error, Result};
use crate::core::handler::{ScreenCondition, ScreenTrigger, ScreenTriggerHandler};
use crate::core::screen::Dimensions;
use crate::core::session::SessionTimeouts;
use crate::core::transport::TelnetConfig;

/// Automation configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    /// Connection target and terminal model
    pub session: SessionSettings,
    /// Wait and connect deadlines
    pub timeouts: TimeoutSettings,
    /// Extra code-page descriptors
    pub codepages: CodepageSettings,
    /// Log output
    pub logging: LoggingConfig,
    /// Interrupt request answers, first match wins
    pub triggers: Vec<TriggerDefinition>,
}

impl AutomationConfig {
    /// Parse a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Configuration(format!("Invalid configuration: {e}")))
    }

    /// Load an explicit file; a missing file is an error
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Configuration(format!("Cannot read {}: {e}", path.display())))?;
        let config = Self::from_toml_str(&content)
            .map_err(|e| Error::Configuration(format!("{}: {e}", path.display())))?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load the per-user file if there is one, defaults otherwise
    pub fn load_default() -> Result<Self> {
        match super::default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Built-in code pages plus every configured descriptor directory
    pub fn build_registry(&self) -> Result<CodepageRegistry> {
        let mut registry = CodepageRegistry::builtin()?;
        for dir in &self.codepages.directories {
            let count = registry.load_dir(dir)?;
            debug!("Loaded {} code pages from {}", count, dir.display());
        }
        Ok(registry)
    }

    /// Request handler built from the configured triggers
    pub fn request_handler(&self) -> Result<ScreenTriggerHandler> {
        ScreenTriggerHandler::from_triggers(self.triggers.iter().map(TriggerDefinition::to_trigger))
    }

    /// Telnet settings for the configured terminal
    pub fn telnet_config(&self) -> TelnetConfig {
        let config = TelnetConfig::new().connect_timeout(self.timeouts.connect());
        match &self.session.terminal_type {
            Some(tt) => config.terminal_type(tt),
            None => config,
        }
    }
}

/// Session settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Host to connect to
    pub host: Option<String>,
    /// Port number (default: 23)
    pub port: u16,
    /// Screen size as `ROWSxCOLS`
    pub screen: String,
    /// Code page id
    pub codepage: String,
    /// Terminal type override
    pub terminal_type: Option<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            host: None,
            port: 23,
            screen: "24x80".to_string(),
            codepage: "37".to_string(),
            terminal_type: None,
        }
    }
}

impl SessionSettings {
    /// Parsed screen size
    pub fn dimensions(&self) -> Result<Dimensions> {
        self.screen.parse()
    }
}

/// Deadlines in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    /// Default `wait_for_unlock` deadline
    pub unlock_ms: u64,
    /// Default `wait_for_lock_cycle` deadline
    pub lock_cycle_ms: u64,
    /// Connect plus negotiation
    pub connect_ms: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            unlock_ms: 30_000,
            lock_cycle_ms: 5_000,
            connect_ms: 10_000,
        }
    }
}

impl TimeoutSettings {
    /// Connect deadline
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    /// As session deadlines
    pub fn to_session_timeouts(&self) -> SessionTimeouts {
        SessionTimeouts {
            unlock: Duration::from_millis(self.unlock_ms),
            lock_cycle: Duration::from_millis(self.lock_cycle_ms),
            connect: self.connect(),
        }
    }
}

/// Code-page settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodepageSettings {
    /// Directories of `*.json` descriptors loaded after the built-ins
    pub directories: Vec<PathBuf>,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// Also write to this file (daily rotation)
    pub file: Option<PathBuf>,
    /// JSON lines instead of text
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            json: false,
        }
    }
}

/// How a trigger pattern is matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// Case-sensitive substring
    Text,
    /// Case-insensitive substring
    TextIgnoreCase,
    /// Regular expression
    Regex,
}

/// Trigger as written in the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerDefinition {
    /// Trigger name
    pub name: String,
    /// Match type
    #[serde(rename = "match", default = "default_match")]
    pub kind: MatchKind,
    /// Text or expression to look for
    pub pattern: String,
    /// Key sequence to submit
    pub response: String,
}

fn default_match() -> MatchKind {
    MatchKind::Text
}

impl TriggerDefinition {
    /// Convert to a screen trigger
    pub fn to_trigger(&self) -> ScreenTrigger {
        let condition = match self.kind {
            MatchKind::Text => ScreenCondition::Text(self.pattern.clone()),
            MatchKind::TextIgnoreCase => ScreenCondition::TextIgnoreCase(self.pattern.clone()),
            MatchKind::Regex => ScreenCondition::Regex(self.pattern.clone()),
        };
        ScreenTrigger::new(self.name.clone(), condition, self.response.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::handler::RequestHandler;

    const SAMPLE: &str = r#"
[session]
host = "pub400.com"
screen = "27x132"
codepage = "273"

[timeouts]
unlock_ms = 15000

[logging]
level = "debug"

[[triggers]]
name = "messages"
match = "text_ignore_case"
pattern = "display messages"
response = "[enter]"

[[triggers]]
name = "any"
pattern = "Sign On"
response = "[pf3]"
"#;

    #[test]
    fn test_defaults() {
        let config = AutomationConfig::default();
        assert_eq!(config.session.port, 23);
        assert_eq!(config.session.dimensions().unwrap(), Dimensions::MODEL_2);
        let timeouts = config.timeouts.to_session_timeouts();
        assert_eq!(timeouts, SessionTimeouts::default());
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config = AutomationConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.session.host.as_deref(), Some("pub400.com"));
        assert_eq!(config.session.port, 23);
        assert_eq!(config.session.dimensions().unwrap(), Dimensions::MODEL_5);
        assert_eq!(config.timeouts.unlock_ms, 15_000);
        assert_eq!(config.timeouts.lock_cycle_ms, 5_000);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.triggers.len(), 2);
        assert_eq!(config.triggers[1].kind, MatchKind::Text);

        let handler = config.request_handler().unwrap();
        assert_eq!(handler.handle_request("DISPLAY MESSAGES").as_deref(), Some("[enter]"));
    }

    #[test]
    fn test_malformed_is_configuration_error() {
        let err = AutomationConfig::from_toml_str("[session]\nport = \"x\"").unwrap_err();
        assert_eq!(err.kind(), "configuration");
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = AutomationConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert_eq!(err.kind(), "configuration");
        assert!(err.to_string().contains("absent.toml"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let config = AutomationConfig::load(&path).unwrap();
        assert_eq!(config.session.codepage, "273");
        assert!(config.build_registry().unwrap().contains("273"));
    }

    #[test]
    fn test_terminal_type_override() {
        let config = AutomationConfig::from_toml_str("[session]\nterminal_type = \"IBM-5555-C01\"").unwrap();
        assert_eq!(config.telnet_config().terminal_type_for(Dimensions::MODEL_2), "IBM-5555-C01");
    }
}
