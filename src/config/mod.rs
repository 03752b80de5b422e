//! Configuration module
//!
//! Handles automation settings loaded from TOML

mod settings;

pub use settings::{
    AutomationConfig, CodepageSettings, LoggingConfig, MatchKind, SessionSettings, TimeoutSettings,
    TriggerDefinition,
};

use directories::ProjectDirs;
use std::path::PathBuf;

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "tn5250-automate", "tn5250-automate")
}

/// Get the application configuration directory
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the log directory
pub fn log_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().join("logs"))
}

/// Default configuration file path
pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}
