//! CLI Module
//!
//! Provides command-line interface functionality including:
//! - Exit codes for automation
//! - Log subscriber setup

pub mod exit_codes;
pub mod logging;

pub use exit_codes::{exit_code_description, print_exit_codes, CliResult, ExitCodes};
pub use logging::{init_logging, level_for};
