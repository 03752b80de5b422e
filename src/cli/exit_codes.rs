//! CLI Exit Codes
//!
//! Standard exit codes for CLI operations and automation. Each error kind of
//! the crate taxonomy has its own code so scripts can branch on the failure.

use std::process::ExitCode;

use crate::core::error::Error;

/// Exit code constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCodes;

impl ExitCodes {
    /// Success
    pub const SUCCESS: u8 = 0;

    /// General error
    pub const ERROR: u8 = 1;

    /// Invalid arguments
    pub const INVALID_ARGS: u8 = 2;

    /// Connection failed
    pub const CONNECTION_FAILED: u8 = 3;

    /// Keyboard wait timed out
    pub const TIMEOUT: u8 = 4;

    /// Configuration error
    pub const CONFIG_ERROR: u8 = 8;

    /// Key sequence or text could not be encoded
    pub const PARSE_ERROR: u8 = 9;

    /// Operation attempted in the wrong session state
    pub const STATE_ERROR: u8 = 10;

    /// Internal error
    pub const INTERNAL_ERROR: u8 = 127;
}

/// CLI operation result
#[derive(Debug)]
pub enum CliResult {
    /// Success with optional message
    Success(Option<String>),

    /// Error with code and message
    Error(u8, String),
}

impl CliResult {
    /// Plain success
    pub fn success() -> Self {
        Self::Success(None)
    }

    /// Success carrying output for the user
    pub fn success_with_message(msg: impl Into<String>) -> Self {
        Self::Success(Some(msg.into()))
    }

    /// Failure with an explicit code
    pub fn error(code: u8, msg: impl Into<String>) -> Self {
        Self::Error(code, msg.into())
    }

    /// Connection failure
    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::Error(ExitCodes::CONNECTION_FAILED, msg.into())
    }

    /// Wait deadline elapsed
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Error(ExitCodes::TIMEOUT, msg.into())
    }

    /// Bad command line
    pub fn invalid_args(msg: impl Into<String>) -> Self {
        Self::Error(ExitCodes::INVALID_ARGS, msg.into())
    }

    /// Get exit code
    pub fn code(&self) -> u8 {
        match self {
            Self::Success(_) => ExitCodes::SUCCESS,
            Self::Error(code, _) => *code,
        }
    }

    /// Get message
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success(Some(msg)) | Self::Error(_, msg) => Some(msg),
            Self::Success(None) => None,
        }
    }

    /// Convert to `ExitCode`
    pub fn to_exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    /// Is success?
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl From<&Error> for CliResult {
    fn from(err: &Error) -> Self {
        let code = match err {
            Error::Connection(_) => ExitCodes::CONNECTION_FAILED,
            Error::Timeout { .. } => ExitCodes::TIMEOUT,
            Error::Parse { .. } => ExitCodes::PARSE_ERROR,
            Error::Configuration(_) => ExitCodes::CONFIG_ERROR,
            Error::State(_) => ExitCodes::STATE_ERROR,
        };
        Self::Error(code, err.to_string())
    }
}

impl From<Error> for CliResult {
    fn from(err: Error) -> Self {
        Self::from(&err)
    }
}

impl From<std::io::Error> for CliResult {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let code = match err.kind() {
            ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset => ExitCodes::CONNECTION_FAILED,
            ErrorKind::TimedOut => ExitCodes::TIMEOUT,
            ErrorKind::NotFound | ErrorKind::PermissionDenied => ExitCodes::CONFIG_ERROR,
            _ => ExitCodes::ERROR,
        };

        Self::Error(code, err.to_string())
    }
}

/// Exit code description
pub fn exit_code_description(code: u8) -> &'static str {
    match code {
        ExitCodes::SUCCESS => "Success",
        ExitCodes::ERROR => "General error",
        ExitCodes::INVALID_ARGS => "Invalid arguments",
        ExitCodes::CONNECTION_FAILED => "Connection failed",
        ExitCodes::TIMEOUT => "Keyboard wait timed out",
        ExitCodes::CONFIG_ERROR => "Configuration error",
        ExitCodes::PARSE_ERROR => "Key sequence or text not encodable",
        ExitCodes::STATE_ERROR => "Invalid session state",
        ExitCodes::INTERNAL_ERROR => "Internal error",
        _ => "Unknown error",
    }
}

/// Print exit code table
pub fn print_exit_codes() {
    println!("Exit Codes:");
    for code in [
        ExitCodes::SUCCESS,
        ExitCodes::ERROR,
        ExitCodes::INVALID_ARGS,
        ExitCodes::CONNECTION_FAILED,
        ExitCodes::TIMEOUT,
        ExitCodes::CONFIG_ERROR,
        ExitCodes::PARSE_ERROR,
        ExitCodes::STATE_ERROR,
        ExitCodes::INTERNAL_ERROR,
    ] {
        println!("  {:>3}  {}", code, exit_code_description(code));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::WaitPhase;
    use crate::core::transport::TransportError;
    use std::time::Duration;

    #[test]
    fn test_cli_result() {
        let success = CliResult::success();
        assert!(success.is_success());
        assert_eq!(success.code(), 0);
        assert_eq!(success.message(), None);

        let error = CliResult::error(3, "Connection failed");
        assert!(!error.is_success());
        assert_eq!(error.code(), 3);
        assert_eq!(error.message(), Some("Connection failed"));
    }

    #[test]
    fn test_error_kinds_have_distinct_codes() {
        let errors = [
            Error::Connection(TransportError::Disconnected),
            Error::Timeout {
                phase: WaitPhase::AwaitingUnlock,
                requested: Duration::from_secs(1),
                elapsed: Duration::from_secs(1),
            },
            Error::Parse {
                token: "[bogus]".into(),
                position: 0,
                reason: "unknown key".into(),
            },
            Error::Configuration("x".into()),
            Error::State("x".into()),
        ];
        let mut codes: Vec<u8> = errors.iter().map(|e| CliResult::from(e).code()).collect();
        assert_eq!(codes[0], ExitCodes::CONNECTION_FAILED);
        assert_eq!(codes[1], ExitCodes::TIMEOUT);
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), 5);
        assert!(!codes.contains(&ExitCodes::SUCCESS));
    }

    #[test]
    fn test_from_io_error() {
        let err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let result = CliResult::from(err);
        assert_eq!(result.code(), ExitCodes::CONNECTION_FAILED);
    }

    #[test]
    fn test_descriptions() {
        assert_eq!(exit_code_description(ExitCodes::TIMEOUT), "Keyboard wait timed out");
        assert_eq!(exit_code_description(200), "Unknown error");
    }
}
