//! # tn5250-automate
//!
//! Headless automation of IBM 5250 terminal sessions:
//! - TN5250 over telnet, plus an in-memory host for tests
//! - Keyboard-lock synchronisation (wait for unlock, wait for a full cycle)
//! - EBCDIC code pages, including double-byte CCSID 930
//! - Screen text and snapshots with field attributes
//! - Pluggable answers to host interrupt requests
//! - CLI with exit codes
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tn5250_automate::{CodepageRegistry, Dimensions, SessionController, TelnetConnector, WaitFor};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = Arc::new(CodepageRegistry::builtin()?);
//!     let session = SessionController::new(Arc::new(TelnetConnector::default()), registry);
//!
//!     session.connect("pub400.com", 23, Dimensions::MODEL_2, "37").await?;
//!     session.wait_for_unlock(None).await?;
//!     session.send_keys_and_wait("MYUSER[tab]MYPASS[enter]", WaitFor::LockCycle, None).await?;
//!     println!("{}", session.get_screen_text()?);
//!
//!     session.disconnect().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod core;
pub mod utils;

// Re-exports for convenience
pub use crate::cli::{CliResult, ExitCodes};
pub use crate::config::AutomationConfig;
pub use crate::core::codepage::{CodepageConverter, CodepageDescriptor, CodepageRegistry, TableConverter};
pub use crate::core::error::{Error, Result, WaitPhase};
pub use crate::core::handler::{
    DeclineHandler, RequestHandler, ScreenCondition, ScreenTrigger, ScreenTriggerHandler,
};
pub use crate::core::keyboard::{KeyMnemonic, KeySequence, KeyboardLock, KeyboardMode};
pub use crate::core::screen::{Cell, CellAttributes, Dimensions, InputField, ScreenBuffer, ScreenSnapshot};
pub use crate::core::session::{SessionController, SessionEvent, SessionState, SessionTimeouts, WaitFor};
pub use crate::core::transport::{
    memory_pair, Connector, Endpoint, MemoryConnector, MemoryHost, TelnetConfig, TelnetConnector,
    TransportError, TransportType,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
