//! Core module containing the session automation engine
//!
//! This module provides:
//! - EBCDIC code-page registry and converters (single- and double-byte)
//! - Screen buffer with 5250 field attributes
//! - Keyboard lock state machine and key sequences
//! - 5250 data stream decoding
//! - Interrupt request handlers
//! - Session controller
//! - Transport layer (TN5250 telnet, in-memory)

pub mod codepage;
pub mod datastream;
pub mod error;
pub mod handler;
pub mod keyboard;
pub mod screen;
pub mod session;
pub mod transport;
