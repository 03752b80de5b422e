//! 5250 data stream
//!
//! Decoding of host records into screen and keyboard events, a builder for
//! producing host records, and the inbound records the terminal answers with.

pub mod codes;
mod builder;
mod input;
mod parser;

pub use builder::RecordBuilder;
pub use input::InputRecord;
pub use parser::{DataStreamError, DataStreamParser, HostEvent};

use crate::core::error::Error;

impl From<DataStreamError> for Error {
    fn from(err: DataStreamError) -> Self {
        Error::State(format!("Malformed host record: {err}"))
    }
}
