//! Keyboard handling
//!
//! - `keys`: bracket mnemonics and their 5250 attention identifiers
//! - `sequence`: parsing `TEXT[tab]TEXT[enter]` and encoding it for the host
//! - `entry`: operator editing of input fields and the records submit keys produce
//! - `lock`: the keyboard lock state machine callers wait on

mod entry;
mod keys;
mod lock;
mod sequence;

pub use entry::KeyEntry;
pub use keys::{aid, KeyMnemonic};
pub use lock::{HostSignal, KeyboardLock, KeyboardMode, KeyboardStats, KeyboardTransition};
pub use sequence::{KeySequence, KeyToken, KEY_ESCAPE};
