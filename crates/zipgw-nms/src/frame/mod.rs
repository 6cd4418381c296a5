// crates/zipgw-nms/src/frame/mod.rs
//! Wire codec for the three Network Management command classes.
//!
//! Requests are decoded into [`NmCommand`]; replies are produced by typed
//! builders that track their own length.

pub mod command;
pub mod constants;
pub mod reply;
pub mod report;

pub use command::{NmCommand, RequestHeader};
pub use reply::{
    FailedNodeReplaceStatus, LearnModeSetStatus, NodeAddStatus, NodeAddVariant, PendingReply,
};

use crate::hal::NmsError;
use core::fmt;

/// Errors raised while decoding a request frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    TooShort { expected: usize, actual: usize },
    UnknownClass(u8),
    UnknownCommand { class: u8, command: u8 },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { expected, actual } => {
                write!(f, "Frame too short: expected {expected} bytes, got {actual}")
            }
            Self::UnknownClass(c) => write!(f, "Unknown command class {c:#04x}"),
            Self::UnknownCommand { class, command } => {
                write!(f, "Unknown command {command:#04x} in class {class:#04x}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FrameError {}

impl From<FrameError> for NmsError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::TooShort { expected, actual } => NmsError::FrameTooShort { expected, actual },
            FrameError::UnknownClass(class) => NmsError::UnknownCommandClass(class),
            FrameError::UnknownCommand { class, command } => {
                NmsError::UnknownCommand { class, command }
            }
        }
    }
}

/// Checks that `frame` holds at least `expected` bytes.
pub(crate) fn ensure_len(frame: &[u8], expected: usize) -> Result<(), FrameError> {
    if frame.len() < expected {
        Err(FrameError::TooShort {
            expected,
            actual: frame.len(),
        })
    } else {
        Ok(())
    }
}
