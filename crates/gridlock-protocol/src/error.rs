//! Error types for the protocol layer.
//!
//! The decode path distinguishes two failure classes with different blast
//! radii (see [`ProtocolError::is_fatal`]):
//!
//! - **Fatal**: the outer envelope itself is unreadable. The receiver can no
//!   longer trust its framing and must terminate.
//! - **Soft**: the envelope was fine but the command tag is unknown or the
//!   inner body is malformed. The receiver drops that one message and keeps
//!   reading.

use std::error::Error;
use std::fmt;

/// Raw serialization failure from a codec backend, type-erased so
/// [`Codec`](crate::Codec) implementations can wrap whatever their
/// underlying library returns.
#[derive(Debug)]
pub struct CodecError(Box<dyn Error + Send + Sync>);

impl CodecError {
    pub fn new(source: impl Error + Send + Sync + 'static) -> Self {
        Self(Box::new(source))
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Error for CodecError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.0.as_ref())
    }
}

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a message into bytes).
    #[error("encode failed: {0}")]
    Encode(#[source] CodecError),

    /// The outer envelope could not be decoded. Fatal to the receiver.
    #[error("invalid envelope: {0}")]
    Envelope(#[source] CodecError),

    /// The envelope carried a command tag this build doesn't know.
    /// The message is dropped; the session survives.
    #[error("unknown command tag {0}")]
    UnknownCommand(u8),

    /// A command that requires a body arrived without one.
    #[error("missing {0} body")]
    MissingBody(&'static str),

    /// The inner body failed to decode. The message is dropped.
    #[error("invalid {command} body: {source}")]
    Body {
        command: &'static str,
        #[source]
        source: CodecError,
    },

    /// The message decoded but violates a protocol rule.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

impl ProtocolError {
    /// Whether this error must terminate the receiver task.
    ///
    /// Outer-envelope failures are fatal; per-message body problems are
    /// dropped with a log entry.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Encode(_) | Self::Envelope(_) | Self::InvalidMessage(_) => true,
            Self::UnknownCommand(_) | Self::MissingBody(_) | Self::Body { .. } => false,
        }
    }
}
