//! Unified error type for the Gridlock server.

use gridlock_protocol::ProtocolError;
use gridlock_session::SessionError;
use gridlock_transport::TransportError;

/// Top-level error that wraps all layer-specific errors.
///
/// When using the `gridlock` facade crate, you deal with this single
/// error type instead of importing errors from each sub-crate. The
/// `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum GridlockError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (admission, missing record).
    #[error(transparent)]
    Session(#[from] SessionError),
}
