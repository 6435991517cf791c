//! Collection of error handling types and aliases.

use thiserror::Error;

use crate::msg::trans::DisconnectReason;

/// The disconnection side for [`DisconnectedError`].
#[derive(Debug, Clone)]
pub enum DisconnectedBy {
    /// The session has been disconnected by _us_.
    Us,

    /// The session has been disconnected by _them_.
    Them,
}

/// The error type describing disconnect.
#[must_use]
#[derive(Debug, Error, Clone)]
#[error("The session has been disconnected by {by:?} for {reason:?}: {description}")]
pub struct DisconnectedError {
    /// Side that sent the disconnect message.
    pub by: DisconnectedBy,

    /// Reason for disconnect.
    pub reason: DisconnectReason,

    /// Description of the disconnect reason.
    pub description: String,
}

/// The error types that can occur when manipulating this crate.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// I/O Error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The peer's identification was not a supported SSH protocol version.
    #[error("Peer identified with an unsupported protocol version")]
    UnsupportedVersion,

    /// A message field was truncated or violated its encoding rules.
    #[error("A message field was truncated or malformed")]
    MalformedField,

    /// The binary packet framing was violated.
    #[error("The binary packet was malformed")]
    MalformedPacket,

    /// The packet padding was out of its allowed bounds.
    #[error("The packet padding was out of bounds")]
    BadPadding,

    /// Packet integrity error.
    #[error(transparent)]
    Mac(#[from] digest::MacError),

    /// The message received was unexpected in the current context.
    #[error("Peer sent a message that made no sense in the current context")]
    UnexpectedMessage,

    /// No common kex algorithm found between both sides.
    #[error("Unable to negotiate a common kex algorithm")]
    NoCommonKex,

    /// No common host-key algorithm found between both sides.
    #[error("Unable to negotiate a common host key algorithm")]
    NoCommonHostKey,

    /// No common cipher algorithm found between both sides.
    #[error("Unable to negotiate a common encryption algorithm")]
    NoCommonCipher,

    /// No common hmac algorithm found between both sides.
    #[error("Unable to negotiate a common HMAC algorithm")]
    NoCommonHmac,

    /// Protocol error in the key-exchange.
    #[error("Error in the key-exchange algorithm")]
    KexFailed,

    /// The embedder's verifier refused the server's host key.
    #[error("The host key was refused by the verifier")]
    HostKeyRejected,

    /// Signature verification error over the exchange hash.
    #[error(transparent)]
    HostKeyVerificationFailed(#[from] signature::Error),

    /// The session has been disconnected.
    #[error(transparent)]
    Disconnected(#[from] DisconnectedError),

    /// The underlying stream went away without a disconnect message.
    #[error("The connection has been lost")]
    ConnectionLost,

    /// A send or receive outlived its deadline.
    #[error("The operation timed out")]
    Timeout,
}

/// A handy [`std::result::Result`] type alias bounding the [`enum@Error`] struct as `E`.
pub type Result<T, E = Error> = std::result::Result<T, E>;
