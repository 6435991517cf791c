//! Collection of error handling types and aliases.

use thiserror::Error;

use crate::proto::StatusCode;

/// The error types that can occur when manipulating this crate.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// An error at the channel or transport level.
    #[error(transparent)]
    Channel(#[from] skiff_connect::Error),

    /// The peer sent a malformed or out-of-protocol SFTP message.
    #[error("The peer sent a malformed SFTP message")]
    BadMessage,

    /// The server failed a request with a status reply.
    #[error("The server failed the request ({code:?}): {message}")]
    Sftp {
        /// The status code carried by the reply.
        code: StatusCode,

        /// The server's human-readable message.
        message: String,
    },

    /// The channel went away with requests outstanding.
    #[error("The connection was lost")]
    ConnectionLost,

    /// The request outlived its deadline.
    #[error("The request timed out")]
    Timeout,

    /// The request was cancelled by the caller.
    #[error("The request was cancelled")]
    Cancelled,
}

impl From<skiff::Error> for Error {
    fn from(err: skiff::Error) -> Self {
        Self::Channel(err.into())
    }
}

/// A handy [`std::result::Result`] type alias bounding the [`enum@Error`] struct as `E`.
pub type Result<T, E = Error> = std::result::Result<T, E>;
