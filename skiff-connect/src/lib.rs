#![doc = concat!(
    "[![crates.io](https://img.shields.io/crates/v/", env!("CARGO_PKG_NAME"), ")](https://crates.io/crates/", env!("CARGO_PKG_NAME"), ")",
    " ",
    "[![docs.rs](https://img.shields.io/docsrs/", env!("CARGO_PKG_NAME"), ")](https://docs.rs/", env!("CARGO_PKG_NAME"), ")",
    " ",
    "![license](https://img.shields.io/crates/l/", env!("CARGO_PKG_NAME"), ")"
)]
#![doc = ""]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    clippy::unwrap_used,
    clippy::panic,
    clippy::unimplemented,
    clippy::todo,
    clippy::undocumented_unsafe_blocks
)]
#![forbid(unsafe_code)]

use thiserror::Error;

mod channel;
pub use channel::{Channel, Options};

/// The error types that can occur when manipulating this crate.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// An error at the transport level.
    #[error(transparent)]
    Transport(#[from] skiff::Error),

    /// The peer rejected our channel open.
    #[error("The channel open was rejected ({reason}): {description}")]
    ChannelOpenRejected {
        /// The rejection reason code.
        reason: u32,

        /// The peer's description of the rejection.
        description: String,
    },

    /// The peer refused to start the requested subsystem.
    #[error("The `{0}` subsystem failed to start")]
    SubsystemStartFailed(String),

    /// The peer wrote past the window credit we granted.
    #[error("Peer overflowed the local channel window")]
    WindowOverflow,

    /// The channel has already been closed.
    #[error("The channel has been closed")]
    ChannelClosed,
}

/// A handy [`std::result::Result`] type alias bounding the [`enum@Error`] struct as `E`.
pub type Result<T, E = Error> = std::result::Result<T, E>;
