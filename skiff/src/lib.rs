#![doc = concat!(
    "[![crates.io](https://img.shields.io/crates/v/", env!("CARGO_PKG_NAME"), ")](https://crates.io/crates/", env!("CARGO_PKG_NAME"), ")",
    " ",
    "[![docs.rs](https://img.shields.io/docsrs/", env!("CARGO_PKG_NAME"), ")](https://docs.rs/", env!("CARGO_PKG_NAME"), ")",
    " ",
    "![license](https://img.shields.io/crates/l/", env!("CARGO_PKG_NAME"), ")"
)]
#![doc = ""]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! ### Supported algorithms
//!
//! #### Key-exchange:
//! see [`algorithm::Kex`].
//!
//! #### Host-keys:
//! see [`algorithm::HostKeyAlg`].
//!
//! #### Encryption:
//! see [`algorithm::Cipher`].
//!
//! #### MACs:
//! see [`algorithm::Hmac`].
//!
//! #### Compression:
//! `none`, and nothing else.

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

use futures::{AsyncBufRead, AsyncWrite};

mod error;
pub use error::{DisconnectedBy, DisconnectedError, Error, Result};

mod id;
pub use id::Id;

pub mod algorithm;
pub mod msg;
pub mod wire;

pub mod stream;

pub mod session;
pub use session::Session;

/// The byte-stream requirements to back a [`Session`],
/// satisfied by any buffered, asynchronous duplex stream.
pub trait Pipe: AsyncBufRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncBufRead + AsyncWrite + Unpin + Send> Pipe for T {}
