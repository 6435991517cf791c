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

use futures::{AsyncRead, AsyncWrite};
use thiserror::Error;

use skiff::{
    msg::{self, userauth},
    wire::Writer,
    Session,
};

#[doc(no_inline)]
pub use skiff_keys::PrivateKey;

/// The service requested to carry the authentication exchange.
const SERVICE_NAME: &str = "ssh-userauth";

/// The service requested once authentication succeeds.
const NEXT_SERVICE: &str = "ssh-connection";

const SUCCESS: u8 = <userauth::Success as msg::Packet>::NUMBER;
const FAILURE: u8 = <userauth::Failure as msg::Packet>::NUMBER;
const BANNER: u8 = <userauth::Banner as msg::Packet>::NUMBER;
const PK_OK: u8 = <userauth::PkOk as msg::Packet>::NUMBER;

/// The error types that can occur when authenticating.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// An error at the transport level.
    #[error(transparent)]
    Transport(#[from] skiff::Error),

    /// An error in the configured private key.
    #[error(transparent)]
    Key(#[from] skiff_keys::Error),

    /// Every configured method was refused by the server.
    #[error("Authentication failed, the server accepts: {methods}")]
    AuthenticationFailed {
        /// The methods the server advertised as able to continue.
        methods: String,
    },
}

/// A handy [`std::result::Result`] type alias bounding the [`enum@Error`] struct as `E`.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The outcome of one authentication request.
enum Outcome {
    Success,
    Failure(userauth::Failure),
    PkOk(userauth::PkOk),
}

/// Client-side authentication: `none` first to learn the server's
/// method list, then `publickey` when a key is configured, then
/// `password`.
///
/// # Note
/// While the `publickey` method probes every algorithm the key
/// supports, the `password` method is sent exactly once; a refusal
/// with `partial_success = false` is final.
#[derive(Debug)]
pub struct Auth {
    username: String,

    password: Option<String>,
    key: Option<PrivateKey>,
}

impl Auth {
    /// Create an [`Auth`] flow for the provided _username_.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: None,
            key: None,
        }
    }

    /// Attempt to authenticate with the `password` method.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());

        self
    }

    /// Attempt to authenticate with the `publickey` method.
    pub fn publickey(mut self, key: impl Into<PrivateKey>) -> Self {
        self.key = Some(key.into());

        self
    }

    /// Drive the whole authentication exchange on `session`,
    /// returning once the server granted access.
    pub async fn authenticate<IO>(self, session: &mut Session<IO>) -> Result<()>
    where
        IO: AsyncRead + AsyncWrite + Unpin + Send,
    {
        session.service_request(SERVICE_NAME).await?;

        // `none` probes the methods the server will consider.
        let methods = match self.request(session, userauth::Method::None).await? {
            Outcome::Success => return Ok(()),
            Outcome::Failure(failure) => failure.continue_with,
            Outcome::PkOk(_) => return Err(skiff::Error::UnexpectedMessage.into()),
        };

        tracing::debug!("Server accepts authentication with: {}", methods.to_string());

        if let Some(key) = &self.key {
            if methods.contains("publickey") {
                if self.publickey_flow(session, key).await? {
                    return Ok(());
                }
            } else {
                tracing::debug!("Skipping `publickey`, not in the server's method list");
            }
        }

        if let Some(password) = &self.password {
            if methods.contains("password") {
                let outcome = self
                    .request(
                        session,
                        userauth::Method::Password {
                            password: password.clone(),
                        },
                    )
                    .await?;

                match outcome {
                    Outcome::Success => return Ok(()),
                    Outcome::Failure(failure) => {
                        // No second chance on passwords.
                        return Err(Error::AuthenticationFailed {
                            methods: failure.continue_with.to_string(),
                        });
                    }
                    Outcome::PkOk(_) => return Err(skiff::Error::UnexpectedMessage.into()),
                }
            } else {
                tracing::debug!("Skipping `password`, not in the server's method list");
            }
        }

        Err(Error::AuthenticationFailed {
            methods: methods.to_string(),
        })
    }

    /// The two-phase `publickey` flow: probe each algorithm without
    /// a signature, then sign once the server signals a `PK_OK`.
    async fn publickey_flow<IO>(
        &self,
        session: &mut Session<IO>,
        key: &PrivateKey,
    ) -> Result<bool>
    where
        IO: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let blob = key.public_blob();

        for &algorithm in key.algorithms() {
            let probe = userauth::Method::Publickey {
                algorithm: algorithm.into(),
                blob: blob.clone(),
                signature: None,
            };

            let accepted = match self.request(session, probe).await? {
                Outcome::PkOk(ok) => ok.algorithm == algorithm && ok.blob == blob,
                Outcome::Success => return Ok(true),
                Outcome::Failure(_) => {
                    tracing::debug!("Server refused the `{algorithm}` probe");

                    continue;
                }
            };
            if !accepted {
                return Err(skiff::Error::UnexpectedMessage.into());
            }

            let session_id = session.session_id().ok_or(skiff::Error::ConnectionLost)?;
            let signature = key.sign(algorithm, &self.signed_payload(session_id, algorithm, &blob))?;

            let signature = {
                let mut writer = Writer::new();
                writer.string(algorithm.as_bytes());
                writer.string(&signature);

                writer.finish()
            };

            let signed = userauth::Method::Publickey {
                algorithm: algorithm.into(),
                blob: blob.clone(),
                signature: Some(signature),
            };

            match self.request(session, signed).await? {
                Outcome::Success => return Ok(true),
                Outcome::Failure(_) => {
                    tracing::debug!("Server refused the `{algorithm}` signature");
                }
                Outcome::PkOk(_) => return Err(skiff::Error::UnexpectedMessage.into()),
            }
        }

        Ok(false)
    }

    /// The exact byte string a `publickey` signature covers.
    fn signed_payload(&self, session_id: &[u8], algorithm: &str, blob: &[u8]) -> Vec<u8> {
        let mut writer = Writer::new();

        writer.string(session_id);
        writer.u8(<userauth::Request as msg::Packet>::NUMBER);
        writer.string(self.username.as_bytes());
        writer.string(NEXT_SERVICE.as_bytes());
        writer.string(b"publickey");
        writer.bool(true);
        writer.string(algorithm.as_bytes());
        writer.string(blob);

        writer.finish()
    }

    /// Send one `USERAUTH_REQUEST` and wait for its outcome,
    /// logging and skipping any banner.
    async fn request<IO>(
        &self,
        session: &mut Session<IO>,
        method: userauth::Method,
    ) -> Result<Outcome>
    where
        IO: AsyncRead + AsyncWrite + Unpin + Send,
    {
        session
            .send(&userauth::Request {
                username: self.username.clone(),
                service_name: NEXT_SERVICE.into(),
                method,
            })
            .await?;

        loop {
            let packet = session.recv().await?;

            match packet.number() {
                SUCCESS => break Ok(Outcome::Success),
                FAILURE => break Ok(Outcome::Failure(packet.to()?)),
                PK_OK => break Ok(Outcome::PkOk(packet.to()?)),
                BANNER => {
                    let banner: userauth::Banner = packet.to()?;

                    tracing::info!("Server banner: {}", banner.message.trim_end());
                }
                _ => break Err(skiff::Error::UnexpectedMessage.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_signed_payload_layout_is_stable() {
        let auth = Auth::new("alice");

        let payload = auth.signed_payload(&[0xaa; 4], "rsa-sha2-256", &[0xbb; 8]);

        let mut expected = Vec::new();
        expected.extend_from_slice(&[0, 0, 0, 4, 0xaa, 0xaa, 0xaa, 0xaa]);
        expected.push(50);
        expected.extend_from_slice(b"\x00\x00\x00\x05alice");
        expected.extend_from_slice(b"\x00\x00\x00\x0essh-connection");
        expected.extend_from_slice(b"\x00\x00\x00\x09publickey");
        expected.push(1);
        expected.extend_from_slice(b"\x00\x00\x00\x0crsa-sha2-256");
        expected.extend_from_slice(&[0, 0, 0, 8]);
        expected.extend_from_slice(&[0xbb; 8]);

        assert_eq!(payload, expected);
    }
}
