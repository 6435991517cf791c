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
//! ### Supported armors
//!
//! - `RSA PRIVATE KEY` (PKCS#1),
//! - `EC PRIVATE KEY` (SEC1),
//! - `PRIVATE KEY` (PKCS#8),
//! - `ENCRYPTED PRIVATE KEY` (PKCS#8 with PBES2),
//! - `OPENSSH PRIVATE KEY` (openssh-key-v1, `bcrypt` KDF with
//!   `aes256-ctr` or `aes256-cbc`).

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

use rsa::traits::PublicKeyParts;
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use signature::{SignatureEncoding, Signer};

use skiff::wire::Writer;

mod error;
pub use error::{Error, Result};

mod openssh;
mod pkcs;

/// A decoded private key, ready to expose its SSH public blob and to
/// sign authentication payloads.
#[non_exhaustive]
pub enum PrivateKey {
    /// An RSA key of any modulus size.
    Rsa(rsa::RsaPrivateKey),

    /// An ECDSA key over NIST P-256.
    EcdsaP256(p256::ecdsa::SigningKey),

    /// An ECDSA key over NIST P-384.
    EcdsaP384(p384::ecdsa::SigningKey),

    /// An ECDSA key over NIST P-521.
    EcdsaP521(p521::ecdsa::SigningKey),

    /// An Ed25519 key.
    Ed25519(ed25519_dalek::SigningKey),
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material stays out of the logs.
        f.write_str(match self {
            Self::Rsa(_) => "PrivateKey::Rsa",
            Self::EcdsaP256(_) => "PrivateKey::EcdsaP256",
            Self::EcdsaP384(_) => "PrivateKey::EcdsaP384",
            Self::EcdsaP521(_) => "PrivateKey::EcdsaP521",
            Self::Ed25519(_) => "PrivateKey::Ed25519",
        })
    }
}

impl PrivateKey {
    /// Decode a PEM-armored private key, decrypting it with
    /// `passphrase` when the armor is encrypted.
    pub fn decode(pem: &[u8], passphrase: Option<&str>) -> Result<Self> {
        let armor = pem::parse(pem).map_err(|_| Error::UnsupportedKeyFormat)?;

        // Legacy `DEK-Info` PEM encryption is not a supported armor.
        if armor.headers().get("Proc-Type").is_some() {
            return Err(Error::UnsupportedKeyFormat);
        }

        match armor.tag() {
            "RSA PRIVATE KEY" => pkcs::rsa_pkcs1(armor.contents()),
            "EC PRIVATE KEY" => pkcs::ec_sec1(armor.contents()),
            "PRIVATE KEY" => pkcs::pkcs8(armor.contents()),
            "ENCRYPTED PRIVATE KEY" => pkcs::pkcs8_encrypted(armor.contents(), passphrase),
            "OPENSSH PRIVATE KEY" => openssh::decode(armor.contents(), passphrase),
            tag => {
                tracing::debug!("Refused an unknown `{tag}` armor");

                Err(Error::UnsupportedKeyFormat)
            }
        }
    }

    /// The SSH signature algorithm names this key can produce, in
    /// preference order.
    ///
    /// RSA keys keep `rsa-sha2-512` first regardless of modulus
    /// size, with the SHA-1 `ssh-rsa` as the last resort.
    pub fn algorithms(&self) -> &'static [&'static str] {
        match self {
            Self::Rsa(_) => &["rsa-sha2-512", "rsa-sha2-256", "ssh-rsa"],
            Self::EcdsaP256(_) => &["ecdsa-sha2-nistp256"],
            Self::EcdsaP384(_) => &["ecdsa-sha2-nistp384"],
            Self::EcdsaP521(_) => &["ecdsa-sha2-nistp521"],
            Self::Ed25519(_) => &["ssh-ed25519"],
        }
    }

    /// The SSH-encoded public-key blob.
    ///
    /// The RSA blob always carries the legacy `ssh-rsa` type tag,
    /// whichever signature algorithm is chosen later.
    pub fn public_blob(&self) -> Vec<u8> {
        let mut writer = Writer::new();

        match self {
            Self::Rsa(key) => {
                writer.string(b"ssh-rsa");
                writer.mpint(&key.e().to_bytes_be());
                writer.mpint(&key.n().to_bytes_be());
            }
            Self::EcdsaP256(key) => {
                writer.string(b"ecdsa-sha2-nistp256");
                writer.string(b"nistp256");
                writer.string(key.verifying_key().to_encoded_point(false).as_bytes());
            }
            Self::EcdsaP384(key) => {
                writer.string(b"ecdsa-sha2-nistp384");
                writer.string(b"nistp384");
                writer.string(key.verifying_key().to_encoded_point(false).as_bytes());
            }
            Self::EcdsaP521(key) => {
                writer.string(b"ecdsa-sha2-nistp521");
                writer.string(b"nistp521");
                writer.string(
                    p521::ecdsa::VerifyingKey::from(key)
                        .to_encoded_point(false)
                        .as_bytes(),
                );
            }
            Self::Ed25519(key) => {
                writer.string(b"ssh-ed25519");
                writer.string(&key.verifying_key().to_bytes());
            }
        }

        writer.finish()
    }

    /// Produce the raw signature bytes over `data` with `algorithm`.
    ///
    /// RSA emits a PKCS#1 v1.5 signature over the matching SHA
    /// digest, ECDSA emits `mpint r || mpint s`, Ed25519 the raw 64
    /// bytes. An algorithm that does not fit the key kind or curve is
    /// an [`Error::AlgorithmKeyMismatch`].
    pub fn sign(&self, algorithm: &str, data: &[u8]) -> Result<Vec<u8>> {
        fn split_rs(r: &[u8], s: &[u8]) -> Vec<u8> {
            let mut writer = Writer::new();
            writer.mpint(r);
            writer.mpint(s);

            writer.finish()
        }

        match (self, algorithm) {
            (Self::Rsa(key), "rsa-sha2-512") => {
                let signer = rsa::pkcs1v15::SigningKey::<Sha512>::new(key.clone());

                Ok(signer.sign(data).to_vec())
            }
            (Self::Rsa(key), "rsa-sha2-256") => {
                let signer = rsa::pkcs1v15::SigningKey::<Sha256>::new(key.clone());

                Ok(signer.sign(data).to_vec())
            }
            (Self::Rsa(key), "ssh-rsa") => {
                let signer = rsa::pkcs1v15::SigningKey::<Sha1>::new(key.clone());

                Ok(signer.sign(data).to_vec())
            }
            (Self::EcdsaP256(key), "ecdsa-sha2-nistp256") => {
                let signature: p256::ecdsa::Signature = key.sign(data);
                let (r, s) = signature.split_bytes();

                Ok(split_rs(&r, &s))
            }
            (Self::EcdsaP384(key), "ecdsa-sha2-nistp384") => {
                let signature: p384::ecdsa::Signature = key.sign(data);
                let (r, s) = signature.split_bytes();

                Ok(split_rs(&r, &s))
            }
            (Self::EcdsaP521(key), "ecdsa-sha2-nistp521") => {
                let signature: p521::ecdsa::Signature = key.sign(data);
                let (r, s) = signature.split_bytes();

                Ok(split_rs(&r, &s))
            }
            (Self::Ed25519(key), "ssh-ed25519") => Ok(key.sign(data).to_bytes().to_vec()),
            _ => Err(Error::AlgorithmKeyMismatch),
        }
    }
}

// Direct constructions, mostly useful to test embedders.

impl From<rsa::RsaPrivateKey> for PrivateKey {
    fn from(key: rsa::RsaPrivateKey) -> Self {
        Self::Rsa(key)
    }
}

impl From<ed25519_dalek::SigningKey> for PrivateKey {
    fn from(key: ed25519_dalek::SigningKey) -> Self {
        Self::Ed25519(key)
    }
}

impl From<p256::ecdsa::SigningKey> for PrivateKey {
    fn from(key: p256::ecdsa::SigningKey) -> Self {
        Self::EcdsaP256(key)
    }
}

impl From<p384::ecdsa::SigningKey> for PrivateKey {
    fn from(key: p384::ecdsa::SigningKey) -> Self {
        Self::EcdsaP384(key)
    }
}

impl From<p521::ecdsa::SigningKey> for PrivateKey {
    fn from(key: p521::ecdsa::SigningKey) -> Self {
        Self::EcdsaP521(key)
    }
}

/// Left-pad a scalar to the fixed width of its field.
pub(crate) fn left_pad<const N: usize>(bytes: &[u8]) -> Result<[u8; N]> {
    if bytes.len() > N {
        return Err(Error::Malformed);
    }

    let mut out = [0u8; N];
    out[N - bytes.len()..].copy_from_slice(bytes);

    Ok(out)
}
