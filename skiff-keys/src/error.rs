//! Collection of error handling types and aliases.

use thiserror::Error;

/// The error types that can occur when decoding or using keys.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// The key is encrypted and no passphrase was provided.
    #[error("The key is encrypted and needs a passphrase")]
    EncryptedKeyNeedsPassphrase,

    /// Decryption did not produce a valid key structure.
    #[error("The passphrase did not decrypt the key")]
    BadPassphrase,

    /// The armor or inner structure is not a supported key format.
    #[error("The key format is not supported")]
    UnsupportedKeyFormat,

    /// The requested signature algorithm does not fit the key.
    #[error("The signature algorithm does not match the key")]
    AlgorithmKeyMismatch,

    /// The key structure failed to decode.
    #[error("The key structure is malformed")]
    Malformed,
}

impl From<skiff::Error> for Error {
    fn from(_: skiff::Error) -> Self {
        Self::Malformed
    }
}

/// A handy [`std::result::Result`] type alias bounding the [`enum@Error`] struct as `E`.
pub type Result<T, E = Error> = std::result::Result<T, E>;
