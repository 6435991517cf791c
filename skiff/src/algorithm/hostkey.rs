use rsa::BigUint;
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use signature::Verifier;
use strum::{AsRefStr, EnumString};

use crate::{wire::Reader, Error, Result};

/// SSH host-key signature algorithms.
///
/// The RSA variants share the `ssh-rsa` public-key blob tag; only
/// the signature algorithm name, and the digest underneath, differ.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, EnumString, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum HostKeyAlg {
    /// RSA with a sha-2-512 digest.
    #[strum(serialize = "rsa-sha2-512")]
    RsaSha512,

    /// RSA with a sha-2-256 digest.
    #[strum(serialize = "rsa-sha2-256")]
    RsaSha256,

    /// ECDSA over NIST P-256 with a sha-2-256 digest.
    #[strum(serialize = "ecdsa-sha2-nistp256")]
    EcdsaSha2Nistp256,

    /// ECDSA over NIST P-384 with a sha-2-384 digest.
    #[strum(serialize = "ecdsa-sha2-nistp384")]
    EcdsaSha2Nistp384,

    /// ECDSA over NIST P-521 with a sha-2-512 digest.
    #[strum(serialize = "ecdsa-sha2-nistp521")]
    EcdsaSha2Nistp521,

    /// Ed25519.
    #[strum(serialize = "ssh-ed25519")]
    Ed25519,

    /// RSA with a sha-1 digest, last-resort legacy.
    #[strum(serialize = "ssh-rsa")]
    SshRsa,
}

/// Left-pad a scalar to the fixed width of its field, as ECDSA
/// `mpint` halves may come in shorter than the field size.
fn scalar<const N: usize>(bytes: &[u8]) -> Result<[u8; N]> {
    if bytes.len() > N {
        return Err(Error::MalformedField);
    }

    let mut out = [0u8; N];
    out[N - bytes.len()..].copy_from_slice(bytes);

    Ok(out)
}

impl HostKeyAlg {
    /// The type tag expected at the head of the public-key blob.
    pub fn blob_tag(&self) -> &'static str {
        match self {
            Self::RsaSha512 | Self::RsaSha256 | Self::SshRsa => "ssh-rsa",
            Self::EcdsaSha2Nistp256 => "ecdsa-sha2-nistp256",
            Self::EcdsaSha2Nistp384 => "ecdsa-sha2-nistp384",
            Self::EcdsaSha2Nistp521 => "ecdsa-sha2-nistp521",
            Self::Ed25519 => "ssh-ed25519",
        }
    }

    /// Verify the signature blob over `message` against the
    /// SSH-encoded public-key blob `k_s`.
    ///
    /// The signature blob is `string(algorithm) || string(raw)`; an
    /// algorithm name that does not match `self` is an
    /// [`Error::UnexpectedMessage`], a bad signature an
    /// [`Error::HostKeyVerificationFailed`].
    pub fn verify(&self, k_s: &[u8], message: &[u8], signature: &[u8]) -> Result<()> {
        let mut blob = Reader::new(k_s);
        if blob.utf8()? != self.blob_tag() {
            return Err(Error::UnexpectedMessage);
        }

        let mut signature = Reader::new(signature);
        if signature.utf8()? != self.as_ref() {
            return Err(Error::UnexpectedMessage);
        }
        let raw = signature.string()?;

        match self {
            Self::RsaSha512 => self.verify_rsa::<Sha512>(&mut blob, message, raw),
            Self::RsaSha256 => self.verify_rsa::<Sha256>(&mut blob, message, raw),
            Self::SshRsa => self.verify_rsa::<Sha1>(&mut blob, message, raw),

            Self::EcdsaSha2Nistp256 => {
                let (q, r, s) = Self::ecdsa_parts(&mut blob, raw)?;

                let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(q)?;
                let signature = p256::ecdsa::Signature::from_scalars(
                    p256::FieldBytes::clone_from_slice(&scalar::<32>(r)?),
                    p256::FieldBytes::clone_from_slice(&scalar::<32>(s)?),
                )?;

                Ok(key.verify(message, &signature)?)
            }
            Self::EcdsaSha2Nistp384 => {
                let (q, r, s) = Self::ecdsa_parts(&mut blob, raw)?;

                let key = p384::ecdsa::VerifyingKey::from_sec1_bytes(q)?;
                let signature = p384::ecdsa::Signature::from_scalars(
                    p384::FieldBytes::clone_from_slice(&scalar::<48>(r)?),
                    p384::FieldBytes::clone_from_slice(&scalar::<48>(s)?),
                )?;

                Ok(key.verify(message, &signature)?)
            }
            Self::EcdsaSha2Nistp521 => {
                let (q, r, s) = Self::ecdsa_parts(&mut blob, raw)?;

                let key = p521::ecdsa::VerifyingKey::from_sec1_bytes(q)?;
                let signature = p521::ecdsa::Signature::from_scalars(
                    p521::FieldBytes::clone_from_slice(&scalar::<66>(r)?),
                    p521::FieldBytes::clone_from_slice(&scalar::<66>(s)?),
                )?;

                Ok(key.verify(message, &signature)?)
            }

            Self::Ed25519 => {
                let pk: [u8; 32] = blob.string()?.try_into().map_err(|_| Error::MalformedField)?;

                let key = ed25519_dalek::VerifyingKey::from_bytes(&pk)?;
                let signature = ed25519_dalek::Signature::from_slice(raw)?;

                Ok(key.verify(message, &signature)?)
            }
        }
    }

    fn verify_rsa<D>(&self, blob: &mut Reader<'_>, message: &[u8], raw: &[u8]) -> Result<()>
    where
        D: digest::Digest + const_oid::AssociatedOid,
    {
        let e = BigUint::from_bytes_be(blob.mpint()?);
        let n = BigUint::from_bytes_be(blob.mpint()?);

        let key = rsa::RsaPublicKey::new(n, e).map_err(|_| Error::KexFailed)?;
        let key = rsa::pkcs1v15::VerifyingKey::<D>::new(key);

        let signature = rsa::pkcs1v15::Signature::try_from(raw)?;

        Ok(key.verify(message, &signature)?)
    }

    /// Split an ECDSA blob and signature into the SEC1 point and the
    /// `mpint r || mpint s` halves.
    fn ecdsa_parts<'k>(
        blob: &mut Reader<'k>,
        raw: &'k [u8],
    ) -> Result<(&'k [u8], &'k [u8], &'k [u8])> {
        let _ident = blob.string()?;
        let q = blob.string()?;

        let mut raw = Reader::new(raw);
        let r = raw.mpint()?;
        let s = raw.mpint()?;

        Ok((q, r, s))
    }
}
