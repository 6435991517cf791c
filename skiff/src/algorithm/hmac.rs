use digest::OutputSizeUser;
use sha2::{Sha256, Sha512};
use strum::{AsRefStr, EnumString};

use crate::Result;

/// SSH hmac algorithms.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, EnumString, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Hmac {
    /// HMAC with sha-2-256 digest.
    #[strum(serialize = "hmac-sha2-256")]
    HmacSha256,

    /// HMAC with sha-2-512 digest.
    #[strum(serialize = "hmac-sha2-512")]
    HmacSha512,

    /// HMAC with sha-2-256 digest on encrypted message.
    #[strum(serialize = "hmac-sha2-256-etm@openssh.com")]
    HmacSha256ETM,

    /// HMAC with sha-2-512 digest on encrypted message.
    #[strum(serialize = "hmac-sha2-512-etm@openssh.com")]
    HmacSha512ETM,

    /// No HMAC algorithm, either before the first `SSH_MSG_NEWKEYS`
    /// or because an AEAD cipher authenticates the packet itself.
    #[default]
    None,
}

impl Hmac {
    pub(crate) fn verify(
        &self,
        seq: u32,
        buf: &[u8],
        key: &[u8],
        mac: &[u8],
    ) -> Result<(), digest::MacError> {
        fn verify<D: digest::Mac + digest::KeyInit>(
            seq: u32,
            buf: &[u8],
            key: &[u8],
            mac: &[u8],
        ) -> Result<(), digest::MacError> {
            <D as digest::Mac>::new_from_slice(key)
                .expect("Key derivation failed horribly")
                .chain_update(seq.to_be_bytes())
                .chain_update(buf)
                .verify_slice(mac)
        }

        match self {
            Self::HmacSha256 | Self::HmacSha256ETM => {
                verify::<hmac::Hmac<Sha256>>(seq, buf, key, mac)
            }
            Self::HmacSha512 | Self::HmacSha512ETM => {
                verify::<hmac::Hmac<Sha512>>(seq, buf, key, mac)
            }
            Self::None => Ok(()),
        }
    }

    pub(crate) fn sign(&self, seq: u32, buf: &[u8], key: &[u8]) -> Vec<u8> {
        fn sign<D: digest::Mac + digest::KeyInit>(seq: u32, buf: &[u8], key: &[u8]) -> Vec<u8> {
            <D as digest::Mac>::new_from_slice(key)
                .expect("Key derivation failed horribly")
                .chain_update(seq.to_be_bytes())
                .chain_update(buf)
                .finalize()
                .into_bytes()
                .to_vec()
        }

        match self {
            Self::HmacSha256 | Self::HmacSha256ETM => sign::<hmac::Hmac<Sha256>>(seq, buf, key),
            Self::HmacSha512 | Self::HmacSha512ETM => sign::<hmac::Hmac<Sha512>>(seq, buf, key),
            Self::None => Default::default(),
        }
    }

    pub(crate) fn size(&self) -> usize {
        match self {
            Self::HmacSha256 | Self::HmacSha256ETM => Sha256::output_size(),
            Self::HmacSha512 | Self::HmacSha512ETM => Sha512::output_size(),
            Self::None => 0,
        }
    }

    pub(crate) fn etm(&self) -> bool {
        matches!(self, Self::HmacSha256ETM | Self::HmacSha512ETM)
    }
}
