use aes_gcm::aead::{AeadCore, AeadInPlace};
use cipher::{
    consts::{U12, U16},
    KeyInit, KeyIvInit, StreamCipher,
};
use strum::{AsRefStr, EnumString};

use crate::{Error, Result};

/// Opaque per-direction cipher state, lazily initialized from the
/// derived key material on first use after a key cutover.
pub type CipherState = Box<dyn std::any::Any + Send + Sync>;

/// The size of the authentication tag trailing AEAD packets.
pub const TAG_SIZE: usize = 16;

/// An AEAD context with its RFC 5647 invocation-counter nonce: the
/// low 8 bytes of the 12-byte IV increment once per packet.
struct Aead<C> {
    cipher: C,
    nonce: [u8; 12],
}

impl<C> Aead<C> {
    fn next_nonce(&mut self) -> aes_gcm::Nonce<U12> {
        let nonce = self.nonce;

        let mut counter =
            u64::from_be_bytes(self.nonce[4..].try_into().expect("nonce is 12 bytes"));
        counter = counter.wrapping_add(1);
        self.nonce[4..].copy_from_slice(&counter.to_be_bytes());

        nonce.into()
    }
}

/// SSH cipher algorithms.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, EnumString, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Cipher {
    /// AES-128 in counter (CTR) mode.
    #[strum(serialize = "aes128-ctr")]
    Aes128Ctr,

    /// AES-256 in counter (CTR) mode.
    #[strum(serialize = "aes256-ctr")]
    Aes256Ctr,

    /// AES-128 in Galois/Counter Mode (GCM).
    #[strum(serialize = "aes128-gcm@openssh.com")]
    Aes128Gcm,

    /// AES-256 in Galois/Counter Mode (GCM).
    #[strum(serialize = "aes256-gcm@openssh.com")]
    Aes256Gcm,

    /// No cipher algorithm, the state before the first `SSH_MSG_NEWKEYS`.
    ///
    /// It is never proposed on the wire.
    #[default]
    None,
}

impl Cipher {
    /// This method is a hack to solve deduplication of the enum
    /// variants and to store the cipher states inside a dynamically
    /// typed `Box<dyn std::any::Any>`.
    fn state<'s, T: KeyIvInit + Send + Sync + 'static>(
        state: &'s mut Option<CipherState>,
        key: &[u8],
        iv: &[u8],
    ) -> Result<&'s mut T> {
        state
            .get_or_insert_with(|| {
                Box::new(T::new_from_slices(key, iv).expect("Key derivation failed horribly"))
            })
            .downcast_mut()
            .ok_or(Error::MalformedPacket)
    }

    fn aead_state<'s, T: KeyInit + Send + Sync + 'static>(
        state: &'s mut Option<CipherState>,
        key: &[u8],
        iv: &[u8],
    ) -> Result<&'s mut Aead<T>> {
        state
            .get_or_insert_with(|| {
                Box::new(Aead {
                    cipher: T::new_from_slice(key).expect("Key derivation failed horribly"),
                    nonce: iv.try_into().expect("Key derivation failed horribly"),
                })
            })
            .downcast_mut()
            .ok_or(Error::MalformedPacket)
    }

    /// Apply the keystream over `buffer`, for the stream-cipher
    /// variants where encryption and decryption are the same.
    pub(crate) fn apply_keystream(
        &self,
        state: &mut Option<CipherState>,
        key: &[u8],
        iv: &[u8],
        buffer: &mut [u8],
    ) -> Result<()> {
        match self {
            Self::Aes128Ctr => Self::state::<ctr::Ctr128BE<aes::Aes128>>(state, key, iv)?
                .try_apply_keystream(buffer)
                .map_err(|_| Error::MalformedPacket),
            Self::Aes256Ctr => Self::state::<ctr::Ctr128BE<aes::Aes256>>(state, key, iv)?
                .try_apply_keystream(buffer)
                .map_err(|_| Error::MalformedPacket),
            Self::None => Ok(()),

            // AEAD variants go through `seal_in_place`/`open_in_place`.
            Self::Aes128Gcm | Self::Aes256Gcm => Err(Error::MalformedPacket),
        }
    }

    /// Encrypt `buffer` in place with `aad` authenticated, returning
    /// the detached tag and advancing the nonce.
    pub(crate) fn seal_in_place(
        &self,
        state: &mut Option<CipherState>,
        key: &[u8],
        iv: &[u8],
        aad: &[u8],
        buffer: &mut [u8],
    ) -> Result<[u8; TAG_SIZE]> {
        fn seal<C>(aead: &mut Aead<C>, aad: &[u8], buffer: &mut [u8]) -> Result<[u8; TAG_SIZE]>
        where
            C: AeadInPlace + AeadCore<NonceSize = U12, TagSize = U16>,
        {
            let nonce = aead.next_nonce();

            aead.cipher
                .encrypt_in_place_detached(&nonce, aad, buffer)
                .map(Into::into)
                .map_err(|_| Error::Mac(digest::MacError))
        }

        match self {
            Self::Aes128Gcm => seal(
                Self::aead_state::<aes_gcm::Aes128Gcm>(state, key, iv)?,
                aad,
                buffer,
            ),
            Self::Aes256Gcm => seal(
                Self::aead_state::<aes_gcm::Aes256Gcm>(state, key, iv)?,
                aad,
                buffer,
            ),
            _ => Err(Error::MalformedPacket),
        }
    }

    /// Decrypt `buffer` in place, verifying `aad` and the detached
    /// `tag`, and advancing the nonce. A forged tag is a
    /// [`Error::Mac`].
    pub(crate) fn open_in_place(
        &self,
        state: &mut Option<CipherState>,
        key: &[u8],
        iv: &[u8],
        aad: &[u8],
        buffer: &mut [u8],
        tag: &[u8],
    ) -> Result<()> {
        fn open<C>(aead: &mut Aead<C>, aad: &[u8], buffer: &mut [u8], tag: &[u8]) -> Result<()>
        where
            C: AeadInPlace + AeadCore<NonceSize = U12, TagSize = U16>,
        {
            let nonce = aead.next_nonce();

            aead.cipher
                .decrypt_in_place_detached(&nonce, aad, buffer, aes_gcm::Tag::from_slice(tag))
                .map_err(|_| Error::Mac(digest::MacError))
        }

        match self {
            Self::Aes128Gcm => open(
                Self::aead_state::<aes_gcm::Aes128Gcm>(state, key, iv)?,
                aad,
                buffer,
                tag,
            ),
            Self::Aes256Gcm => open(
                Self::aead_state::<aes_gcm::Aes256Gcm>(state, key, iv)?,
                aad,
                buffer,
                tag,
            ),
            _ => Err(Error::MalformedPacket),
        }
    }

    /// Whether the cipher authenticates its payload itself,
    /// subsuming the MAC negotiation for its direction.
    pub fn is_aead(&self) -> bool {
        matches!(self, Self::Aes128Gcm | Self::Aes256Gcm)
    }

    pub(crate) fn block_size(&self) -> usize {
        match self {
            Self::None => 8,
            Self::Aes128Ctr | Self::Aes256Ctr | Self::Aes128Gcm | Self::Aes256Gcm => 16,
        }
    }

    pub(crate) fn key_size(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Aes128Ctr | Self::Aes128Gcm => 16,
            Self::Aes256Ctr | Self::Aes256Gcm => 32,
        }
    }

    pub(crate) fn iv_size(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Aes128Ctr | Self::Aes256Ctr => 16,
            Self::Aes128Gcm | Self::Aes256Gcm => 12,
        }
    }
}
