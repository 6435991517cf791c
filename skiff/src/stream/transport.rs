use rand::Rng;
use secrecy::ExposeSecret;

use crate::{
    algorithm::{self, Cipher, CipherState, Hmac},
    Error, Result,
};

use super::Keys;

/// The pair of directed transport contexts, `tx` being
/// client-to-server on a client session.
#[derive(Debug, Default)]
pub struct TransportPair {
    /// The sealing direction.
    pub tx: Transport,

    /// The opening direction.
    pub rx: Transport,
}

/// One direction of the packet pipeline: the negotiated cipher and
/// MAC with their derived key material and running cipher state.
#[derive(Default)]
pub struct Transport {
    /// The negotiated cipher.
    pub cipher: Cipher,

    /// The negotiated MAC, [`Hmac::None`] under an AEAD cipher.
    pub hmac: Hmac,

    /// The derived key material.
    pub keys: Keys,

    pub(crate) state: Option<CipherState>,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("cipher", &self.cipher)
            .field("hmac", &self.hmac)
            .finish_non_exhaustive()
    }
}

impl Transport {
    /// Assemble a direction from its negotiated algorithms and
    /// derived key material.
    pub fn new(cipher: Cipher, hmac: Hmac, keys: Keys) -> Self {
        Self {
            cipher,
            hmac,
            keys,
            state: None,
        }
    }

    /// The cipher block size this direction aligns packets to.
    pub fn block_size(&self) -> usize {
        self.cipher.block_size()
    }

    /// The size of the integrity trailer, MAC or AEAD tag.
    pub fn mac_size(&self) -> usize {
        if self.cipher.is_aead() {
            algorithm::TAG_SIZE
        } else {
            self.hmac.size()
        }
    }

    /// Whether the `packet_length` field travels in the clear,
    /// outside the ciphertext.
    fn length_in_clear(&self) -> bool {
        self.cipher.is_aead() || self.hmac.etm()
    }

    /// RFC 4253 §6 padding: align `padding_length || payload ||
    /// padding` (plus the length field when it is encrypted) to the
    /// block size, with at least 4 bytes of padding and a total
    /// packet of at least 16 bytes.
    fn padding(&self, payload: usize) -> u8 {
        const MIN_PAD_SIZE: usize = 4;
        const MIN_ALIGN: usize = 8;
        const MIN_PACKET_SIZE: usize = 16;

        let align = self.block_size().max(MIN_ALIGN);

        let size = if self.length_in_clear() {
            std::mem::size_of::<u8>() + payload
        } else {
            std::mem::size_of::<u32>() + std::mem::size_of::<u8>() + payload
        };
        let padding = align - size % align;

        let padding = if padding < MIN_PAD_SIZE {
            padding + align
        } else {
            padding
        };

        if size + padding < self.block_size().max(MIN_PACKET_SIZE) {
            (padding + align) as u8
        } else {
            padding as u8
        }
    }

    /// Frame, pad, encrypt and authenticate `payload` into its
    /// on-the-wire bytes, under sequence number `seq`.
    pub fn seal(&mut self, payload: &[u8], seq: u32) -> Result<Vec<u8>> {
        let mut rng = rand::thread_rng();

        let padding = self.padding(payload.len()) as usize;

        // padding_length || payload || random padding
        let mut body = Vec::with_capacity(1 + payload.len() + padding);
        body.push(padding as u8);
        body.extend_from_slice(payload);
        body.resize_with(body.len() + padding, || rng.gen());

        if self.cipher.is_aead() {
            let length = (body.len() as u32).to_be_bytes();

            let tag = self.cipher.seal_in_place(
                &mut self.state,
                self.keys.key.expose_secret(),
                self.keys.iv.expose_secret(),
                &length,
                &mut body,
            )?;

            let mut wire = Vec::with_capacity(4 + body.len() + tag.len());
            wire.extend_from_slice(&length);
            wire.extend_from_slice(&body);
            wire.extend_from_slice(&tag);

            Ok(wire)
        } else if self.hmac.etm() {
            let length = (body.len() as u32).to_be_bytes();

            self.cipher.apply_keystream(
                &mut self.state,
                self.keys.key.expose_secret(),
                self.keys.iv.expose_secret(),
                &mut body,
            )?;

            let mut wire = Vec::with_capacity(4 + body.len() + self.mac_size());
            wire.extend_from_slice(&length);
            wire.extend_from_slice(&body);

            let mac = self.hmac.sign(seq, &wire, self.keys.hmac.expose_secret());
            wire.extend_from_slice(&mac);

            Ok(wire)
        } else {
            let mut wire = Vec::with_capacity(4 + body.len() + self.mac_size());
            wire.extend_from_slice(&(body.len() as u32).to_be_bytes());
            wire.extend_from_slice(&body);

            // MAC over the plaintext packet, before encryption.
            let mac = self.hmac.sign(seq, &wire, self.keys.hmac.expose_secret());

            if self.cipher != Cipher::None {
                self.cipher.apply_keystream(
                    &mut self.state,
                    self.keys.key.expose_secret(),
                    self.keys.iv.expose_secret(),
                    &mut wire,
                )?;
            }

            wire.extend_from_slice(&mac);

            Ok(wire)
        }
    }

    pub(crate) fn decrypt(&mut self, buffer: &mut [u8]) -> Result<()> {
        if self.cipher != Cipher::None {
            self.cipher.apply_keystream(
                &mut self.state,
                self.keys.key.expose_secret(),
                self.keys.iv.expose_secret(),
                buffer,
            )?;
        }

        Ok(())
    }

    pub(crate) fn verify(&self, buffer: &[u8], mac: &[u8], seq: u32) -> Result<()> {
        if self.hmac.size() > 0 {
            self.hmac
                .verify(seq, buffer, self.keys.hmac.expose_secret(), mac)?;
        }

        Ok(())
    }

    pub(crate) fn open_aead(&mut self, aad: &[u8], buffer: &mut [u8], tag: &[u8]) -> Result<()> {
        self.cipher.open_in_place(
            &mut self.state,
            self.keys.key.expose_secret(),
            self.keys.iv.expose_secret(),
            aad,
            buffer,
            tag,
        )
    }

    /// Strip the padding frame off a decrypted packet body,
    /// returning the payload.
    pub(crate) fn unpad(body: Vec<u8>) -> Result<Vec<u8>> {
        let Some(&padding) = body.first() else {
            return Err(Error::MalformedPacket);
        };
        let padding = padding as usize;

        if padding < 4 || padding + 1 >= body.len() {
            return Err(Error::BadPadding);
        }

        let mut payload = body;
        payload.truncate(payload.len() - padding);
        payload.remove(0);

        Ok(payload)
    }
}
