use digest::{Digest, FixedOutputReset};
use secrecy::SecretBox;

use crate::algorithm::{Cipher, Hmac};

/// Derived key material for one direction of the transport.
#[derive(Debug, Default)]
pub struct Keys {
    /// Cipher _initialization vector_.
    pub iv: SecretBox<Vec<u8>>,

    /// Cipher _key_.
    pub key: SecretBox<Vec<u8>>,

    /// Hmac _key_.
    pub hmac: SecretBox<Vec<u8>>,
}

impl Keys {
    /// Derive the client-to-server key set, letters `A`, `C` and `E`.
    ///
    /// `secret` is the shared secret `K` in its `mpint` wire
    /// encoding, as it is hashed everywhere else in the exchange.
    pub fn as_client<D: Digest + FixedOutputReset>(
        secret: &[u8],
        hash: &[u8],
        session_id: &[u8],
        cipher: &Cipher,
        hmac: &Hmac,
    ) -> Self {
        Self {
            iv: Self::derive::<D>(secret, hash, b'A', session_id, cipher.iv_size()),
            key: Self::derive::<D>(secret, hash, b'C', session_id, cipher.key_size()),
            hmac: Self::derive::<D>(secret, hash, b'E', session_id, hmac.size()),
        }
    }

    /// Derive the server-to-client key set, letters `B`, `D` and `F`.
    pub fn as_server<D: Digest + FixedOutputReset>(
        secret: &[u8],
        hash: &[u8],
        session_id: &[u8],
        cipher: &Cipher,
        hmac: &Hmac,
    ) -> Self {
        Self {
            iv: Self::derive::<D>(secret, hash, b'B', session_id, cipher.iv_size()),
            key: Self::derive::<D>(secret, hash, b'D', session_id, cipher.key_size()),
            hmac: Self::derive::<D>(secret, hash, b'F', session_id, hmac.size()),
        }
    }

    /// `K1 = HASH(K || H || letter || session_id)`, then extend with
    /// `K_{n+1} = HASH(K || H || K1 || … || K_n)` until `size` bytes
    /// are available, and truncate.
    fn derive<D: Digest + FixedOutputReset>(
        secret: &[u8],
        hash: &[u8],
        kind: u8,
        session_id: &[u8],
        size: usize,
    ) -> SecretBox<Vec<u8>> {
        SecretBox::init_with_mut(|key: &mut Vec<u8>| {
            let mut hasher = D::new()
                .chain_update(secret)
                .chain_update(hash)
                .chain_update([kind])
                .chain_update(session_id);

            key.extend_from_slice(&hasher.finalize_reset());

            while key.len() < size {
                hasher = hasher
                    .chain_update(secret)
                    .chain_update(hash)
                    .chain_update(&*key);

                key.extend_from_slice(&hasher.finalize_reset());
            }

            key.truncate(size);
        })
    }
}
