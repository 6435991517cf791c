//! Client-side session configuration.

use std::{sync::Arc, time::Duration};

use rand::RngCore;

use crate::{
    algorithm::{Cipher, Compress, Hmac, HostKeyAlg, Kex},
    msg::trans::KexInit,
    wire::NameList,
    Id,
};

/// The embedder's host-key verdict callback, invoked with the raw
/// SSH-encoded host-key blob before the exchange hash is trusted.
pub type HostKeyVerifier = dyn Fn(&[u8]) -> bool + Send + Sync;

/// A _client_-side session configuration.
#[derive(Clone)]
pub struct Config {
    /// [`Id`] for this _client_ session.
    pub id: Id,

    /// Timeout for sending and receiving packets.
    pub timeout: Duration,

    /// The algorithms enabled for this _client_ session.
    pub algorithms: Algorithms,

    /// Re-key once this many bytes traveled under the same keys.
    pub rekey_after_bytes: usize,

    /// Re-key once this many packets traveled under the same keys.
    pub rekey_after_packets: u32,

    /// The embedder's host-key verdict; every key is trusted when
    /// left unset.
    pub host_key_verifier: Option<Arc<HostKeyVerifier>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            id: Id::v2(
                concat!(
                    env!("CARGO_PKG_NAME"),
                    "@client:",
                    env!("CARGO_PKG_VERSION")
                ),
                None,
            ),
            timeout: Duration::from_secs(120),
            algorithms: Default::default(),
            rekey_after_bytes: 0x4000_0000, // 1GiB, as recommended per the RFC.
            rekey_after_packets: 1 << 31,
            host_key_verifier: None,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("id", &self.id)
            .field("timeout", &self.timeout)
            .field("algorithms", &self.algorithms)
            .field("rekey_after_bytes", &self.rekey_after_bytes)
            .field("rekey_after_packets", &self.rekey_after_packets)
            .finish_non_exhaustive()
    }
}

/// Algorithms for a _client_-side session, in proposal order.
#[derive(Debug, Clone)]
pub struct Algorithms {
    /// Enabled algorithms for _key-exchange_.
    pub kexs: Vec<Kex>,

    /// Enabled algorithms for _server key signature_.
    pub keys: Vec<HostKeyAlg>,

    /// Enabled algorithms for _encryption & decryption_.
    pub ciphers: Vec<Cipher>,

    /// Enabled algorithms for _hmac_.
    pub macs: Vec<Hmac>,

    /// Enabled algorithms for _compression_.
    pub compressions: Vec<Compress>,
}

impl Default for Algorithms {
    fn default() -> Self {
        Self {
            kexs: vec![
                Kex::EcdhSha2Nistp256,
                Kex::EcdhSha2Nistp384,
                Kex::EcdhSha2Nistp521,
                Kex::DiffieHellmanGroup14Sha256,
                Kex::DiffieHellmanGroup16Sha512,
                Kex::DiffieHellmanGroup14Sha1,
            ],
            keys: vec![
                HostKeyAlg::RsaSha512,
                HostKeyAlg::RsaSha256,
                HostKeyAlg::EcdsaSha2Nistp256,
                HostKeyAlg::EcdsaSha2Nistp384,
                HostKeyAlg::EcdsaSha2Nistp521,
                HostKeyAlg::Ed25519,
                HostKeyAlg::SshRsa,
            ],
            ciphers: vec![
                Cipher::Aes128Ctr,
                Cipher::Aes256Ctr,
                Cipher::Aes128Gcm,
                Cipher::Aes256Gcm,
            ],
            macs: vec![
                Hmac::HmacSha256,
                Hmac::HmacSha512,
                Hmac::HmacSha256ETM,
                Hmac::HmacSha512ETM,
            ],
            compressions: vec![Compress::None],
        }
    }
}

impl Config {
    /// Build our `SSH_MSG_KEXINIT` proposal, with a fresh cookie.
    pub(crate) fn kexinit(&self) -> KexInit {
        fn name_list<T: AsRef<str>>(items: &[T]) -> NameList {
            items.iter().map(|item| item.as_ref()).collect()
        }

        let mut cookie = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut cookie);

        KexInit {
            cookie,
            kex_algorithms: name_list(&self.algorithms.kexs),
            server_host_key_algorithms: name_list(&self.algorithms.keys),
            encryption_algorithms_client_to_server: name_list(&self.algorithms.ciphers),
            encryption_algorithms_server_to_client: name_list(&self.algorithms.ciphers),
            mac_algorithms_client_to_server: name_list(&self.algorithms.macs),
            mac_algorithms_server_to_client: name_list(&self.algorithms.macs),
            compression_algorithms_client_to_server: name_list(&self.algorithms.compressions),
            compression_algorithms_server_to_client: name_list(&self.algorithms.compressions),
            languages_client_to_server: Default::default(),
            languages_server_to_client: Default::default(),
            first_kex_packet_follows: false,
        }
    }
}
