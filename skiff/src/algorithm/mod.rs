//! Algorithm implementations for **encryption**, **integrity**,
//! **key-exchange** and **host-key** signature verification.

mod cipher;
pub use cipher::Cipher;
pub(crate) use cipher::{CipherState, TAG_SIZE};

mod compress;
pub use compress::Compress;

mod hmac;
pub use hmac::Hmac;

pub(crate) mod kex;
pub use kex::Kex;

mod hostkey;
pub use hostkey::HostKeyAlg;

use crate::{msg::trans::KexInit, Error, Result};

/// Negotiate one algorithm slot: the first entry of the client's
/// proposal that also appears in the server's, parsed into `T`.
pub(crate) fn negotiate<T: std::str::FromStr>(
    client: &crate::wire::NameList,
    server: &crate::wire::NameList,
    err: fn() -> Error,
) -> Result<T> {
    client
        .preferred_in(server)
        .ok_or_else(err)?
        .parse()
        .map_err(|_| err())
}

/// The complete outcome of algorithm negotiation over a pair of
/// `SSH_MSG_KEXINIT` proposals, from the client's point of view.
#[derive(Debug, Clone)]
pub struct Negotiated {
    /// The agreed key-exchange algorithm.
    pub kex: Kex,

    /// The agreed host-key signature algorithm.
    pub host_key: HostKeyAlg,

    /// The cipher for the client-to-server direction.
    pub tx_cipher: Cipher,

    /// The cipher for the server-to-client direction.
    pub rx_cipher: Cipher,

    /// The MAC for the client-to-server direction.
    pub tx_hmac: Hmac,

    /// The MAC for the server-to-client direction.
    pub rx_hmac: Hmac,
}

impl Negotiated {
    /// Run the RFC 4253 §7.1 negotiation over both proposals.
    ///
    /// An AEAD cipher subsumes the MAC negotiation for its
    /// direction, so the MAC slot collapses to none there.
    pub fn from_kexinits(client: &KexInit, server: &KexInit) -> Result<Self> {
        let kex = negotiate(&client.kex_algorithms, &server.kex_algorithms, || {
            Error::NoCommonKex
        })?;
        let host_key = negotiate(
            &client.server_host_key_algorithms,
            &server.server_host_key_algorithms,
            || Error::NoCommonHostKey,
        )?;

        let tx_cipher: Cipher = negotiate(
            &client.encryption_algorithms_client_to_server,
            &server.encryption_algorithms_client_to_server,
            || Error::NoCommonCipher,
        )?;
        let rx_cipher: Cipher = negotiate(
            &client.encryption_algorithms_server_to_client,
            &server.encryption_algorithms_server_to_client,
            || Error::NoCommonCipher,
        )?;

        let tx_hmac = if tx_cipher.is_aead() {
            Hmac::None
        } else {
            negotiate(
                &client.mac_algorithms_client_to_server,
                &server.mac_algorithms_client_to_server,
                || Error::NoCommonHmac,
            )?
        };
        let rx_hmac = if rx_cipher.is_aead() {
            Hmac::None
        } else {
            negotiate(
                &client.mac_algorithms_server_to_client,
                &server.mac_algorithms_server_to_client,
                || Error::NoCommonHmac,
            )?
        };

        Ok(Self {
            kex,
            host_key,
            tx_cipher,
            rx_cipher,
            tx_hmac,
            rx_hmac,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::wire::NameList;

    fn kexinit(kexs: &[&'static str], ciphers: &[&'static str], macs: &[&'static str]) -> KexInit {
        KexInit {
            cookie: [0; 16],
            kex_algorithms: kexs.iter().copied().collect(),
            server_host_key_algorithms: NameList::from_iter(["ssh-ed25519"]),
            encryption_algorithms_client_to_server: ciphers.iter().copied().collect(),
            encryption_algorithms_server_to_client: ciphers.iter().copied().collect(),
            mac_algorithms_client_to_server: macs.iter().copied().collect(),
            mac_algorithms_server_to_client: macs.iter().copied().collect(),
            compression_algorithms_client_to_server: NameList::from_iter(["none"]),
            compression_algorithms_server_to_client: NameList::from_iter(["none"]),
            languages_client_to_server: Default::default(),
            languages_server_to_client: Default::default(),
            first_kex_packet_follows: false,
        }
    }

    #[test]
    fn the_clients_preference_wins() {
        let client = kexinit(
            &["ecdh-sha2-nistp256", "diffie-hellman-group14-sha256"],
            &["aes128-ctr", "aes256-ctr"],
            &["hmac-sha2-256", "hmac-sha2-512"],
        );
        let server = kexinit(
            &["diffie-hellman-group14-sha256", "ecdh-sha2-nistp256"],
            &["aes256-ctr", "aes128-ctr"],
            &["hmac-sha2-512", "hmac-sha2-256"],
        );

        let negotiated = Negotiated::from_kexinits(&client, &server).expect("negotiation");

        assert_eq!(negotiated.kex, Kex::EcdhSha2Nistp256);
        assert_eq!(negotiated.tx_cipher, Cipher::Aes128Ctr);
        assert_eq!(negotiated.tx_hmac, Hmac::HmacSha256);
    }

    #[test]
    fn aead_ciphers_subsume_the_mac() {
        let client = kexinit(
            &["ecdh-sha2-nistp256"],
            &["aes128-gcm@openssh.com"],
            &["hmac-sha2-256"],
        );
        let server = kexinit(
            &["ecdh-sha2-nistp256"],
            &["aes128-gcm@openssh.com"],
            &["hmac-sha2-512"], // No common MAC, which must not matter.
        );

        let negotiated = Negotiated::from_kexinits(&client, &server).expect("negotiation");

        assert_eq!(negotiated.tx_cipher, Cipher::Aes128Gcm);
        assert_eq!(negotiated.tx_hmac, Hmac::None);
    }

    #[test]
    fn disjoint_proposals_fail() {
        let client = kexinit(&["ecdh-sha2-nistp384"], &["aes128-ctr"], &["hmac-sha2-256"]);
        let server = kexinit(
            &["diffie-hellman-group14-sha1"],
            &["aes128-ctr"],
            &["hmac-sha2-256"],
        );

        assert!(matches!(
            Negotiated::from_kexinits(&client, &server),
            Err(Error::NoCommonKex)
        ));
    }
}
