use sha1::Sha1;
use sha2::{Sha256, Sha384, Sha512};
use strum::{AsRefStr, EnumString};

use crate::{
    session::HostKeyVerifier,
    stream::{Stream, Transport, TransportPair},
    Id, Pipe, Result,
};

use super::Negotiated;

mod dh;
mod ecdh;

/// SSH key-exchange algorithms.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, EnumString, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Kex {
    /// Ephemeral ECDH over NIST P-256 with a sha-2-256 digest.
    #[strum(serialize = "ecdh-sha2-nistp256")]
    EcdhSha2Nistp256,

    /// Ephemeral ECDH over NIST P-384 with a sha-2-384 digest.
    #[strum(serialize = "ecdh-sha2-nistp384")]
    EcdhSha2Nistp384,

    /// Ephemeral ECDH over NIST P-521 with a sha-2-512 digest.
    #[strum(serialize = "ecdh-sha2-nistp521")]
    EcdhSha2Nistp521,

    /// Diffie-Hellman over the 2048-bit MODP group with a sha-2-256 digest.
    #[strum(serialize = "diffie-hellman-group14-sha256")]
    DiffieHellmanGroup14Sha256,

    /// Diffie-Hellman over the 4096-bit MODP group with a sha-2-512 digest.
    #[strum(serialize = "diffie-hellman-group16-sha512")]
    DiffieHellmanGroup16Sha512,

    /// Diffie-Hellman over the 2048-bit MODP group with a sha-1
    /// digest, last-resort legacy.
    #[strum(serialize = "diffie-hellman-group14-sha1")]
    DiffieHellmanGroup14Sha1,
}

impl Kex {
    /// Run the client side of the key exchange over `stream`,
    /// deriving the transport contexts for both directions.
    ///
    /// `i_c` and `i_s` are the raw `SSH_MSG_KEXINIT` payloads
    /// exactly as they traveled, since they are hashed into `H`.
    #[allow(clippy::too_many_arguments)] // The key exchange requires all of these informations
    pub(crate) async fn as_client<S: Pipe>(
        &self,
        stream: &mut Stream<S>,
        v_c: &Id,
        v_s: &Id,
        i_c: &[u8],
        i_s: &[u8],
        negotiated: &Negotiated,
        verifier: Option<&HostKeyVerifier>,
    ) -> Result<TransportPair> {
        let (client_keys, server_keys) = match self {
            Self::EcdhSha2Nistp256 => {
                ecdh::as_client::<p256::NistP256, Sha256, S>(
                    stream, v_c, v_s, i_c, i_s, negotiated, verifier,
                )
                .await?
            }
            Self::EcdhSha2Nistp384 => {
                ecdh::as_client::<p384::NistP384, Sha384, S>(
                    stream, v_c, v_s, i_c, i_s, negotiated, verifier,
                )
                .await?
            }
            Self::EcdhSha2Nistp521 => {
                ecdh::as_client::<p521::NistP521, Sha512, S>(
                    stream, v_c, v_s, i_c, i_s, negotiated, verifier,
                )
                .await?
            }
            Self::DiffieHellmanGroup14Sha256 => {
                dh::as_client::<Sha256, S>(
                    stream, dh::GROUP_14, v_c, v_s, i_c, i_s, negotiated, verifier,
                )
                .await?
            }
            Self::DiffieHellmanGroup16Sha512 => {
                dh::as_client::<Sha512, S>(
                    stream, dh::GROUP_16, v_c, v_s, i_c, i_s, negotiated, verifier,
                )
                .await?
            }
            Self::DiffieHellmanGroup14Sha1 => {
                dh::as_client::<Sha1, S>(
                    stream, dh::GROUP_14, v_c, v_s, i_c, i_s, negotiated, verifier,
                )
                .await?
            }
        };

        Ok(TransportPair {
            rx: Transport::new(
                negotiated.rx_cipher.clone(),
                negotiated.rx_hmac.clone(),
                server_keys,
            ),
            tx: Transport::new(
                negotiated.tx_cipher.clone(),
                negotiated.tx_hmac.clone(),
                client_keys,
            ),
        })
    }
}

/// Assemble the common `V_C || V_S || I_C || I_S || K_S` prefix of
/// the exchange hash.
fn hash_prefix(writer: &mut crate::wire::Writer, v_c: &Id, v_s: &Id, i_c: &[u8], i_s: &[u8], k_s: &[u8]) {
    writer.string(v_c.as_str().as_bytes());
    writer.string(v_s.as_str().as_bytes());
    writer.string(i_c);
    writer.string(i_s);
    writer.string(k_s);
}

/// Check the embedder's host-key verdict before trusting `k_s`.
fn check_host_key(verifier: Option<&HostKeyVerifier>, k_s: &[u8]) -> Result<()> {
    if let Some(verifier) = verifier {
        if !verifier(k_s) {
            return Err(crate::Error::HostKeyRejected);
        }
    }

    Ok(())
}
