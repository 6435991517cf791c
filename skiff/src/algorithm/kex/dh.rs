use digest::{Digest, FixedOutputReset};
use num_bigint_dig::{BigUint, RandBigInt};

use crate::{
    algorithm::Negotiated,
    msg::trans::{KexDhInit, KexDhReply},
    session::HostKeyVerifier,
    stream::{Keys, Stream},
    wire::Writer,
    Error, Id, Pipe, Result,
};

/// The fixed generator shared by every MODP group.
const GENERATOR: u8 = 2;

/// The RFC 3526 2048-bit MODP group (group 14) prime.
pub(super) const GROUP_14: &[u8] =
    b"FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E088A67CC74\
      020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B302B0A6DF25F1437\
      4FE1356D6D51C245E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED\
      EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3DC2007CB8A163BF05\
      98DA48361C55D39A69163FA8FD24CF5F83655D23DCA3AD961C62F356208552BB\
      9ED529077096966D670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B\
      E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9DE2BCBF695581718\
      3995497CEA956AE515D2261898FA051015728E5A8AACAA68FFFFFFFFFFFFFFFF";

/// The RFC 3526 4096-bit MODP group (group 16) prime.
pub(super) const GROUP_16: &[u8] =
    b"FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E088A67CC74\
      020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B302B0A6DF25F1437\
      4FE1356D6D51C245E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED\
      EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3DC2007CB8A163BF05\
      98DA48361C55D39A69163FA8FD24CF5F83655D23DCA3AD961C62F356208552BB\
      9ED529077096966D670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B\
      E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9DE2BCBF695581718\
      3995497CEA956AE515D2261898FA051015728E5A8AAAC42DAD33170D04507A33\
      A85521ABDF1CBA64ECFB850458DBEF0A8AEA71575D060C7DB3970F85A6E1E4C7\
      ABF5AE8CDB0933D71E8C94E04A25619DCEE3D2261AD2EE6BF12FFA06D98A0864\
      D87602733EC86A64521F2B18177B200CBBE117577A615D6C770988C0BAD946E2\
      08E24FA074E5AB3143DB5BFCE0FD108E4B82D120A92108011A723C12A787E6D7\
      88719A10BDBA5B2699C327186AF4E23C1A946834B6150BDA2583E9CA2AD44CE8\
      DBBBC2DB04DE8EF92E8EFC141FBECAA6287C59474E6BC05D99B2964FA090C3A2\
      233BA186515BE7ED1F612970CEE2D7AFB81BDD762170481CD0069127D5B05AA9\
      93B4EA988D8FDDC186FFB7DC90A6C08F4DF435C934063199FFFFFFFFFFFFFFFF";

/// Parse one of the group primes above, tolerating the indentation
/// whitespace of the literal.
fn prime(group: &[u8]) -> Result<BigUint> {
    let digits = group
        .iter()
        .copied()
        .filter(u8::is_ascii_hexdigit)
        .collect::<Vec<_>>();

    BigUint::parse_bytes(&digits, 16).ok_or(Error::KexFailed)
}

#[allow(clippy::too_many_arguments)] // The key exchange requires all of these informations
pub(super) async fn as_client<H, S>(
    stream: &mut Stream<S>,
    group: &[u8],
    v_c: &Id,
    v_s: &Id,
    i_c: &[u8],
    i_s: &[u8],
    negotiated: &Negotiated,
    verifier: Option<&HostKeyVerifier>,
) -> Result<(Keys, Keys)>
where
    H: Digest + FixedOutputReset,
    S: Pipe,
{
    let p = prime(group)?;
    let g = BigUint::from(GENERATOR);
    let one = BigUint::from(1u8);
    let p_minus_one = p.clone() - &one;

    // x uniform in [2, p - 2], e = g^x mod p.
    let x = rand::thread_rng().gen_biguint_range(&BigUint::from(2u8), &p_minus_one);
    let e = g.modpow(&x, &p);

    stream
        .send(&KexDhInit {
            e: e.to_bytes_be(),
        })
        .await?;

    let reply: KexDhReply = stream.recv().await?.to()?;

    let f = BigUint::from_bytes_be(&reply.f);
    if f <= one || f >= p_minus_one {
        return Err(Error::KexFailed);
    }

    let k = f.modpow(&x, &p);
    let k = {
        let mut writer = Writer::new();
        writer.mpint(&k.to_bytes_be());
        writer.finish()
    };

    let hash = {
        let mut writer = Writer::new();
        super::hash_prefix(&mut writer, v_c, v_s, i_c, i_s, &reply.k_s);
        writer.mpint(&e.to_bytes_be());
        writer.mpint(&reply.f);
        writer.raw(&k);

        H::digest(writer.finish()).to_vec()
    };

    super::check_host_key(verifier, &reply.k_s)?;
    negotiated.host_key.verify(&reply.k_s, &hash, &reply.signature)?;

    let session_id = stream.with_session(&hash);

    Ok((
        Keys::as_client::<H>(
            &k,
            &hash,
            session_id,
            &negotiated.tx_cipher,
            &negotiated.tx_hmac,
        ),
        Keys::as_server::<H>(
            &k,
            &hash,
            session_id,
            &negotiated.rx_cipher,
            &negotiated.rx_hmac,
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_primes_parse_to_their_sizes() {
        assert_eq!(prime(GROUP_14).expect("group 14").bits(), 2048);
        assert_eq!(prime(GROUP_16).expect("group 16").bits(), 4096);
    }

    #[test]
    fn both_sides_agree_on_the_secret() {
        let p = prime(GROUP_14).expect("group 14");
        let g = BigUint::from(GENERATOR);

        let mut rng = rand::thread_rng();
        let x = rng.gen_biguint_range(&BigUint::from(2u8), &(p.clone() - BigUint::from(1u8)));
        let y = rng.gen_biguint_range(&BigUint::from(2u8), &(p.clone() - BigUint::from(1u8)));

        let e = g.modpow(&x, &p);
        let f = g.modpow(&y, &p);

        assert_eq!(f.modpow(&x, &p), e.modpow(&y, &p));
    }
}
