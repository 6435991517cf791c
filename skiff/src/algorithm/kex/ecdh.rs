use digest::{Digest, FixedOutputReset};
use elliptic_curve::{
    ecdh::EphemeralSecret,
    sec1::{FromEncodedPoint, ModulusSize, ToEncodedPoint},
    AffinePoint, CurveArithmetic, FieldBytesSize, PublicKey,
};
use rand::rngs::OsRng;

use crate::{
    algorithm::Negotiated,
    msg::trans::{KexEcdhInit, KexEcdhReply},
    session::HostKeyVerifier,
    stream::{Keys, Stream},
    wire::Writer,
    Error, Id, Pipe, Result,
};

#[allow(clippy::too_many_arguments)] // The key exchange requires all of these informations
pub(super) async fn as_client<C, H, S>(
    stream: &mut Stream<S>,
    v_c: &Id,
    v_s: &Id,
    i_c: &[u8],
    i_s: &[u8],
    negotiated: &Negotiated,
    verifier: Option<&HostKeyVerifier>,
) -> Result<(Keys, Keys)>
where
    C: CurveArithmetic,
    FieldBytesSize<C>: ModulusSize,
    AffinePoint<C>: FromEncodedPoint<C> + ToEncodedPoint<C>,
    H: Digest + FixedOutputReset,
    S: Pipe,
{
    let secret = EphemeralSecret::<C>::random(&mut OsRng);
    let q_c = secret.public_key().to_encoded_point(false);

    stream
        .send(&KexEcdhInit {
            q_c: q_c.as_bytes().to_vec(),
        })
        .await?;

    let reply: KexEcdhReply = stream.recv().await?.to()?;

    let q_s = PublicKey::<C>::from_sec1_bytes(&reply.q_s).map_err(|_| Error::KexFailed)?;
    let shared = secret.diffie_hellman(&q_s);

    // The shared secret is the X coordinate, hashed as an mpint.
    let k = {
        let mut writer = Writer::new();
        writer.mpint(shared.raw_secret_bytes());
        writer.finish()
    };

    let hash = {
        let mut writer = Writer::new();
        super::hash_prefix(&mut writer, v_c, v_s, i_c, i_s, &reply.k_s);
        writer.string(q_c.as_bytes());
        writer.string(&reply.q_s);
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
