//! A scripted SSH server speaking over a real socket, assembled from
//! the crate's own wire primitives so both sides of the protocol are
//! exercised against each other.

#![allow(clippy::unwrap_used)]

use std::net::SocketAddr;

use async_std::net::{TcpListener, TcpStream};
use digest::{Digest, FixedOutputReset};
use futures::{io::BufReader, AsyncWriteExt};
use num_bigint_dig::{BigUint, RandBigInt};
use sha1::Sha1;
use sha2::Sha256;
use signature::Signer;

use skiff::{
    algorithm::{Cipher, Hmac},
    msg::{self, connect, trans, userauth},
    stream::{Keys, Packet, Stream, Transport, TransportPair},
    wire::{NameList, Writer},
    Id, Result,
};

/// The RFC 3526 2048-bit MODP prime, test-side copy.
const GROUP_14: &str = "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E088A67CC74\
020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B302B0A6DF25F1437\
4FE1356D6D51C245E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED\
EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3DC2007CB8A163BF05\
98DA48361C55D39A69163FA8FD24CF5F83655D23DCA3AD961C62F356208552BB\
9ED529077096966D670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B\
E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9DE2BCBF695581718\
3995497CEA956AE515D2261898FA051015728E5A8AACAA68FFFFFFFFFFFFFFFF";

const KEXINIT: u8 = <trans::KexInit as msg::Packet>::NUMBER;
const NEWKEYS: u8 = <trans::NewKeys as msg::Packet>::NUMBER;
const KEX_INIT_30: u8 = <trans::KexDhInit as msg::Packet>::NUMBER;
const SERVICE_REQUEST: u8 = <trans::ServiceRequest as msg::Packet>::NUMBER;
const USERAUTH_REQUEST: u8 = <userauth::Request as msg::Packet>::NUMBER;
const CHANNEL_OPEN: u8 = <connect::ChannelOpen as msg::Packet>::NUMBER;
const CHANNEL_REQUEST: u8 = <connect::ChannelRequest as msg::Packet>::NUMBER;
const CHANNEL_DATA: u8 = <connect::ChannelData as msg::Packet>::NUMBER;

/// The kex algorithms the scripted server can run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ServerKex {
    Group14Sha256,
    Group14Sha1,
    EcdhNistp256,
}

impl ServerKex {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Group14Sha256 => "diffie-hellman-group14-sha256",
            Self::Group14Sha1 => "diffie-hellman-group14-sha1",
            Self::EcdhNistp256 => "ecdh-sha2-nistp256",
        }
    }

    /// The size of the exchange hash, which the first one also makes
    /// the session identifier.
    pub fn hash_size(&self) -> usize {
        match self {
            Self::Group14Sha256 | Self::EcdhNistp256 => 32,
            Self::Group14Sha1 => 20,
        }
    }
}

/// The server side of one scripted connection.
pub struct ServerSession {
    pub stream: Stream<BufReader<TcpStream>>,
    pub session_id: Vec<u8>,

    kex: ServerKex,
    cipher: Cipher,
    hmac: Hmac,

    host_key: ed25519_dalek::SigningKey,
    client_id: Id,
    server_id: Id,
}

/// Bind a listener and hand its first connection to `serve`,
/// returning the address and the server task's handle.
pub async fn spawn<F, Fut>(
    serve: F,
) -> Result<(SocketAddr, async_std::task::JoinHandle<Result<()>>)>
where
    F: FnOnce(TcpStream) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<()>> + Send,
{
    let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
    let addr = listener.local_addr()?;

    let handle = async_std::task::spawn(async move {
        let (socket, _) = listener.accept().await?;

        serve(socket).await
    });

    Ok((addr, handle))
}

impl ServerSession {
    /// Exchange identifications and run the initial key exchange.
    pub async fn handshake(
        socket: TcpStream,
        kex: ServerKex,
        cipher: Cipher,
        hmac: Hmac,
    ) -> Result<Self> {
        let mut io = BufReader::new(socket);

        let server_id = Id::v2("scripted_0.0.1", None);
        server_id.to_async_writer(&mut io).await?;
        io.flush().await?;

        let client_id = Id::from_async_reader(&mut io).await?;

        let stream = Stream::new(
            io,
            std::time::Duration::from_secs(10),
            usize::MAX,
            u32::MAX,
        );

        let mut session = Self {
            stream,
            session_id: Vec::new(),
            kex,
            cipher,
            hmac,
            host_key: ed25519_dalek::SigningKey::from_bytes(&[7u8; 32]),
            client_id,
            server_id,
        };

        session.kex(None).await?;

        Ok(session)
    }

    fn kexinit(&self) -> trans::KexInit {
        trans::KexInit {
            cookie: [0x5c; 16],
            kex_algorithms: NameList::from_iter([self.kex.name()]),
            server_host_key_algorithms: NameList::from_iter(["ssh-ed25519"]),
            encryption_algorithms_client_to_server: NameList::from_iter([self.cipher.as_ref()]),
            encryption_algorithms_server_to_client: NameList::from_iter([self.cipher.as_ref()]),
            mac_algorithms_client_to_server: NameList::from_iter([mac_name(&self.hmac)]),
            mac_algorithms_server_to_client: NameList::from_iter([mac_name(&self.hmac)]),
            compression_algorithms_client_to_server: NameList::from_iter(["none"]),
            compression_algorithms_server_to_client: NameList::from_iter(["none"]),
            languages_client_to_server: Default::default(),
            languages_server_to_client: Default::default(),
            first_kex_packet_follows: false,
        }
    }

    /// The server's half of a (re-)keying: proposal exchange, one
    /// kex round, `newkeys` cutover.
    pub async fn kex(&mut self, client_kexinit: Option<Packet>) -> Result<()> {
        let kexinit = self.kexinit();
        let i_s = msg::Packet::to_payload(&kexinit);
        self.stream.send(&kexinit).await?;

        let client_packet = match client_kexinit {
            Some(packet) => packet,
            None => self.stream.recv_expected(KEXINIT).await?,
        };
        let i_c = client_packet.payload.clone();

        let host_blob = {
            let mut writer = Writer::new();
            writer.string(b"ssh-ed25519");
            writer.string(&self.host_key.verifying_key().to_bytes());
            writer.finish()
        };

        let (k, hash) = match self.kex {
            ServerKex::Group14Sha256 => {
                self.dh_round::<Sha256>(&i_c, &i_s, &host_blob).await?
            }
            ServerKex::Group14Sha1 => self.dh_round::<Sha1>(&i_c, &i_s, &host_blob).await?,
            ServerKex::EcdhNistp256 => {
                self.ecdh_round::<Sha256>(&i_c, &i_s, &host_blob).await?
            }
        };

        self.stream.send(&trans::NewKeys).await?;
        self.stream.recv_expected(NEWKEYS).await?;

        if self.session_id.is_empty() {
            self.session_id = hash.clone();
        }
        self.stream.with_session(&self.session_id);

        let transport = match self.kex {
            ServerKex::Group14Sha1 => self.transport::<Sha1>(&k, &hash),
            _ => self.transport::<Sha256>(&k, &hash),
        };
        self.stream.with_transport(transport);

        Ok(())
    }

    fn transport<D: Digest + FixedOutputReset>(&self, k: &[u8], hash: &[u8]) -> TransportPair {
        // The server transmits with the B/D/F letters and reads with
        // the client's A/C/E set.
        TransportPair {
            tx: Transport::new(
                self.cipher.clone(),
                self.hmac.clone(),
                Keys::as_server::<D>(k, hash, &self.session_id, &self.cipher, &self.hmac),
            ),
            rx: Transport::new(
                self.cipher.clone(),
                self.hmac.clone(),
                Keys::as_client::<D>(k, hash, &self.session_id, &self.cipher, &self.hmac),
            ),
        }
    }

    async fn dh_round<D: Digest>(
        &mut self,
        i_c: &[u8],
        i_s: &[u8],
        host_blob: &[u8],
    ) -> Result<(Vec<u8>, Vec<u8>)> {
        let init: trans::KexDhInit = self.stream.recv_expected(KEX_INIT_30).await?.to()?;

        let p = BigUint::parse_bytes(GROUP_14.as_bytes(), 16).unwrap();
        let g = BigUint::from(2u8);

        let y = rand::thread_rng()
            .gen_biguint_range(&BigUint::from(2u8), &(p.clone() - BigUint::from(1u8)));
        let f = g.modpow(&y, &p);

        let e = BigUint::from_bytes_be(&init.e);
        let secret = e.modpow(&y, &p);

        let k = {
            let mut writer = Writer::new();
            writer.mpint(&secret.to_bytes_be());
            writer.finish()
        };

        let hash = {
            let mut writer = Writer::new();
            writer.string(self.client_id.as_str().as_bytes());
            writer.string(self.server_id.as_str().as_bytes());
            writer.string(i_c);
            writer.string(i_s);
            writer.string(host_blob);
            writer.mpint(&init.e);
            writer.mpint(&f.to_bytes_be());
            writer.raw(&k);

            D::digest(writer.finish()).to_vec()
        };

        let signature = {
            let mut writer = Writer::new();
            writer.string(b"ssh-ed25519");
            writer.string(&self.host_key.sign(&hash).to_bytes());
            writer.finish()
        };

        self.stream
            .send(&trans::KexDhReply {
                k_s: host_blob.to_vec(),
                f: f.to_bytes_be(),
                signature,
            })
            .await?;

        Ok((k, hash))
    }

    async fn ecdh_round<D: Digest>(
        &mut self,
        i_c: &[u8],
        i_s: &[u8],
        host_blob: &[u8],
    ) -> Result<(Vec<u8>, Vec<u8>)> {
        let init: trans::KexEcdhInit = self.stream.recv_expected(KEX_INIT_30).await?.to()?;

        let secret = p256::ecdh::EphemeralSecret::random(&mut rand::rngs::OsRng);
        let q_s = p256::EncodedPoint::from(secret.public_key());

        let q_c =
            p256::PublicKey::from_sec1_bytes(&init.q_c).map_err(|_| skiff::Error::KexFailed)?;
        let shared = secret.diffie_hellman(&q_c);

        let k = {
            let mut writer = Writer::new();
            writer.mpint(shared.raw_secret_bytes());
            writer.finish()
        };

        let hash = {
            let mut writer = Writer::new();
            writer.string(self.client_id.as_str().as_bytes());
            writer.string(self.server_id.as_str().as_bytes());
            writer.string(i_c);
            writer.string(i_s);
            writer.string(host_blob);
            writer.string(&init.q_c);
            writer.string(q_s.as_bytes());
            writer.raw(&k);

            D::digest(writer.finish()).to_vec()
        };

        let signature = {
            let mut writer = Writer::new();
            writer.string(b"ssh-ed25519");
            writer.string(&self.host_key.sign(&hash).to_bytes());
            writer.finish()
        };

        self.stream
            .send(&trans::KexEcdhReply {
                k_s: host_blob.to_vec(),
                q_s: q_s.as_bytes().to_vec(),
                signature,
            })
            .await?;

        Ok((k, hash))
    }

    // Post-handshake scripting helpers.

    /// Accept the next `SSH_MSG_SERVICE_REQUEST`.
    pub async fn accept_service(&mut self, name: &str) -> Result<()> {
        let request: trans::ServiceRequest =
            self.stream.recv_expected(SERVICE_REQUEST).await?.to()?;
        assert_eq!(request.service_name, name);

        self.stream
            .send(&trans::ServiceAccept {
                service_name: request.service_name,
            })
            .await
    }

    /// Receive the next `SSH_MSG_USERAUTH_REQUEST`.
    pub async fn recv_userauth(&mut self) -> Result<userauth::Request> {
        self.stream.recv_expected(USERAUTH_REQUEST).await?.to()
    }

    pub async fn send_auth_failure(&mut self, methods: &[&'static str]) -> Result<()> {
        self.stream
            .send(&userauth::Failure {
                continue_with: NameList::from_iter(methods.iter().copied()),
                partial_success: false,
            })
            .await
    }

    pub async fn send_auth_success(&mut self) -> Result<()> {
        self.stream.send(&userauth::Success).await
    }

    pub async fn send_pk_ok(&mut self, algorithm: &str, blob: Vec<u8>) -> Result<()> {
        self.stream
            .send(&userauth::PkOk {
                algorithm: algorithm.into(),
                blob,
            })
            .await
    }

    /// Accept the next `session` channel open with the window and
    /// packet limits this server enforces.
    pub async fn accept_channel(&mut self, window: u32, max_packet: u32) -> Result<u32> {
        let open: connect::ChannelOpen = self.stream.recv_expected(CHANNEL_OPEN).await?.to()?;
        assert_eq!(open.channel_type, "session");

        self.stream
            .send(&connect::ChannelOpenConfirmation {
                recipient_channel: open.sender_channel,
                sender_channel: 7,
                initial_window_size: window,
                maximum_packet_size: max_packet,
            })
            .await?;

        Ok(open.sender_channel)
    }

    /// Answer the next subsystem request with success or failure.
    pub async fn answer_subsystem(&mut self, client_channel: u32, accept: bool) -> Result<()> {
        let request: connect::ChannelRequest =
            self.stream.recv_expected(CHANNEL_REQUEST).await?.to()?;
        assert_eq!(request.request_type, "subsystem");
        assert!(request.want_reply);

        if accept {
            self.stream
                .send(&connect::ChannelSuccess {
                    recipient_channel: client_channel,
                })
                .await
        } else {
            self.stream
                .send(&connect::ChannelFailure {
                    recipient_channel: client_channel,
                })
                .await
        }
    }

    /// Receive one `SSH_MSG_CHANNEL_DATA` payload.
    pub async fn recv_channel_data(&mut self) -> Result<Vec<u8>> {
        let data: connect::ChannelData = self.stream.recv_expected(CHANNEL_DATA).await?.to()?;

        Ok(data.data)
    }

    pub async fn adjust_window(&mut self, client_channel: u32, bytes: u32) -> Result<()> {
        self.stream
            .send(&connect::ChannelWindowAdjust {
                recipient_channel: client_channel,
                bytes_to_add: bytes,
            })
            .await
    }
}

/// The MAC entry the server advertises; AEAD ciphers do not consult
/// it, but the name-list may not be empty.
fn mac_name(hmac: &Hmac) -> &str {
    match hmac {
        Hmac::None => "hmac-sha2-256",
        other => other.as_ref(),
    }
}
