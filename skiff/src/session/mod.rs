//! Session and transport handling mechanics.

use futures::{io::BufReader, AsyncRead, AsyncWrite, AsyncWriteExt};
use futures_time::future::FutureExt as _;

use crate::{
    algorithm::Negotiated,
    msg::{self, trans},
    stream::{Packet, Stream},
    DisconnectedBy, DisconnectedError, Error, Id, Result,
};

mod config;
pub use config::{Algorithms, Config, HostKeyVerifier};

const DISCONNECT: u8 = <trans::Disconnect as msg::Packet>::NUMBER;
const IGNORE: u8 = <trans::Ignore as msg::Packet>::NUMBER;
const UNIMPLEMENTED: u8 = <trans::Unimplemented as msg::Packet>::NUMBER;
const DEBUG: u8 = <trans::Debug as msg::Packet>::NUMBER;
const SERVICE_ACCEPT: u8 = <trans::ServiceAccept as msg::Packet>::NUMBER;
const KEXINIT: u8 = <trans::KexInit as msg::Packet>::NUMBER;
const NEWKEYS: u8 = <trans::NewKeys as msg::Packet>::NUMBER;

/// A client session wrapping an [`AsyncRead`] + [`AsyncWrite`]
/// stream to drive the version exchange, **key exchange** and
/// **[`SSH-TRANS`]** messages.
///
/// [`SSH-TRANS`]: https://datatracker.ietf.org/doc/html/rfc4253
pub struct Session<IO> {
    stream: Option<Stream<BufReader<IO>>>,
    config: Config,

    peer_id: Id,
}

impl<IO> Session<IO>
where
    IO: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Create a new [`Session`] from a [`AsyncRead`] + [`AsyncWrite`]
    /// stream and some configuration, exchanging identifications and
    /// running the initial key exchange before returning.
    pub async fn new(stream: IO, config: Config) -> Result<Self> {
        let mut stream = BufReader::new(stream);

        config.id.to_async_writer(&mut stream).await?;
        stream.flush().await?;

        let peer_id = Id::from_async_reader(&mut stream)
            .timeout(futures_time::time::Duration::from(config.timeout))
            .await
            .map_err(|_| Error::Timeout)??;

        tracing::debug!("Session started with peer `{peer_id}`");

        let stream = Stream::new(
            stream,
            config.timeout,
            config.rekey_after_bytes,
            config.rekey_after_packets,
        );

        let mut session = Self {
            stream: Some(stream),
            config,
            peer_id,
        };

        // No service traffic before the first key exchange.
        session.rekey(None).await?;

        Ok(session)
    }

    /// Get the [`Id`] of the connected peer.
    pub fn peer_id(&self) -> &Id {
        &self.peer_id
    }

    /// The immutable session identifier, the exchange hash of the
    /// first key exchange.
    pub fn session_id(&self) -> Option<&[u8]> {
        self.stream.as_ref().and_then(Stream::session_id)
    }

    fn stream(&mut self) -> Result<&mut Stream<BufReader<IO>>> {
        self.stream.as_mut().ok_or(Error::ConnectionLost)
    }

    /// Receive a message from the peer, handling the transport-level
    /// messages transparently: `ignore`/`debug`/`unimplemented` are
    /// logged, a `disconnect` is fatal, and a peer `kexinit` runs a
    /// whole re-keying before the next application message.
    pub async fn recv(&mut self) -> Result<Packet> {
        loop {
            if self.stream()?.is_rekeyable() {
                self.rekey(None).await?;
            }

            let packet = match self.stream()?.recv().await {
                Ok(packet) => packet,
                Err(err) => return Err(self.poison(err).await),
            };

            match packet.number() {
                DISCONNECT => {
                    let disconnect: trans::Disconnect = packet.to()?;
                    drop(self.stream.take());

                    return Err(DisconnectedError {
                        by: DisconnectedBy::Them,
                        reason: disconnect.reason,
                        description: disconnect.description,
                    }
                    .into());
                }
                IGNORE => {
                    tracing::debug!("Received an 'ignore' message");
                }
                DEBUG => {
                    let message: trans::Debug = packet.to()?;

                    tracing::debug!("Received a 'debug' message: {}", message.message);
                }
                UNIMPLEMENTED => {
                    let message: trans::Unimplemented = packet.to()?;

                    tracing::debug!(
                        "Received a 'unimplemented' message about packet #{}",
                        message.seq
                    );
                }
                KEXINIT => {
                    tracing::debug!("Peer initiated a re-keying");

                    self.rekey(Some(packet)).await?;
                }
                // The service, authentication and connection ranges
                // belong to the layers above.
                50..=100 => return Ok(packet),
                number => {
                    tracing::debug!("Answering an unknown ^{number:#x} message");

                    let seq = self.stream()?.last_rxseq();
                    self.send(&trans::Unimplemented { seq }).await?;
                }
            }
        }
    }

    /// Send a message to the peer, re-keying first when the
    /// thresholds have been crossed.
    pub async fn send<T: msg::Packet>(&mut self, message: &T) -> Result<()> {
        if self.stream()?.is_rekeyable() {
            self.rekey(None).await?;
        }

        match self.stream()?.send(message).await {
            Ok(()) => Ok(()),
            Err(err) => Err(self.poison(err).await),
        }
    }

    /// Request a service on the transport, awaiting the accept.
    pub async fn service_request(&mut self, name: &str) -> Result<()> {
        self.send(&trans::ServiceRequest {
            service_name: name.into(),
        })
        .await?;

        let accept: trans::ServiceAccept = match self.stream()?.recv_expected(SERVICE_ACCEPT).await
        {
            Ok(packet) => packet.to()?,
            Err(err) => return Err(self.poison(err).await),
        };

        if accept.service_name != name {
            return Err(self.poison(Error::UnexpectedMessage).await);
        }

        tracing::debug!("Peer accepted the `{name}` service");

        Ok(())
    }

    /// Disconnect the session on our initiative.
    pub async fn disconnect(
        mut self,
        reason: trans::DisconnectReason,
        description: impl Into<String>,
    ) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            stream
                .send(&trans::Disconnect {
                    reason,
                    description: description.into(),
                    language: String::new(),
                })
                .await?;
        }

        Ok(())
    }

    /// Run a key exchange, either self-initiated (`received: None`)
    /// or answering the peer's `SSH_MSG_KEXINIT`.
    ///
    /// The session identifier and both sequence numbers survive
    /// re-keying untouched.
    async fn rekey(&mut self, received: Option<Packet>) -> Result<()> {
        match self.rekey_inner(received).await {
            Ok(()) => Ok(()),
            Err(err) => Err(self.poison(err).await),
        }
    }

    async fn rekey_inner(&mut self, received: Option<Packet>) -> Result<()> {
        let kexinit = self.config.kexinit();
        let i_c = msg::Packet::to_payload(&kexinit);

        let stream = self.stream.as_mut().ok_or(Error::ConnectionLost)?;

        stream.send(&kexinit).await?;

        let server_packet = match received {
            Some(packet) => packet,
            None => stream.recv_expected(KEXINIT).await?,
        };
        let i_s = server_packet.payload.clone();
        let server_kexinit: trans::KexInit = server_packet.to()?;

        let negotiated = Negotiated::from_kexinits(&kexinit, &server_kexinit)?;

        tracing::debug!(
            "Negotiated kex::{}, key::{}, cipher::{}/{}, mac::{}/{}",
            negotiated.kex.as_ref(),
            negotiated.host_key.as_ref(),
            negotiated.tx_cipher.as_ref(),
            negotiated.rx_cipher.as_ref(),
            negotiated.tx_hmac.as_ref(),
            negotiated.rx_hmac.as_ref(),
        );

        let transport = negotiated
            .kex
            .clone()
            .as_client(
                stream,
                &self.config.id,
                &self.peer_id,
                &i_c,
                &i_s,
                &negotiated,
                self.config.host_key_verifier.as_deref(),
            )
            .await?;

        // Outbound keys activate once our `newkeys` is out, inbound
        // ones once the peer's came in; nothing travels in between,
        // so the cutover is done in one step after both.
        stream.send(&trans::NewKeys).await?;
        stream.recv_expected(NEWKEYS).await?.to::<trans::NewKeys>()?;

        stream.with_transport(transport);

        tracing::debug!("Key exchange completed, new keys in effect");

        Ok(())
    }

    fn disconnect_reason(err: &Error) -> trans::DisconnectReason {
        match err {
            Error::Mac(_) => trans::DisconnectReason::MacError,
            Error::KexFailed
            | Error::NoCommonKex
            | Error::NoCommonHostKey
            | Error::NoCommonCipher
            | Error::NoCommonHmac => trans::DisconnectReason::KeyExchangeFailed,
            Error::HostKeyRejected | Error::HostKeyVerificationFailed(_) => {
                trans::DisconnectReason::HostKeyNotVerifiable
            }
            Error::UnsupportedVersion => trans::DisconnectReason::ProtocolVersionNotSupported,
            _ => trans::DisconnectReason::ProtocolError,
        }
    }

    /// Transport errors are fatal: notify the peer with a matching
    /// `disconnect` when the stream still stands, then tear down.
    async fn poison(&mut self, err: Error) -> Error {
        if matches!(err, Error::Disconnected(_)) {
            drop(self.stream.take());

            return err;
        }

        if let Some(mut stream) = self.stream.take() {
            let _ = stream
                .send(&trans::Disconnect {
                    reason: Self::disconnect_reason(&err),
                    description: "transport failure".into(),
                    language: String::new(),
                })
                .await;
        }

        err
    }
}
