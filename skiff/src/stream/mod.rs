//! Primitives to exchange binary packets over a [`Pipe`] stream,
//! through the negotiated cipher and MAC pipeline.

use std::collections::VecDeque;

use futures::{AsyncBufReadExt, AsyncWriteExt};
use futures_time::{future::FutureExt as _, time::Duration};

use crate::{
    msg::{self, trans},
    DisconnectedBy, DisconnectedError, Error, Pipe, Result,
};

const DISCONNECT: u8 = <trans::Disconnect as msg::Packet>::NUMBER;
const IGNORE: u8 = <trans::Ignore as msg::Packet>::NUMBER;
const UNIMPLEMENTED: u8 = <trans::Unimplemented as msg::Packet>::NUMBER;
const DEBUG: u8 = <trans::Debug as msg::Packet>::NUMBER;

mod keys;
pub use keys::Keys;

mod transport;
pub use transport::{Transport, TransportPair};

/// Hard upper bound on an inbound `packet_length`, so a corrupted or
/// hostile length field cannot make us buffer without bounds.
pub const MAX_PACKET_LENGTH: usize = 256 * 1024;

/// A decoded binary packet, holding its raw payload.
#[derive(Debug, Clone)]
pub struct Packet {
    /// The packet payload, padding stripped, never empty.
    pub payload: Vec<u8>,
}

impl Packet {
    /// The message number in the first payload byte.
    pub fn number(&self) -> u8 {
        self.payload[0]
    }

    /// Decode the payload as a `T` message.
    pub fn to<T: msg::Packet>(&self) -> Result<T> {
        T::from_payload(&self.payload)
    }
}

/// Progress of the inbound packet parser over the accumulation
/// buffer, kept across calls so a cancelled receive loses nothing.
#[derive(Debug, Clone, Copy)]
enum Gather {
    /// Waiting for enough bytes to learn the packet length.
    Length,

    /// Waiting for the whole packet; `decrypted` bytes of the
    /// accumulation buffer already went through the cipher.
    Body { total: usize, decrypted: usize },
}

/// A wrapper around a [`Pipe`] to interface with the SSH binary protocol.
pub struct Stream<S> {
    inner: S,
    timeout: Duration,

    /// The pair of transport contexts computed from the key exchange.
    transport: TransportPair,

    /// The session identifier derived from the first key exchange.
    session: Option<Vec<u8>>,

    /// Raw inbound bytes not yet parsed into a packet.
    acc: Vec<u8>,
    gather: Gather,

    /// Application packets that arrived while a key exchange was
    /// waiting for its own replies, delivered on the next receive.
    backlog: VecDeque<Packet>,

    /// Sequence number for the `tx` side.
    txseq: u32,

    /// Sequence number for the `rx` side.
    rxseq: u32,

    /// Exchanged bytes and packets since the last key cutover.
    bytes: usize,
    packets: u32,

    rekey_bytes: usize,
    rekey_packets: u32,
}

impl<S> Stream<S>
where
    S: Pipe,
{
    /// Wrap a [`Pipe`], in the clear protocol phase.
    pub fn new(
        stream: S,
        timeout: std::time::Duration,
        rekey_bytes: usize,
        rekey_packets: u32,
    ) -> Self {
        Self {
            inner: stream,
            timeout: timeout.into(),
            transport: Default::default(),
            session: None,
            acc: Vec::new(),
            gather: Gather::Length,
            backlog: VecDeque::new(),
            txseq: 0,
            rxseq: 0,
            bytes: 0,
            packets: 0,
            rekey_bytes,
            rekey_packets,
        }
    }

    /// Whether the re-keying thresholds have been crossed, or no key
    /// exchange happened yet at all.
    pub fn is_rekeyable(&self) -> bool {
        self.session.is_none() || self.bytes > self.rekey_bytes || self.packets > self.rekey_packets
    }

    /// Cut over to freshly derived transport contexts.
    ///
    /// Sequence numbers are left untouched, as they span the whole
    /// connection lifetime.
    pub fn with_transport(&mut self, transport: TransportPair) {
        self.transport = transport;
        self.bytes = 0;
        self.packets = 0;
    }

    /// Store the session identifier on the first key exchange, and
    /// return the (unchanged) identifier on any later one.
    pub fn with_session(&mut self, session: &[u8]) -> &[u8] {
        self.session.get_or_insert_with(|| session.to_vec())
    }

    /// The session identifier, once the first key exchange completed.
    pub fn session_id(&self) -> Option<&[u8]> {
        self.session.as_deref()
    }

    /// The sequence number of the last received packet.
    pub fn last_rxseq(&self) -> u32 {
        self.rxseq.wrapping_sub(1)
    }

    /// Receive and decrypt a _packet_ from the peer, draining the
    /// backlog queued up during a key exchange first.
    pub async fn recv(&mut self) -> Result<Packet> {
        if let Some(packet) = self.backlog.pop_front() {
            return Ok(packet);
        }

        self.recv_wire().await
    }

    /// Receive packets until one carries message number `number`.
    ///
    /// `ignore`/`debug`/`unimplemented` messages are logged and
    /// skipped, a `disconnect` is decoded and fatal, and application
    /// messages are parked on the backlog, as they may legitimately
    /// be in flight around a re-keying.
    pub async fn recv_expected(&mut self, number: u8) -> Result<Packet> {
        loop {
            let packet = self.recv_wire().await?;

            match packet.number() {
                n if n == number => break Ok(packet),
                DISCONNECT => {
                    let disconnect: trans::Disconnect = packet.to()?;

                    break Err(DisconnectedError {
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
                n if n >= 50 => {
                    tracing::trace!("Parked a ^{n:#x} message during the key exchange");

                    self.backlog.push_back(packet);
                }
                _ => break Err(Error::UnexpectedMessage),
            }
        }
    }

    async fn recv_wire(&mut self) -> Result<Packet> {
        let timeout = self.timeout;
        let packet = async {
            loop {
                if let Some(packet) = Self::try_parse(
                    &mut self.acc,
                    &mut self.gather,
                    &mut self.transport.rx,
                    self.rxseq,
                )? {
                    break Ok::<_, Error>(packet);
                }

                let read = {
                    let buffered = self.inner.fill_buf().await?;
                    if buffered.is_empty() {
                        return Err(Error::ConnectionLost);
                    }

                    self.acc.extend_from_slice(buffered);
                    buffered.len()
                };
                self.inner.consume_unpin(read);
            }
        }
        .timeout(timeout)
        .await
        .map_err(|_| Error::Timeout)??;

        tracing::trace!(
            "<~- #{}: ^{:#x} ({} bytes)",
            self.rxseq,
            packet.payload[0],
            packet.payload.len(),
        );

        self.rxseq = self.rxseq.wrapping_add(1);
        self.bytes = self.bytes.saturating_add(packet.payload.len());
        self.packets = self.packets.saturating_add(1);

        Ok(packet)
    }

    /// Advance the parser over the accumulated bytes, returning a
    /// packet once one is complete.
    ///
    /// The cipher touches each byte exactly once, so the call is
    /// safe to repeat as more bytes trickle in.
    fn try_parse(
        acc: &mut Vec<u8>,
        gather: &mut Gather,
        transport: &mut Transport,
        seq: u32,
    ) -> Result<Option<Packet>> {
        let mac_size = transport.mac_size();
        let block = transport.block_size();
        let length_in_clear = transport.cipher.is_aead() || transport.hmac.etm();

        if let Gather::Length = *gather {
            if length_in_clear {
                if acc.len() < 4 {
                    return Ok(None);
                }

                let len =
                    u32::from_be_bytes(acc[..4].try_into().expect("sliced 4 bytes")) as usize;
                if len == 0 || len > MAX_PACKET_LENGTH || len % block != 0 {
                    return Err(Error::MalformedPacket);
                }

                *gather = Gather::Body {
                    total: 4 + len + mac_size,
                    decrypted: 0,
                };
            } else {
                if acc.len() < block {
                    return Ok(None);
                }

                transport.decrypt(&mut acc[..block])?;

                let len =
                    u32::from_be_bytes(acc[..4].try_into().expect("sliced 4 bytes")) as usize;
                if len == 0 || len > MAX_PACKET_LENGTH || (4 + len) % block != 0 || 4 + len < block
                {
                    return Err(Error::MalformedPacket);
                }

                *gather = Gather::Body {
                    total: 4 + len + mac_size,
                    decrypted: block,
                };
            }
        }

        let Gather::Body { total, decrypted } = *gather else {
            return Ok(None);
        };
        if acc.len() < total {
            return Ok(None);
        }

        let mut wire: Vec<u8> = acc.drain(..total).collect();
        *gather = Gather::Length;

        let sealed_end = total - mac_size;

        let body = if transport.cipher.is_aead() {
            let (aad, rest) = wire.split_at_mut(4);
            let (body, tag) = rest.split_at_mut(sealed_end - 4);

            transport.open_aead(aad, body, tag)?;

            body.to_vec()
        } else if transport.hmac.etm() {
            transport.verify(&wire[..sealed_end], &wire[sealed_end..], seq)?;

            let mut body = wire[4..sealed_end].to_vec();
            transport.decrypt(&mut body)?;

            body
        } else {
            transport.decrypt(&mut wire[decrypted..sealed_end])?;
            transport.verify(&wire[..sealed_end], &wire[sealed_end..], seq)?;

            wire[4..sealed_end].to_vec()
        };

        let payload = Transport::unpad(body)?;
        if payload.is_empty() {
            return Err(Error::MalformedPacket);
        }

        Ok(Some(Packet { payload }))
    }

    /// Encrypt and send a _packet_ to the peer.
    pub async fn send<T: msg::Packet>(&mut self, message: &T) -> Result<()> {
        let payload = message.to_payload();
        let wire = self.transport.tx.seal(&payload, self.txseq)?;

        self.inner
            .write_all(&wire)
            .timeout(self.timeout)
            .await
            .map_err(|_| Error::Timeout)??;
        self.inner.flush().await?;

        tracing::trace!(
            "-~> #{}: ^{:#x} ({} bytes)",
            self.txseq,
            payload[0],
            payload.len(),
        );

        self.txseq = self.txseq.wrapping_add(1);
        self.bytes = self.bytes.saturating_add(payload.len());
        self.packets = self.packets.saturating_add(1);

        Ok(())
    }
}
