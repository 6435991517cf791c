//! Definition of the [`Channel`] struct providing I/O and flow
//! control on the single `session` channel of the connection.

use std::collections::VecDeque;

use futures::{AsyncRead, AsyncWrite};

use skiff::{
    msg::{self, connect},
    Session,
};

use crate::{Error, Result};

mod window;
use window::{LocalWindow, RemoteWindow};

const GLOBAL_REQUEST: u8 = <connect::GlobalRequest as msg::Packet>::NUMBER;
const OPEN_CONFIRMATION: u8 = <connect::ChannelOpenConfirmation as msg::Packet>::NUMBER;
const OPEN_FAILURE: u8 = <connect::ChannelOpenFailure as msg::Packet>::NUMBER;
const WINDOW_ADJUST: u8 = <connect::ChannelWindowAdjust as msg::Packet>::NUMBER;
const DATA: u8 = <connect::ChannelData as msg::Packet>::NUMBER;
const EXTENDED_DATA: u8 = <connect::ChannelExtendedData as msg::Packet>::NUMBER;
const EOF: u8 = <connect::ChannelEof as msg::Packet>::NUMBER;
const CLOSE: u8 = <connect::ChannelClose as msg::Packet>::NUMBER;
const REQUEST: u8 = <connect::ChannelRequest as msg::Packet>::NUMBER;
const SUCCESS: u8 = <connect::ChannelSuccess as msg::Packet>::NUMBER;
const FAILURE: u8 = <connect::ChannelFailure as msg::Packet>::NUMBER;

/// Options for opening the `session` channel.
#[derive(Debug, Clone)]
pub struct Options {
    /// The window we grant the peer, in bytes.
    pub initial_window: u32,

    /// The largest data packet we accept, in bytes.
    pub max_packet: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            initial_window: 2 * 1024 * 1024,
            max_packet: 32 * 1024,
        }
    }
}

/// Channel events surfaced past the bookkeeping.
///
/// Window credit is applied before [`Event::Adjust`] is returned, so
/// a sender blocked on the window can retry its reservation.
enum Event {
    Data(Vec<u8>),
    Adjust,
    Eof,
    Close,
    Success,
    Failure,
}

/// An opened `session` channel owning the underlying [`Session`].
///
/// Data is segmented to the peer's maximum packet size on the way
/// out and throttled by its window; the inbound window is
/// replenished transparently.
pub struct Channel<IO> {
    session: Session<IO>,

    local_id: u32,
    local_window: LocalWindow,

    remote_id: u32,
    remote_window: RemoteWindow,
    remote_maxpack: u32,

    /// Data already received but not yet claimed by the caller.
    inbound: VecDeque<Vec<u8>>,

    eof_received: bool,
    eof_sent: bool,
    close_received: bool,
    close_sent: bool,
}

impl<IO> Channel<IO>
where
    IO: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Open the `session` channel over an authenticated [`Session`].
    pub async fn open(mut session: Session<IO>, options: &Options) -> Result<Self> {
        let local_id = 0;

        session
            .send(&connect::ChannelOpen {
                channel_type: "session".into(),
                sender_channel: local_id,
                initial_window_size: options.initial_window,
                maximum_packet_size: options.max_packet,
            })
            .await?;

        loop {
            let packet = session.recv().await?;

            match packet.number() {
                OPEN_CONFIRMATION => {
                    let confirmation: connect::ChannelOpenConfirmation = packet.to()?;
                    if confirmation.recipient_channel != local_id {
                        return Err(skiff::Error::UnexpectedMessage.into());
                    }

                    tracing::debug!(
                        "Opened channel {}:{}, window {}, max packet {}",
                        local_id,
                        confirmation.sender_channel,
                        confirmation.initial_window_size,
                        confirmation.maximum_packet_size,
                    );

                    return Ok(Self {
                        session,
                        local_id,
                        local_window: LocalWindow::new(options.initial_window),
                        remote_id: confirmation.sender_channel,
                        remote_window: RemoteWindow::new(confirmation.initial_window_size),
                        remote_maxpack: confirmation.maximum_packet_size,
                        inbound: VecDeque::new(),
                        eof_received: false,
                        eof_sent: false,
                        close_received: false,
                        close_sent: false,
                    });
                }
                OPEN_FAILURE => {
                    let failure: connect::ChannelOpenFailure = packet.to()?;

                    return Err(Error::ChannelOpenRejected {
                        reason: failure.reason_code,
                        description: failure.description,
                    });
                }
                GLOBAL_REQUEST => {
                    Self::refuse_global_request(&mut session, packet.to()?).await?;
                }
                _ => return Err(skiff::Error::UnexpectedMessage.into()),
            }
        }
    }

    /// Start a subsystem on the channel, failing with
    /// [`Error::SubsystemStartFailed`] when the peer refuses.
    pub async fn subsystem(&mut self, name: &str) -> Result<()> {
        self.session
            .send(&connect::ChannelRequest::subsystem(
                self.remote_id,
                name,
                true,
            ))
            .await?;

        loop {
            match self.next_event().await? {
                Event::Success => {
                    tracing::debug!("Peer started the `{name}` subsystem");

                    break Ok(());
                }
                Event::Failure => break Err(Error::SubsystemStartFailed(name.into())),
                Event::Data(data) => self.inbound.push_back(data),
                Event::Adjust => (),
                Event::Eof => self.eof_received = true,
                Event::Close => break Err(Error::ChannelClosed),
            }
        }
    }

    /// Send `data`, segmented under the peer's maximum packet size
    /// and suspended whenever its window runs out of credit.
    pub async fn send_data(&mut self, data: &[u8]) -> Result<()> {
        let mut offset = 0;

        while offset < data.len() {
            if self.close_sent || self.close_received {
                return Err(Error::ChannelClosed);
            }

            let wanted = (data.len() - offset).min(self.remote_maxpack as usize) as u32;

            let Some(reserved) = self.remote_window.reserve(wanted) else {
                tracing::warn!("Peer channel window is exhausted, awaiting for credit");

                match self.next_event().await? {
                    Event::Data(data) => self.inbound.push_back(data),
                    Event::Adjust => (),
                    Event::Eof => self.eof_received = true,
                    Event::Close => return Err(Error::ChannelClosed),
                    Event::Success | Event::Failure => {
                        return Err(skiff::Error::UnexpectedMessage.into())
                    }
                }

                continue;
            };

            self.session
                .send(&connect::ChannelData {
                    recipient_channel: self.remote_id,
                    data: data[offset..offset + reserved as usize].to_vec(),
                })
                .await?;

            offset += reserved as usize;
        }

        Ok(())
    }

    /// Receive the next chunk of channel data, `None` once the peer
    /// sent an EOF or the channel closed.
    pub async fn recv_data(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            if let Some(data) = self.inbound.pop_front() {
                return Ok(Some(data));
            }
            if self.eof_received || self.close_received {
                return Ok(None);
            }

            match self.next_event().await? {
                Event::Data(data) => self.inbound.push_back(data),
                Event::Adjust => (),
                Event::Eof => self.eof_received = true,
                Event::Close => self.close_received = true,
                Event::Success | Event::Failure => {
                    return Err(skiff::Error::UnexpectedMessage.into())
                }
            }
        }
    }

    /// Signal we are done sending data.
    pub async fn eof(&mut self) -> Result<()> {
        if !self.eof_sent && !self.close_sent {
            self.session
                .send(&connect::ChannelEof {
                    recipient_channel: self.remote_id,
                })
                .await?;
            self.eof_sent = true;
        }

        Ok(())
    }

    /// Close the channel, waiting until both sides agreed.
    pub async fn close(mut self) -> Result<()> {
        self.eof().await?;

        if !self.close_sent {
            self.session
                .send(&connect::ChannelClose {
                    recipient_channel: self.remote_id,
                })
                .await?;
            self.close_sent = true;
        }

        while !self.close_received {
            match self.next_event().await? {
                Event::Close => self.close_received = true,
                // Late data on a closing channel is dropped.
                Event::Data(_) | Event::Adjust | Event::Eof | Event::Success | Event::Failure => {
                }
            }
        }

        tracing::debug!("Channel {}:{} closed", self.local_id, self.remote_id);

        Ok(())
    }

    /// Process one inbound message, folding the flow-control and
    /// bookkeeping messages away.
    async fn next_event(&mut self) -> Result<Event> {
        loop {
            let packet = self.session.recv().await?;

            match packet.number() {
                WINDOW_ADJUST => {
                    let adjust: connect::ChannelWindowAdjust = packet.to()?;
                    self.check_recipient(adjust.recipient_channel)?;

                    self.remote_window.replenish(adjust.bytes_to_add);

                    tracing::debug!(
                        "Peer added {} bytes of credit for channel {}:{}",
                        adjust.bytes_to_add,
                        self.local_id,
                        self.remote_id,
                    );

                    return Ok(Event::Adjust);
                }
                DATA => {
                    let data: connect::ChannelData = packet.to()?;
                    self.check_recipient(data.recipient_channel)?;

                    self.charge_window(data.data.len())?;
                    self.replenish_window().await?;

                    return Ok(Event::Data(data.data));
                }
                EXTENDED_DATA => {
                    let data: connect::ChannelExtendedData = packet.to()?;
                    self.check_recipient(data.recipient_channel)?;

                    self.charge_window(data.data.len())?;
                    self.replenish_window().await?;

                    // The SFTP subsystem has no use for stderr.
                    tracing::debug!(
                        "Discarded {} bytes of extended data (stream {})",
                        data.data.len(),
                        data.data_type,
                    );
                }
                EOF => {
                    let eof: connect::ChannelEof = packet.to()?;
                    self.check_recipient(eof.recipient_channel)?;

                    return Ok(Event::Eof);
                }
                CLOSE => {
                    let close: connect::ChannelClose = packet.to()?;
                    self.check_recipient(close.recipient_channel)?;

                    if !self.close_sent {
                        self.session
                            .send(&connect::ChannelClose {
                                recipient_channel: self.remote_id,
                            })
                            .await?;
                        self.close_sent = true;
                    }
                    self.close_received = true;

                    return Ok(Event::Close);
                }
                SUCCESS => {
                    let success: connect::ChannelSuccess = packet.to()?;
                    self.check_recipient(success.recipient_channel)?;

                    return Ok(Event::Success);
                }
                FAILURE => {
                    let failure: connect::ChannelFailure = packet.to()?;
                    self.check_recipient(failure.recipient_channel)?;

                    return Ok(Event::Failure);
                }
                REQUEST => {
                    let request: connect::ChannelRequest = packet.to()?;
                    self.check_recipient(request.recipient_channel)?;

                    tracing::debug!("Refused a `{}` channel request", request.request_type);

                    if request.want_reply {
                        self.session
                            .send(&connect::ChannelFailure {
                                recipient_channel: self.remote_id,
                            })
                            .await?;
                    }
                }
                GLOBAL_REQUEST => {
                    Self::refuse_global_request(&mut self.session, packet.to()?).await?;
                }
                _ => return Err(skiff::Error::UnexpectedMessage.into()),
            }
        }
    }

    /// Account inbound bytes against the window we granted, and hand
    /// credit back once the threshold is crossed.
    fn charge_window(&mut self, size: usize) -> Result<()> {
        self.local_window
            .consume(size as u32)
            .ok_or(Error::WindowOverflow)
    }

    fn check_recipient(&self, recipient: u32) -> Result<()> {
        if recipient != self.local_id {
            return Err(skiff::Error::UnexpectedMessage.into());
        }

        Ok(())
    }

    async fn refuse_global_request(
        session: &mut Session<IO>,
        request: connect::GlobalRequest,
    ) -> Result<()> {
        tracing::debug!("Refused a `{}` global request", request.request_type);

        if request.want_reply {
            session.send(&connect::RequestFailure).await?;
        }

        Ok(())
    }

    /// Replenish the peer's view of our window when due.
    async fn replenish_window(&mut self) -> Result<()> {
        if let Some(credit) = self.local_window.adjustable() {
            self.session
                .send(&connect::ChannelWindowAdjust {
                    recipient_channel: self.remote_id,
                    bytes_to_add: credit,
                })
                .await?;

            tracing::debug!(
                "Granted {credit} bytes of credit on channel {}:{}",
                self.local_id,
                self.remote_id,
            );
        }

        Ok(())
    }
}
