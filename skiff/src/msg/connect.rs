//! Messages involved in the SSH's **connect** (`SSH-CONNECT`) part of the protocol,
//! as defined in the [RFC 4254](https://datatracker.ietf.org/doc/html/rfc4254).

use crate::{
    wire::{Reader, Writer},
    Result,
};

use super::Packet;

/// The `SSH_MSG_GLOBAL_REQUEST` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4254#section-4>.
#[derive(Debug, Clone)]
pub struct GlobalRequest {
    /// The request type name.
    pub request_type: String,

    /// Whether the peer must answer.
    pub want_reply: bool,

    /// Raw type-specific trailing fields.
    pub context: Vec<u8>,
}

impl Packet for GlobalRequest {
    const NUMBER: u8 = 80;

    fn encode_body(&self, writer: &mut Writer) {
        writer.string(self.request_type.as_bytes());
        writer.bool(self.want_reply);
        writer.raw(&self.context);
    }

    fn decode_body(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            request_type: reader.utf8()?.to_owned(),
            want_reply: reader.bool()?,
            context: reader.remaining().to_owned(),
        })
    }
}

/// The `SSH_MSG_REQUEST_FAILURE` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4254#section-4>.
#[derive(Debug, Default, Clone)]
pub struct RequestFailure;

impl Packet for RequestFailure {
    const NUMBER: u8 = 82;

    fn encode_body(&self, _writer: &mut Writer) {}

    fn decode_body(_reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self)
    }
}

/// The `SSH_MSG_CHANNEL_OPEN` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4254#section-5.1>.
#[derive(Debug, Clone)]
pub struct ChannelOpen {
    /// The channel type; the only type opened by this crate is `session`.
    pub channel_type: String,

    /// Our identifier for the channel.
    pub sender_channel: u32,

    /// Initial window size, in bytes.
    pub initial_window_size: u32,

    /// Maximum packet size, in bytes.
    pub maximum_packet_size: u32,
}

impl Packet for ChannelOpen {
    const NUMBER: u8 = 90;

    fn encode_body(&self, writer: &mut Writer) {
        writer.string(self.channel_type.as_bytes());
        writer.u32(self.sender_channel);
        writer.u32(self.initial_window_size);
        writer.u32(self.maximum_packet_size);
    }

    fn decode_body(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            channel_type: reader.utf8()?.to_owned(),
            sender_channel: reader.u32()?,
            initial_window_size: reader.u32()?,
            maximum_packet_size: reader.u32()?,
        })
    }
}

/// The `SSH_MSG_CHANNEL_OPEN_CONFIRMATION` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4254#section-5.1>.
#[derive(Debug, Clone)]
pub struct ChannelOpenConfirmation {
    /// The recipient's identifier for the channel.
    pub recipient_channel: u32,

    /// The sender's identifier for the channel.
    pub sender_channel: u32,

    /// Initial window size, in bytes.
    pub initial_window_size: u32,

    /// Maximum packet size, in bytes.
    pub maximum_packet_size: u32,
}

impl Packet for ChannelOpenConfirmation {
    const NUMBER: u8 = 91;

    fn encode_body(&self, writer: &mut Writer) {
        writer.u32(self.recipient_channel);
        writer.u32(self.sender_channel);
        writer.u32(self.initial_window_size);
        writer.u32(self.maximum_packet_size);
    }

    fn decode_body(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            recipient_channel: reader.u32()?,
            sender_channel: reader.u32()?,
            initial_window_size: reader.u32()?,
            maximum_packet_size: reader.u32()?,
        })
    }
}

/// The `SSH_MSG_CHANNEL_OPEN_FAILURE` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4254#section-5.1>.
#[derive(Debug, Clone)]
pub struct ChannelOpenFailure {
    /// The recipient's identifier for the channel.
    pub recipient_channel: u32,

    /// The failure reason code.
    pub reason_code: u32,

    /// Description of the failure.
    pub description: String,

    /// Language tag.
    pub language: String,
}

impl Packet for ChannelOpenFailure {
    const NUMBER: u8 = 92;

    fn encode_body(&self, writer: &mut Writer) {
        writer.u32(self.recipient_channel);
        writer.u32(self.reason_code);
        writer.string(self.description.as_bytes());
        writer.string(self.language.as_bytes());
    }

    fn decode_body(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            recipient_channel: reader.u32()?,
            reason_code: reader.u32()?,
            description: reader.utf8()?.to_owned(),
            language: reader.utf8()?.to_owned(),
        })
    }
}

/// The `SSH_MSG_CHANNEL_WINDOW_ADJUST` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4254#section-5.2>.
#[derive(Debug, Clone)]
pub struct ChannelWindowAdjust {
    /// The recipient's identifier for the channel.
    pub recipient_channel: u32,

    /// The window credit to add, in bytes.
    pub bytes_to_add: u32,
}

impl Packet for ChannelWindowAdjust {
    const NUMBER: u8 = 93;

    fn encode_body(&self, writer: &mut Writer) {
        writer.u32(self.recipient_channel);
        writer.u32(self.bytes_to_add);
    }

    fn decode_body(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            recipient_channel: reader.u32()?,
            bytes_to_add: reader.u32()?,
        })
    }
}

/// The `SSH_MSG_CHANNEL_DATA` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4254#section-5.2>.
#[derive(Debug, Clone)]
pub struct ChannelData {
    /// The recipient's identifier for the channel.
    pub recipient_channel: u32,

    /// The data itself.
    pub data: Vec<u8>,
}

impl Packet for ChannelData {
    const NUMBER: u8 = 94;

    fn encode_body(&self, writer: &mut Writer) {
        writer.u32(self.recipient_channel);
        writer.string(&self.data);
    }

    fn decode_body(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            recipient_channel: reader.u32()?,
            data: reader.string()?.to_owned(),
        })
    }
}

/// The `SSH_MSG_CHANNEL_EXTENDED_DATA` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4254#section-5.2>.
#[derive(Debug, Clone)]
pub struct ChannelExtendedData {
    /// The recipient's identifier for the channel.
    pub recipient_channel: u32,

    /// The extended stream identifier; `1` is `stderr`.
    pub data_type: u32,

    /// The data itself.
    pub data: Vec<u8>,
}

impl Packet for ChannelExtendedData {
    const NUMBER: u8 = 95;

    fn encode_body(&self, writer: &mut Writer) {
        writer.u32(self.recipient_channel);
        writer.u32(self.data_type);
        writer.string(&self.data);
    }

    fn decode_body(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            recipient_channel: reader.u32()?,
            data_type: reader.u32()?,
            data: reader.string()?.to_owned(),
        })
    }
}

/// The `SSH_MSG_CHANNEL_EOF` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4254#section-5.3>.
#[derive(Debug, Clone)]
pub struct ChannelEof {
    /// The recipient's identifier for the channel.
    pub recipient_channel: u32,
}

impl Packet for ChannelEof {
    const NUMBER: u8 = 96;

    fn encode_body(&self, writer: &mut Writer) {
        writer.u32(self.recipient_channel);
    }

    fn decode_body(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            recipient_channel: reader.u32()?,
        })
    }
}

/// The `SSH_MSG_CHANNEL_CLOSE` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4254#section-5.3>.
#[derive(Debug, Clone)]
pub struct ChannelClose {
    /// The recipient's identifier for the channel.
    pub recipient_channel: u32,
}

impl Packet for ChannelClose {
    const NUMBER: u8 = 97;

    fn encode_body(&self, writer: &mut Writer) {
        writer.u32(self.recipient_channel);
    }

    fn decode_body(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            recipient_channel: reader.u32()?,
        })
    }
}

/// The `SSH_MSG_CHANNEL_REQUEST` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4254#section-5.4>.
#[derive(Debug, Clone)]
pub struct ChannelRequest {
    /// The recipient's identifier for the channel.
    pub recipient_channel: u32,

    /// The request type name.
    pub request_type: String,

    /// Whether the peer must answer with success or failure.
    pub want_reply: bool,

    /// Raw type-specific trailing fields.
    pub context: Vec<u8>,
}

impl ChannelRequest {
    /// Build a `subsystem` start request.
    pub fn subsystem(recipient_channel: u32, name: &str, want_reply: bool) -> Self {
        let mut context = Writer::new();
        context.string(name.as_bytes());

        Self {
            recipient_channel,
            request_type: "subsystem".into(),
            want_reply,
            context: context.finish(),
        }
    }
}

impl Packet for ChannelRequest {
    const NUMBER: u8 = 98;

    fn encode_body(&self, writer: &mut Writer) {
        writer.u32(self.recipient_channel);
        writer.string(self.request_type.as_bytes());
        writer.bool(self.want_reply);
        writer.raw(&self.context);
    }

    fn decode_body(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            recipient_channel: reader.u32()?,
            request_type: reader.utf8()?.to_owned(),
            want_reply: reader.bool()?,
            context: reader.remaining().to_owned(),
        })
    }
}

/// The `SSH_MSG_CHANNEL_SUCCESS` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4254#section-5.4>.
#[derive(Debug, Clone)]
pub struct ChannelSuccess {
    /// The recipient's identifier for the channel.
    pub recipient_channel: u32,
}

impl Packet for ChannelSuccess {
    const NUMBER: u8 = 99;

    fn encode_body(&self, writer: &mut Writer) {
        writer.u32(self.recipient_channel);
    }

    fn decode_body(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            recipient_channel: reader.u32()?,
        })
    }
}

/// The `SSH_MSG_CHANNEL_FAILURE` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4254#section-5.4>.
#[derive(Debug, Clone)]
pub struct ChannelFailure {
    /// The recipient's identifier for the channel.
    pub recipient_channel: u32,
}

impl Packet for ChannelFailure {
    const NUMBER: u8 = 100;

    fn encode_body(&self, writer: &mut Writer) {
        writer.u32(self.recipient_channel);
    }

    fn decode_body(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            recipient_channel: reader.u32()?,
        })
    }
}
