//! Typed messages of the `SSH-TRANS`, `SSH-USERAUTH` and
//! `SSH-CONNECT` protocols, hand-encoded over [`crate::wire`].

use crate::{
    wire::{Reader, Writer},
    Error, Result,
};

pub mod connect;
pub mod trans;
pub mod userauth;

/// A message that can be carried as the payload of a binary packet.
///
/// The first payload byte is always the message number; the body
/// encoding follows the field layouts of RFC 4253 and friends.
pub trait Packet: Sized {
    /// The message number identifying this message on the wire.
    const NUMBER: u8;

    /// Encode the message body, without the message number.
    fn encode_body(&self, writer: &mut Writer);

    /// Decode the message body, the message number already consumed.
    fn decode_body(reader: &mut Reader<'_>) -> Result<Self>;

    /// Encode the full payload, message number included.
    fn to_payload(&self) -> Vec<u8> {
        let mut writer = Writer::new();

        writer.u8(Self::NUMBER);
        self.encode_body(&mut writer);

        writer.finish()
    }

    /// Decode a full payload, failing with [`Error::UnexpectedMessage`]
    /// when the message number does not match.
    fn from_payload(payload: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(payload);

        if reader.u8()? != Self::NUMBER {
            return Err(Error::UnexpectedMessage);
        }

        Self::decode_body(&mut reader)
    }
}
