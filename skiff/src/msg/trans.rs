//! Messages involved in the SSH's **transport** (`SSH-TRANS`) part of the protocol,
//! as defined in the [RFC 4253](https://datatracker.ietf.org/doc/html/rfc4253)
//! and [RFC 5656](https://datatracker.ietf.org/doc/html/rfc5656).

use crate::{
    wire::{NameList, Reader, Writer},
    Result,
};

use super::Packet;

/// The `reason` for disconnect in the `SSH_MSG_DISCONNECT` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// `SSH_DISCONNECT_HOST_NOT_ALLOWED_TO_CONNECT`.
    HostNotAllowedToConnect,

    /// `SSH_DISCONNECT_PROTOCOL_ERROR`.
    ProtocolError,

    /// `SSH_DISCONNECT_KEY_EXCHANGE_FAILED`.
    KeyExchangeFailed,

    /// `SSH_DISCONNECT_RESERVED`.
    Reserved,

    /// `SSH_DISCONNECT_MAC_ERROR`.
    MacError,

    /// `SSH_DISCONNECT_COMPRESSION_ERROR`.
    CompressionError,

    /// `SSH_DISCONNECT_SERVICE_NOT_AVAILABLE`.
    ServiceNotAvailable,

    /// `SSH_DISCONNECT_PROTOCOL_VERSION_NOT_SUPPORTED`.
    ProtocolVersionNotSupported,

    /// `SSH_DISCONNECT_HOST_KEY_NOT_VERIFIABLE`.
    HostKeyNotVerifiable,

    /// `SSH_DISCONNECT_CONNECTION_LOST`.
    ConnectionLost,

    /// `SSH_DISCONNECT_BY_APPLICATION`.
    ByApplication,

    /// `SSH_DISCONNECT_TOO_MANY_CONNECTIONS`.
    TooManyConnections,

    /// `SSH_DISCONNECT_AUTH_CANCELLED_BY_USER`.
    AuthCancelledByUser,

    /// `SSH_DISCONNECT_NO_MORE_AUTH_METHODS_AVAILABLE`.
    NoMoreAuthMethodsAvailable,

    /// `SSH_DISCONNECT_ILLEGAL_USER_NAME`.
    IllegalUserName,

    /// Any other disconnect reason, may be non-standard.
    Other(u32),
}

impl From<u32> for DisconnectReason {
    fn from(code: u32) -> Self {
        match code {
            1 => Self::HostNotAllowedToConnect,
            2 => Self::ProtocolError,
            3 => Self::KeyExchangeFailed,
            4 => Self::Reserved,
            5 => Self::MacError,
            6 => Self::CompressionError,
            7 => Self::ServiceNotAvailable,
            8 => Self::ProtocolVersionNotSupported,
            9 => Self::HostKeyNotVerifiable,
            10 => Self::ConnectionLost,
            11 => Self::ByApplication,
            12 => Self::TooManyConnections,
            13 => Self::AuthCancelledByUser,
            14 => Self::NoMoreAuthMethodsAvailable,
            15 => Self::IllegalUserName,
            code => Self::Other(code),
        }
    }
}

impl From<DisconnectReason> for u32 {
    fn from(reason: DisconnectReason) -> Self {
        match reason {
            DisconnectReason::HostNotAllowedToConnect => 1,
            DisconnectReason::ProtocolError => 2,
            DisconnectReason::KeyExchangeFailed => 3,
            DisconnectReason::Reserved => 4,
            DisconnectReason::MacError => 5,
            DisconnectReason::CompressionError => 6,
            DisconnectReason::ServiceNotAvailable => 7,
            DisconnectReason::ProtocolVersionNotSupported => 8,
            DisconnectReason::HostKeyNotVerifiable => 9,
            DisconnectReason::ConnectionLost => 10,
            DisconnectReason::ByApplication => 11,
            DisconnectReason::TooManyConnections => 12,
            DisconnectReason::AuthCancelledByUser => 13,
            DisconnectReason::NoMoreAuthMethodsAvailable => 14,
            DisconnectReason::IllegalUserName => 15,
            DisconnectReason::Other(code) => code,
        }
    }
}

/// The `SSH_MSG_DISCONNECT` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4253#section-11.1>.
#[derive(Debug, Clone)]
pub struct Disconnect {
    /// Reason for disconnection.
    pub reason: DisconnectReason,

    /// Description of the reason for disconnection.
    pub description: String,

    /// Language tag.
    pub language: String,
}

impl Packet for Disconnect {
    const NUMBER: u8 = 1;

    fn encode_body(&self, writer: &mut Writer) {
        writer.u32(self.reason.into());
        writer.string(self.description.as_bytes());
        writer.string(self.language.as_bytes());
    }

    fn decode_body(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            reason: reader.u32()?.into(),
            description: reader.utf8()?.to_owned(),
            language: reader.utf8()?.to_owned(),
        })
    }
}

/// The `SSH_MSG_IGNORE` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4253#section-11.2>.
#[derive(Debug, Default, Clone)]
pub struct Ignore {
    /// A random blob of data to ignore.
    pub data: Vec<u8>,
}

impl Packet for Ignore {
    const NUMBER: u8 = 2;

    fn encode_body(&self, writer: &mut Writer) {
        writer.string(&self.data);
    }

    fn decode_body(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            data: reader.string()?.to_owned(),
        })
    }
}

/// The `SSH_MSG_UNIMPLEMENTED` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4253#section-11.4>.
#[derive(Debug, Clone)]
pub struct Unimplemented {
    /// Packet sequence number of rejected message.
    pub seq: u32,
}

impl Packet for Unimplemented {
    const NUMBER: u8 = 3;

    fn encode_body(&self, writer: &mut Writer) {
        writer.u32(self.seq);
    }

    fn decode_body(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self { seq: reader.u32()? })
    }
}

/// The `SSH_MSG_DEBUG` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4253#section-11.3>.
#[derive(Debug, Default, Clone)]
pub struct Debug {
    /// Whether the debug data should be forcefully displayed.
    pub always_display: bool,

    /// The debug message.
    pub message: String,

    /// Language tag.
    pub language: String,
}

impl Packet for Debug {
    const NUMBER: u8 = 4;

    fn encode_body(&self, writer: &mut Writer) {
        writer.bool(self.always_display);
        writer.string(self.message.as_bytes());
        writer.string(self.language.as_bytes());
    }

    fn decode_body(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            always_display: reader.bool()?,
            message: reader.utf8()?.to_owned(),
            language: reader.utf8()?.to_owned(),
        })
    }
}

/// The `SSH_MSG_SERVICE_REQUEST` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4253#section-10>.
#[derive(Debug, Clone)]
pub struct ServiceRequest {
    /// The service name to request.
    pub service_name: String,
}

impl Packet for ServiceRequest {
    const NUMBER: u8 = 5;

    fn encode_body(&self, writer: &mut Writer) {
        writer.string(self.service_name.as_bytes());
    }

    fn decode_body(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            service_name: reader.utf8()?.to_owned(),
        })
    }
}

/// The `SSH_MSG_SERVICE_ACCEPT` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4253#section-10>.
#[derive(Debug, Clone)]
pub struct ServiceAccept {
    /// Service name accepted to be requested.
    pub service_name: String,
}

impl Packet for ServiceAccept {
    const NUMBER: u8 = 6;

    fn encode_body(&self, writer: &mut Writer) {
        writer.string(self.service_name.as_bytes());
    }

    fn decode_body(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            service_name: reader.utf8()?.to_owned(),
        })
    }
}

/// The `SSH_MSG_KEXINIT` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4253#section-7.1>.
#[derive(Debug, Clone)]
pub struct KexInit {
    /// The kex-init cookie.
    pub cookie: [u8; 16],

    /// Kex algorithms.
    pub kex_algorithms: NameList,

    /// Server host-key algorithms.
    pub server_host_key_algorithms: NameList,

    /// Client -> server encryption algorithms.
    pub encryption_algorithms_client_to_server: NameList,

    /// Server -> client encryption algorithms.
    pub encryption_algorithms_server_to_client: NameList,

    /// Client -> server MAC algorithms.
    pub mac_algorithms_client_to_server: NameList,

    /// Server -> client MAC algorithms.
    pub mac_algorithms_server_to_client: NameList,

    /// Client -> server compression algorithms.
    pub compression_algorithms_client_to_server: NameList,

    /// Server -> client compression algorithms.
    pub compression_algorithms_server_to_client: NameList,

    /// Client -> server languages.
    pub languages_client_to_server: NameList,

    /// Server -> client languages.
    pub languages_server_to_client: NameList,

    /// Whether the first kex packet follows.
    pub first_kex_packet_follows: bool,
}

impl Packet for KexInit {
    const NUMBER: u8 = 20;

    fn encode_body(&self, writer: &mut Writer) {
        writer.raw(&self.cookie);
        writer.name_list(&self.kex_algorithms);
        writer.name_list(&self.server_host_key_algorithms);
        writer.name_list(&self.encryption_algorithms_client_to_server);
        writer.name_list(&self.encryption_algorithms_server_to_client);
        writer.name_list(&self.mac_algorithms_client_to_server);
        writer.name_list(&self.mac_algorithms_server_to_client);
        writer.name_list(&self.compression_algorithms_client_to_server);
        writer.name_list(&self.compression_algorithms_server_to_client);
        writer.name_list(&self.languages_client_to_server);
        writer.name_list(&self.languages_server_to_client);
        writer.bool(self.first_kex_packet_follows);
        writer.u32(0); // Reserved.
    }

    fn decode_body(reader: &mut Reader<'_>) -> Result<Self> {
        let decoded = Self {
            cookie: reader.array()?,
            kex_algorithms: reader.name_list()?,
            server_host_key_algorithms: reader.name_list()?,
            encryption_algorithms_client_to_server: reader.name_list()?,
            encryption_algorithms_server_to_client: reader.name_list()?,
            mac_algorithms_client_to_server: reader.name_list()?,
            mac_algorithms_server_to_client: reader.name_list()?,
            compression_algorithms_client_to_server: reader.name_list()?,
            compression_algorithms_server_to_client: reader.name_list()?,
            languages_client_to_server: reader.name_list()?,
            languages_server_to_client: reader.name_list()?,
            first_kex_packet_follows: reader.bool()?,
        };

        let _ = reader.u32()?; // Reserved.

        Ok(decoded)
    }
}

/// The `SSH_MSG_NEWKEYS` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4253#section-7.3>.
#[derive(Debug, Default, Clone)]
pub struct NewKeys;

impl Packet for NewKeys {
    const NUMBER: u8 = 21;

    fn encode_body(&self, _writer: &mut Writer) {}

    fn decode_body(_reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self)
    }
}

/// The `SSH_MSG_KEXDH_INIT` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4253#section-8>.
#[derive(Debug, Clone)]
pub struct KexDhInit {
    /// Exchange value sent by the client, as an `mpint` magnitude.
    pub e: Vec<u8>,
}

impl Packet for KexDhInit {
    const NUMBER: u8 = 30;

    fn encode_body(&self, writer: &mut Writer) {
        writer.mpint(&self.e);
    }

    fn decode_body(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            e: reader.mpint()?.to_owned(),
        })
    }
}

/// The `SSH_MSG_KEXDH_REPLY` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4253#section-8>.
#[derive(Debug, Clone)]
pub struct KexDhReply {
    /// Server's public host key.
    pub k_s: Vec<u8>,

    /// Exchange value sent by the server, as an `mpint` magnitude.
    pub f: Vec<u8>,

    /// Signature of the exchange hash.
    pub signature: Vec<u8>,
}

impl Packet for KexDhReply {
    const NUMBER: u8 = 31;

    fn encode_body(&self, writer: &mut Writer) {
        writer.string(&self.k_s);
        writer.mpint(&self.f);
        writer.string(&self.signature);
    }

    fn decode_body(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            k_s: reader.string()?.to_owned(),
            f: reader.mpint()?.to_owned(),
            signature: reader.string()?.to_owned(),
        })
    }
}

/// The `SSH_MSG_KEX_ECDH_INIT` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc5656#section-4>.
#[derive(Debug, Clone)]
pub struct KexEcdhInit {
    /// Client's ephemeral public key octet string.
    pub q_c: Vec<u8>,
}

impl Packet for KexEcdhInit {
    const NUMBER: u8 = 30;

    fn encode_body(&self, writer: &mut Writer) {
        writer.string(&self.q_c);
    }

    fn decode_body(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            q_c: reader.string()?.to_owned(),
        })
    }
}

/// The `SSH_MSG_KEX_ECDH_REPLY` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc5656#section-4>.
#[derive(Debug, Clone)]
pub struct KexEcdhReply {
    /// Server's public host key.
    pub k_s: Vec<u8>,

    /// Server's ephemeral public key octet string.
    pub q_s: Vec<u8>,

    /// Signature of the exchange hash.
    pub signature: Vec<u8>,
}

impl Packet for KexEcdhReply {
    const NUMBER: u8 = 31;

    fn encode_body(&self, writer: &mut Writer) {
        writer.string(&self.k_s);
        writer.string(&self.q_s);
        writer.string(&self.signature);
    }

    fn decode_body(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            k_s: reader.string()?.to_owned(),
            q_s: reader.string()?.to_owned(),
            signature: reader.string()?.to_owned(),
        })
    }
}
