//! Messages involved in the SSH's **authentication** (`SSH-USERAUTH`) part of the protocol,
//! as defined in the [RFC 4252](https://datatracker.ietf.org/doc/html/rfc4252).

use crate::{
    wire::{NameList, Reader, Writer},
    Result,
};

use super::Packet;

/// The authentication method carried by a [`Request`].
#[derive(Debug, Clone)]
pub enum Method {
    /// The `none` method, used to probe the server's method list.
    None,

    /// The `password` method.
    Password {
        /// The plaintext password.
        password: String,
    },

    /// The `publickey` method, in its probe (`signature: None`)
    /// or signed form.
    Publickey {
        /// The signature algorithm name, which for RSA keys may
        /// differ from the public-key blob's type tag.
        algorithm: String,

        /// The SSH-encoded public-key blob.
        blob: Vec<u8>,

        /// The signature blob, when past the probe phase.
        signature: Option<Vec<u8>>,
    },
}

impl Method {
    /// The method name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Password { .. } => "password",
            Self::Publickey { .. } => "publickey",
        }
    }
}

/// The `SSH_MSG_USERAUTH_REQUEST` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4252#section-5>.
#[derive(Debug, Clone)]
pub struct Request {
    /// The user name to authenticate as.
    pub username: String,

    /// The service to start after authentication.
    pub service_name: String,

    /// The authentication method and its fields.
    pub method: Method,
}

impl Packet for Request {
    const NUMBER: u8 = 50;

    fn encode_body(&self, writer: &mut Writer) {
        writer.string(self.username.as_bytes());
        writer.string(self.service_name.as_bytes());
        writer.string(self.method.name().as_bytes());

        match &self.method {
            Method::None => (),
            Method::Password { password } => {
                writer.bool(false);
                writer.string(password.as_bytes());
            }
            Method::Publickey {
                algorithm,
                blob,
                signature,
            } => {
                writer.bool(signature.is_some());
                writer.string(algorithm.as_bytes());
                writer.string(blob);

                if let Some(signature) = signature {
                    writer.string(signature);
                }
            }
        }
    }

    fn decode_body(reader: &mut Reader<'_>) -> Result<Self> {
        let username = reader.utf8()?.to_owned();
        let service_name = reader.utf8()?.to_owned();

        let method = match reader.utf8()? {
            "password" => {
                let _ = reader.bool()?;

                Method::Password {
                    password: reader.utf8()?.to_owned(),
                }
            }
            "publickey" => {
                let signed = reader.bool()?;
                let algorithm = reader.utf8()?.to_owned();
                let blob = reader.string()?.to_owned();
                let signature = signed.then(|| reader.string().map(<[u8]>::to_owned));

                Method::Publickey {
                    algorithm,
                    blob,
                    signature: signature.transpose()?,
                }
            }
            _ => Method::None,
        };

        Ok(Self {
            username,
            service_name,
            method,
        })
    }
}

/// The `SSH_MSG_USERAUTH_FAILURE` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4252#section-5.1>.
#[derive(Debug, Clone)]
pub struct Failure {
    /// The methods that may productively continue the exchange.
    pub continue_with: NameList,

    /// Whether the request was accepted, while not sufficient alone.
    pub partial_success: bool,
}

impl Packet for Failure {
    const NUMBER: u8 = 51;

    fn encode_body(&self, writer: &mut Writer) {
        writer.name_list(&self.continue_with);
        writer.bool(self.partial_success);
    }

    fn decode_body(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            continue_with: reader.name_list()?,
            partial_success: reader.bool()?,
        })
    }
}

/// The `SSH_MSG_USERAUTH_SUCCESS` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4252#section-5.1>.
#[derive(Debug, Default, Clone)]
pub struct Success;

impl Packet for Success {
    const NUMBER: u8 = 52;

    fn encode_body(&self, _writer: &mut Writer) {}

    fn decode_body(_reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self)
    }
}

/// The `SSH_MSG_USERAUTH_BANNER` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4252#section-5.4>.
#[derive(Debug, Default, Clone)]
pub struct Banner {
    /// The banner text to display.
    pub message: String,

    /// Language tag.
    pub language: String,
}

impl Packet for Banner {
    const NUMBER: u8 = 53;

    fn encode_body(&self, writer: &mut Writer) {
        writer.string(self.message.as_bytes());
        writer.string(self.language.as_bytes());
    }

    fn decode_body(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            message: reader.utf8()?.to_owned(),
            language: reader.utf8()?.to_owned(),
        })
    }
}

/// The `SSH_MSG_USERAUTH_PK_OK` message, answering a `publickey`
/// probe the server is willing to accept.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4252#section-7>.
#[derive(Debug, Clone)]
pub struct PkOk {
    /// The signature algorithm name echoed from the probe.
    pub algorithm: String,

    /// The public-key blob echoed from the probe.
    pub blob: Vec<u8>,
}

impl Packet for PkOk {
    const NUMBER: u8 = 60;

    fn encode_body(&self, writer: &mut Writer) {
        writer.string(self.algorithm.as_bytes());
        writer.string(&self.blob);
    }

    fn decode_body(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            algorithm: reader.utf8()?.to_owned(),
            blob: reader.string()?.to_owned(),
        })
    }
}
