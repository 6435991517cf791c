//! The identification string exchanged before any binary packet.

use futures::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::{Error, Result};

/// Upper bound on preamble lines a server may send before its
/// identification, so a misbehaving peer cannot spin us forever.
const MAX_PREAMBLE_LINES: usize = 1024;

/// Upper bound on the length of a single preamble line.
const MAX_LINE_LENGTH: usize = 8192;

/// An `SSH-2.0-softwareversion [comment]` identification string,
/// stored without its trailing CRLF, exactly as seen on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Id {
    line: String,
}

impl Id {
    /// Create a protocol-2.0 [`Id`] from a software version and an
    /// optional comment.
    pub fn v2(software: impl AsRef<str>, comment: Option<&str>) -> Self {
        let line = match comment {
            Some(comment) => format!("SSH-2.0-{} {comment}", software.as_ref()),
            None => format!("SSH-2.0-{}", software.as_ref()),
        };

        Self { line }
    }

    /// Parse an identification line, without its line terminator.
    ///
    /// Anything that does not announce protocol version `2.0` is an
    /// [`Error::UnsupportedVersion`].
    pub fn parse(line: &str) -> Result<Self> {
        if !line.starts_with("SSH-2.0-") {
            return Err(Error::UnsupportedVersion);
        }

        Ok(Self {
            line: line.to_owned(),
        })
    }

    /// Read the peer's identification from the stream, discarding
    /// any preamble lines the server prints before it.
    pub async fn from_async_reader(reader: &mut (impl AsyncBufRead + Unpin)) -> Result<Self> {
        let mut line = Vec::with_capacity(64);

        for _ in 0..MAX_PREAMBLE_LINES {
            line.clear();

            let read = reader.read_until(b'\n', &mut line).await?;
            if read == 0 {
                return Err(Error::ConnectionLost);
            }
            if line.len() > MAX_LINE_LENGTH {
                return Err(Error::UnsupportedVersion);
            }

            while matches!(line.last(), Some(b'\r' | b'\n')) {
                line.pop();
            }

            if line.starts_with(b"SSH-") {
                let line = std::str::from_utf8(&line).map_err(|_| Error::UnsupportedVersion)?;

                return Self::parse(line);
            }

            tracing::debug!("Discarded a banner line before the peer identification");
        }

        Err(Error::UnsupportedVersion)
    }

    /// Write our identification, CRLF-terminated, to the stream.
    pub async fn to_async_writer(&self, writer: &mut (impl AsyncWrite + Unpin)) -> Result<()> {
        writer.write_all(self.line.as_bytes()).await?;
        writer.write_all(b"\r\n").await?;

        Ok(())
    }

    /// The identification string without its CRLF, as hashed into
    /// the key exchange.
    pub fn as_str(&self) -> &str {
        &self.line
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.line)
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::v2(
            concat!(env!("CARGO_PKG_NAME"), "_", env!("CARGO_PKG_VERSION")),
            None,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use futures::io::BufReader;

    #[async_std::test]
    async fn skips_preamble_lines() {
        let wire = b"Welcome to example.org\r\nplease behave\r\nSSH-2.0-OpenSSH_8.9\r\n";
        let mut reader = BufReader::new(&wire[..]);

        let id = Id::from_async_reader(&mut reader).await.expect("id");
        assert_eq!(id.as_str(), "SSH-2.0-OpenSSH_8.9");
    }

    #[async_std::test]
    async fn rejects_protocol_1() {
        let wire = b"SSH-1.5-old\r\n";
        let mut reader = BufReader::new(&wire[..]);

        assert!(matches!(
            Id::from_async_reader(&mut reader).await,
            Err(Error::UnsupportedVersion)
        ));
    }

    #[test]
    fn keeps_the_comment_in_the_line() {
        let id = Id::v2("skiff_0.1.0", Some("testing"));

        assert_eq!(id.as_str(), "SSH-2.0-skiff_0.1.0 testing");
    }
}
