//! Re-assembly of length-prefixed SFTP records out of the channel's
//! arbitrary `SSH_MSG_CHANNEL_DATA` fragmentation.

use crate::{Error, Result};

/// Hard upper bound on a single record, far above any data block
/// the negotiated channel packet size allows.
const MAX_RECORD_LENGTH: usize = 2 * 1024 * 1024;

/// A streaming accumulator turning byte fragments into whole
/// `u32 length || body` records.
#[derive(Debug, Default)]
pub(crate) struct Chunker {
    buf: Vec<u8>,
}

impl Chunker {
    /// Feed one fragment of channel data.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pop the next complete record body, `None` until one is whole.
    pub fn next(&mut self) -> Result<Option<Vec<u8>>> {
        if self.buf.len() < 4 {
            return Ok(None);
        }

        let length = u32::from_be_bytes(self.buf[..4].try_into().expect("sliced 4 bytes")) as usize;
        if length == 0 || length > MAX_RECORD_LENGTH {
            return Err(Error::BadMessage);
        }

        if self.buf.len() < 4 + length {
            return Ok(None);
        }

        let record = self.buf[4..4 + length].to_vec();
        self.buf.drain(..4 + length);

        Ok(Some(record))
    }
}
