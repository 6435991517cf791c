//! The SFTP v3 message vocabulary: type numbers, status codes, open
//! flags and the attribute flag word, as defined in
//! `draft-ietf-secsh-filexfer-02`.

use bitflags::bitflags;

use skiff::wire::{Reader, Writer};

use crate::{Error, Result};

pub(crate) const INIT: u8 = 1;
pub(crate) const VERSION: u8 = 2;
pub(crate) const OPEN: u8 = 3;
pub(crate) const CLOSE: u8 = 4;
pub(crate) const READ: u8 = 5;
pub(crate) const WRITE: u8 = 6;
pub(crate) const LSTAT: u8 = 7;
pub(crate) const FSTAT: u8 = 8;
pub(crate) const SETSTAT: u8 = 9;
pub(crate) const FSETSTAT: u8 = 10;
pub(crate) const OPENDIR: u8 = 11;
pub(crate) const READDIR: u8 = 12;
pub(crate) const REMOVE: u8 = 13;
pub(crate) const MKDIR: u8 = 14;
pub(crate) const RMDIR: u8 = 15;
pub(crate) const REALPATH: u8 = 16;
pub(crate) const STAT: u8 = 17;
pub(crate) const RENAME: u8 = 18;

pub(crate) const STATUS: u8 = 101;
pub(crate) const HANDLE: u8 = 102;
pub(crate) const DATA: u8 = 103;
pub(crate) const NAME: u8 = 104;
pub(crate) const ATTRS: u8 = 105;

/// The SFTP protocol version this engine speaks.
pub(crate) const OUR_VERSION: u32 = 3;

/// The status codes of `SSH_FXP_STATUS` replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// `SSH_FX_OK`.
    Ok,

    /// `SSH_FX_EOF`.
    Eof,

    /// `SSH_FX_NO_SUCH_FILE`.
    NoSuchFile,

    /// `SSH_FX_PERMISSION_DENIED`.
    PermissionDenied,

    /// `SSH_FX_FAILURE`.
    Failure,

    /// `SSH_FX_BAD_MESSAGE`.
    BadMessage,

    /// `SSH_FX_NO_CONNECTION`.
    NoConnection,

    /// `SSH_FX_CONNECTION_LOST`.
    ConnectionLost,

    /// `SSH_FX_OP_UNSUPPORTED`.
    OpUnsupported,

    /// Any other status code, may be non-standard.
    Other(u32),
}

impl From<u32> for StatusCode {
    fn from(code: u32) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::Eof,
            2 => Self::NoSuchFile,
            3 => Self::PermissionDenied,
            4 => Self::Failure,
            5 => Self::BadMessage,
            6 => Self::NoConnection,
            7 => Self::ConnectionLost,
            8 => Self::OpUnsupported,
            code => Self::Other(code),
        }
    }
}

bitflags! {
    /// The `pflags` word of `SSH_FXP_OPEN`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        /// Open for reading.
        const READ = 0x0000_0001;

        /// Open for writing.
        const WRITE = 0x0000_0002;

        /// Writes append at the end of the file.
        const APPEND = 0x0000_0004;

        /// Create the file when missing.
        const CREATE = 0x0000_0008;

        /// Truncate an existing file.
        const TRUNCATE = 0x0000_0010;

        /// Fail when the file already exists.
        const EXCLUDE = 0x0000_0020;
    }
}

const ATTR_SIZE: u32 = 0x0000_0001;
const ATTR_UIDGID: u32 = 0x0000_0002;
const ATTR_PERMISSIONS: u32 = 0x0000_0004;
const ATTR_ACMODTIME: u32 = 0x0000_0008;
const ATTR_EXTENDED: u32 = 0x8000_0000;

/// The SFTP v3 file attributes, each field present only when its
/// flag is set in the leading flag word.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Attrs {
    /// File size, in bytes.
    pub size: Option<u64>,

    /// Owner and group identifiers.
    pub uid_gid: Option<(u32, u32)>,

    /// POSIX permission bits.
    pub permissions: Option<u32>,

    /// Access and modification times, in seconds since the epoch.
    pub times: Option<(u32, u32)>,

    /// Extension pairs, rarely present.
    pub extended: Vec<(String, Vec<u8>)>,
}

impl Attrs {
    /// An [`Attrs`] carrying only a size.
    pub fn with_size(size: u64) -> Self {
        Self {
            size: Some(size),
            ..Default::default()
        }
    }

    /// Append the flag word and the present fields.
    pub fn encode(&self, writer: &mut Writer) {
        let mut flags = 0u32;
        flags |= self.size.map_or(0, |_| ATTR_SIZE);
        flags |= self.uid_gid.map_or(0, |_| ATTR_UIDGID);
        flags |= self.permissions.map_or(0, |_| ATTR_PERMISSIONS);
        flags |= self.times.map_or(0, |_| ATTR_ACMODTIME);
        if !self.extended.is_empty() {
            flags |= ATTR_EXTENDED;
        }

        writer.u32(flags);

        if let Some(size) = self.size {
            writer.u64(size);
        }
        if let Some((uid, gid)) = self.uid_gid {
            writer.u32(uid);
            writer.u32(gid);
        }
        if let Some(permissions) = self.permissions {
            writer.u32(permissions);
        }
        if let Some((atime, mtime)) = self.times {
            writer.u32(atime);
            writer.u32(mtime);
        }
        if !self.extended.is_empty() {
            writer.u32(self.extended.len() as u32);
            for (name, data) in &self.extended {
                writer.string(name.as_bytes());
                writer.string(data);
            }
        }
    }

    /// Decode the flag word and the fields it announces.
    pub fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        let flags = reader.u32()?;

        let mut attrs = Self::default();

        if flags & ATTR_SIZE != 0 {
            attrs.size = Some(reader.u64()?);
        }
        if flags & ATTR_UIDGID != 0 {
            attrs.uid_gid = Some((reader.u32()?, reader.u32()?));
        }
        if flags & ATTR_PERMISSIONS != 0 {
            attrs.permissions = Some(reader.u32()?);
        }
        if flags & ATTR_ACMODTIME != 0 {
            attrs.times = Some((reader.u32()?, reader.u32()?));
        }
        if flags & ATTR_EXTENDED != 0 {
            let count = reader.u32()?;
            for _ in 0..count {
                let name = reader.utf8()?.to_owned();
                let data = reader.string()?.to_owned();

                attrs.extended.push((name, data));
            }
        }

        Ok(attrs)
    }
}

/// An opaque server-allocated handle for an open file or directory.
///
/// Handles are owned by the caller and must be closed exactly once;
/// [`crate::SftpClient::close`] consumes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handle(pub(crate) Vec<u8>);

/// One entry of an `SSH_FXP_NAME` reply.
#[derive(Debug, Clone)]
pub struct DirEntry {
    /// The bare file name.
    pub filename: String,

    /// The `ls -l`-styled long name.
    pub longname: String,

    /// The entry's attributes.
    pub attrs: Attrs,
}

impl DirEntry {
    pub(crate) fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            filename: reader.utf8()?.to_owned(),
            longname: reader.utf8()?.to_owned(),
            attrs: Attrs::decode(reader)?,
        })
    }
}

/// Map a non-`Ok` status into its error, `Eof` staying distinct for
/// the read paths.
pub(crate) fn status_error(code: StatusCode, message: String) -> Error {
    match code {
        StatusCode::ConnectionLost | StatusCode::NoConnection => Error::ConnectionLost,
        code => Error::Sftp { code, message },
    }
}
