//! Primitives to encode and decode the binary field types of the
//! SSH wire format: fixed-width integers, `boolean`, `string`,
//! `mpint` and `name-list`.

use crate::{Error, Result};

mod namelist;
pub use namelist::NameList;

/// A bounds-checked cursor over a borrowed byte buffer.
///
/// Every read consumes from the front and fails with
/// [`Error::MalformedField`] on truncation, never panicking.
pub struct Reader<'b> {
    buf: &'b [u8],
}

impl<'b> Reader<'b> {
    /// Create a new [`Reader`] over the provided buffer.
    pub fn new(buf: &'b [u8]) -> Self {
        Self { buf }
    }

    /// The bytes that have not been consumed yet.
    pub fn remaining(&self) -> &'b [u8] {
        self.buf
    }

    /// Whether the whole buffer has been consumed.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consume exactly `n` bytes.
    pub fn take(&mut self, n: usize) -> Result<&'b [u8]> {
        if self.buf.len() < n {
            return Err(Error::MalformedField);
        }

        let (taken, rest) = self.buf.split_at(n);
        self.buf = rest;

        Ok(taken)
    }

    /// Consume a fixed-size array, such as the 16-byte kex cookie.
    pub fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.take(N)?
            .try_into()
            .map_err(|_| Error::MalformedField)
    }

    /// Consume a single byte.
    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Consume a big-endian `uint32`.
    pub fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    /// Consume a big-endian `uint64`.
    pub fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    /// Consume a `boolean`, where any non-zero byte reads as `true`.
    pub fn bool(&mut self) -> Result<bool> {
        Ok(self.u8()? != 0)
    }

    /// Consume a length-prefixed `string`, returning its raw bytes.
    pub fn string(&mut self) -> Result<&'b [u8]> {
        let len = self.u32()? as usize;

        self.take(len)
    }

    /// Consume a `string` that is required to be valid UTF-8.
    pub fn utf8(&mut self) -> Result<&'b str> {
        std::str::from_utf8(self.string()?).map_err(|_| Error::MalformedField)
    }

    /// Consume an `mpint`, returning the big-endian magnitude with
    /// the sign byte and any redundant leading zeroes stripped.
    ///
    /// Negative values do not occur in the protocol and are rejected.
    pub fn mpint(&mut self) -> Result<&'b [u8]> {
        let body = self.string()?;

        if body.first().is_some_and(|byte| byte & 0x80 != 0) {
            return Err(Error::MalformedField);
        }

        let zeroes = body.iter().take_while(|byte| **byte == 0).count();

        Ok(&body[zeroes..])
    }

    /// Consume a `name-list`: comma-separated names inside a `string`,
    /// required to be printable ASCII.
    pub fn name_list(&mut self) -> Result<NameList> {
        NameList::decode(self.string()?)
    }
}

/// A growable buffer assembling the binary field types back to back.
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    /// Create a new, empty [`Writer`].
    pub fn new() -> Self {
        Self::default()
    }

    /// The amount of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing was written yet.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Append raw bytes, without a length prefix.
    pub fn raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Append a single byte.
    pub fn u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    /// Append a big-endian `uint32`.
    pub fn u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Append a big-endian `uint64`.
    pub fn u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Append a `boolean`.
    pub fn bool(&mut self, value: bool) {
        self.buf.push(value.into());
    }

    /// Append a length-prefixed `string`.
    pub fn string(&mut self, bytes: &[u8]) {
        self.u32(bytes.len() as u32);
        self.buf.extend_from_slice(bytes);
    }

    /// Append an `mpint` from an unsigned big-endian magnitude.
    ///
    /// The encoding is canonical: leading zeroes are stripped, and a
    /// single `0x00` is prepended when the high bit of the leading
    /// byte is set, so the value stays positive. Zero encodes as the
    /// empty string.
    pub fn mpint(&mut self, magnitude: &[u8]) {
        let zeroes = magnitude.iter().take_while(|byte| **byte == 0).count();
        let magnitude = &magnitude[zeroes..];

        let sign = magnitude.first().is_some_and(|byte| byte & 0x80 != 0);

        self.u32((magnitude.len() + usize::from(sign)) as u32);
        if sign {
            self.buf.push(0);
        }
        self.buf.extend_from_slice(magnitude);
    }

    /// Append a `name-list`.
    pub fn name_list(&mut self, list: &NameList) {
        self.string(list.to_string().as_bytes());
    }

    /// Finish the buffer and return the written bytes.
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[rstest]
    #[case(&[], &[0, 0, 0, 0])]
    #[case(&[0x7f], &[0, 0, 0, 1, 0x7f])]
    #[case(&[0x80], &[0, 0, 0, 2, 0x00, 0x80])]
    #[case(&[0x00, 0x00, 0x01], &[0, 0, 0, 1, 0x01])]
    #[case(&[0x00, 0x80], &[0, 0, 0, 2, 0x00, 0x80])]
    fn mpint_is_canonical(#[case] magnitude: &[u8], #[case] expected: &[u8]) {
        let mut writer = Writer::new();
        writer.mpint(magnitude);

        assert_eq!(writer.finish(), expected);
    }

    #[rstest]
    #[case(&[0x01])]
    #[case(&[0x80, 0x00])]
    #[case(&[0xff; 33])]
    #[case(&[])]
    fn mpint_roundtrips(#[case] magnitude: &[u8]) {
        let mut writer = Writer::new();
        writer.mpint(magnitude);
        let encoded = writer.finish();

        // Canonical form never starts with two zero bytes.
        assert!(encoded.len() < 6 || encoded[4..6] != [0, 0]);

        let mut reader = Reader::new(&encoded);
        assert_eq!(reader.mpint().expect("decode"), magnitude);
        assert!(reader.is_empty());
    }

    #[test]
    fn mpint_rejects_negative() {
        let mut reader = Reader::new(&[0, 0, 0, 1, 0x80]);

        assert!(matches!(reader.mpint(), Err(Error::MalformedField)));
    }

    #[test]
    fn reads_are_bounds_checked() {
        let mut reader = Reader::new(&[0, 0, 0, 5, b'a']);
        assert!(matches!(reader.string(), Err(Error::MalformedField)));

        let mut reader = Reader::new(&[0, 0]);
        assert!(matches!(reader.u32(), Err(Error::MalformedField)));

        let mut reader = Reader::new(&[]);
        assert!(matches!(reader.u8(), Err(Error::MalformedField)));
    }

    #[test]
    fn strings_roundtrip() {
        let mut writer = Writer::new();
        writer.string(b"ssh-userauth");
        writer.bool(true);
        writer.u32(0xdead_beef);

        let buf = writer.finish();
        let mut reader = Reader::new(&buf);

        assert_eq!(reader.string().expect("string"), b"ssh-userauth");
        assert!(reader.bool().expect("bool"));
        assert_eq!(reader.u32().expect("u32"), 0xdead_beef);
        assert!(reader.is_empty());
    }
}
