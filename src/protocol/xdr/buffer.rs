//! Growable XDR buffer with an explicit read cursor.
//!
//! A call is built in a buffer that keeps [`RECORD_MARK_LEN`] bytes free at
//! offset 0, so the transport can drop the first record mark in place instead
//! of copying the payload. A reply buffer starts at the first byte of the
//! reply message. Each buffer belongs to exactly one call or reply.

use std::io::{self, Read, Write};

use super::{deserialize, utils, Deserialize, Serialize};
use crate::error::{Error, Result};

/// Size of the record mark that prefixes every TCP record.
pub const RECORD_MARK_LEN: usize = 4;

#[derive(Clone, Debug, Default)]
pub struct XdrBuffer {
    data: Vec<u8>,
    pos: usize,
}

impl XdrBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// An outbound buffer with the record mark slot already reserved.
    pub fn for_record() -> Self {
        Self { data: vec![0; RECORD_MARK_LEN], pos: RECORD_MARK_LEN }
    }

    /// Wraps received bytes for decoding from the start.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }

    /// Total number of bytes held, including any reserved record mark.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Bytes that have not been decoded yet.
    pub fn unread(&self) -> &[u8] {
        &self.data[self.pos.min(self.data.len())..]
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    pub fn encode_int32(&mut self, v: i32) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    pub fn decode_int32(&mut self) -> Result<i32> {
        self.decode::<i32>()
    }

    pub fn encode_uint32(&mut self, v: u32) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    pub fn decode_uint32(&mut self) -> Result<u32> {
        self.decode::<u32>()
    }

    /// Fixed-length opaque data, padded to the next four byte boundary.
    pub fn encode_opaque(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
        self.data.resize(self.data.len() + utils::padding_len(bytes.len()), 0);
    }

    pub fn decode_opaque(&mut self, len: usize) -> Result<Vec<u8>> {
        let padded = len + utils::padding_len(len);
        if self.remaining() < padded {
            return Err(Error::MalformedReply(format!(
                "need {padded} bytes of opaque data, {} left",
                self.remaining()
            )));
        }
        let bytes = self.data[self.pos..self.pos + len].to_vec();
        self.pos += padded;
        Ok(bytes)
    }

    /// Counted bytes: length word, data, padding.
    pub fn encode_counted_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.encode(bytes)
    }

    pub fn decode_counted_bytes(&mut self) -> Result<Vec<u8>> {
        self.decode::<Vec<u8>>()
    }

    pub fn encode_string(&mut self, s: &str) -> Result<()> {
        self.encode(s)
    }

    pub fn decode_string(&mut self) -> Result<String> {
        self.decode::<String>()
    }

    /// Appends any XDR value.
    pub fn encode<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        value
            .serialize(&mut self.data)
            .map_err(|e| Error::InvalidArgument(format!("cannot encode value: {e}")))
    }

    /// Reads any XDR value at the cursor; running off the end is a malformed reply.
    pub fn decode<T: Deserialize + Default>(&mut self) -> Result<T> {
        deserialize::<T>(self).map_err(Error::malformed)
    }
}

impl Read for XdrBuffer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let unread = self.unread();
        let n = unread.len().min(buf.len());
        buf[..n].copy_from_slice(&unread[..n]);
        self.pos += n;
        Ok(n)
    }
}

/// Writes always append at the end, independent of the read cursor.
impl Write for XdrBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_buffer_reserves_mark() {
        let mut buf = XdrBuffer::for_record();
        buf.encode_uint32(7);
        assert_eq!(buf.len(), RECORD_MARK_LEN + 4);
        assert_eq!(&buf.as_bytes()[RECORD_MARK_LEN..], &[0, 0, 0, 7]);
    }

    #[test]
    fn decoding_past_end_is_malformed() {
        let mut buf = XdrBuffer::from_bytes(vec![0, 0, 0]);
        assert!(matches!(buf.decode_uint32(), Err(Error::MalformedReply(_))));

        let mut buf = XdrBuffer::from_bytes(vec![0, 0, 0, 9, 1, 2]);
        assert!(matches!(buf.decode_counted_bytes(), Err(Error::MalformedReply(_))));
    }

    #[test]
    fn opaque_is_padded() {
        let mut buf = XdrBuffer::new();
        buf.encode_opaque(&[1, 2, 3, 4, 5]);
        buf.encode_int32(-2);
        assert_eq!(buf.len(), 12);

        assert_eq!(buf.decode_opaque(5).unwrap(), vec![1, 2, 3, 4, 5]);
        assert_eq!(buf.decode_int32().unwrap(), -2);
        assert_eq!(buf.remaining(), 0);
    }
}
