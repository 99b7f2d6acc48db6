//! Record Marking Standard for RPC over TCP (RFC 5531 section 11).
//!
//! A record is one or more fragments, each prefixed with a 4-byte big-endian
//! header whose high bit flags the last fragment and whose low 31 bits carry
//! the fragment length, header excluded.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::protocol::xdr::RECORD_MARK_LEN;

/// Largest length a record mark can express.
pub const MAX_FRAGMENT_SIZE: usize = (1 << 31) - 1;

const LAST_FRAGMENT: u32 = 1 << 31;

fn fragment_header(length: usize, is_last: bool) -> [u8; RECORD_MARK_LEN] {
    let length = length as u32;
    u32::to_be_bytes(if is_last { length | LAST_FRAGMENT } else { length })
}

/// Reads a single record-marked fragment and appends it to `append_to`.
///
/// Returns true if this was the last fragment of the record. A stream that
/// ends inside a fragment is an `UnexpectedEof` error.
async fn read_fragment<S: AsyncRead + Unpin>(
    socket: &mut S,
    append_to: &mut Vec<u8>,
    max_record_len: usize,
) -> io::Result<bool> {
    let mut header_buf = [0_u8; RECORD_MARK_LEN];
    socket.read_exact(&mut header_buf).await?;
    let fragment_header = u32::from_be_bytes(header_buf);
    let is_last = (fragment_header & LAST_FRAGMENT) > 0;
    let length = (fragment_header & !LAST_FRAGMENT) as usize;
    trace!("Reading fragment length:{}, last:{}", length, is_last);
    if append_to.len().saturating_add(length) > max_record_len {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("RPC record length exceeds max {max_record_len}"),
        ));
    }
    let start_offset = append_to.len();
    append_to.resize(start_offset + length, 0);
    socket.read_exact(&mut append_to[start_offset..]).await?;
    Ok(is_last)
}

/// Reads fragments until the last one and returns the reassembled record.
pub async fn read_record<S: AsyncRead + Unpin>(
    socket: &mut S,
    max_record_len: usize,
) -> io::Result<Vec<u8>> {
    let mut record = Vec::new();
    while !read_fragment(socket, &mut record, max_record_len).await? {}
    trace!("Finished reading record length:{}", record.len());
    Ok(record)
}

/// Writes `record` as fragments of at most `max_fragment` payload bytes.
///
/// The first [`RECORD_MARK_LEN`] bytes of `record` are a reserved slot, not
/// payload: the first mark is written there in place so the leading chunk
/// goes out without a copy. Later fragments get a separate header write.
/// An empty payload still produces one (empty, last) fragment.
pub async fn write_record<S: AsyncWrite + Unpin>(
    socket: &mut S,
    record: &mut [u8],
    max_fragment: usize,
) -> io::Result<()> {
    if record.len() < RECORD_MARK_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "record is missing its record mark slot",
        ));
    }
    let max_fragment = max_fragment.clamp(1, MAX_FRAGMENT_SIZE);
    let payload_len = record.len() - RECORD_MARK_LEN;

    let first = payload_len.min(max_fragment);
    let is_last = first == payload_len;
    record[..RECORD_MARK_LEN].copy_from_slice(&fragment_header(first, is_last));
    trace!("Writing fragment length:{}, last:{}", first, is_last);
    socket.write_all(&record[..RECORD_MARK_LEN + first]).await?;

    let mut offset = RECORD_MARK_LEN + first;
    while offset < record.len() {
        let fragment_size = (record.len() - offset).min(max_fragment);
        let is_last = offset + fragment_size == record.len();
        trace!("Writing fragment length:{}, last:{}", fragment_size, is_last);
        socket.write_all(&fragment_header(fragment_size, is_last)).await?;
        socket.write_all(&record[offset..offset + fragment_size]).await?;
        offset += fragment_size;
    }

    socket.flush().await
}
