//! Length-prefixed frame encoding over a byte stream.
//!
//! Wire format:
//! ```text
//! +----------------------+---------------------------+
//! | length (u32 BE, 4 B) | payload (length bytes)    |
//! +----------------------+---------------------------+
//! ```
//!
//! The payload is opaque to this layer. A zero length is never valid, and a
//! length above the caller's `max_size` is rejected before any buffer is
//! sized from it. No state persists between calls.

use std::io::{self, Read, Write};

use tracing::{debug, trace};

use super::error::{NetworkError, NetworkResult};
use crate::core::{FRAME_HEADER_SIZE, MAX_ZERO_WRITE_RETRIES};

/// Write one frame: the big-endian length prefix, then the payload.
///
/// Short writes are continued until every byte is out. `Interrupted` is
/// retried, and a write that reports zero bytes without an error is treated
/// as transient and retried up to [`MAX_ZERO_WRITE_RETRIES`] times in a row.
///
/// # Errors
/// - [`NetworkError::InvalidFrameSize`] if `payload` is empty or does not fit
///   in a `u32` length; nothing is written in that case.
/// - [`NetworkError::Timeout`] / [`NetworkError::Io`] on socket failure.
pub fn write_frame<W: Write + ?Sized>(writer: &mut W, payload: &[u8]) -> NetworkResult<()> {
    let max = u32::MAX as usize;
    if payload.is_empty() || payload.len() > max {
        return Err(NetworkError::InvalidFrameSize {
            size: payload.len(),
            max,
        });
    }

    let header = (payload.len() as u32).to_be_bytes();
    write_all_retrying(writer, &header)?;
    write_all_retrying(writer, payload)?;
    writer.flush().map_err(NetworkError::from_io)?;

    trace!(len = payload.len(), "frame written");
    Ok(())
}

/// Read one frame and return its payload.
///
/// # Errors
/// - [`NetworkError::ConnectionClosed`] if the stream ends before the header
///   or the payload is complete.
/// - [`NetworkError::InvalidFrameSize`] if the advertised length is zero or
///   exceeds `max_size`.
/// - [`NetworkError::Timeout`] / [`NetworkError::Io`] on socket failure.
pub fn read_frame<R: Read + ?Sized>(reader: &mut R, max_size: usize) -> NetworkResult<Vec<u8>> {
    let mut header = [0u8; FRAME_HEADER_SIZE];
    read_exact_or_closed(reader, &mut header)?;

    let size = u32::from_be_bytes(header) as usize;
    if size == 0 || size > max_size {
        debug!(size, max_size, "rejecting frame length");
        return Err(NetworkError::InvalidFrameSize {
            size,
            max: max_size,
        });
    }

    let mut payload = vec![0u8; size];
    read_exact_or_closed(reader, &mut payload)?;

    trace!(len = size, "frame read");
    Ok(payload)
}

/// Write every byte of `buf`, continuing after short writes.
fn write_all_retrying<W: Write + ?Sized>(writer: &mut W, mut buf: &[u8]) -> NetworkResult<()> {
    let mut zero_writes = 0u32;

    while !buf.is_empty() {
        match writer.write(buf) {
            Ok(0) => {
                zero_writes += 1;
                if zero_writes > MAX_ZERO_WRITE_RETRIES {
                    return Err(NetworkError::Io(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "socket repeatedly accepted zero bytes",
                    )));
                }
                std::thread::yield_now();
            }
            Ok(n) => {
                zero_writes = 0;
                buf = &buf[n..];
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(NetworkError::from_io(e)),
        }
    }

    Ok(())
}

/// Fill `buf` completely; EOF before that is [`NetworkError::ConnectionClosed`].
fn read_exact_or_closed<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> NetworkResult<()> {
    let mut filled = 0;

    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => return Err(NetworkError::ConnectionClosed),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(NetworkError::from_io(e)),
        }
    }

    Ok(())
}
