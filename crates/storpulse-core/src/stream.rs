//! Helpers for the caller-supplied seekable byte stream.
//!
//! The schemes take any `Read + Seek`; large files are consumed
//! sequentially in [`DEFAULT_BUFFER_SIZE`] slices. Streams are borrowed
//! for the duration of a call and never retained.

use std::io::{Read, Seek, SeekFrom};

use crate::error::Result;

/// Buffer size for sequential reads.
pub const DEFAULT_BUFFER_SIZE: usize = 65536;

/// Secret key / seed length in bytes.
pub const DEFAULT_KEY_SIZE: usize = 32;

/// Total length of the stream in bytes, by seeking to the end.
///
/// Leaves the cursor at the end; callers reposition before reading.
///
/// # Errors
/// Propagates seek failures.
pub fn stream_len<F: Seek>(file: &mut F) -> Result<u64> {
    Ok(file.seek(SeekFrom::End(0))?)
}

/// Fill `buf` from the stream until it is full or EOF is hit; returns the
/// number of bytes read. Fewer than `buf.len()` bytes means EOF.
///
/// # Errors
/// Propagates read failures other than interruption.
pub fn read_up_to<F: Read + ?Sized>(file: &mut F, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
