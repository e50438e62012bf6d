//! In-place prefix editing on seekable byte buffers.
//!
//! Google Docs exported as `text/plain` start with a UTF-8 byte-order mark.
//! These routines add or strip such a prefix without materialising a second
//! copy of the content: data is shifted one block at a time through
//! seek/read/write, and the tail is cut with [`Truncate`].
//!
//! Both functions work on anything that is `Read + Write + Seek + Truncate`:
//! an in-memory `Cursor<Vec<u8>>`, a `Cursor<&mut Vec<u8>>` or a
//! `std::fs::File`. They rewind the buffer to position 0 before returning.

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

use log::debug;

/// Default number of bytes moved per step.
pub const BLOCK_SIZE: usize = 1024;

/// UTF-8 encoding of U+FEFF.
pub const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Buffers whose length can be cut down in place.
pub trait Truncate {
    /// Set the logical length of the buffer to `len` bytes.
    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl Truncate for Cursor<Vec<u8>> {
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        let len = to_usize(len)?;
        self.get_mut().truncate(len);
        Ok(())
    }
}

impl Truncate for Cursor<&mut Vec<u8>> {
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        let len = to_usize(len)?;
        self.get_mut().truncate(len);
        Ok(())
    }
}

impl Truncate for std::fs::File {
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

impl<T: Truncate + ?Sized> Truncate for &mut T {
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        (**self).truncate(len)
    }
}

fn to_usize(len: u64) -> io::Result<usize> {
    usize::try_from(len)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "length exceeds usize"))
}

fn check_block_size(block_size: usize) -> io::Result<()> {
    if block_size == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "block size must be positive",
        ));
    }
    Ok(())
}

/// Read up to `len` bytes, stopping early only at end of data.
fn read_block<R: Read>(reader: &mut R, len: usize) -> io::Result<Vec<u8>> {
    let mut block = Vec::with_capacity(len);
    reader.by_ref().take(len as u64).read_to_end(&mut block)?;
    Ok(block)
}

/// Strip `prefix` from the start of `buf` if it is there.
///
/// Returns `Ok(false)` and leaves the content untouched when the buffer does
/// not start with `prefix` (this includes buffers shorter than the prefix and
/// an empty prefix). On a match the remaining bytes are shifted left one
/// block at a time and the buffer is truncated to its new length.
pub fn remove_prefix<F>(buf: &mut F, prefix: &[u8], block_size: usize) -> io::Result<bool>
where
    F: Read + Write + Seek + Truncate,
{
    check_block_size(block_size)?;
    buf.seek(SeekFrom::Start(0))?;

    if prefix.is_empty() || read_block(buf, prefix.len())? != prefix {
        buf.seek(SeekFrom::Start(0))?;
        return Ok(false);
    }

    let shift = prefix.len() as u64;
    let mut read_at = shift;
    let mut write_at = 0u64;

    loop {
        buf.seek(SeekFrom::Start(read_at))?;
        let block = read_block(buf, block_size)?;
        if block.is_empty() {
            break;
        }
        buf.seek(SeekFrom::Start(write_at))?;
        buf.write_all(&block)?;

        read_at += block.len() as u64;
        write_at += block.len() as u64;
    }

    buf.truncate(read_at - shift)?;
    buf.seek(SeekFrom::Start(0))?;
    debug!("Removed {}-byte prefix, {} bytes remain", shift, read_at - shift);
    Ok(true)
}

/// Insert `prefix` at the start of `buf`, shifting the content right.
///
/// Two blocks are held in memory so that writing a block never clobbers
/// bytes that have not been read yet. That only holds while the prefix fits
/// in one block, so the effective block size is raised to the prefix length
/// when needed; the result does not depend on `block_size`.
pub fn insert_prefix<F>(buf: &mut F, prefix: &[u8], block_size: usize) -> io::Result<()>
where
    F: Read + Write + Seek + Truncate,
{
    check_block_size(block_size)?;
    let block_size = block_size.max(prefix.len());
    let step = block_size as u64;

    buf.seek(SeekFrom::Start(0))?;
    let mut first = read_block(buf, block_size)?;
    let mut second = read_block(buf, block_size)?;
    let mut read_at = 2 * step;

    buf.seek(SeekFrom::Start(0))?;
    buf.write_all(prefix)?;
    let mut write_at = prefix.len() as u64;

    // Every block but the last is full, so the write cursor moves by `step`.
    while !first.is_empty() {
        buf.seek(SeekFrom::Start(write_at))?;
        buf.write_all(&first)?;
        write_at += step;

        first = std::mem::take(&mut second);

        buf.seek(SeekFrom::Start(read_at))?;
        second = read_block(buf, block_size)?;
        read_at += step;
    }

    buf.seek(SeekFrom::Start(0))?;
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
