// CLASSIFICATION: COMMUNITY
// Filename: file_hash.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-18

//! Streams a file through [`Sha1`] in fixed-size chunks.

use std::io::Read;

use crate::boot::sha1::{Sha1, Sha1Digest};
use crate::bootloader::storage::Storage;
use crate::error::BootError;

/// Hash everything `reader` yields, `chunk_size` bytes at a time.
///
/// Only the final chunk may be short; an empty tail is never handed to the
/// engine, so an empty file hashes to `SHA1("")`.
pub fn hash_reader<R: Read + ?Sized>(reader: &mut R, chunk_size: usize) -> Result<Sha1Digest, BootError> {
    let mut ctx = Sha1::new();
    let mut buf = vec![0u8; chunk_size.max(1)];
    loop {
        let n = read_full(reader, &mut buf)?;
        if n == 0 {
            break;
        }
        ctx.update(&buf[..n])?;
        if n < buf.len() {
            break;
        }
    }
    Ok(ctx.finish())
}

/// Open `path` through `storage` and hash it.
pub fn hash_file(storage: &dyn Storage, path: &str, chunk_size: usize) -> Result<Sha1Digest, BootError> {
    let mut file = storage.open(path)?;
    hash_reader(&mut file, chunk_size)
}

/// `sha1sum`-compatible line: 40 hex digits, two spaces, path, newline.
pub fn format_hash_line(digest: &Sha1Digest, path: &str) -> String {
    format!("{}  {}\n", digest.to_hex(), path)
}

/// Fill `buf` as far as the reader allows; returns bytes read (short only at EOF).
pub(crate) fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<usize, BootError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(BootError::Io(e)),
        }
    }
    Ok(filled)
}
