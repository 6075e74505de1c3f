// CLASSIFICATION: COMMUNITY
// Filename: sha1.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-10-18
//
// ─────────────────────────────────────────────────────────────
// Streaming FIPS-180-1 SHA1
//
// The measurement chain of the trust anchor is defined over SHA1,
// so the loader carries its own engine rather than a SHA-2 crate.
// Partial blocks are buffered across `update` calls; the digest
// does not depend on how the input is chunked.
//
// A zero-length `update` is rejected with `BootError::EmptyChunk`.
// Callers (the file hasher, the extend rule) never issue one.
//
// # Public API
// * [`Sha1`]        – streaming context
// * [`Sha1Digest`]  – five-word result, big-endian byte view
// * [`sha1`]        – one-shot helper
// ─────────────────────────────────────────────────────────────

use std::fmt;

use crate::error::BootError;

const IV: [u32; 5] = [0x6745_2301, 0xEFCD_AB89, 0x98BA_DCFE, 0x1032_5476, 0xC3D2_E1F0];
const BLOCK: usize = 64;

/// Padding source: a single `0x80` followed by zeros.
const PADDING: [u8; BLOCK] = {
    let mut p = [0u8; BLOCK];
    p[0] = 0x80;
    p
};

/// Finalised SHA1 value as five 32-bit words.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sha1Digest(pub [u32; 5]);

impl Sha1Digest {
    /// Big-endian byte serialisation, as sent to the trust anchor.
    pub fn to_bytes(&self) -> [u8; 20] {
        let mut out = [0u8; 20];
        for (chunk, word) in out.chunks_exact_mut(4).zip(self.0.iter()) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }
        out
    }

    /// Rebuild the words from a 20-byte big-endian value.
    pub fn from_bytes(bytes: &[u8; 20]) -> Self {
        let mut words = [0u32; 5];
        for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(4)) {
            *word = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Sha1Digest(words)
    }

    /// 40 lowercase hex characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

impl fmt::Display for Sha1Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Sha1Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha1Digest({})", self.to_hex())
    }
}

/// Streaming SHA1 context.
///
/// Between calls `buffer` holds exactly `total_bytes % 64` pending bytes.
#[derive(Clone)]
pub struct Sha1 {
    state: [u32; 5],
    buffer: [u8; BLOCK],
    total_bytes: u64,
}

impl Default for Sha1 {
    fn default() -> Self {
        Self::new()
    }
}

impl Sha1 {
    /// Fresh context initialised to the FIPS-180-1 IV.
    pub fn new() -> Self {
        Self {
            state: IV,
            buffer: [0u8; BLOCK],
            total_bytes: 0,
        }
    }

    /// Bytes consumed so far.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Absorb `chunk`. Empty chunks are an error.
    pub fn update(&mut self, chunk: &[u8]) -> Result<(), BootError> {
        if chunk.is_empty() {
            return Err(BootError::EmptyChunk);
        }
        self.absorb(chunk);
        Ok(())
    }

    fn absorb(&mut self, mut data: &[u8]) {
        let left = (self.total_bytes % BLOCK as u64) as usize;
        self.total_bytes = self.total_bytes.wrapping_add(data.len() as u64);

        let mut left = left;
        if left > 0 {
            let fill = BLOCK - left;
            if data.len() < fill {
                self.buffer[left..left + data.len()].copy_from_slice(data);
                return;
            }
            self.buffer[left..].copy_from_slice(&data[..fill]);
            let block = self.buffer;
            self.compress(&block);
            data = &data[fill..];
            left = 0;
        }

        let mut blocks = data.chunks_exact(BLOCK);
        for block in &mut blocks {
            let mut b = [0u8; BLOCK];
            b.copy_from_slice(block);
            self.compress(&b);
        }
        let rest = blocks.remainder();
        self.buffer[left..left + rest.len()].copy_from_slice(rest);
    }

    /// Pad, append the bit length and return the digest.
    pub fn finish(mut self) -> Sha1Digest {
        let bit_len = self.total_bytes.wrapping_mul(8);
        let last = (self.total_bytes % BLOCK as u64) as usize;
        let padn = if last < 56 { 56 - last } else { 120 - last };
        self.absorb(&PADDING[..padn]);
        self.absorb(&bit_len.to_be_bytes());
        Sha1Digest(self.state)
    }

    fn compress(&mut self, block: &[u8; BLOCK]) {
        let mut w = [0u32; 80];
        for (i, chunk) in block.chunks_exact(4).enumerate() {
            w[i] = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        for t in 16..80 {
            w[t] = (w[t - 3] ^ w[t - 8] ^ w[t - 14] ^ w[t - 16]).rotate_left(1);
        }

        let [mut a, mut b, mut c, mut d, mut e] = self.state;
        for (t, wt) in w.iter().enumerate() {
            let (f, k) = match t {
                0..=19 => (d ^ (b & (c ^ d)), 0x5A82_7999),
                20..=39 => (b ^ c ^ d, 0x6ED9_EBA1),
                40..=59 => ((b & c) | (d & (b | c)), 0x8F1B_BCDC),
                _ => (b ^ c ^ d, 0xCA62_C1D6),
            };
            let temp = a
                .rotate_left(5)
                .wrapping_add(f)
                .wrapping_add(e)
                .wrapping_add(k)
                .wrapping_add(*wt);
            e = d;
            d = c;
            c = b.rotate_left(30);
            b = a;
            a = temp;
        }

        self.state[0] = self.state[0].wrapping_add(a);
        self.state[1] = self.state[1].wrapping_add(b);
        self.state[2] = self.state[2].wrapping_add(c);
        self.state[3] = self.state[3].wrapping_add(d);
        self.state[4] = self.state[4].wrapping_add(e);
    }
}

/// One-shot SHA1 of `data`; empty input yields the digest of the empty string.
pub fn sha1(data: &[u8]) -> Sha1Digest {
    let mut ctx = Sha1::new();
    if !data.is_empty() {
        ctx.absorb(data);
    }
    ctx.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fips_vectors() {
        assert_eq!(sha1(b"abc").to_hex(), "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert_eq!(
            sha1(b"abcdbcdecdefdefgefghfghighijhijkijkljklmklmnlmnomnopnopq").to_hex(),
            "84983e441c3bd26ebaae4aa1f95129e5e54670f1"
        );
        assert_eq!(sha1(b"").to_hex(), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    }

    #[test]
    fn million_a() {
        let mut ctx = Sha1::new();
        let block = [b'a'; 1000];
        for _ in 0..1000 {
            ctx.update(&block).unwrap();
        }
        assert_eq!(ctx.finish().to_hex(), "34aa973cd4c4daa4f61eeb2bdbad27316534016f");
    }

    #[test]
    fn chunking_does_not_change_digest() {
        let data: Vec<u8> = (0..1000u32).map(|i| (i * 7 + 3) as u8).collect();
        let expected = sha1(&data);
        for step in [1usize, 3, 55, 56, 63, 64, 65, 127, 999] {
            let mut ctx = Sha1::new();
            for chunk in data.chunks(step) {
                ctx.update(chunk).unwrap();
            }
            assert_eq!(ctx.total_bytes(), data.len() as u64);
            assert_eq!(ctx.finish(), expected, "step {step}");
        }
    }

    #[test]
    fn zero_length_update_is_rejected() {
        let mut ctx = Sha1::new();
        ctx.update(b"ab").unwrap();
        assert!(matches!(ctx.update(&[]), Err(BootError::EmptyChunk)));
        // Rejected call leaves the context untouched.
        ctx.update(b"c").unwrap();
        assert_eq!(ctx.finish(), sha1(b"abc"));
    }

    #[test]
    fn hello_digest_matches_manifest_sample() {
        assert_eq!(sha1(b"hello").to_hex(), "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d");
        let d = sha1(b"hello");
        assert_eq!(Sha1Digest::from_bytes(&d.to_bytes()), d);
    }
}
