// CLASSIFICATION: COMMUNITY
// Filename: mod.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-18

//! Image builders and storage wrappers shared by the integration tests.

#![allow(dead_code)]

use std::io::{self, Read, Seek, SeekFrom};

use tgrub::bootloader::multiboot::header_bytes;
use tgrub::bootloader::storage::{BootFile, MemStorage, Storage};
use tgrub::BootError;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn put32(b: &mut [u8], at: usize, v: u32) {
    b[at..at + 4].copy_from_slice(&v.to_le_bytes());
}

fn put16(b: &mut [u8], at: usize, v: u16) {
    b[at..at + 2].copy_from_slice(&v.to_le_bytes());
}

/// i386 executable: one PT_LOAD of `body` at `addr` (memsz `memsz`),
/// followed by one 16-byte unallocated section when `with_sections`.
pub fn elf_kernel(addr: u32, body: &[u8], memsz: u32, with_sections: bool) -> Vec<u8> {
    let mut b = vec![0u8; 0x100];
    b[..4].copy_from_slice(&[0x7F, b'E', b'L', b'F']);
    b[4] = 1;
    b[5] = 1;
    b[6] = 1;
    put16(&mut b, 16, 2);
    put16(&mut b, 18, 3);
    put32(&mut b, 20, 1);
    put32(&mut b, 24, addr);
    put32(&mut b, 28, 52);
    put16(&mut b, 40, 52);
    put16(&mut b, 42, 32);
    put16(&mut b, 44, 1);
    put16(&mut b, 46, 40);

    put32(&mut b, 52, 1);
    put32(&mut b, 56, 0x100);
    put32(&mut b, 60, addr);
    put32(&mut b, 64, addr);
    put32(&mut b, 68, body.len() as u32);
    put32(&mut b, 72, memsz);
    b.extend_from_slice(body);

    if with_sections {
        let sym_off = b.len();
        b.extend_from_slice(&[0xAB; 16]);
        let shoff = b.len();
        b.resize(shoff + 80, 0);
        let s1 = shoff + 40;
        put32(&mut b, s1 + 16, sym_off as u32);
        put32(&mut b, s1 + 20, 16);
        put32(&mut b, s1 + 32, 4);
        put32(&mut b, 32, shoff as u32);
        put16(&mut b, 48, 2);
    }
    b
}

/// OMAGIC a.out loading at `entry`: `text` and `data` bytes, a `bss` size,
/// then `syms` symbol bytes and a string table whose size word is `strsize`.
pub fn aout_kernel(entry: u32, text: usize, data: usize, bss: u32, syms: usize, strsize: u32) -> Vec<u8> {
    let mut b = vec![0u8; 32];
    let fields = [0o407, text as u32, data as u32, bss, syms as u32, entry, 0, 0];
    for (i, f) in fields.iter().enumerate() {
        put32(&mut b, i * 4, *f);
    }
    b.extend(std::iter::repeat(0x7Eu8).take(text));
    b.extend(std::iter::repeat(0xDAu8).take(data));
    b.extend(std::iter::repeat(0x5Bu8).take(syms));
    b.extend_from_slice(&strsize.to_le_bytes());
    b.extend(std::iter::repeat(b's').take(strsize.saturating_sub(4) as usize));
    b
}

/// Place a Multiboot header triple at `offset`, growing the image as needed.
pub fn with_multiboot_header(mut img: Vec<u8>, offset: usize, flags: u32) -> Vec<u8> {
    if img.len() < offset + 12 {
        img.resize(offset + 12, 0);
    }
    img[offset..offset + 12].copy_from_slice(&header_bytes(flags));
    img
}

/// bzImage with `setup_sects` setup sectors and a `body_len` protected-mode part.
pub fn bzimage(version: u16, setup_sects: u8, body_len: usize) -> Vec<u8> {
    let setup_len = (usize::from(setup_sects) + 1) * 512;
    let mut b = vec![0u8; setup_len];
    b[0x1F1] = setup_sects;
    put16(&mut b, 0x1FE, 0xAA55);
    put32(&mut b, 0x202, 0x5372_6448);
    put16(&mut b, 0x206, version);
    b[0x211] = 0x01;
    put32(&mut b, 0x22C, 0x37FF_FFFF);
    b.extend((0..body_len).map(|i| (i % 251) as u8));
    b
}

/// File handle that returns at most `chunk` bytes per read.
pub struct ChunkedFile {
    inner: Box<dyn BootFile>,
    chunk: usize,
}

impl Read for ChunkedFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.chunk);
        self.inner.read(&mut buf[..n])
    }
}

impl Seek for ChunkedFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

impl BootFile for ChunkedFile {
    fn size(&self) -> u64 {
        self.inner.size()
    }
}

/// [`MemStorage`] whose files deliver short reads.
pub struct ChunkedStorage {
    pub inner: MemStorage,
    pub chunk: usize,
}

impl Storage for ChunkedStorage {
    fn open(&self, path: &str) -> Result<Box<dyn BootFile>, BootError> {
        Ok(Box::new(ChunkedFile {
            inner: self.inner.open(path)?,
            chunk: self.chunk,
        }))
    }
}

/// Single-file storage helper.
pub fn one_file(path: &str, data: Vec<u8>) -> MemStorage {
    MemStorage::new().with_file(path, data)
}

