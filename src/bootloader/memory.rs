// CLASSIFICATION: COMMUNITY
// Filename: memory.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-10-18

//! Physical memory seen by the loader.
//!
//! Design at a glance:
//! - Frames are 4 KiB and allocated lazily in a `BTreeMap`, so a machine
//!   with hundreds of MiB of RAM costs only what the loader touches.
//! - Every access is an explicit `(addr, len)` range checked against the
//!   memory map (`mem_lower` below 1 MiB, `mem_upper` above it). Out of
//!   range accesses return `BootError::WontFit` instead of writing.
//! - Frames never touched read back as zero.

use std::collections::BTreeMap;

use crate::error::BootError;

/// Frame granularity.
pub const PAGE_SIZE: u32 = 0x1000;
/// Start of extended memory.
pub const ONE_MB: u32 = 0x10_0000;

/// Round `addr` up to the next 4 KiB boundary.
pub fn align_4k(addr: u32) -> u32 {
    addr.wrapping_add(PAGE_SIZE - 1) & !(PAGE_SIZE - 1)
}

/// Sparse, bounds-checked physical address space.
#[derive(Debug, Clone)]
pub struct PhysicalMemory {
    mem_lower: u64,
    mem_upper: u64,
    frames: BTreeMap<u32, Box<[u8; PAGE_SIZE as usize]>>,
}

impl PhysicalMemory {
    /// Memory map in KiB, as reported by the BIOS.
    pub fn new(mem_lower_kb: u32, mem_upper_kb: u32) -> Self {
        Self {
            mem_lower: u64::from(mem_lower_kb) * 1024,
            mem_upper: u64::from(mem_upper_kb) * 1024,
            frames: BTreeMap::new(),
        }
    }

    /// Conventional memory size in bytes.
    pub fn lower_bytes(&self) -> u64 {
        self.mem_lower
    }

    /// First byte past extended memory.
    pub fn limit(&self) -> u64 {
        u64::from(ONE_MB) + self.mem_upper
    }

    /// Whether `[addr, addr+len)` is usable: above the first page and
    /// inside conventional or extended memory.
    pub fn fits(&self, addr: u32, len: u64) -> bool {
        let start = u64::from(addr);
        let end = start + len;
        if start < u64::from(PAGE_SIZE) || end > 1u64 << 32 {
            return false;
        }
        if start < u64::from(ONE_MB) {
            return end <= self.mem_lower;
        }
        end <= self.limit()
    }

    fn check(&self, addr: u32, len: u64) -> Result<(), BootError> {
        if self.fits(addr, len) {
            Ok(())
        } else {
            Err(BootError::WontFit)
        }
    }

    /// Copy `data` to `addr`.
    pub fn write(&mut self, addr: u32, data: &[u8]) -> Result<(), BootError> {
        self.check(addr, data.len() as u64)?;
        let mut offset = 0usize;
        while offset < data.len() {
            let at = addr + offset as u32;
            let page = at & !(PAGE_SIZE - 1);
            let in_page = (at - page) as usize;
            let n = (PAGE_SIZE as usize - in_page).min(data.len() - offset);
            let frame = self
                .frames
                .entry(page)
                .or_insert_with(|| Box::new([0u8; PAGE_SIZE as usize]));
            frame[in_page..in_page + n].copy_from_slice(&data[offset..offset + n]);
            offset += n;
        }
        Ok(())
    }

    /// Zero `len` bytes at `addr`.
    pub fn zero(&mut self, addr: u32, len: u32) -> Result<(), BootError> {
        self.check(addr, u64::from(len))?;
        let mut done = 0u32;
        while done < len {
            let at = addr + done;
            let page = at & !(PAGE_SIZE - 1);
            let in_page = at - page;
            let n = (PAGE_SIZE - in_page).min(len - done);
            if let Some(frame) = self.frames.get_mut(&page) {
                frame[in_page as usize..(in_page + n) as usize].fill(0);
            }
            done += n;
        }
        Ok(())
    }

    /// Copy `len` bytes starting at `addr` out of memory.
    pub fn read(&self, addr: u32, len: usize) -> Result<Vec<u8>, BootError> {
        self.check(addr, len as u64)?;
        let mut out = vec![0u8; len];
        let mut offset = 0usize;
        while offset < len {
            let at = addr + offset as u32;
            let page = at & !(PAGE_SIZE - 1);
            let in_page = (at - page) as usize;
            let n = (PAGE_SIZE as usize - in_page).min(len - offset);
            if let Some(frame) = self.frames.get(&page) {
                out[offset..offset + n].copy_from_slice(&frame[in_page..in_page + n]);
            }
            offset += n;
        }
        Ok(out)
    }

    /// Little-endian u32 at `addr`.
    pub fn read_u32(&self, addr: u32) -> Result<u32, BootError> {
        let b = self.read(addr, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Number of frames materialised so far.
    pub fn resident_frames(&self) -> usize {
        self.frames.len()
    }
}
