// CLASSIFICATION: COMMUNITY
// Filename: aout.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-18

//! a.out executables and the Multiboot address "kludge".
//!
//! Both paths load one text block, an optional data block and a zeroed
//! bss, so they share [`AoutPlan`].

use crate::bootloader::image::ImageFormat;
use crate::bootloader::memory::ONE_MB;
use crate::bootloader::multiboot::MultibootHeader;
use crate::error::BootError;

pub const OMAGIC: u32 = 0o407;
pub const NMAGIC: u32 = 0o410;
pub const ZMAGIC: u32 = 0o413;
pub const QMAGIC: u32 = 0o314;
/// Size of `struct exec`.
pub const EXEC_HEADER_LEN: usize = 32;

/// The classic `struct exec` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecHeader {
    pub midmag: u32,
    pub text: u32,
    pub data: u32,
    pub bss: u32,
    pub syms: u32,
    pub entry: u32,
    pub trsize: u32,
    pub drsize: u32,
}

impl ExecHeader {
    /// Parse the header if the window holds more than one and the magic is known.
    pub fn parse(window: &[u8]) -> Option<Self> {
        if window.len() <= EXEC_HEADER_LEN {
            return None;
        }
        let w = |i: usize| u32::from_le_bytes([window[i * 4], window[i * 4 + 1], window[i * 4 + 2], window[i * 4 + 3]]);
        let h = Self {
            midmag: w(0),
            text: w(1),
            data: w(2),
            bss: w(3),
            syms: w(4),
            entry: w(5),
            trsize: w(6),
            drsize: w(7),
        };
        matches!(h.magic(), OMAGIC | NMAGIC | ZMAGIC | QMAGIC).then_some(h)
    }

    /// Magic number in host byte order.
    pub fn magic(&self) -> u32 {
        self.midmag & 0xFFFF
    }

    /// File offset of the text segment.
    pub fn text_offset(&self) -> u32 {
        match self.magic() {
            ZMAGIC => 0x1000,
            QMAGIC => 0,
            _ => EXEC_HEADER_LEN as u32,
        }
    }
}

/// Placement of an a.out-style image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AoutPlan {
    pub format: ImageFormat,
    pub entry: u32,
    pub load_addr: u32,
    pub text_offset: u32,
    pub text_len: u32,
    pub data_len: u32,
    pub bss_len: u32,
    /// Page-align the data segment and the symbol table.
    pub align_4k: bool,
    /// `a_syms` of the header; 0 when there is no symbol table to load.
    pub syms: u32,
    /// A load address below 1 MiB was computed.
    pub below_1mb: bool,
}

/// Plan a plain a.out image.
///
/// Without a Multiboot header the entry is masked to 24 bits and the BSD
/// flavour is guessed from the first two bytes (`0x0b 0x01`, ZMAGIC in
/// network order, means FreeBSD).
pub fn plan_exec(window: &[u8], exec: &ExecHeader, multiboot: bool) -> AoutPlan {
    let mut align_4k = true;
    let (format, entry, load_addr) = if multiboot {
        (ImageFormat::Multiboot, exec.entry, exec.entry)
    } else {
        let entry = exec.entry & 0x00FF_FFFF;
        if window[0] == 0x0b && window[1] == 0x01 {
            (ImageFormat::AOutFreeBsd, entry, entry)
        } else {
            if exec.magic() != NMAGIC {
                align_4k = false;
            }
            (ImageFormat::AOutOpenBsd, entry, entry & 0x00F0_0000)
        }
    };
    AoutPlan {
        format,
        entry,
        load_addr,
        text_offset: exec.text_offset(),
        text_len: exec.text,
        data_len: exec.data,
        bss_len: exec.bss,
        align_4k,
        syms: exec.syms,
        below_1mb: load_addr < ONE_MB,
    }
}

/// Plan an image described by the Multiboot address fields.
///
/// A zero `load_end_addr` loads the whole file; a zero `bss_end_addr`
/// means no bss.
pub fn plan_kludge(mb: &MultibootHeader, filemax: u64) -> Result<AoutPlan, BootError> {
    let load = mb.load_addr;
    let load_end = match mb.load_end_addr {
        0 => u32::try_from(u64::from(load) + filemax).map_err(|_| BootError::ExecFormat)?,
        end => end,
    };
    let bss_end = match mb.bss_end_addr {
        0 => load_end,
        end => end,
    };
    if mb.header_addr < load
        || load_end <= load
        || bss_end < load_end
        || (mb.header_addr - load) as usize > mb.offset
    {
        return Err(BootError::ExecFormat);
    }
    Ok(AoutPlan {
        format: ImageFormat::AOutKludge,
        entry: mb.entry_addr,
        load_addr: load,
        text_offset: (mb.offset - (mb.header_addr - load) as usize) as u32,
        text_len: load_end - load,
        data_len: 0,
        bss_len: bss_end - load_end,
        align_4k: true,
        syms: 0,
        below_1mb: load < ONE_MB,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exec(midmag: u32, entry: u32) -> Vec<u8> {
        let mut b = vec![0u8; 64];
        let fields = [midmag, 0x2000, 0x1000, 0x800, 0, entry, 0, 0];
        for (i, f) in fields.iter().enumerate() {
            b[i * 4..i * 4 + 4].copy_from_slice(&f.to_le_bytes());
        }
        b
    }

    #[test]
    fn freebsd_signature_and_entry_mask() {
        // ZMAGIC stored big-endian: 0b 01 00 00.
        let mut w = exec(0, 0xF020_0000);
        w[0..4].copy_from_slice(&[0x0b, 0x01, 0x00, 0x00]);
        let h = ExecHeader::parse(&w).unwrap();
        assert_eq!(h.magic(), ZMAGIC);
        let p = plan_exec(&w, &h, false);
        assert_eq!(p.format, ImageFormat::AOutFreeBsd);
        assert_eq!(p.entry, 0x20_0000);
        assert_eq!(p.load_addr, 0x20_0000);
        assert_eq!(p.text_offset, 0x1000);
        assert!(p.align_4k);
    }

    #[test]
    fn openbsd_load_address_and_alignment() {
        let w = exec(OMAGIC, 0x0023_4567);
        let p = plan_exec(&w, &ExecHeader::parse(&w).unwrap(), false);
        assert_eq!(p.format, ImageFormat::AOutOpenBsd);
        assert_eq!(p.load_addr, 0x20_0000);
        assert!(!p.align_4k);
        assert_eq!(p.text_offset, 32);

        let w = exec(NMAGIC, 0x0023_4567);
        assert!(plan_exec(&w, &ExecHeader::parse(&w).unwrap(), false).align_4k);
    }

    #[test]
    fn bad_magic_is_not_aout() {
        assert!(ExecHeader::parse(&exec(0x1234, 0)).is_none());
        assert!(ExecHeader::parse(&exec(OMAGIC, 0)[..32]).is_none());
    }

    fn kludge(header_addr: u32, load: u32, load_end: u32, bss_end: u32, offset: usize) -> MultibootHeader {
        MultibootHeader {
            offset,
            flags: 0x0001_0000,
            header_addr,
            load_addr: load,
            load_end_addr: load_end,
            bss_end_addr: bss_end,
            entry_addr: load + 0x40,
            mode_type: 0,
            width: 0,
            height: 0,
            depth: 0,
        }
    }

    #[test]
    fn kludge_defaults_and_offsets() {
        let p = plan_kludge(&kludge(0x10_0020, 0x10_0000, 0, 0, 0x20), 0x3000).unwrap();
        assert_eq!(p.text_offset, 0);
        assert_eq!(p.text_len, 0x3000);
        assert_eq!(p.bss_len, 0);
        assert_eq!(p.entry, 0x10_0040);
        assert!(!p.below_1mb);
    }

    #[test]
    fn kludge_inconsistent_addresses_are_rejected() {
        assert!(plan_kludge(&kludge(0x0F_0000, 0x10_0000, 0, 0, 0x20), 0x3000).is_err());
        assert!(plan_kludge(&kludge(0x10_0020, 0x10_0000, 0x10_0000, 0, 0x20), 0x3000).is_err());
        assert!(plan_kludge(&kludge(0x10_0020, 0x10_0000, 0x10_2000, 0x10_1000, 0x20), 0x3000).is_err());
        assert!(plan_kludge(&kludge(0x10_0040, 0x10_0000, 0, 0, 0x20), 0x3000).is_err());
    }
}
