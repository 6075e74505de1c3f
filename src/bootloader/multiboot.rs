// CLASSIFICATION: COMMUNITY
// Filename: multiboot.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-18

//! Multiboot header search and boot-info record types.

use bitflags::bitflags;

use crate::error::BootError;

/// Header magic.
pub const MULTIBOOT_MAGIC: u32 = 0x1BAD_B002;
/// Flag bits this loader does not implement.
pub const MULTIBOOT_UNSUPPORTED: u32 = 0x0000_FFF8;
/// Bytes needed for `magic`, `flags` and `checksum`.
const MIN_HEADER_LEN: usize = 12;

bitflags! {
    /// Requests a kernel makes in its Multiboot header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HeaderFlags: u32 {
        /// Align modules on page boundaries.
        const PAGE_ALIGN = 0x0000_0001;
        /// Memory map requested.
        const MEMORY_INFO = 0x0000_0002;
        /// Video mode table present.
        const VIDEO_MODE = 0x0000_0004;
        /// Address fields are valid (a.out kludge).
        const AOUT_KLUDGE = 0x0001_0000;
    }
}

bitflags! {
    /// Validity flags of the boot-info record handed to the kernel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InfoFlags: u32 {
        /// `mem_lower`/`mem_upper` valid.
        const MEMORY = 0x0000_0001;
        /// Command line valid.
        const CMDLINE = 0x0000_0004;
        /// Module list valid.
        const MODS = 0x0000_0008;
        /// a.out symbol table valid.
        const AOUT_SYMS = 0x0000_0010;
        /// ELF section header table valid.
        const ELF_SHDR = 0x0000_0020;
        /// VBE information valid.
        const VIDEO_INFO = 0x0000_0800;
    }
}

/// A located Multiboot header. Fields past the end of the probe window
/// read as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultibootHeader {
    /// Byte offset of the header in the file.
    pub offset: usize,
    /// Raw flag word.
    pub flags: u32,
    pub header_addr: u32,
    pub load_addr: u32,
    pub load_end_addr: u32,
    pub bss_end_addr: u32,
    pub entry_addr: u32,
    pub mode_type: u32,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl MultibootHeader {
    /// Known flag bits.
    pub fn header_flags(&self) -> HeaderFlags {
        HeaderFlags::from_bits_truncate(self.flags)
    }

    /// Fail with `BootFeatures` if any unsupported bit is set.
    pub fn check_features(&self) -> Result<(), BootError> {
        if self.flags & MULTIBOOT_UNSUPPORTED != 0 {
            return Err(BootError::BootFeatures(self.flags));
        }
        Ok(())
    }

    /// The header carries explicit load addresses.
    pub fn is_kludge(&self) -> bool {
        self.header_flags().contains(HeaderFlags::AOUT_KLUDGE)
    }

    /// Linear framebuffer request (`mode_type == 0`) as `(w, h, depth)`.
    pub fn video_request(&self) -> Option<(u32, u32, u32)> {
        (self.header_flags().contains(HeaderFlags::VIDEO_MODE) && self.mode_type == 0)
            .then_some((self.width, self.height, self.depth))
    }
}

fn le32(window: &[u8], at: usize) -> u32 {
    window
        .get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .unwrap_or(0)
}

/// Scan `window` for a Multiboot header.
///
/// Candidates sit on 32-bit boundaries and need all twelve bytes of the
/// magic/flags/checksum triple inside the window; the triple must sum to
/// zero modulo 2^32.
///
/// Only offsets that are multiples of four are examined. A triple stored
/// at an unaligned offset is not a Multiboot header and is skipped even
/// when its bytes and checksum are otherwise valid.
pub fn find_header(window: &[u8]) -> Option<MultibootHeader> {
    (0..window.len())
        .step_by(4)
        .take_while(|i| window.len() - i >= MIN_HEADER_LEN)
        .find(|&i| {
            let (magic, flags, checksum) = (le32(window, i), le32(window, i + 4), le32(window, i + 8));
            magic == MULTIBOOT_MAGIC && magic.wrapping_add(flags).wrapping_add(checksum) == 0
        })
        .map(|i| MultibootHeader {
            offset: i,
            flags: le32(window, i + 4),
            header_addr: le32(window, i + 12),
            load_addr: le32(window, i + 16),
            load_end_addr: le32(window, i + 20),
            bss_end_addr: le32(window, i + 24),
            entry_addr: le32(window, i + 28),
            mode_type: le32(window, i + 32),
            width: le32(window, i + 36),
            height: le32(window, i + 40),
            depth: le32(window, i + 44),
        })
}

/// Serialise a minimal header triple; used by tooling and tests.
pub fn header_bytes(flags: u32) -> [u8; 12] {
    let mut out = [0u8; 12];
    out[0..4].copy_from_slice(&MULTIBOOT_MAGIC.to_le_bytes());
    out[4..8].copy_from_slice(&flags.to_le_bytes());
    out[8..12].copy_from_slice(&0u32.wrapping_sub(MULTIBOOT_MAGIC).wrapping_sub(flags).to_le_bytes());
    out
}
