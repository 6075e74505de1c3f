// CLASSIFICATION: COMMUNITY
// Filename: elf.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-10-18

//! 32-bit i386 ELF kernels.
//!
//! The file header is validated with `xmas_elf`; program and section
//! headers are decoded field by field from the probe window and the file,
//! since neither is guaranteed to be aligned there.

use std::io::SeekFrom;

use log::debug;
use xmas_elf::header::{Machine, Type};
use xmas_elf::ElfFile;

use crate::boot::file_hash::read_full;
use crate::bootloader::image::{ImageFormat, KernelKind, Segment};
use crate::bootloader::memory::{align_4k, PhysicalMemory, ONE_MB};
use crate::bootloader::session::SymbolTable;
use crate::bootloader::storage::BootFile;
use crate::error::BootError;

const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];
const ELFCLASS32: u8 = 1;
const ELFDATA2LSB: u8 = 1;
const EV_CURRENT: u8 = 1;
const EI_OSABI: usize = 7;
const EI_BRAND: usize = 8;
const ELFOSABI_FREEBSD: u8 = 9;
const ELF32_EHDR_LEN: usize = 52;
const ELF32_PHDR_LEN: usize = 32;
const ELF32_SHDR_LEN: usize = 40;
const PT_LOAD: u32 = 1;
/// Section tables placed below this address are implausible.
const MIN_SECTION_TABLE_ADDR: u32 = 0x1_0000;

/// Section header table location, copied from the file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionTable {
    pub offset: u32,
    pub num: u16,
    pub entsize: u16,
    pub shstrndx: u16,
}

/// Validated ELF kernel layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElfPlan {
    pub format: ImageFormat,
    /// Entry point after masking and physical correction.
    pub entry: u32,
    /// Loadable segments in program-header order.
    pub segments: Vec<Segment>,
    pub sections: SectionTable,
    /// A segment or the entry point lies below 1 MiB.
    pub below_1mb: bool,
}

fn le32(b: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

fn is_freebsd_branded(window: &[u8]) -> bool {
    window[EI_OSABI] == ELFOSABI_FREEBSD || window.get(EI_BRAND..EI_BRAND + 8) == Some(b"FreeBSD\0".as_slice())
}

/// File header of a bootable i386 executable, or `None`.
fn bootable_i386(window: &[u8]) -> Option<ElfFile<'_>> {
    let ident = window.get(..ELF32_EHDR_LEN)?;
    if ident[..4] != ELF_MAGIC || ident[4] != ELFCLASS32 || ident[5] != ELFDATA2LSB || ident[6] != EV_CURRENT {
        return None;
    }
    let elf = ElfFile::new(window).ok()?;
    let exec = matches!(elf.header.pt2.type_().as_type(), Type::Executable);
    let i386 = matches!(elf.header.pt2.machine().as_machine(), Machine::X86);
    (exec && i386).then_some(elf)
}

/// Try the ELF path.
///
/// Returns `None` when the window is not an ELF this loader should take
/// (so detection moves on), or the plan / structural error otherwise.
pub fn probe(window: &[u8], multiboot: bool, hint: Option<KernelKind>) -> Option<Result<ElfPlan, BootError>> {
    if window.len() <= ELF32_EHDR_LEN {
        return None;
    }
    let eligible = multiboot
        || is_freebsd_branded(window)
        || matches!(hint, None | Some(KernelKind::OpenBsd) | Some(KernelKind::NetBsd));
    if !eligible {
        return None;
    }
    let elf = bootable_i386(window)?;
    Some(plan(window, &elf, multiboot, hint))
}

fn plan(window: &[u8], elf: &ElfFile<'_>, multiboot: bool, hint: Option<KernelKind>) -> Result<ElfPlan, BootError> {
    let pt2 = &elf.header.pt2;
    let raw_entry = pt2.entry_point() as u32;
    let mut entry = if multiboot { raw_entry } else { raw_entry & 0x00FF_FFFF };
    let mut below_1mb = entry < ONE_MB;

    let phoff = pt2.ph_offset();
    let phnum = u64::from(pt2.ph_count());
    let phentsize = u64::from(pt2.ph_entry_size());
    if phoff == 0 || phnum == 0 || phoff + phentsize * phnum >= window.len() as u64 {
        return Err(BootError::ExecFormat);
    }
    if (phentsize as usize) < ELF32_PHDR_LEN {
        return Err(BootError::ExecFormat);
    }

    let format = if multiboot {
        ImageFormat::ElfMultiboot
    } else if hint == Some(KernelKind::NetBsd) {
        ImageFormat::ElfNetBsd
    } else if hint == Some(KernelKind::FreeBsd) || window[EI_OSABI] == ELFOSABI_FREEBSD {
        ImageFormat::ElfFreeBsd
    } else {
        ImageFormat::ElfOpenBsd
    };
    let bsd = !multiboot;

    let mut segments = Vec::new();
    let mut real_entry = None;
    for i in 0..phnum {
        let at = (phoff + i * phentsize) as usize;
        if le32(window, at) != PT_LOAD {
            continue;
        }
        let offset = le32(window, at + 4);
        let vaddr = le32(window, at + 8);
        let paddr = le32(window, at + 12);
        let filesz = le32(window, at + 16);
        let memsz = le32(window, at + 20);

        let dest = if bsd { paddr & 0x00FF_FFFF } else { paddr };
        if dest < ONE_MB {
            below_1mb = true;
        }
        if multiboot && raw_entry >= vaddr && u64::from(raw_entry) < u64::from(vaddr) + u64::from(memsz) {
            real_entry = Some(raw_entry.wrapping_add(dest).wrapping_sub(vaddr));
        }
        segments.push(Segment {
            dest,
            file_offset: u64::from(offset),
            file_size: filesz.min(memsz),
            mem_size: memsz,
        });
    }
    if segments.is_empty() && !below_1mb {
        return Err(BootError::ExecFormat);
    }
    if let Some(physical) = real_entry {
        debug!("entry 0x{entry:x} relocated to physical 0x{physical:x}");
        entry = physical;
    }

    Ok(ElfPlan {
        format,
        entry,
        segments,
        sections: SectionTable {
            offset: pt2.sh_offset() as u32,
            num: pt2.sh_count(),
            entsize: pt2.sh_entry_size(),
            shstrndx: pt2.sh_str_index(),
        },
        below_1mb,
    })
}

fn align_up(addr: u32, align: u32) -> Option<u32> {
    if align <= 1 {
        return Some(addr);
    }
    let mask = align.checked_next_power_of_two()? - 1;
    addr.checked_add(mask).map(|a| a & !mask)
}

/// Copy the section header table and every unallocated, non-empty section
/// above `end`, patching their `sh_addr` in the copied table.
///
/// Best effort: any read failure, a section that does not fit or a table
/// below 64 KiB yields `None`, and the caller keeps its high-water mark.
pub(crate) fn load_sections(
    file: &mut dyn BootFile,
    memory: &mut PhysicalMemory,
    table: &SectionTable,
    end: u32,
) -> Option<(SymbolTable, u32)> {
    if table.num == 0 || usize::from(table.entsize) < ELF32_SHDR_LEN {
        return None;
    }
    let table_addr = align_4k(end);
    if table_addr < MIN_SECTION_TABLE_ADDR {
        return None;
    }
    let tab_size = usize::from(table.entsize) * usize::from(table.num);
    let mut shdrs = vec![0u8; tab_size];
    file.seek(SeekFrom::Start(u64::from(table.offset))).ok()?;
    if read_full(file, &mut shdrs).ok()? != tab_size {
        return None;
    }
    let mut cur = table_addr.checked_add(tab_size as u32)?;

    for i in 0..usize::from(table.num) {
        let at = i * usize::from(table.entsize);
        let (addr, offset, size, align) = (
            le32(&shdrs, at + 12),
            le32(&shdrs, at + 16),
            le32(&shdrs, at + 20),
            le32(&shdrs, at + 32),
        );
        if addr != 0 || size == 0 {
            continue;
        }
        cur = align_up(cur, align)?;
        if !memory.fits(cur, u64::from(size)) {
            return None;
        }
        let mut bytes = vec![0u8; size as usize];
        file.seek(SeekFrom::Start(u64::from(offset))).ok()?;
        if read_full(file, &mut bytes).ok()? != bytes.len() {
            return None;
        }
        memory.write(cur, &bytes).ok()?;
        shdrs[at + 12..at + 16].copy_from_slice(&cur.to_le_bytes());
        cur = cur.checked_add(size)?;
    }
    memory.write(table_addr, &shdrs).ok()?;

    let syms = SymbolTable::Elf {
        num: u32::from(table.num),
        size: u32::from(table.entsize),
        addr: table_addr,
        shndx: u32::from(table.shstrndx),
    };
    Some((syms, cur))
}
