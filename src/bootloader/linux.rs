// CLASSIFICATION: COMMUNITY
// Filename: linux.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-10-18
//
// ─────────────────────────────────────────────────────────────
// Linux boot protocol (zImage / bzImage)
//
// The setup header is parsed out of the first sector into a
// `LinuxHeader` value. Loading never edits the probe buffer: it
// derives a staged copy with the loader-owned fields rewritten
// (type_of_loader, heap, command line) and serialises that copy
// over the setup code placed in the staging area.
//
// Staging layout (relative to `tmp_addr`):
//   0x0000 .. setup_len   boot sector + setup sectors
//   0x9000 .. 0x90FF      kernel command line
//   0x9100                end of the real-mode move area
// ─────────────────────────────────────────────────────────────

use log::info;

use crate::bootloader::args::{find_option, kernel_args, parse_mem_limit, parse_vga};
use crate::bootloader::image::LoadFlags;
use crate::error::BootError;

pub const BOOTSEC_SIGNATURE: u16 = 0xAA55;
pub const LINUX_MAGIC_SIGNATURE: u32 = 0x5372_6448; // "HdrS"
pub const LINUX_MAX_SETUP_SECTS: u8 = 64;
pub const LINUX_DEFAULT_SETUP_SECTS: u8 = 4;
pub const LINUX_BOOT_LOADER_TYPE: u8 = 0x71;
pub const LINUX_FLAG_BIG_KERNEL: u8 = 0x01;
pub const LINUX_FLAG_CAN_USE_HEAP: u8 = 0x80;
pub const LINUX_HEAP_END_OFFSET: u16 = 0x9000 - 0x200;
pub const LINUX_BZIMAGE_ADDR: u32 = 0x10_0000;
pub const LINUX_ZIMAGE_ADDR: u32 = 0x1_0000;
pub const LINUX_OLD_REAL_MODE_ADDR: u32 = 0x9_0000;
pub const LINUX_SETUP_MOVE_SIZE: u32 = 0x9100;
pub const LINUX_CL_OFFSET: u32 = 0x9000;
pub const LINUX_CL_END_OFFSET: u32 = 0x90FF;
pub const LINUX_CL_MAGIC: u16 = 0xA33F;
pub const SECTOR_SIZE: u32 = 0x200;

const OFF_CL_MAGIC: usize = 0x20;
const OFF_CL_OFFSET: usize = 0x22;
const OFF_SETUP_SECTS: usize = 0x1F1;
const OFF_VID_MODE: usize = 0x1FA;
const OFF_BOOT_FLAG: usize = 0x1FE;
const OFF_HEADER: usize = 0x202;
const OFF_VERSION: usize = 0x206;
const OFF_TYPE_OF_LOADER: usize = 0x210;
const OFF_LOADFLAGS: usize = 0x211;
const OFF_SETUP_MOVE_SIZE: usize = 0x212;
const OFF_RAMDISK_IMAGE: usize = 0x218;
const OFF_RAMDISK_SIZE: usize = 0x21C;
const OFF_HEAP_END_PTR: usize = 0x224;
const OFF_CMD_LINE_PTR: usize = 0x228;
const OFF_INITRD_ADDR_MAX: usize = 0x22C;

/// Fields of the real-mode kernel header the loader reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinuxHeader {
    pub cl_magic: u16,
    pub cl_offset: u16,
    pub setup_sects: u8,
    pub vid_mode: u16,
    pub boot_flag: u16,
    pub header: u32,
    pub version: u16,
    pub type_of_loader: u8,
    pub loadflags: u8,
    pub setup_move_size: u16,
    pub ramdisk_image: u32,
    pub ramdisk_size: u32,
    pub heap_end_ptr: u16,
    pub cmd_line_ptr: u32,
    pub initrd_addr_max: u32,
}

fn get_u8(b: &[u8], at: usize) -> u8 {
    b.get(at).copied().unwrap_or(0)
}

fn get_u16(b: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([get_u8(b, at), get_u8(b, at + 1)])
}

fn get_u32(b: &[u8], at: usize) -> u32 {
    u32::from(get_u16(b, at)) | u32::from(get_u16(b, at + 2)) << 16
}

fn put(b: &mut [u8], at: usize, bytes: &[u8]) {
    if let Some(dst) = b.get_mut(at..at + bytes.len()) {
        dst.copy_from_slice(bytes);
    }
}

impl LinuxHeader {
    /// Read the header from the start of an image; bytes past `window`
    /// read as zero.
    pub fn read(window: &[u8]) -> Self {
        Self {
            cl_magic: get_u16(window, OFF_CL_MAGIC),
            cl_offset: get_u16(window, OFF_CL_OFFSET),
            setup_sects: get_u8(window, OFF_SETUP_SECTS),
            vid_mode: get_u16(window, OFF_VID_MODE),
            boot_flag: get_u16(window, OFF_BOOT_FLAG),
            header: get_u32(window, OFF_HEADER),
            version: get_u16(window, OFF_VERSION),
            type_of_loader: get_u8(window, OFF_TYPE_OF_LOADER),
            loadflags: get_u8(window, OFF_LOADFLAGS),
            setup_move_size: get_u16(window, OFF_SETUP_MOVE_SIZE),
            ramdisk_image: get_u32(window, OFF_RAMDISK_IMAGE),
            ramdisk_size: get_u32(window, OFF_RAMDISK_SIZE),
            heap_end_ptr: get_u16(window, OFF_HEAP_END_PTR),
            cmd_line_ptr: get_u32(window, OFF_CMD_LINE_PTR),
            initrd_addr_max: get_u32(window, OFF_INITRD_ADDR_MAX),
        }
    }

    /// Serialise every field over `setup`.
    pub fn write_into(&self, setup: &mut [u8]) {
        put(setup, OFF_CL_MAGIC, &self.cl_magic.to_le_bytes());
        put(setup, OFF_CL_OFFSET, &self.cl_offset.to_le_bytes());
        put(setup, OFF_SETUP_SECTS, &[self.setup_sects]);
        put(setup, OFF_VID_MODE, &self.vid_mode.to_le_bytes());
        put(setup, OFF_BOOT_FLAG, &self.boot_flag.to_le_bytes());
        put(setup, OFF_HEADER, &self.header.to_le_bytes());
        put(setup, OFF_VERSION, &self.version.to_le_bytes());
        put(setup, OFF_TYPE_OF_LOADER, &[self.type_of_loader]);
        put(setup, OFF_LOADFLAGS, &[self.loadflags]);
        put(setup, OFF_SETUP_MOVE_SIZE, &self.setup_move_size.to_le_bytes());
        put(setup, OFF_RAMDISK_IMAGE, &self.ramdisk_image.to_le_bytes());
        put(setup, OFF_RAMDISK_SIZE, &self.ramdisk_size.to_le_bytes());
        put(setup, OFF_HEAP_END_PTR, &self.heap_end_ptr.to_le_bytes());
        put(setup, OFF_CMD_LINE_PTR, &self.cmd_line_ptr.to_le_bytes());
        put(setup, OFF_INITRD_ADDR_MAX, &self.initrd_addr_max.to_le_bytes());
    }

    /// Boot sector signature present and setup size plausible.
    pub fn is_boot_sector(&self) -> bool {
        self.boot_flag == BOOTSEC_SIGNATURE && self.setup_sects <= LINUX_MAX_SETUP_SECTS
    }

    /// Protocol 2.00 or later (`HdrS` header present).
    pub fn has_protocol(&self) -> bool {
        self.header == LINUX_MAGIC_SIGNATURE && self.version >= 0x0200
    }
}

/// A Linux kernel placed in memory, waiting for an initrd and the jump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinuxStaging {
    /// Header as the kernel will see it.
    pub header: LinuxHeader,
    /// bzImage (loaded high) rather than zImage.
    pub big: bool,
    /// Final real-mode data address.
    pub real_addr: u32,
    /// Staging address of the setup code.
    pub tmp_addr: u32,
    /// Setup sectors actually used.
    pub setup_sects: u8,
    /// Protected-mode body length.
    pub text_len: u32,
    /// Command line as written to the staging area.
    pub cmdline: String,
}

impl LinuxStaging {
    /// Boot sector plus setup sectors.
    pub fn setup_len(&self) -> u32 {
        (u32::from(self.setup_sects) << 9) + SECTOR_SIZE
    }

    /// Address of the staged header sector.
    pub fn header_addr(&self) -> u32 {
        self.tmp_addr
    }

    /// First byte past the real-mode move area; modules go above it.
    pub fn end_addr(&self) -> u32 {
        self.tmp_addr + LINUX_SETUP_MOVE_SIZE
    }
}

/// Everything computed from the header and the kernel line, before any
/// memory is touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinuxPlan {
    pub staging: LinuxStaging,
    /// Initrd ceiling from `mem=`, 0 if absent.
    pub mem_size: u32,
    /// Clear the unused setup heap (pre-2.00 kernels).
    pub clear_heap: bool,
}

/// Derive the staged header and placement for a Linux image.
///
/// `line` is the full kernel line (file name first); `mem_lower_kb` and
/// `mem_upper_kb` are the BIOS memory sizes.
pub fn plan(
    original: &LinuxHeader,
    filemax: u64,
    line: &str,
    flags: LoadFlags,
    mem_lower_kb: u32,
    mem_upper_kb: u32,
) -> Result<LinuxPlan, BootError> {
    let mem_lower = mem_lower_kb.saturating_mul(1024);
    let mut staged = *original;
    let mut big = false;
    let mut setup_sects = original.setup_sects;
    let real_addr;

    if original.has_protocol() {
        big = original.loadflags & LINUX_FLAG_BIG_KERNEL != 0;
        staged.type_of_loader = LINUX_BOOT_LOADER_TYPE;
        real_addr = mem_lower
            .checked_sub(LINUX_SETUP_MOVE_SIZE)
            .map_or(LINUX_OLD_REAL_MODE_ADDR, |a| a.min(LINUX_OLD_REAL_MODE_ADDR));
        if original.version >= 0x0201 {
            staged.heap_end_ptr = LINUX_HEAP_END_OFFSET;
            staged.loadflags |= LINUX_FLAG_CAN_USE_HEAP;
        }
        if original.version >= 0x0202 {
            staged.cmd_line_ptr = real_addr + LINUX_CL_OFFSET;
        } else {
            staged.cl_magic = LINUX_CL_MAGIC;
            staged.cl_offset = LINUX_CL_OFFSET as u16;
            staged.setup_move_size = LINUX_SETUP_MOVE_SIZE as u16;
        }
    } else {
        staged.cl_magic = LINUX_CL_MAGIC;
        staged.cl_offset = LINUX_CL_OFFSET as u16;
        setup_sects = LINUX_DEFAULT_SETUP_SECTS;
        real_addr = LINUX_OLD_REAL_MODE_ADDR;
    }
    if setup_sects == 0 {
        setup_sects = LINUX_DEFAULT_SETUP_SECTS;
    }

    let setup_len = (u64::from(setup_sects) << 9) + u64::from(SECTOR_SIZE);
    let text_len = filemax
        .checked_sub(setup_len)
        .and_then(|t| u32::try_from(t).ok())
        .ok_or(BootError::ExecFormat)?;
    let tmp_addr = LINUX_BZIMAGE_ADDR.checked_add(text_len).ok_or(BootError::WontFit)?;

    if !big && text_len > real_addr.saturating_sub(LINUX_ZIMAGE_ADDR) {
        return Err(BootError::WontFit);
    }
    if real_addr + LINUX_SETUP_MOVE_SIZE > mem_lower {
        return Err(BootError::WontFit);
    }

    if let Some(value) = find_option(line, "vga=") {
        staged.vid_mode = parse_vga(value)?;
    }
    let mem_size = parse_mem_limit(line);
    let cmdline = compose_cmdline(line, flags, original.version, mem_upper_kb);

    info!(
        "[Linux-{}, setup=0x{:x}, size=0x{:x}]",
        if big { "bzImage" } else { "zImage" },
        setup_len - u64::from(SECTOR_SIZE),
        text_len
    );

    Ok(LinuxPlan {
        staging: LinuxStaging {
            header: staged,
            big,
            real_addr,
            tmp_addr,
            setup_sects,
            text_len,
            cmdline,
        },
        mem_size,
        clear_heap: !original.has_protocol(),
    })
}

/// Kernel arguments capped to the command-line area, plus a synthesised
/// `mem=` for pre-2.03 kernels that cannot size memory themselves.
fn compose_cmdline(line: &str, flags: LoadFlags, version: u16, mem_upper_kb: u32) -> String {
    let cap = (LINUX_CL_END_OFFSET - LINUX_CL_OFFSET) as usize;
    let mut out: Vec<u8> = kernel_args(line).bytes().take(cap).collect();
    if !line.contains("mem=")
        && !flags.contains(LoadFlags::NO_MEM_OPTION)
        && version < 0x0203
        && out.len() + 15 < cap
    {
        out.extend_from_slice(format!(" mem={}K", u64::from(mem_upper_kb) + 0x400).as_bytes());
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(version: u16, loadflags: u8, setup_sects: u8) -> Vec<u8> {
        let mut b = vec![0u8; 0x400];
        b[OFF_SETUP_SECTS] = setup_sects;
        put(&mut b, OFF_BOOT_FLAG, &BOOTSEC_SIGNATURE.to_le_bytes());
        put(&mut b, OFF_HEADER, &LINUX_MAGIC_SIGNATURE.to_le_bytes());
        put(&mut b, OFF_VERSION, &version.to_le_bytes());
        b[OFF_LOADFLAGS] = loadflags;
        b
    }

    #[test]
    fn bzimage_protocol_fields_are_staged() {
        let h = LinuxHeader::read(&header(0x0204, LINUX_FLAG_BIG_KERNEL, 8));
        assert!(h.is_boot_sector() && h.has_protocol());
        let plan = plan(&h, 0x20_0000, "/vmlinuz root=/dev/hda1", LoadFlags::empty(), 640, 31744).unwrap();
        let s = &plan.staging;
        assert!(s.big);
        assert_eq!(s.real_addr, 0x9_0000);
        assert_eq!(s.text_len, 0x20_0000 - 9 * 512);
        assert_eq!(s.tmp_addr, 0x10_0000 + s.text_len);
        assert_eq!(s.header.type_of_loader, LINUX_BOOT_LOADER_TYPE);
        assert_eq!(s.header.heap_end_ptr, 0x8E00);
        assert_eq!(s.header.loadflags, LINUX_FLAG_BIG_KERNEL | LINUX_FLAG_CAN_USE_HEAP);
        assert_eq!(s.header.cmd_line_ptr, 0x9_9000);
        assert_eq!(s.cmdline, "root=/dev/hda1");
        // Original value untouched.
        assert_eq!(h.type_of_loader, 0);
    }

    #[test]
    fn old_protocol_gets_mem_option_and_cl_magic() {
        let h = LinuxHeader::read(&header(0x0201, 0, 0));
        let plan = plan(&h, 0x6_0000, "/zImage ro", LoadFlags::empty(), 640, 31744).unwrap();
        let s = &plan.staging;
        assert!(!s.big);
        assert_eq!(s.setup_sects, LINUX_DEFAULT_SETUP_SECTS);
        assert_eq!(s.header.cl_magic, LINUX_CL_MAGIC);
        assert_eq!(s.header.setup_move_size, 0x9100);
        assert_eq!(s.cmdline, "ro mem=32768K");

        let plan2 = super::plan(&h, 0x6_0000, "/zImage ro", LoadFlags::NO_MEM_OPTION, 640, 31744).unwrap();
        assert_eq!(plan2.staging.cmdline, "ro");
    }

    #[test]
    fn zimage_too_big_wont_fit() {
        let h = LinuxHeader::read(&header(0x0202, 0, 4));
        assert!(matches!(
            plan(&h, 0x9_0000, "/zImage", LoadFlags::empty(), 640, 31744),
            Err(BootError::WontFit)
        ));
    }

    #[test]
    fn vga_and_mem_options() {
        let h = LinuxHeader::read(&header(0x0203, LINUX_FLAG_BIG_KERNEL, 4));
        let plan = plan(&h, 0x10_0000, "/bz vga=ask mem=64M", LoadFlags::empty(), 640, 31744).unwrap();
        assert_eq!(plan.staging.header.vid_mode, 0xFFFD);
        assert_eq!(plan.mem_size, 64 << 20);
        assert!(super::plan(&h, 0x10_0000, "/bz vga=bogus", LoadFlags::empty(), 640, 31744).is_err());
    }

    #[test]
    fn legacy_kernel_without_hdrs() {
        let mut b = vec![0u8; 0x400];
        put(&mut b, OFF_BOOT_FLAG, &BOOTSEC_SIGNATURE.to_le_bytes());
        b[OFF_SETUP_SECTS] = 2;
        let h = LinuxHeader::read(&b);
        assert!(!h.has_protocol());
        let plan = plan(&h, 0x4_0000, "/old", LoadFlags::empty(), 640, 1024).unwrap();
        assert!(plan.clear_heap);
        assert_eq!(plan.staging.setup_sects, 4);
        assert_eq!(plan.staging.real_addr, 0x9_0000);
        assert_eq!(plan.staging.cmdline, " mem=2048K");
    }
}
