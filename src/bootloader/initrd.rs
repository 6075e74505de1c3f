// CLASSIFICATION: COMMUNITY
// Filename: initrd.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-18

//! Linux initial ramdisk placement.
//!
//! The ramdisk goes as high as the kernel allows: below the `mem=` ceiling
//! (or the top of memory), below the kernel's `initrd_addr_max`, page
//! aligned, minus a 64 KiB gap. The staged setup header is then patched
//! with the final address and size.

use log::info;

use crate::boot::file_hash::read_full;
use crate::bootloader::args::LINUX_INITRD_MAX_ADDRESS;
use crate::bootloader::linux::LinuxStaging;
use crate::bootloader::memory::ONE_MB;
use crate::bootloader::session::BootSession;
use crate::error::BootError;

/// Gap kept between the ramdisk and the ceiling.
const INITRD_GAP: u32 = 0x1_0000;
const PAGE_MASK: u32 = !0xFFF;

/// Where the ramdisk ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitrdPlacement {
    pub addr: u32,
    pub len: u32,
}

/// Highest page-aligned address for a ramdisk of `len` bytes.
///
/// `mem_size` is the kernel's `mem=` ceiling (0 when absent) and
/// `mem_upper_kb` the extended memory size.
pub fn placement(staging: &LinuxStaging, len: u32, mem_size: u32, mem_upper_kb: u32) -> Result<u32, BootError> {
    let top = if mem_size != 0 {
        u64::from(mem_size)
    } else {
        (u64::from(mem_upper_kb) + 0x400) << 10
    };
    let mut moveto = top.checked_sub(u64::from(len)).ok_or(BootError::WontFit)? as u32 & PAGE_MASK;

    let max = if staging.header.has_protocol() && staging.header.version >= 0x0203 {
        staging.header.initrd_addr_max
    } else {
        LINUX_INITRD_MAX_ADDRESS
    };
    if u64::from(moveto) + u64::from(len) >= u64::from(max) {
        moveto = max.checked_sub(len).ok_or(BootError::WontFit)? & PAGE_MASK;
    }

    moveto = moveto.checked_sub(INITRD_GAP).ok_or(BootError::WontFit)?;
    if moveto < ONE_MB {
        return Err(BootError::WontFit);
    }
    Ok(moveto)
}

/// Load the ramdisk at `path` for the staged Linux kernel.
pub fn load_initrd(session: &mut BootSession, path: &str) -> Result<InitrdPlacement, BootError> {
    if session.linux.is_none() {
        return Err(BootError::NoLinuxKernel);
    }

    let mut file = session.storage.open(path)?;
    let filemax = file.size();
    if filemax == 0 {
        return Err(BootError::EmptyFile(path.to_string()));
    }
    let len = u32::try_from(filemax).map_err(|_| BootError::WontFit)?;
    session.measure_load(file.as_mut(), path)?;

    let mut data = vec![0u8; len as usize];
    if read_full(file.as_mut(), &mut data)? != data.len() {
        return Err(BootError::ExecFormat);
    }

    let (mem_size, mem_upper) = (session.linux_mem_size, session.config.mem_upper_kb);
    let staging = session.linux.as_mut().ok_or(BootError::NoLinuxKernel)?;
    let addr = placement(staging, len, mem_size, mem_upper)?;
    if !session.memory.fits(addr, u64::from(len)) {
        return Err(BootError::WontFit);
    }
    session.memory.write(addr, &data)?;

    staging.header.ramdisk_image = addr;
    staging.header.ramdisk_size = len;
    let mut sector = session.memory.read(staging.header_addr(), staging.setup_len() as usize)?;
    staging.header.write_into(&mut sector);
    session.memory.write(staging.header_addr(), &sector)?;

    info!("[Linux-initrd @ 0x{addr:x}, 0x{len:x} bytes]");
    Ok(InitrdPlacement { addr, len })
}
