// CLASSIFICATION: COMMUNITY
// Filename: module.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-18

//! Multiboot module loading.

use log::info;

use crate::bootloader::args::splice_password;
use crate::bootloader::image::copy_to_memory;
use crate::bootloader::memory::align_4k;
use crate::bootloader::multiboot::InfoFlags;
use crate::bootloader::session::{BootSession, ModuleDescriptor};
use crate::error::BootError;

/// Load the file at `path` page-aligned at the high-water mark and append
/// it to the boot-info module list.
///
/// `cmdline` is the module's full line; a password-dialog marker in it is
/// replaced before the descriptor is recorded.
pub fn load_module(session: &mut BootSession, path: &str, cmdline: &str) -> Result<ModuleDescriptor, BootError> {
    let cmdline = splice_password(cmdline, session.operator.as_mut())?;

    if session.info.mods.len() >= session.config.max_modules {
        return Err(BootError::TooManyModules(session.config.max_modules));
    }

    let mut file = session.storage.open(path)?;
    let filemax = file.size();
    if filemax == 0 {
        return Err(BootError::EmptyFile(path.to_string()));
    }

    let start = align_4k(session.cur_addr);
    let limit = session.memory.limit();
    if u64::from(start) + filemax >= limit {
        return Err(BootError::BadModuleAddress {
            addr: start,
            len: filemax,
            limit,
        });
    }
    session.measure_load(file.as_mut(), path)?;

    // filemax < limit <= 4 GiB here.
    let len = filemax as u32;
    copy_to_memory(file.as_mut(), &mut session.memory, start, len)?;
    let end = start + len;
    info!("[Multiboot-module @ 0x{start:x}, 0x{len:x} bytes]");

    let module = ModuleDescriptor { cmdline, start, end };
    session.info.mods.push(module.clone());
    session.info.flags.insert(InfoFlags::MODS);
    session.cur_addr = end;
    Ok(module)
}
