// CLASSIFICATION: COMMUNITY
// Filename: session.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-10-18

//! Boot session context.
//!
//! Everything the loaders share (memory, the boot-info record, the load
//! high-water mark, the staged Linux header and the measurer) lives in one
//! [`BootSession`] passed by `&mut` into every loader call.

use std::io::SeekFrom;

use log::{debug, error};

use crate::boot::file_hash::hash_reader;
use crate::boot::measure::{MeasurementEvent, Measurer};
use crate::boot::sha1::Sha1Digest;
use crate::boot::tpm::TcgTransport;
use crate::bootloader::console::{DisplayModes, Operator};
use crate::bootloader::linux::LinuxStaging;
use crate::bootloader::memory::PhysicalMemory;
use crate::bootloader::multiboot::InfoFlags;
use crate::bootloader::storage::{BootFile, Storage};
use crate::config::BootConfig;
use crate::error::BootError;

/// A loaded module as recorded in the boot-info module list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDescriptor {
    /// Module command line after any password splice.
    pub cmdline: String,
    /// First byte.
    pub start: u32,
    /// First byte past the module.
    pub end: u32,
}

/// Symbol information handed to the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolTable {
    /// a.out symbol and string tables, stored back to back.
    AOut { tabsize: u32, strsize: u32, addr: u32 },
    /// ELF section header table with relocated debug sections.
    Elf { num: u32, size: u32, addr: u32, shndx: u32 },
}

/// Boot-info record consumed by the dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootInfo {
    pub flags: InfoFlags,
    /// Conventional memory in KiB.
    pub mem_lower: u32,
    /// Extended memory in KiB.
    pub mem_upper: u32,
    /// Kernel command line.
    pub cmdline: String,
    /// Loaded modules in load order.
    pub mods: Vec<ModuleDescriptor>,
    pub syms: Option<SymbolTable>,
}

impl BootInfo {
    fn new(mem_lower: u32, mem_upper: u32) -> Self {
        Self {
            flags: InfoFlags::MEMORY,
            mem_lower,
            mem_upper,
            ..Self::default()
        }
    }

    /// Forget everything a previous kernel load recorded.
    pub(crate) fn reset_for_kernel(&mut self, cmdline: &str) {
        self.flags.remove(InfoFlags::MODS | InfoFlags::AOUT_SYMS | InfoFlags::ELF_SHDR);
        self.flags.insert(InfoFlags::CMDLINE);
        self.cmdline = cmdline.to_string();
        self.mods.clear();
        self.syms = None;
    }
}

/// Explicit state of one boot.
pub struct BootSession {
    pub(crate) config: BootConfig,
    pub(crate) memory: PhysicalMemory,
    pub(crate) info: BootInfo,
    pub(crate) cur_addr: u32,
    pub(crate) linux: Option<LinuxStaging>,
    pub(crate) linux_mem_size: u32,
    pub(crate) measurer: Measurer,
    pub(crate) storage: Box<dyn Storage>,
    pub(crate) operator: Box<dyn Operator>,
    pub(crate) display: Option<Box<dyn DisplayModes>>,
}

impl BootSession {
    /// New session over the given collaborators.
    pub fn new(
        config: BootConfig,
        storage: Box<dyn Storage>,
        transport: Box<dyn TcgTransport>,
        operator: Box<dyn Operator>,
    ) -> Self {
        let memory = PhysicalMemory::new(config.mem_lower_kb, config.mem_upper_kb);
        let info = BootInfo::new(config.mem_lower_kb, config.mem_upper_kb);
        let measurer = Measurer::new(transport, config.extend_policy);
        Self {
            config,
            memory,
            info,
            cur_addr: 0,
            linux: None,
            linux_mem_size: 0,
            measurer,
            storage,
            operator,
            display: None,
        }
    }

    /// Attach a display for Multiboot video requests.
    pub fn with_display(mut self, display: Box<dyn DisplayModes>) -> Self {
        self.display = Some(display);
        self
    }

    pub fn config(&self) -> &BootConfig {
        &self.config
    }

    pub fn memory(&self) -> &PhysicalMemory {
        &self.memory
    }

    pub fn info(&self) -> &BootInfo {
        &self.info
    }

    /// Current load high-water mark.
    pub fn cur_addr(&self) -> u32 {
        self.cur_addr
    }

    /// Move the load high-water mark; the next module is placed at the
    /// first 4 KiB boundary at or above `addr`.
    pub fn set_load_addr(&mut self, addr: u32) {
        debug!("load address set to 0x{addr:x}");
        self.cur_addr = addr;
    }

    /// Staged Linux kernel, if the last kernel loaded was Linux.
    pub fn linux(&self) -> Option<&LinuxStaging> {
        self.linux.as_ref()
    }

    /// Initrd ceiling taken from the kernel's `mem=` option (0 if none).
    pub fn linux_mem_size(&self) -> u32 {
        self.linux_mem_size
    }

    pub fn measurer(&self) -> &Measurer {
        &self.measurer
    }

    /// Measurement events issued so far, in order.
    pub fn events(&self) -> &[MeasurementEvent] {
        self.measurer.events()
    }

    /// Hash `file` into the load PCR when load measurement is enabled.
    ///
    /// The file is rewound afterwards. Extend failures are logged and do
    /// not fail the load.
    pub(crate) fn measure_load(&mut self, file: &mut dyn BootFile, path: &str) -> Result<(), BootError> {
        if !self.config.measure_loads {
            return Ok(());
        }
        let digest = hash_reader(file, self.config.hash_chunk_size)?;
        file.seek(SeekFrom::Start(0))?;
        self.record_measurement(self.config.load_pcr, digest, path);
        Ok(())
    }

    pub(crate) fn record_measurement(&mut self, pcr: u8, digest: Sha1Digest, what: &str) -> bool {
        match self.measurer.measure(pcr, digest, what) {
            Ok(sent) => sent,
            Err(e) => {
                error!("Error during PCR extension: {e}");
                false
            }
        }
    }
}
