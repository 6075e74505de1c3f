// CLASSIFICATION: COMMUNITY
// Filename: image.rs v0.3
// Author: Lukas Bower
// Date Modified: 2026-10-18
//
// ─────────────────────────────────────────────────────────────
// Kernel format detection and segment loading
//
// `load_image` reads a probe window from the start of the file
// and tries, in order: Multiboot header search, ELF, Multiboot
// a.out kludge, plain a.out, Linux boot sector. Parsing yields a
// `ParsedImage` value; nothing is written to memory until the
// whole plan has been checked (1 MiB floor, caller's format hint).
//
// # Public API
// * [`load_image`]    – detect, plan and load a kernel
// * [`KernelImage`]   – what was loaded and where to jump
// * [`ImageFormat`] / [`KernelKind`] – detected and requested types
// ─────────────────────────────────────────────────────────────

use std::fmt;
use std::io::SeekFrom;

use bitflags::bitflags;
use log::{debug, info, warn};

use crate::boot::file_hash::read_full;
use crate::bootloader::aout::{plan_exec, plan_kludge, AoutPlan, ExecHeader};
use crate::bootloader::elf::{self, ElfPlan};
use crate::bootloader::linux::{self, LinuxHeader, LinuxPlan, LINUX_BZIMAGE_ADDR, LINUX_SETUP_MOVE_SIZE};
use crate::bootloader::memory::{align_4k, PhysicalMemory};
use crate::bootloader::multiboot::{find_header, InfoFlags, MultibootHeader};
use crate::bootloader::session::{BootSession, SymbolTable};
use crate::bootloader::storage::BootFile;
use crate::error::BootError;

/// Smallest file the detector looks at.
const MIN_IMAGE_LEN: usize = 32;

/// Boot protocol a kernel is started with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelKind {
    Multiboot,
    Linux,
    BigLinux,
    FreeBsd,
    NetBsd,
    OpenBsd,
}

/// Detected executable format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    /// a.out executable carrying a Multiboot header.
    Multiboot,
    ElfMultiboot,
    ElfFreeBsd,
    ElfNetBsd,
    ElfOpenBsd,
    AOutFreeBsd,
    AOutOpenBsd,
    /// Addresses taken from the Multiboot header.
    AOutKludge,
    LinuxZImage,
    LinuxBzImage,
}

impl ImageFormat {
    /// Boot protocol implied by the format.
    pub fn kind(self) -> KernelKind {
        match self {
            ImageFormat::Multiboot | ImageFormat::ElfMultiboot | ImageFormat::AOutKludge => KernelKind::Multiboot,
            ImageFormat::ElfFreeBsd | ImageFormat::AOutFreeBsd => KernelKind::FreeBsd,
            ImageFormat::ElfNetBsd => KernelKind::NetBsd,
            ImageFormat::ElfOpenBsd | ImageFormat::AOutOpenBsd => KernelKind::OpenBsd,
            ImageFormat::LinuxZImage => KernelKind::Linux,
            ImageFormat::LinuxBzImage => KernelKind::BigLinux,
        }
    }

    fn parts(self) -> (&'static str, &'static str) {
        match self {
            ImageFormat::Multiboot => ("Multiboot", "a.out"),
            ImageFormat::ElfMultiboot => ("Multiboot", "elf"),
            ImageFormat::ElfFreeBsd => ("FreeBSD", "elf"),
            ImageFormat::ElfNetBsd => ("NetBSD", "elf"),
            ImageFormat::ElfOpenBsd => ("OpenBSD", "elf"),
            ImageFormat::AOutFreeBsd => ("FreeBSD", "a.out"),
            ImageFormat::AOutOpenBsd => ("OpenBSD", "a.out"),
            ImageFormat::AOutKludge => ("Multiboot", "kludge"),
            ImageFormat::LinuxZImage => ("Linux", "zImage"),
            ImageFormat::LinuxBzImage => ("Linux", "bzImage"),
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (flavor, format) = self.parts();
        write!(f, "{flavor}-{format}")
    }
}

bitflags! {
    /// Caller options for [`load_image`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct LoadFlags: u32 {
        /// Never synthesise a Linux `mem=` option.
        const NO_MEM_OPTION = 0x1;
    }
}

/// One block copied from the file; bytes past `file_size` are zeroed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub dest: u32,
    pub file_offset: u64,
    pub file_size: u32,
    pub mem_size: u32,
}

/// A kernel placed in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelImage {
    pub format: ImageFormat,
    /// Physical entry point; for Linux, the real-mode setup entry.
    pub entry: u32,
    pub segments: Vec<Segment>,
    pub symbols: Option<SymbolTable>,
    /// The display accepted a Multiboot video request.
    pub video: bool,
}

/// What to load.
#[derive(Debug, Clone, Copy)]
pub struct LoadRequest<'a> {
    /// Device/path of the kernel.
    pub path: &'a str,
    /// Full kernel line, file name first.
    pub cmdline: &'a str,
    /// Caller's expected boot protocol.
    pub hint: Option<KernelKind>,
    pub flags: LoadFlags,
}

impl<'a> LoadRequest<'a> {
    /// Request with the path doubling as the command line.
    pub fn new(path: &'a str) -> Self {
        Self {
            path,
            cmdline: path,
            hint: None,
            flags: LoadFlags::empty(),
        }
    }

    pub fn cmdline(mut self, cmdline: &'a str) -> Self {
        self.cmdline = cmdline;
        self
    }

    pub fn hint(mut self, hint: KernelKind) -> Self {
        self.hint = Some(hint);
        self
    }

    pub fn flags(mut self, flags: LoadFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// Validated result of format detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedImage {
    Elf(ElfPlan),
    AOut(AoutPlan),
    Kludge(AoutPlan),
    Linux(LinuxPlan),
}

impl ParsedImage {
    pub fn format(&self) -> ImageFormat {
        match self {
            ParsedImage::Elf(p) => p.format,
            ParsedImage::AOut(p) | ParsedImage::Kludge(p) => p.format,
            ParsedImage::Linux(p) if p.staging.big => ImageFormat::LinuxBzImage,
            ParsedImage::Linux(_) => ImageFormat::LinuxZImage,
        }
    }

    fn below_1mb(&self) -> bool {
        match self {
            ParsedImage::Elf(p) => p.below_1mb,
            ParsedImage::AOut(p) | ParsedImage::Kludge(p) => p.below_1mb,
            ParsedImage::Linux(_) => false,
        }
    }
}

/// Classify the probe window.
///
/// `multiboot` is the header found in the window, if any.
pub fn detect(
    window: &[u8],
    multiboot: Option<&MultibootHeader>,
    filemax: u64,
    req: &LoadRequest<'_>,
    mem_lower_kb: u32,
    mem_upper_kb: u32,
) -> Result<ParsedImage, BootError> {
    if let Some(result) = elf::probe(window, multiboot.is_some(), req.hint) {
        return result.map(ParsedImage::Elf);
    }
    if let Some(mb) = multiboot.filter(|mb| mb.is_kludge()) {
        return plan_kludge(mb, filemax).map(ParsedImage::Kludge);
    }
    if let Some(exec) = ExecHeader::parse(window) {
        return Ok(ParsedImage::AOut(plan_exec(window, &exec, multiboot.is_some())));
    }
    let lh = LinuxHeader::read(window);
    if lh.is_boot_sector() {
        let plan = linux::plan(&lh, filemax, req.cmdline, req.flags, mem_lower_kb, mem_upper_kb)?;
        return Ok(ParsedImage::Linux(plan));
    }
    Err(BootError::ExecFormat)
}

/// Detect, check and load the kernel named by `req`.
///
/// The session's boot-info record, module list and Linux staging are reset
/// first. On success the high-water mark sits past the loaded image.
pub fn load_image(session: &mut BootSession, req: &LoadRequest<'_>) -> Result<KernelImage, BootError> {
    session.info.reset_for_kernel(req.cmdline);
    session.linux = None;
    session.linux_mem_size = 0;
    session.cur_addr = 0;

    let mut file = session.storage.open(req.path)?;
    let filemax = file.size();
    session.measure_load(file.as_mut(), req.path)?;

    let mut probe = vec![0u8; session.config.probe_size];
    let len = read_full(file.as_mut(), &mut probe)?;
    if len < MIN_IMAGE_LEN {
        return Err(BootError::ExecFormat);
    }
    let window = &probe[..len];

    let multiboot = find_header(window);
    let mut video = false;
    if let Some(mb) = &multiboot {
        mb.check_features()?;
        if let Some((w, h, d)) = mb.video_request() {
            video = session.display.as_mut().is_some_and(|disp| disp.match_vbe(w, h, d));
            if video {
                session.info.flags.insert(InfoFlags::VIDEO_INFO);
            }
        }
    }

    let parsed = detect(
        window,
        multiboot.as_ref(),
        filemax,
        req,
        session.config.mem_lower_kb,
        session.config.mem_upper_kb,
    )?;
    let format = parsed.format();
    if parsed.below_1mb() {
        warn!("{format}: load address below 1MB");
        return Err(BootError::BelowOneMb);
    }
    if let Some(hint) = req.hint {
        if hint != format.kind() {
            warn!("{format} image does not match requested {hint:?} kernel");
            return Err(BootError::ExecFormat);
        }
    }

    let image = match parsed {
        ParsedImage::Elf(plan) => load_elf(session, file.as_mut(), plan)?,
        ParsedImage::AOut(plan) | ParsedImage::Kludge(plan) => load_aout(session, file.as_mut(), filemax, plan)?,
        ParsedImage::Linux(plan) => load_linux(session, file.as_mut(), plan)?,
    };
    Ok(KernelImage { video, ..image })
}

/// Copy `len` bytes from the file's current position to `dest`.
///
/// A short read is a format error; out-of-map destinations are `WontFit`.
pub(crate) fn copy_to_memory(
    file: &mut dyn BootFile,
    memory: &mut PhysicalMemory,
    dest: u32,
    len: u32,
) -> Result<(), BootError> {
    if !memory.fits(dest, u64::from(len)) {
        return Err(BootError::WontFit);
    }
    let mut buf = vec![0u8; len as usize];
    if read_full(file, &mut buf)? != buf.len() {
        return Err(BootError::ExecFormat);
    }
    memory.write(dest, &buf)
}

fn load_elf(session: &mut BootSession, file: &mut dyn BootFile, plan: ElfPlan) -> Result<KernelImage, BootError> {
    let mut end = 0u32;
    for seg in &plan.segments {
        if !session.memory.fits(seg.dest, u64::from(seg.mem_size)) {
            return Err(BootError::WontFit);
        }
        file.seek(SeekFrom::Start(seg.file_offset))?;
        copy_to_memory(file, &mut session.memory, seg.dest, seg.file_size)?;
        session.memory.zero(seg.dest + seg.file_size, seg.mem_size - seg.file_size)?;
        debug!("<0x{:x}:0x{:x}:0x{:x}>", seg.dest, seg.file_size, seg.mem_size - seg.file_size);
        end = end.max(seg.dest + seg.mem_size);
    }

    let mut symbols = None;
    match elf::load_sections(file, &mut session.memory, &plan.sections, end) {
        Some((syms, new_end)) => {
            session.info.flags.insert(InfoFlags::ELF_SHDR);
            symbols = Some(syms);
            end = new_end;
        }
        None => debug!("section headers not loaded"),
    }
    session.info.syms = symbols;
    session.cur_addr = end;

    info!("[{}, <{} segment(s)>, entry=0x{:x}]", plan.format, plan.segments.len(), plan.entry);
    Ok(KernelImage {
        format: plan.format,
        entry: plan.entry,
        segments: plan.segments,
        symbols,
        video: false,
    })
}

fn load_aout(
    session: &mut BootSession,
    file: &mut dyn BootFile,
    filemax: u64,
    plan: AoutPlan,
) -> Result<KernelImage, BootError> {
    let kludge = plan.format == ImageFormat::AOutKludge;
    let mut segments = Vec::with_capacity(2);
    let mut cur = plan.load_addr;

    file.seek(SeekFrom::Start(u64::from(plan.text_offset)))?;
    copy_to_memory(file, &mut session.memory, cur, plan.text_len)?;
    segments.push(Segment {
        dest: cur,
        file_offset: u64::from(plan.text_offset),
        file_size: plan.text_len,
        mem_size: plan.text_len,
    });
    cur = cur.checked_add(plan.text_len).ok_or(BootError::WontFit)?;

    if !kludge {
        if plan.align_4k {
            cur = align_4k(cur);
        }
        let data_offset = u64::from(plan.text_offset) + u64::from(plan.text_len);
        copy_to_memory(file, &mut session.memory, cur, plan.data_len)?;
        segments.push(Segment {
            dest: cur,
            file_offset: data_offset,
            file_size: plan.data_len,
            mem_size: plan.data_len,
        });
        cur = cur.checked_add(plan.data_len).ok_or(BootError::WontFit)?;
    }

    session.memory.zero(cur, plan.bss_len)?;
    if let Some(last) = segments.last_mut() {
        last.mem_size = last.mem_size.checked_add(plan.bss_len).ok_or(BootError::WontFit)?;
    }
    cur = cur.checked_add(plan.bss_len).ok_or(BootError::WontFit)?;

    info!(
        "[{}, loadaddr=0x{:x}, text{}=0x{:x}, data=0x{:x}, bss=0x{:x}, entry=0x{:x}]",
        plan.format,
        plan.load_addr,
        if kludge { "-and-data" } else { "" },
        plan.text_len,
        plan.data_len,
        plan.bss_len,
        plan.entry
    );

    let filepos = file.stream_position()?;
    let mut symbols = None;
    if plan.syms != 0 && u64::from(plan.syms) < filemax.saturating_sub(filepos) {
        match load_aout_symbols(file, &mut session.memory, cur, plan.syms, plan.align_4k) {
            Some((syms, end)) => {
                session.info.flags.insert(InfoFlags::AOUT_SYMS);
                symbols = Some(syms);
                cur = end;
            }
            None => debug!("a.out symbol table dropped"),
        }
    }
    session.info.syms = symbols;
    session.cur_addr = cur;

    Ok(KernelImage {
        format: plan.format,
        entry: plan.entry,
        segments,
        symbols,
        video: false,
    })
}

/// Symbol table, then string table (its size word included), stored
/// back to back after the image. Any inconsistency drops both.
fn load_aout_symbols(
    file: &mut dyn BootFile,
    memory: &mut PhysicalMemory,
    end: u32,
    syms: u32,
    align: bool,
) -> Option<(SymbolTable, u32)> {
    let addr = if align { align_4k(end) } else { end };
    memory.write(addr, &syms.to_le_bytes()).ok()?;
    let mut cur = addr.checked_add(4)?;
    copy_to_memory(file, memory, cur, syms).ok()?;
    cur = cur.checked_add(syms)?;

    let mut word = [0u8; 4];
    if read_full(file, &mut word).ok()? != 4 {
        return None;
    }
    let strsize = u32::from_le_bytes(word);
    memory.write(cur, &word).ok()?;
    cur = cur.checked_add(4)?;
    let strings = strsize.checked_sub(4)?;
    copy_to_memory(file, memory, cur, strings).ok()?;
    cur = cur.checked_add(strings)?;

    Some((
        SymbolTable::AOut {
            tabsize: syms,
            strsize,
            addr,
        },
        cur,
    ))
}

fn load_linux(session: &mut BootSession, file: &mut dyn BootFile, plan: LinuxPlan) -> Result<KernelImage, BootError> {
    let staging = plan.staging;
    let setup_len = staging.setup_len();
    if !session.memory.fits(staging.tmp_addr, u64::from(LINUX_SETUP_MOVE_SIZE)) {
        return Err(BootError::WontFit);
    }

    let mut setup = vec![0u8; setup_len as usize];
    file.seek(SeekFrom::Start(0))?;
    if read_full(file, &mut setup)? != setup.len() {
        return Err(BootError::ExecFormat);
    }
    staging.header.write_into(&mut setup);
    session.memory.write(staging.tmp_addr, &setup)?;
    if plan.clear_heap {
        let heap = (u32::from(staging.setup_sects) + 1) << 9;
        let heap_len = (u32::from(linux::LINUX_MAX_SETUP_SECTS) - u32::from(staging.setup_sects) - 1) << 9;
        session.memory.zero(staging.tmp_addr + heap, heap_len)?;
    }

    let mut cl = staging.cmdline.clone().into_bytes();
    cl.push(0);
    session.memory.write(staging.tmp_addr + linux::LINUX_CL_OFFSET, &cl)?;

    file.seek(SeekFrom::Start(u64::from(setup_len)))?;
    copy_to_memory(file, &mut session.memory, LINUX_BZIMAGE_ADDR, staging.text_len)?;

    let format = if staging.big {
        ImageFormat::LinuxBzImage
    } else {
        ImageFormat::LinuxZImage
    };
    let segments = vec![
        Segment {
            dest: staging.tmp_addr,
            file_offset: 0,
            file_size: setup_len,
            mem_size: LINUX_SETUP_MOVE_SIZE,
        },
        Segment {
            dest: LINUX_BZIMAGE_ADDR,
            file_offset: u64::from(setup_len),
            file_size: staging.text_len,
            mem_size: staging.text_len,
        },
    ];
    let entry = staging.real_addr + linux::SECTOR_SIZE;

    session.info.cmdline = staging.cmdline.clone();
    session.cur_addr = staging.end_addr();
    session.linux_mem_size = plan.mem_size;
    session.linux = Some(staging);

    Ok(KernelImage {
        format,
        entry,
        segments,
        symbols: None,
        video: false,
    })
}
