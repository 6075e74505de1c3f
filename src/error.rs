// CLASSIFICATION: COMMUNITY
// Filename: error.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-10-18

//! Crate-wide error type.
//!
//! The variants mirror the boot loader's classic error numbers
//! (`ERR_EXEC_FORMAT`, `ERR_BELOW_1MB`, ...) plus the bounds failures that
//! the typed loader reports instead of writing past a buffer.

use thiserror::Error;

/// Errors surfaced by loading, hashing and measuring.
#[derive(Debug, Error)]
pub enum BootError {
    /// Unrecognised or structurally invalid executable, or a format that
    /// disagrees with the caller's hint.
    #[error("invalid or unsupported executable format")]
    ExecFormat,
    /// A required load address lies below 1 MiB physical.
    #[error("loading below 1MB is not supported")]
    BelowOneMb,
    /// The Multiboot header asks for features this loader does not implement.
    #[error("unsupported Multiboot features requested (flags 0x{0:08x})")]
    BootFeatures(u32),
    /// The image does not fit its addressable memory window.
    #[error("selected item cannot fit into memory")]
    WontFit,
    /// A module would end beyond usable memory.
    #[error("module at 0x{addr:x} with length 0x{len:x} exceeds usable memory 0x{limit:x}")]
    BadModuleAddress {
        /// Rounded load address.
        addr: u32,
        /// File length in bytes.
        len: u64,
        /// First byte past usable memory.
        limit: u64,
    },
    /// A numeric argument exceeds the representable range.
    #[error("overflow while parsing number")]
    NumberOverflow,
    /// A numeric argument could not be parsed at all.
    #[error("bad or corrupt number: {0:?}")]
    InvalidNumber(String),
    /// Zero-length chunk handed to the SHA1 engine.
    #[error("sha1 update rejected a zero-length chunk")]
    EmptyChunk,
    /// PCR index outside the range reserved for the boot loader.
    #[error("wrong PCR register {0}, allowed values are 8...15")]
    InvalidPcrIndex(u8),
    /// Initial PCR value is neither `NULL` nor 40 lowercase hex digits.
    #[error("invalid PCR value {0:?}: expected NULL or 40 lowercase hex digits")]
    InvalidPcrValue(String),
    /// Manifest record layout violated.
    #[error("file list not in correct format at byte {offset}: {reason}")]
    ManifestFormat {
        /// Byte offset of the offending record element.
        offset: usize,
        /// What was expected there.
        reason: &'static str,
    },
    /// Manifest larger than the checkfile buffer.
    #[error("file list too large ({0} bytes)")]
    ManifestTooLarge(usize),
    /// A manifest path exceeded the path limit.
    #[error("file name too long at byte {0}")]
    FileNameTooLong(usize),
    /// Module table capacity exhausted.
    #[error("module table full ({0} entries)")]
    TooManyModules(usize),
    /// Module argument has more tokens than the splice tokenizer accepts.
    #[error("module argument has more than {0} tokens")]
    TooManyTokens(usize),
    /// A single module argument token is too long.
    #[error("module argument token longer than {0} bytes")]
    TokenTooLong(usize),
    /// `initrd` issued without a staged Linux kernel.
    #[error("no Linux kernel staged for initrd")]
    NoLinuxKernel,
    /// A file that has to carry data is empty.
    #[error("file {0} is empty")]
    EmptyFile(String),
    /// The storage collaborator has no such file.
    #[error("file not found: {0}")]
    FileNotFound(String),
    /// The trust-anchor transport refused or failed the request.
    #[error("trust anchor transport failure: {0}")]
    Transport(String),
    /// The operator stopped the boot at the integrity prompt.
    #[error("boot aborted by operator after {0} integrity error(s)")]
    Aborted(usize),
    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),
    /// Underlying read, open or seek failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result alias used across the crate.
pub type BootResult<T> = Result<T, BootError>;
