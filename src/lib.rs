// CLASSIFICATION: COMMUNITY
// Filename: lib.rs v1.1
// Date Modified: 2026-10-18
// Author: Lukas Bower

//! Measured-boot core: loads Multiboot, ELF, a.out and Linux kernels into a
//! modelled physical memory and measures what it loads into PCRs.

#![forbid(unsafe_code)]

/// Hashing, PCR extension and checkfile verification.
pub mod boot;

/// Kernel, module and initrd loading.
pub mod bootloader;

/// Boot session configuration.
pub mod config;

/// Crate-wide error type.
pub mod error;

pub use boot::measure::{ExtendPolicy, Measurer, PcrValue};
pub use boot::tpm::{SoftTpm, TcgTransport};
pub use bootloader::image::{load_image, ImageFormat, KernelImage, KernelKind, LoadFlags, LoadRequest};
pub use bootloader::initrd::load_initrd;
pub use bootloader::module::load_module;
pub use bootloader::session::BootSession;
pub use config::BootConfig;
pub use error::{BootError, BootResult};
