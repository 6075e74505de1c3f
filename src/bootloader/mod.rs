// CLASSIFICATION: COMMUNITY
// Filename: mod.rs v0.3
// Date Modified: 2026-10-18
// Author: Lukas Bower
//
// ─────────────────────────────────────────────────────────────
// tGRUB · Loader (root module)
//
// Places kernels, modules and ramdisks into the physical memory
// model of a `BootSession`.
//
// Current sub-modules
// -------------------
// * `session`   – explicit boot state + boot-info record
// * `memory`    – bounds-checked physical memory
// * `storage`   – device/path file access
// * `console`   – operator and display collaborators
// * `args`      – kernel/module argument helpers
// * `multiboot`, `elf`, `aout`, `linux` – header parsers
// * `image`     – format detection and segment loading
// * `module`    – Multiboot modules
// * `initrd`    – Linux ramdisk placement
// ─────────────────────────────────────────────────────────────

pub mod aout;
/// Argument helpers for kernel and module lines.
pub mod args;
pub mod console;
pub mod elf;
/// Format detection and segment loading.
///
/// See [`image::load_image`].
pub mod image;
pub mod initrd;
pub mod linux;
pub mod memory;
pub mod module;
pub mod multiboot;
pub mod session;
pub mod storage;
