// CLASSIFICATION: COMMUNITY
// Filename: mod.rs v0.3
// Date Modified: 2026-10-18
// Author: Lukas Bower
//
// ─────────────────────────────────────────────────────────────
// tGRUB · Measurement subsystem (root module)
//
// Hashing, PCR extension and integrity checks used while a
// boot session loads files.
//
// ## Sub-modules
// * `sha1`      – streaming SHA1 engine
// * `file_hash` – chunked file hashing, `sha1sum` line format
// * `tpm`       – extend command envelope + transport trait
// * `measure`   – extend rule, policy-gated `Measurer`
// * `verify`    – checkfile verification
// * `offline`   – PCR prediction without an anchor
// ─────────────────────────────────────────────────────────────

pub mod file_hash;
/// Extend rule and measurement log.
/// Re-export [`measure::extend_pcr`] for convenience.
pub mod measure;
pub use measure::extend_pcr;
pub mod offline;
pub mod sha1;
/// Trust-anchor command envelope and transports.
pub mod tpm;
/// Checkfile verification.
pub mod verify;
