// CLASSIFICATION: COMMUNITY
// Filename: offline.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-18

//! Predicts a PCR value without a trust anchor.
//!
//! Files are hashed and chained with the same extend rule the live path
//! uses, so an auditor can compare the result with a quote.

use log::debug;

use crate::boot::file_hash::hash_file;
use crate::boot::measure::PcrValue;
use crate::bootloader::storage::Storage;
use crate::error::BootError;

const BANNER_WIDTH: usize = 79;

/// Extend `initial` with the SHA1 of every file in `paths`, in order.
pub fn chain_files<S: AsRef<str>>(
    initial: PcrValue,
    storage: &dyn Storage,
    paths: &[S],
    chunk_size: usize,
) -> Result<PcrValue, BootError> {
    let mut pcr = initial;
    for path in paths {
        let path = path.as_ref();
        let digest = hash_file(storage, path, chunk_size)?;
        debug!("{digest}  {path}");
        pcr.extend(&digest);
    }
    Ok(pcr)
}

/// Result block printed by the verifier tool.
pub fn format_result(pcr: &PcrValue) -> String {
    let banner = "*".repeat(BANNER_WIDTH);
    let bytes: String = pcr.0.iter().map(|b| format!("{b:02x} ")).collect();
    format!("{banner}\n* Result for PCR: {bytes}*\n{banner}\n")
}
