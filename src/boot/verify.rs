// CLASSIFICATION: COMMUNITY
// Filename: verify.rs v1.1
// Author: Lukas Bower
// Date Modified: 2026-10-18

//! Checkfile verification.
//!
//! A checkfile lists `<40 hex digits> <path>\n` records. Every listed file
//! is re-hashed; matches are extended into the checkfile PCR, mismatches
//! are counted and, if there are any, the operator decides whether the
//! boot goes on.

use log::{info, warn};

use crate::boot::file_hash::{hash_file, read_full};
use crate::bootloader::console::Key;
use crate::bootloader::session::BootSession;
use crate::config::TCG_BUFFER_SIZE;
use crate::error::BootError;

/// Largest accepted checkfile.
pub const MAX_MANIFEST_LEN: usize = 2 * TCG_BUFFER_SIZE;
/// Longest accepted path in a record.
pub const MAX_PATH_LEN: usize = 1023;
const HASH_LEN: usize = 40;

/// One checkfile line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRecord {
    /// Expected digest exactly as written.
    pub expected: String,
    pub path: String,
}

/// Outcome of a checkfile run that was not aborted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckReport {
    /// Records processed.
    pub checked: usize,
    /// Paths whose digest did not match, in manifest order.
    pub mismatches: Vec<String>,
    /// Matches that actually reached the trust anchor.
    pub extended: usize,
    /// The operator was asked whether to continue.
    pub prompted: bool,
}

impl CheckReport {
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Split a checkfile into records.
///
/// The whole buffer is validated before anything is hashed: a record is
/// 40 bytes, one space, then a path of at most [`MAX_PATH_LEN`] bytes ended
/// by `\n`.
pub fn parse_manifest(data: &[u8]) -> Result<Vec<ManifestRecord>, BootError> {
    if data.len() > MAX_MANIFEST_LEN {
        return Err(BootError::ManifestTooLarge(data.len()));
    }
    let mut records = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        let hash = data.get(pos..pos + HASH_LEN).ok_or(BootError::ManifestFormat {
            offset: pos,
            reason: "truncated hash value",
        })?;
        pos += HASH_LEN;
        if data.get(pos) != Some(&b' ') {
            return Err(BootError::ManifestFormat {
                offset: pos,
                reason: "expected a single space after the hash value",
            });
        }
        pos += 1;

        let rest = &data[pos..];
        let Some(nl) = rest.iter().position(|&b| b == b'\n') else {
            if rest.len() > MAX_PATH_LEN {
                return Err(BootError::FileNameTooLong(pos));
            }
            return Err(BootError::ManifestFormat {
                offset: data.len(),
                reason: "record not terminated by a newline",
            });
        };
        if nl > MAX_PATH_LEN {
            return Err(BootError::FileNameTooLong(pos));
        }
        records.push(ManifestRecord {
            expected: String::from_utf8_lossy(hash).into_owned(),
            path: String::from_utf8_lossy(&rest[..nl]).into_owned(),
        });
        pos += nl + 1;
    }
    Ok(records)
}

/// Verify every file listed in the checkfile at `path`.
///
/// Hash mismatches do not fail the call; they are returned in the report
/// after the operator chose to continue. Escape at that prompt yields
/// [`BootError::Aborted`].
///
/// The manifest is parsed in full first: a malformed record anywhere fails
/// the call before any file is hashed, so well-formed records preceding it
/// are not extended either.
pub fn load_checkfile(session: &mut BootSession, path: &str) -> Result<CheckReport, BootError> {
    info!("Opening checkfile {path}");
    let mut file = session.storage.open(path)?;
    let len = file.size();
    if len > MAX_MANIFEST_LEN as u64 {
        return Err(BootError::ManifestTooLarge(len as usize));
    }
    let mut data = vec![0u8; len as usize];
    let n = read_full(file.as_mut(), &mut data)?;
    data.truncate(n);
    drop(file);

    let records = parse_manifest(&data)?;
    let mut report = CheckReport::default();
    let pcr = session.config.checkfile_pcr;
    for record in &records {
        let digest = hash_file(session.storage.as_ref(), &record.path, session.config.hash_chunk_size)?;
        report.checked += 1;
        if digest.to_hex() != record.expected {
            warn!("Verifying {} -> Integrity Error!", record.path);
            report.mismatches.push(record.path.clone());
            continue;
        }
        if session.record_measurement(pcr, digest, &record.path) {
            report.extended += 1;
        }
    }

    if !report.mismatches.is_empty() {
        let failures = report.mismatches.len();
        warn!("Data integrity not guaranteed, {failures} problem(s) occurred");
        report.prompted = true;
        if session.operator.integrity_prompt(failures) == Key::Escape {
            return Err(BootError::Aborted(failures));
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boot::tpm::SoftTpm;
    use crate::bootloader::console::ScriptedOperator;
    use crate::bootloader::storage::MemStorage;
    use crate::config::BootConfig;

    const HELLO: &str = "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d";

    #[test]
    fn parses_records() {
        let text = format!("{HELLO} (hd0,0)/a\n{HELLO} /b c\n");
        let records = parse_manifest(text.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].path, "(hd0,0)/a");
        assert_eq!(records[1].path, "/b c");
        assert_eq!(records[1].expected, HELLO);
    }

    #[test]
    fn format_errors_are_positional() {
        let text = format!("{HELLO}x/a\n");
        assert!(matches!(
            parse_manifest(text.as_bytes()),
            Err(BootError::ManifestFormat { offset: 40, .. })
        ));
        assert!(matches!(parse_manifest(b"abc"), Err(BootError::ManifestFormat { offset: 0, .. })));
        let text = format!("{HELLO} /a");
        assert!(matches!(parse_manifest(text.as_bytes()), Err(BootError::ManifestFormat { .. })));
        let long = format!("{HELLO} /{}\n", "p".repeat(MAX_PATH_LEN));
        assert!(matches!(parse_manifest(long.as_bytes()), Err(BootError::FileNameTooLong(41))));
        assert!(parse_manifest(&vec![b'a'; MAX_MANIFEST_LEN + 1]).is_err());
    }

    #[test]
    fn default_policy_extends_only_without_anchor() {
        let manifest = format!("{HELLO} /hello\n");
        let files = || {
            MemStorage::new()
                .with_file("/list", manifest.clone().into_bytes())
                .with_file("/hello", b"hello".to_vec())
        };

        let tpm = SoftTpm::absent();
        let mut s = BootSession::new(
            BootConfig::default(),
            Box::new(files()),
            Box::new(tpm.clone()),
            Box::new(ScriptedOperator::new()),
        );
        let report = load_checkfile(&mut s, "/list").unwrap();
        assert!(report.is_clean() && !report.prompted);
        assert_eq!(s.events().len(), 1);
        // Sent, but the absent anchor refused it.
        assert_eq!(report.extended, 0);

        let tpm = SoftTpm::new();
        let mut s = BootSession::new(
            BootConfig::default(),
            Box::new(files()),
            Box::new(tpm.clone()),
            Box::new(ScriptedOperator::new()),
        );
        load_checkfile(&mut s, "/list").unwrap();
        assert_eq!(tpm.extend_count(), 0);
    }

    #[test]
    fn malformed_record_stops_earlier_extends() {
        let files = MemStorage::new()
            .with_file("/list", format!("{HELLO} /hello\n{HELLO}\t/hello\n").into_bytes())
            .with_file("/hello", b"hello".to_vec());
        let tpm = SoftTpm::new();
        let config = BootConfig {
            extend_policy: crate::boot::measure::ExtendPolicy::Always,
            ..BootConfig::default()
        };
        let mut s = BootSession::new(
            config,
            Box::new(files),
            Box::new(tpm.clone()),
            Box::new(ScriptedOperator::new()),
        );
        assert!(matches!(
            load_checkfile(&mut s, "/list"),
            Err(BootError::ManifestFormat { offset: 88, .. })
        ));
        assert!(s.events().is_empty());
        assert_eq!(tpm.extend_count(), 0);
    }

    #[test]
    fn escape_aborts() {
        let files = MemStorage::new()
            .with_file("/list", format!("{HELLO} /x\n{HELLO} /y\n").into_bytes())
            .with_file("/x", b"hellx".to_vec())
            .with_file("/y", b"hello".to_vec());
        let mut s = BootSession::new(
            BootConfig::default(),
            Box::new(files),
            Box::new(SoftTpm::new()),
            Box::new(ScriptedOperator::new().with_keys([Key::Escape])),
        );
        assert!(matches!(load_checkfile(&mut s, "/list"), Err(BootError::Aborted(1))));
    }
}
