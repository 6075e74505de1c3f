// CLASSIFICATION: COMMUNITY
// Filename: test_checkfile.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-18

mod common;

use std::fs;

use common::init_logging;
use tgrub::boot::verify::load_checkfile;
use tgrub::bootloader::console::{Key, ScriptedOperator};
use tgrub::bootloader::storage::{HostStorage, MemStorage, Storage};
use tgrub::{BootConfig, BootError, BootSession, ExtendPolicy, SoftTpm};

const MANIFEST: &str = "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d (hd0,0)/boot/hello\n";

fn host_session(content: &[u8], manifest: &str, keys: Vec<Key>) -> (tempfile::TempDir, BootSession) {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("boot")).unwrap();
    fs::write(dir.path().join("boot/hello"), content).unwrap();
    fs::write(dir.path().join("boot/checkfile"), manifest).unwrap();
    let session = BootSession::new(
        BootConfig::default(),
        Box::new(HostStorage::new(dir.path())),
        Box::new(SoftTpm::new()),
        Box::new(ScriptedOperator::new().with_keys(keys)),
    );
    (dir, session)
}

#[test]
fn matching_file_passes_without_prompt() {
    init_logging();
    let (_dir, mut s) = host_session(b"hello", MANIFEST, vec![Key::Escape]);
    let report = load_checkfile(&mut s, "(hd0,0)/boot/checkfile").unwrap();
    assert_eq!(report.checked, 1);
    assert!(report.is_clean());
    assert!(!report.prompted);
}

#[test]
fn mismatch_is_aggregated_and_prompts() {
    init_logging();
    let (_dir, mut s) = host_session(b"hellx", MANIFEST, vec![Key::Other(' ')]);
    let report = load_checkfile(&mut s, "(hd0,0)/boot/checkfile").unwrap();
    assert_eq!(report.mismatches, vec!["(hd0,0)/boot/hello".to_string()]);
    assert!(report.prompted);
    assert_eq!(report.extended, 0);

    let (_dir, mut s) = host_session(b"hellx", MANIFEST, vec![Key::Escape]);
    assert!(matches!(
        load_checkfile(&mut s, "(hd0,0)/boot/checkfile"),
        Err(BootError::Aborted(1))
    ));
}

#[test]
fn missing_space_fails_before_hashing() {
    let bad = MANIFEST.replacen(' ', "\t", 1);
    // The listed file does not even exist: the format error must win.
    let storage = MemStorage::new().with_file("/list", format!("{bad}{MANIFEST}").into_bytes());
    let mut s = BootSession::new(
        BootConfig::default(),
        Box::new(storage),
        Box::new(SoftTpm::new()),
        Box::new(ScriptedOperator::new()),
    );
    assert!(matches!(
        load_checkfile(&mut s, "/list"),
        Err(BootError::ManifestFormat { offset: 40, .. })
    ));
    assert!(s.events().is_empty());
}

fn run_ordered(manifest: String) -> [u8; 20] {
    let storage = MemStorage::new()
        .with_file("/list", manifest.into_bytes())
        .with_file("/a", b"A".to_vec())
        .with_file("/b", b"B".to_vec());
    let tpm = SoftTpm::new();
    let config = BootConfig {
        extend_policy: ExtendPolicy::Always,
        ..BootConfig::default()
    };
    let mut s = BootSession::new(
        config,
        Box::new(storage),
        Box::new(tpm.clone()),
        Box::new(ScriptedOperator::new()),
    );
    let report = load_checkfile(&mut s, "/list").unwrap();
    assert_eq!(report.extended, 2);
    tpm.pcr(13)
}

#[test]
fn extends_follow_manifest_order() {
    let a = "6dcd4ce23d88e2ee9568ba546c007c63d9131c1b /a\n";
    let b = "ae4f281df5a5d0ff3cad6371f76d5c29b6d953ec /b\n";
    assert_ne!(run_ordered(format!("{a}{b}")), run_ordered(format!("{b}{a}")));
}

#[test]
fn default_policy_pins_absent_anchor_gate() {
    let tpm = SoftTpm::new();
    let storage = MemStorage::new()
        .with_file("/list", b"aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d /hello\n".to_vec())
        .with_file("/hello", b"hello".to_vec());
    assert!(storage.exists("/hello"));
    let mut s = BootSession::new(
        BootConfig::default(),
        Box::new(storage),
        Box::new(tpm.clone()),
        Box::new(ScriptedOperator::new()),
    );
    assert_eq!(s.config().extend_policy, ExtendPolicy::WhenAnchorAbsent);
    let report = load_checkfile(&mut s, "/list").unwrap();
    // Present anchor: the match is logged but never sent.
    assert_eq!(report.extended, 0);
    assert_eq!(tpm.extend_count(), 0);
    assert!(!s.events()[0].sent);
}
