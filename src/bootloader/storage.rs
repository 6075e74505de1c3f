// CLASSIFICATION: COMMUNITY
// Filename: storage.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-10-18

//! Storage collaborator.
//!
//! The loader never resolves paths itself: a [`Storage`] maps a device/path
//! string such as `(hd0,0)/boot/vmlinuz` to an open [`BootFile`]. Dropping
//! the handle closes the file, so every exit path of a loader closes its
//! stream.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::BootError;

/// An open, seekable file with a known size.
pub trait BootFile: Read + Seek {
    /// Total size in bytes (`filemax`).
    fn size(&self) -> u64;
}

/// Opens files by device/path name.
pub trait Storage {
    /// Open `path` for reading.
    fn open(&self, path: &str) -> Result<Box<dyn BootFile>, BootError>;

    /// Whether `path` names an existing file.
    fn exists(&self, path: &str) -> bool {
        self.open(path).is_ok()
    }
}

/// In-memory file handle.
pub struct MemFile {
    data: Cursor<Vec<u8>>,
}

impl MemFile {
    /// Wrap `bytes` as an open file.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            data: Cursor::new(bytes),
        }
    }
}

impl Read for MemFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.data.read(buf)
    }
}

impl Seek for MemFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.data.seek(pos)
    }
}

impl BootFile for MemFile {
    fn size(&self) -> u64 {
        self.data.get_ref().len() as u64
    }
}

/// Path-keyed in-memory storage, used by tests and tooling.
#[derive(Debug, Default, Clone)]
pub struct MemStorage {
    files: HashMap<String, Vec<u8>>,
}

impl MemStorage {
    /// Empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with_file(mut self, path: &str, data: Vec<u8>) -> Self {
        self.insert(path, data);
        self
    }

    /// Insert or replace a file.
    pub fn insert(&mut self, path: &str, data: Vec<u8>) {
        self.files.insert(path.to_string(), data);
    }
}

impl Storage for MemStorage {
    fn open(&self, path: &str) -> Result<Box<dyn BootFile>, BootError> {
        self.files
            .get(path)
            .map(|d| Box::new(MemFile::new(d.clone())) as Box<dyn BootFile>)
            .ok_or_else(|| BootError::FileNotFound(path.to_string()))
    }

    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }
}

/// Host file handle.
pub struct HostFile {
    file: File,
    size: u64,
}

impl Read for HostFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Seek for HostFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

impl BootFile for HostFile {
    fn size(&self) -> u64 {
        self.size
    }
}

/// Storage backed by a host directory.
///
/// A leading GRUB device prefix such as `(hd0,0)` is stripped and the rest
/// is resolved below `root`.
#[derive(Debug, Clone)]
pub struct HostStorage {
    root: PathBuf,
}

impl HostStorage {
    /// Resolve paths below `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let stripped = match path.strip_prefix('(') {
            Some(rest) => rest.split_once(')').map(|(_, p)| p).unwrap_or(path),
            None => path,
        };
        self.root.join(stripped.trim_start_matches('/'))
    }
}

impl Storage for HostStorage {
    fn open(&self, path: &str) -> Result<Box<dyn BootFile>, BootError> {
        let full = self.resolve(path);
        let file = File::open(&full).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => BootError::FileNotFound(path.to_string()),
            _ => BootError::Io(e),
        })?;
        let size = file.metadata()?.len();
        Ok(Box::new(HostFile { file, size }))
    }

    fn exists(&self, path: &str) -> bool {
        Path::new(&self.resolve(path)).is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn host_storage_strips_device_prefix() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("boot")).unwrap();
        let mut f = File::create(dir.path().join("boot/hello")).unwrap();
        f.write_all(b"hello").unwrap();

        let storage = HostStorage::new(dir.path());
        assert!(storage.exists("(hd0,0)/boot/hello"));
        assert!(storage.exists("/boot/hello"));
        let mut file = storage.open("(hd0,0)/boot/hello").unwrap();
        assert_eq!(file.size(), 5);
        let mut s = String::new();
        file.read_to_string(&mut s).unwrap();
        assert_eq!(s, "hello");
        assert!(matches!(storage.open("(hd0,0)/boot/none"), Err(BootError::FileNotFound(_))));
    }

    #[test]
    fn mem_storage_round_trip() {
        let storage = MemStorage::new().with_file("a", vec![1, 2, 3]);
        let mut f = storage.open("a").unwrap();
        f.seek(SeekFrom::Start(1)).unwrap();
        let mut b = Vec::new();
        f.read_to_end(&mut b).unwrap();
        assert_eq!(b, vec![2, 3]);
        assert!(!storage.exists("b"));
    }
}
