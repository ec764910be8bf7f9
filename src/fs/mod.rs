// src/fs/mod.rs

use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub mod mock;

/// Abstract filesystem interface used for the local side of log collection.
pub trait FileSystem: Send + Sync + Debug {
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn exists(&self, path: &Path) -> bool;
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Copy `from` to `to`, overwriting `to`. Returns the number of bytes copied.
    fn copy(&self, from: &Path, to: &Path) -> Result<u64>;
    fn remove_file(&self, path: &Path) -> Result<()>;

    /// Whether `a` and `b` name the same existing file.
    fn same_file(&self, a: &Path, b: &Path) -> bool;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("reading file {:?}", path))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).with_context(|| format!("creating dir {:?}", path))
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<u64> {
        fs::copy(from, to).with_context(|| format!("copying {:?} to {:?}", from, to))
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).with_context(|| format!("removing file {:?}", path))
    }

    fn same_file(&self, a: &Path, b: &Path) -> bool {
        match (fs::canonicalize(a), fs::canonicalize(b)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

/// `dir` joined with the final component of `source`, which may use either
/// separator (guest paths are POSIX, host paths may be Windows).
pub fn destination_in(dir: &Path, source: &str) -> Result<PathBuf> {
    let name = source
        .rsplit(['/', '\\'])
        .next()
        .filter(|n| !n.is_empty())
        .with_context(|| format!("no file name in {source:?}"))?;
    Ok(dir.join(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_keeps_file_name() {
        let dest = destination_in(Path::new("/logs"), "/home/dev/build/2024-05-01 09:30_vm_output").unwrap();
        assert_eq!(dest, PathBuf::from("/logs/2024-05-01 09:30_vm_output"));

        let dest = destination_in(Path::new("/logs"), r"C:\build\x_output").unwrap();
        assert_eq!(dest, PathBuf::from("/logs/x_output"));
    }

    #[test]
    fn same_file_resolves_relative_components() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("out.log");
        fs::write(&log, "x").unwrap();
        let fs = RealFileSystem;

        assert!(fs.same_file(&log, &dir.path().join(".").join("out.log")));
        assert!(!fs.same_file(&log, &dir.path().join("missing.log")));
    }

    #[test]
    fn destination_requires_file_name() {
        assert!(destination_in(Path::new("/logs"), "/home/dev/").is_err());
    }
}
