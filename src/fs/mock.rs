// src/fs/mock.rs

use super::FileSystem;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File(Vec<u8>),
    Dir,
}

/// In-memory filesystem; clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, MockEntry>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = path.as_ref().to_path_buf();
        let mut files = self.lock();
        if let Some(parent) = path.parent() {
            Self::ensure_dirs(&mut files, parent);
        }
        files.insert(path, MockEntry::File(content.into()));
    }

    pub fn is_dir(&self, path: &Path) -> bool {
        matches!(self.lock().get(path), Some(MockEntry::Dir))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, MockEntry>> {
        // A poisoned lock only means another test thread panicked mid-write.
        self.files.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn ensure_dirs(files: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            files.entry(ancestor.to_path_buf()).or_insert(MockEntry::Dir);
        }
    }
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        match self.lock().get(path) {
            Some(MockEntry::File(content)) => {
                String::from_utf8(content.clone()).map_err(|e| anyhow!("Invalid UTF-8: {}", e))
            }
            Some(MockEntry::Dir) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock().contains_key(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let mut files = self.lock();
        if let Some(MockEntry::File(_)) = files.get(path) {
            return Err(anyhow!("Not a directory: {:?}", path));
        }
        Self::ensure_dirs(&mut files, path);
        Ok(())
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<u64> {
        let mut files = self.lock();
        let content = match files.get(from) {
            Some(MockEntry::File(content)) => content.clone(),
            Some(MockEntry::Dir) => return Err(anyhow!("Is a directory: {:?}", from)),
            None => return Err(anyhow!("File not found: {:?}", from)),
        };
        match to.parent() {
            Some(parent) if !parent.as_os_str().is_empty() && !files.contains_key(parent) => {
                return Err(anyhow!("Parent directory missing: {:?}", parent));
            }
            _ => {}
        }
        let len = content.len() as u64;
        files.insert(to.to_path_buf(), MockEntry::File(content));
        Ok(len)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        let mut files = self.lock();
        match files.get(path) {
            Some(MockEntry::File(_)) => {
                files.remove(path);
                Ok(())
            }
            Some(MockEntry::Dir) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn same_file(&self, a: &Path, b: &Path) -> bool {
        a == b && matches!(self.lock().get(a), Some(MockEntry::File(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_requires_existing_parent() {
        let fs = MockFileSystem::new();
        fs.add_file("/build/log", "text");

        assert!(fs.copy(Path::new("/build/log"), Path::new("/logs/log")).is_err());

        fs.create_dir_all(Path::new("/logs")).unwrap();
        assert_eq!(fs.copy(Path::new("/build/log"), Path::new("/logs/log")).unwrap(), 4);
        assert_eq!(fs.read_to_string(Path::new("/logs/log")).unwrap(), "text");
    }

    #[test]
    fn remove_file_deletes_entry() {
        let fs = MockFileSystem::new();
        fs.add_file("/build/log", "text");
        fs.remove_file(Path::new("/build/log")).unwrap();
        assert!(!fs.exists(Path::new("/build/log")));
        assert!(fs.is_dir(Path::new("/build")));
    }
}
