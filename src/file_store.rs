//! Raw PDF storage on the local filesystem.
//!
//! Files are named `<uuid><ext>` under a configured root; the extension is
//! taken from the original filename (falling back to `.pdf`) and is the
//! only part of the user-supplied name that survives. Bytes are written
//! to a temporary file in the same directory and renamed into place, so
//! a stored path is either complete or absent.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use uuid::Uuid;

const DEFAULT_EXTENSION: &str = "pdf";

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist `bytes` and return the storage path.
    pub fn save(&self, bytes: &[u8], original_name: &str) -> io::Result<String> {
        let name = format!("{}.{}", Uuid::new_v4(), extension_of(original_name));
        let target = self.root.join(name);

        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist_noclobber(&target).map_err(|e| e.error)?;

        Ok(target.display().to_string())
    }

    /// Remove a stored file. Missing files are not an error.
    pub fn delete(&self, storage_path: &str) -> io::Result<()> {
        match std::fs::remove_file(self.resolve(storage_path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub fn resolve(&self, storage_path: &str) -> PathBuf {
        let path = Path::new(storage_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

/// Lowercased extension of `name` if it is short and alphanumeric.
fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 10 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_writes_exact_bytes() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("files")).unwrap();
        let path = store.save(b"%PDF-1.4 body", "Quarterly Report.PDF").unwrap();

        assert!(path.ends_with(".pdf"));
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.4 body");
        let stem = Path::new(&path).file_stem().unwrap().to_str().unwrap();
        assert!(Uuid::parse_str(stem).is_ok());
    }

    #[test]
    fn test_user_name_never_reaches_disk() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let path = store.save(b"x", "../../etc/passwd").unwrap();
        assert!(Path::new(&path).starts_with(dir.path()));
        assert!(!path.contains("passwd"));
        assert!(path.ends_with(".pdf"));
    }

    #[test]
    fn test_extension_fallbacks() {
        assert_eq!(extension_of("scan.pdf"), "pdf");
        assert_eq!(extension_of("noext"), "pdf");
        assert_eq!(extension_of("weird.p d f"), "pdf");
        assert_eq!(extension_of("archive.tar.GZ"), "gz");
    }

    #[test]
    fn test_names_do_not_collide() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let a = store.save(b"a", "same.pdf").unwrap();
        let b = store.save(b"b", "same.pdf").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let path = store.save(b"x", "a.pdf").unwrap();
        store.delete(&path).unwrap();
        assert!(!Path::new(&path).exists());
        store.delete(&path).unwrap();
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        store.save(b"x", "a.pdf").unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
