use anyhow::{bail, Result};
use std::fs;
use std::path::PathBuf;

/// Flat directory of whole-document text files. Callers share one
/// store behind a single mutex (see `Server`), so every operation is
/// serialized against every other, across all files.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(FileStore { root })
    }

    /// Names only, no paths. Blocks path traversal and nesting.
    fn valid_name(name: &str) -> bool {
        !name.trim().is_empty()
            && !name.contains("..")
            && !name.contains('/')
            && !name.contains('\\')
    }

    pub fn list(&self) -> Vec<String> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("could not list {}: {}", self.root.display(), e);
                return Vec::new();
            }
        };

        entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect()
    }

    pub fn create(&self, name: &str) -> bool {
        if !Self::valid_name(name) {
            return false;
        }

        let path = self.root.join(name);
        if path.exists() {
            return false;
        }

        match fs::write(&path, "") {
            Ok(()) => true,
            Err(e) => {
                log::error!("could not create {}: {}", name, e);
                false
            }
        }
    }

    pub fn read(&self, name: &str) -> Result<String> {
        if !Self::valid_name(name) {
            bail!("Geçersiz dosya adı: {}", name);
        }

        let path = self.root.join(name);
        if !path.exists() {
            bail!("Dosya bulunamadı: {}", name);
        }

        Ok(fs::read_to_string(&path)?)
    }

    /// Create-or-replace. The content arrives already unescaped; the
    /// store never sees the wire encoding.
    pub fn write(&self, name: &str, content: &str) -> Result<()> {
        if !Self::valid_name(name) {
            bail!("Geçersiz dosya adı: {}", name);
        }

        fs::write(self.root.join(name), content.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_store() -> (TempDir, FileStore) {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_create_and_list() {
        let (_dir, store) = setup_store();
        assert!(store.list().is_empty());

        assert!(store.create("notes.txt"));
        let files = store.list();
        assert_eq!(files, vec!["notes.txt".to_string()]);
    }

    #[test]
    fn test_create_existing_fails() {
        let (_dir, store) = setup_store();
        assert!(store.create("notes.txt"));
        assert!(!store.create("notes.txt"));
    }

    #[test]
    fn test_write_then_read() {
        let (_dir, store) = setup_store();
        store.write("doc.txt", "hello\nworld").unwrap();
        assert_eq!(store.read("doc.txt").unwrap(), "hello\nworld");
    }

    #[test]
    fn test_write_replaces_whole_document() {
        let (_dir, store) = setup_store();
        store.write("doc.txt", "first version, quite long").unwrap();
        store.write("doc.txt", "v2").unwrap();
        assert_eq!(store.read("doc.txt").unwrap(), "v2");
    }

    #[test]
    fn test_read_missing_fails() {
        let (_dir, store) = setup_store();
        assert!(store.read("missing.txt").is_err());
    }

    #[test]
    fn test_rejects_unsafe_names() {
        let (dir, store) = setup_store();
        for name in ["", "  ", "../escape.txt", "a/b.txt", "a\\b.txt", ".."] {
            assert!(!store.create(name), "create accepted {:?}", name);
            assert!(store.read(name).is_err(), "read accepted {:?}", name);
            assert!(store.write(name, "x").is_err(), "write accepted {:?}", name);
        }
        // Nothing escaped the root or landed inside it.
        assert!(store.list().is_empty());
        assert!(!dir.path().parent().unwrap().join("escape.txt").exists());
    }
}
