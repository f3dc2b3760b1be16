//! Local module directory
//!
//! Installed modules are plain files directly inside one directory.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::{NmbError, Result};
use crate::modules::{to_unix_line_endings, validate_name, ModuleHeader};

/// Installed modules on disk
#[derive(Debug, Clone)]
pub struct ModuleStore {
    dir: PathBuf,
}

impl ModuleStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the modules directory if missing
    pub fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    /// Names of installed modules, sorted
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Path a module lives at, after validating the name
    pub fn path_of(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.dir.join(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.path_of(name).map(|path| path.is_file()).unwrap_or(false)
    }

    /// Store module source with unix line endings
    pub fn write(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.path_of(name)?;
        self.ensure_dir()?;
        std::fs::write(&path, to_unix_line_endings(content))?;
        debug!(module = name, path = %path.display(), "module written");
        Ok(path)
    }

    /// Module source with unix line endings
    pub fn read(&self, name: &str) -> Result<String> {
        let path = self.existing_path(name)?;
        let content = std::fs::read_to_string(path)?;
        Ok(to_unix_line_endings(&content))
    }

    pub fn read_header(&self, name: &str) -> Result<ModuleHeader> {
        Ok(ModuleHeader::parse(&self.read(name)?))
    }

    /// Delete an installed module
    pub fn remove(&self, name: &str) -> Result<()> {
        let path = self.existing_path(name)?;
        std::fs::remove_file(&path)?;
        debug!(module = name, "module removed");
        Ok(())
    }

    fn existing_path(&self, name: &str) -> Result<PathBuf> {
        let path = self.path_of(name)?;
        if !path.is_file() {
            return Err(NmbError::ModuleNotFound(name.to_string()));
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, ModuleStore) {
        let dir = TempDir::new().unwrap();
        let store = ModuleStore::new(dir.path().join("modules"));
        (dir, store)
    }

    #[test]
    fn test_list_missing_dir_is_empty() {
        let (_dir, store) = store();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_list_files_only_sorted() {
        let (_dir, store) = store();
        store.write("zeta.sh", "echo z").unwrap();
        store.write("alpha.py", "print('a')").unwrap();
        std::fs::create_dir(store.dir().join("subdir")).unwrap();

        assert_eq!(store.list().unwrap(), vec!["alpha.py", "zeta.sh"]);
    }

    #[test]
    fn test_write_normalises_line_endings() {
        let (_dir, store) = store();
        let path = store.write("a.sh", "echo 1\r\necho 2\r\n").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "echo 1\necho 2\n");
    }

    #[test]
    fn test_rejects_traversal() {
        let (_dir, store) = store();
        assert!(matches!(
            store.write("../escape.sh", "x"),
            Err(NmbError::InvalidModuleName(_))
        ));
        assert!(!store.contains("../escape.sh"));
    }

    #[test]
    fn test_remove() {
        let (_dir, store) = store();
        store.write("a.sh", "echo").unwrap();
        assert!(store.contains("a.sh"));

        store.remove("a.sh").unwrap();
        assert!(!store.contains("a.sh"));

        let err = store.remove("a.sh").unwrap_err();
        assert_eq!(err.to_string(), "Module a.sh not found.");
    }

    #[test]
    fn test_read_header() {
        let (_dir, store) = store();
        store.write("a.sh", "# Inputs: host\r\n# Silent: true\r\n").unwrap();

        let header = store.read_header("a.sh").unwrap();
        assert_eq!(header.inputs, vec!["host"]);
        assert!(header.silent);
    }
}
