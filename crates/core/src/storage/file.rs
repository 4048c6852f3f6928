use std::fs;
use std::path::{Path, PathBuf};

use super::traits::ScopeStore;
use crate::errors::CoreError;

/// File-backed `ScopeStore`: one `{scope_key}.json` document per scope under
/// a base directory.
///
/// A save writes to a temporary sibling file and renames it into place, so a
/// reader never observes a half-written document and a crash mid-save leaves
/// the previous document intact.
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `base_dir`, creating the directory if needed.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    fn path_for(&self, scope_key: &str) -> PathBuf {
        self.base_dir.join(format!("{scope_key}.json"))
    }

    /// Directory this store writes into.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

impl ScopeStore for FileStore {
    fn load(&self, scope_key: &str) -> Result<Option<String>, CoreError> {
        let path = self.path_for(scope_key);
        match fs::read_to_string(&path) {
            Ok(document) => Ok(Some(document)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, scope_key: &str, document: &str) -> Result<(), CoreError> {
        let path = self.path_for(scope_key);
        let tmp = self.base_dir.join(format!("{scope_key}.json.tmp"));
        fs::write(&tmp, document)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, scope_key: &str) -> Result<(), CoreError> {
        let path = self.path_for(scope_key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
