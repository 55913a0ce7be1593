//! Annotation store kept as one JSON file per key in a directory.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{PatchError, Result};
use crate::store::AnnotationStore;

/// On-disk record. The key is kept alongside the value so a directory
/// listing can be mapped back without reversing the hash.
#[derive(Debug, Serialize, Deserialize)]
struct Entry {
    key: String,
    value: String,
}

/// Directory-backed [`AnnotationStore`].
///
/// File names are the SHA-256 of the key; writes go to a temporary file that
/// is renamed into place.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) the store directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| PatchError::io(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        self.dir.join(format!("{:x}.json", hasher.finalize()))
    }
}

impl AnnotationStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PatchError::io(&path, e)),
        };
        let entry: Entry = serde_json::from_str(&raw)?;
        if entry.key != key {
            warn!(path = %path.display(), stored = %entry.key, "Annotation key mismatch");
            return Err(PatchError::Store(format!(
                "{} holds '{}', expected '{key}'",
                path.display(),
                entry.key
            )));
        }
        Ok(Some(entry.value))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let entry = Entry {
            key: key.to_string(),
            value: value.to_string(),
        };
        let json = serde_json::to_string_pretty(&entry)?;

        let mut file = File::create(&tmp).map_err(|e| PatchError::io(&tmp, e))?;
        file.write_all(json.as_bytes())
            .map_err(|e| PatchError::io(&tmp, e))?;
        file.flush().map_err(|e| PatchError::io(&tmp, e))?;
        drop(file);
        std::fs::rename(&tmp, &path).map_err(|e| PatchError::io(&path, e))?;

        debug!(key, path = %path.display(), "Annotation written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::AnnotationStoreExt;

    #[test]
    fn test_round_trip_and_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path().join("notes")).unwrap();
        assert_eq!(store.get("https://github.com/git/git/pull/1").unwrap(), None);

        store.set("https://github.com/git/git/pull/1", "{\"iteration\":1}").unwrap();
        store.set("https://github.com/git/git/pull/1", "{\"iteration\":2}").unwrap();
        assert_eq!(
            store.get("https://github.com/git/git/pull/1").unwrap().as_deref(),
            Some("{\"iteration\":2}")
        );

        let files: Vec<_> = std::fs::read_dir(store.dir()).unwrap().collect();
        assert_eq!(files.len(), 1, "temporary file must not linger");
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = FileStore::open(dir.path()).unwrap();
            store.set_json("branch", &vec!["a", "b"]).unwrap();
        }
        let store = FileStore::open(dir.path()).unwrap();
        let value: Option<Vec<String>> = store.get_json("branch").unwrap();
        assert_eq!(value, Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn test_keys_do_not_collide_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert_ne!(store.path_for("a/b"), store.path_for("a_b"));
        assert!(store.path_for("../escape").starts_with(dir.path()));
    }
}
