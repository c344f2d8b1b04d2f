//! # Persistent key-value store.
//!
//! Sessions keep small bits of state (cached backends, tunnel credentials) across
//! runs. [`FsKeyValueStore`] stores one file per key under the settings' `state_dir`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::ProbeError;

/// Byte-oriented persistent store handed to the session.
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ProbeError>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &[u8]) -> Result<(), ProbeError>;
}

/// File-per-key store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FsKeyValueStore {
    root: PathBuf,
}

impl FsKeyValueStore {
    /// Opens (creating if needed) the store at `dir`.
    ///
    /// # Errors
    /// - [`ProbeError::EmptyStateDir`] when `dir` is empty
    /// - [`ProbeError::StateDir`] when the directory cannot be created
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, ProbeError> {
        let root = dir.as_ref();
        if root.as_os_str().is_empty() {
            return Err(ProbeError::EmptyStateDir);
        }
        fs::create_dir_all(root).map_err(|source| state_dir_error(root, source))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Directory backing the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, key: &str) -> Result<PathBuf, ProbeError> {
        let valid = !key.is_empty()
            && key != "."
            && key != ".."
            && !key.contains(['/', '\\', '\0']);
        if !valid {
            return Err(ProbeError::Other(format!("invalid key: {key:?}")));
        }
        Ok(self.root.join(key))
    }
}

impl KeyValueStore for FsKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ProbeError> {
        let path = self.path_of(key)?;
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(state_dir_error(&path, e)),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), ProbeError> {
        let path = self.path_of(key)?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, value).map_err(|e| state_dir_error(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| state_dir_error(&path, e))
    }
}

fn state_dir_error(path: &Path, source: io::Error) -> ProbeError {
    ProbeError::StateDir {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::scratch_dir;

    #[test]
    fn test_empty_dir_is_rejected() {
        assert!(matches!(
            FsKeyValueStore::open(""),
            Err(ProbeError::EmptyStateDir)
        ));
    }

    #[test]
    fn test_set_then_get() {
        let scratch = scratch_dir("kvstore-set-get");
        let dir = scratch.path().join("nested/state");
        let kvs = FsKeyValueStore::open(&dir).unwrap();
        assert!(dir.is_dir());

        assert_eq!(kvs.get("missing").unwrap(), None);
        kvs.set("bouncer", b"[]").unwrap();
        kvs.set("bouncer", b"[1]").unwrap();
        assert_eq!(kvs.get("bouncer").unwrap().as_deref(), Some(&b"[1]"[..]));
    }

    #[test]
    fn test_keys_cannot_escape_root() {
        let scratch = scratch_dir("kvstore-escape");
        let kvs = FsKeyValueStore::open(scratch.path()).unwrap();
        assert!(kvs.set("../outside", b"x").is_err());
        assert!(kvs.get("..").is_err());
        assert!(kvs.get("").is_err());
    }

    #[test]
    fn test_unwritable_dir_is_reported() {
        let scratch = scratch_dir("kvstore-file");
        let file = scratch.path().join("plain-file");
        fs::write(&file, b"not a directory").unwrap();
        let err = FsKeyValueStore::open(file.join("state")).unwrap_err();
        assert!(matches!(err, ProbeError::StateDir { .. }), "{err}");
    }
}
