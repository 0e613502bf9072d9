//! Content-addressed result cache
//!
//! Results live as one JSON file per cache key under a configured directory.
//! File presence is the sole source of truth for "already computed"; there is
//! no index. Writes go to a temp name and are renamed into place, so a
//! concurrent reader never sees a partial file. A present-but-corrupt file is
//! reported as a miss (the engine recomputes rather than failing the run).

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::types::CachedResult;

/// File extension for cached results
pub const RESULT_EXT: &str = "json";

/// Filesystem-backed cache of experiment results
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    /// Open a cache rooted at `dir`, creating the directory if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| Error::IoWrite {
            path: dir.clone(),
            source: e,
        })?;
        Ok(Self { dir })
    }

    /// The cache directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the result file for a key
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", key, RESULT_EXT))
    }

    /// Whether a result exists for the key
    pub fn contains(&self, key: &str) -> bool {
        self.path_for(key).is_file()
    }

    /// Read the cached result for a key, if present.
    ///
    /// A file that exists but cannot be decoded is treated as absent:
    /// availability over strict consistency, since the recompute path
    /// overwrites it with a good copy.
    pub fn get(&self, key: &str) -> Result<Option<CachedResult>> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::IoRead { path, source: e }),
        };

        match serde_json::from_slice(&bytes) {
            Ok(result) => {
                debug!(key = %key, "cache hit");
                Ok(Some(result))
            }
            Err(e) => {
                warn!(key = %key, path = %path.display(), error = %e,
                      "corrupt cache file, treating as miss");
                Ok(None)
            }
        }
    }

    /// Like [`get`](Self::get), but surface corruption as an error instead of
    /// a miss. Used by callers that want to distinguish the two.
    pub fn get_strict(&self, key: &str) -> Result<Option<CachedResult>> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::IoRead { path, source: e }),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| Error::CacheCorrupt { path, source: e })
    }

    /// Persist a result under a key. Writes to a temp file in the same
    /// directory, then renames into place; rename atomicity is the only
    /// cross-process coordination assumed.
    pub fn put(&self, key: &str, result: &CachedResult) -> Result<()> {
        let path = self.path_for(key);
        let tmp = self.dir.join(format!(".{}.{}.tmp", key, std::process::id()));

        let bytes = serde_json::to_vec(result).map_err(Error::CacheEncode)?;
        fs::write(&tmp, bytes).map_err(|e| Error::IoWrite {
            path: tmp.clone(),
            source: e,
        })?;
        fs::rename(&tmp, &path).map_err(|e| Error::IoWrite {
            path: path.clone(),
            source: e,
        })?;

        debug!(key = %key, path = %path.display(), "cached result written");
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScoreValue;
    use tempfile::TempDir;

    fn store() -> (TempDir, CacheStore) {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_miss_on_empty_cache() {
        let (_dir, store) = store();
        assert!(store.get("v1.0.0__d__m__x__s").unwrap().is_none());
    }

    #[test]
    fn test_put_then_get() {
        let (_dir, store) = store();
        let result = CachedResult::new(ScoreValue::Scalar(0.25), "1.0.0");
        store.put("v1.0.0__d__m__x__s", &result).unwrap();

        let loaded = store.get("v1.0.0__d__m__x__s").unwrap().unwrap();
        assert_eq!(loaded.score, result.score);
        assert_eq!(loaded.engine_version, "1.0.0");
    }

    #[test]
    fn test_put_leaves_single_named_file() {
        let (dir, store) = store();
        let result = CachedResult::new(ScoreValue::Scalar(1.0), "1.2.0");
        store
            .put("v1.2.0__corrgroups60__lasso__tree_shap__runtime", &result)
            .unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(
            entries,
            vec!["v1.2.0__corrgroups60__lasso__tree_shap__runtime.json"]
        );
    }

    #[test]
    fn test_corrupt_file_is_a_miss() {
        let (_dir, store) = store();
        std::fs::write(store.path_for("badkey"), b"{not json").unwrap();
        assert!(store.get("badkey").unwrap().is_none());
    }

    #[test]
    fn test_strict_get_reports_corruption() {
        let (_dir, store) = store();
        std::fs::write(store.path_for("badkey"), b"{not json").unwrap();
        let err = store.get_strict("badkey").unwrap_err();
        assert!(matches!(err, Error::CacheCorrupt { .. }));
    }

    #[test]
    fn test_overwrite_replaces_value() {
        let (_dir, store) = store();
        store
            .put("k", &CachedResult::new(ScoreValue::Scalar(1.0), "1.0.0"))
            .unwrap();
        store
            .put("k", &CachedResult::new(ScoreValue::Scalar(2.0), "1.0.0"))
            .unwrap();
        let loaded = store.get("k").unwrap().unwrap();
        assert_eq!(loaded.score.as_scalar(), Some(2.0));
    }
}
