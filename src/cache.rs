use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;

use crate::error::CompileError;

/// Hex SHA-256 of `source`.
pub fn compute_hash(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Serialize, Deserialize)]
struct CacheEntry<T> {
    hash: String,
    output: T,
}

/// On-disk cache of compiled outputs keyed by file path and validated by source hash.
pub struct OutputCache {
    cache_dir: PathBuf,
}

impl OutputCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Result<Self, CompileError> {
        let cache_dir = cache_dir.into();
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir).map_err(|source| CompileError::Io {
                path: cache_dir.clone(),
                source,
            })?;
        }
        Ok(Self { cache_dir })
    }

    fn get_cache_path(&self, file_path: &str) -> PathBuf {
        // Create a stable file name for the cache entry
        let safe_name = file_path.replace(['/', '\\', ':'], "_");
        self.cache_dir.join(format!("{}.json", safe_name))
    }

    pub fn get<T: DeserializeOwned>(&self, file_path: &str, source: &str) -> Option<T> {
        let cache_path = self.get_cache_path(file_path);
        if !cache_path.exists() {
            return None;
        }

        let data = fs::read_to_string(&cache_path).ok()?;

        let entry: CacheEntry<T> = match serde_json::from_str(&data) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(file = file_path, error = %e, "discarding corrupt cache entry");
                // Invalidate corrupt cache file
                fs::remove_file(cache_path).ok();
                return None;
            }
        };

        if entry.hash == compute_hash(source) {
            Some(entry.output)
        } else {
            None
        }
    }

    pub fn set<T: Serialize>(&self, file_path: &str, source: &str, output: &T) {
        let cache_path = self.get_cache_path(file_path);
        let entry = CacheEntry {
            hash: compute_hash(source),
            output,
        };

        match serde_json::to_string(&entry) {
            Ok(data) => {
                if let Err(e) = fs::write(&cache_path, data) {
                    tracing::warn!(path = %cache_path.display(), error = %e, "failed to write cache entry");
                }
            }
            Err(e) => tracing::warn!(file = file_path, error = %e, "failed to encode cache entry"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_hex_sha256() {
        let hash = compute_hash("");
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_roundtrip_and_invalidation() {
        let dir = tempfile::tempdir().unwrap();
        let cache = OutputCache::new(dir.path().join("cache")).unwrap();
        cache.set("src/App.vine.ts", "v1", &"compiled".to_string());

        assert_eq!(
            cache.get::<String>("src/App.vine.ts", "v1"),
            Some("compiled".to_string())
        );
        assert_eq!(cache.get::<String>("src/App.vine.ts", "v2"), None);
        assert_eq!(cache.get::<String>("src/Other.vine.ts", "v1"), None);
    }

    #[test]
    fn test_corrupt_entry_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let cache = OutputCache::new(dir.path()).unwrap();
        let path = dir.path().join("a.vine.ts.json");
        fs::write(&path, "{not json").unwrap();
        assert_eq!(cache.get::<String>("a.vine.ts", "x"), None);
        assert!(!path.exists());
    }
}
