//! Compiled-kernel binary cache.
//!
//! Grounded on `original_source/profanity.cpp`'s `getDeviceCacheFilename` /
//! cache-read / cache-write sequence in `main()`: one binary file per
//! `(device, inverse_size)` pair, loaded if present, compiled from source
//! and written back otherwise.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CacheError;

/// Builds the cache filename for a device/configuration pair, mirroring
/// `getDeviceCacheFilename()`: `cache-opencl.<inverse_size>.<unique_id>`.
pub fn cache_filename(inverse_size: usize, device_unique_id: &str) -> String {
    format!("cache-opencl.{}.{}", inverse_size, device_unique_id)
}

/// Loads a cached program binary from `dir`, if present and non-empty.
pub fn load(dir: &Path, inverse_size: usize, device_unique_id: &str) -> Result<Vec<u8>, CacheError> {
    let path = cache_path(dir, inverse_size, device_unique_id);
    let bytes = fs::read(&path).map_err(|e| CacheError::Missing(format!("{}: {}", path.display(), e)))?;
    if bytes.is_empty() {
        return Err(CacheError::Missing(format!("{} is empty", path.display())));
    }
    Ok(bytes)
}

/// Writes a freshly compiled program binary back to the cache directory.
///
/// Cache writes are best-effort: a failure here is logged by the caller and
/// does not abort the run (the device still has the binary in memory).
pub fn store(
    dir: &Path,
    inverse_size: usize,
    device_unique_id: &str,
    binary: &[u8],
) -> Result<(), CacheError> {
    let path = cache_path(dir, inverse_size, device_unique_id);
    fs::write(&path, binary).map_err(|e| CacheError::WriteFailed(format!("{}: {}", path.display(), e)))
}

fn cache_path(dir: &Path, inverse_size: usize, device_unique_id: &str) -> PathBuf {
    dir.join(cache_filename(inverse_size, device_unique_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_matches_expected_pattern() {
        assert_eq!(
            cache_filename(8192, "10de:1234"),
            "cache-opencl.8192.10de:1234"
        );
    }

    #[test]
    fn load_missing_file_is_not_found() {
        let dir = std::env::temp_dir();
        let result = load(&dir, 1, "definitely-not-a-real-device-id-xyz");
        assert!(matches!(result, Err(CacheError::Missing(_))));
    }

    #[test]
    fn store_then_load_roundtrips() {
        let dir = std::env::temp_dir();
        let unique_id = format!("test-device-{}", std::process::id());
        let binary = vec![1u8, 2, 3, 4, 5];

        store(&dir, 4096, &unique_id, &binary).unwrap();
        let loaded = load(&dir, 4096, &unique_id).unwrap();
        assert_eq!(loaded, binary);

        let _ = fs::remove_file(cache_path(&dir, 4096, &unique_id));
    }

    #[test]
    fn empty_cache_file_is_treated_as_missing() {
        let dir = std::env::temp_dir();
        let unique_id = format!("test-empty-{}", std::process::id());
        store(&dir, 1, &unique_id, &[]).unwrap();

        let result = load(&dir, 1, &unique_id);
        assert!(matches!(result, Err(CacheError::Missing(_))));

        let _ = fs::remove_file(cache_path(&dir, 1, &unique_id));
    }
}
