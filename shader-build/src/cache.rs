/// Timestamp caches backing the incremental rebuild decision.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Modification times keyed by list-relative path, persisted as JSON next to
/// the shader sources. Whole seconds are enough resolution for a build tool.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TimestampCache {
    pub entries: HashMap<String, u64>,
}

impl TimestampCache {
    /// Load a cache file. A missing or unreadable cache simply means a full
    /// rebuild, so both cases fold to an empty cache.
    pub fn load(path: &Path) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Whether the on-disk file differs from the recorded state.
    pub fn is_stale(&self, key: &str, mtime: u64) -> bool {
        self.entries.get(key) != Some(&mtime)
    }

    pub fn record(&mut self, key: &str, mtime: u64) {
        self.entries.insert(key.to_string(), mtime);
    }
}

/// Modification time of a file as whole seconds since the Unix epoch.
pub fn mtime_seconds(path: &Path) -> std::io::Result<u64> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    #[test]
    fn missing_cache_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TimestampCache::load(&dir.path().join("nope.json"));
        assert!(cache.entries.is_empty());
    }

    #[test]
    fn corrupt_cache_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{not json").unwrap();
        assert!(TimestampCache::load(&path).entries.is_empty());
    }

    #[test]
    fn round_trips_recorded_times() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("times.json");

        let mut cache = TimestampCache::default();
        cache.record("a.vert", 1700000000);
        cache.record("b.frag", 1700000123);
        cache.save(&path).unwrap();

        let loaded = TimestampCache::load(&path);
        assert!(!loaded.is_stale("a.vert", 1700000000));
        assert!(loaded.is_stale("a.vert", 1700000001));
        assert!(loaded.is_stale("unknown.comp", 0));
    }

    #[test]
    fn mtime_reads_real_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.vert");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "void main() {{}}").unwrap();
        assert!(mtime_seconds(&path).unwrap() > 0);
        assert!(mtime_seconds(&dir.path().join("gone")).is_err());
    }
}
