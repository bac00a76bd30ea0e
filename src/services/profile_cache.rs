use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileEntry {
    pub external_id: String,
    pub last_verified_at: DateTime<Utc>,
}

/// Process-wide map from canonical team key to upstream profile id.
///
/// Writes are serialized by the mutex; the on-disk snapshot is written
/// atomically. A 404 from Stage 2 invalidates the entry so the next attempt
/// re-resolves the profile through the search endpoint.
pub struct ProfileCache {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, ProfileEntry>>,
}

impl ProfileCache {
    /// Load the snapshot for a division. A missing file is an empty cache; a
    /// corrupt one is discarded with a warning rather than failing the run.
    pub fn load(path: PathBuf) -> Self {
        let entries = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!("Discarding corrupt profile cache {}: {}", path.display(), e);
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn get(&self, team_key: &str) -> Option<String> {
        self.entries
            .lock()
            .expect("profile cache lock poisoned")
            .get(team_key)
            .map(|entry| entry.external_id.clone())
    }

    pub fn insert(&self, team_key: &str, external_id: &str, verified_at: DateTime<Utc>) {
        self.entries
            .lock()
            .expect("profile cache lock poisoned")
            .insert(
                team_key.to_string(),
                ProfileEntry {
                    external_id: external_id.to_string(),
                    last_verified_at: verified_at,
                },
            );
    }

    pub fn invalidate(&self, team_key: &str) {
        self.entries
            .lock()
            .expect("profile cache lock poisoned")
            .remove(team_key);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("profile cache lock poisoned").len()
    }

    /// Snapshot the map to disk, write-temp-then-rename.
    pub fn persist(&self) -> Result<()> {
        let snapshot = {
            let entries = self.entries.lock().expect("profile cache lock poisoned");
            serde_json::to_vec_pretty(&*entries)?
        };
        storage::write_atomic(&self.path, &snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::env;

    fn temp_path(name: &str) -> PathBuf {
        let dir = env::temp_dir().join("pitchrank_cache_tests");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(format!("profiles_{}.json", name));
        let _ = fs::remove_file(&path);
        path
    }

    fn verified_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_insert_get_invalidate() {
        let cache = ProfileCache::load(temp_path("basic"));
        assert!(cache.get("2015 phoenix united").is_none());

        cache.insert("2015 phoenix united", "T-4417", verified_at());
        assert_eq!(cache.get("2015 phoenix united").as_deref(), Some("T-4417"));

        cache.invalidate("2015 phoenix united");
        assert!(cache.get("2015 phoenix united").is_none());
    }

    #[test]
    fn test_persist_round_trip() {
        let path = temp_path("round_trip");
        let cache = ProfileCache::load(path.clone());
        cache.insert("2015 scottsdale surf", "T-9001", verified_at());
        cache.persist().unwrap();

        let reloaded = ProfileCache::load(path);
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.get("2015 scottsdale surf").as_deref(), Some("T-9001"));
    }

    #[test]
    fn test_corrupt_snapshot_is_discarded() {
        let path = temp_path("corrupt");
        fs::write(&path, "{not json").unwrap();
        let cache = ProfileCache::load(path);
        assert_eq!(cache.len(), 0);
    }
}
