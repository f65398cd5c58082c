//! Write-through resolution cache, optionally backed by ~/.position/cache.json.
//!
//! Keys are request fingerprints: exact-value, no coordinate rounding.
//! Entries never expire.

use super::types::{PositionRequest, PositionResponse};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use tracing::warn;

/// Lookup and write-through insertion of resolved positions.
pub trait ResolutionCache: Send + Sync {
    fn lookup(&self, request: &PositionRequest) -> Option<PositionResponse>;
    fn insert(&self, request: &PositionRequest, response: &PositionResponse);
}

/// Canonical cache key for a request: shape tag plus every field in
/// declaration order. Floats use shortest round-trip formatting, so
/// distinct values never collide.
pub fn fingerprint(request: &PositionRequest) -> String {
    let body = serde_json::to_string(request).unwrap_or_default();
    format!("{}:{}", request.shape(), body)
}

/// Replace `path` with `contents` via a sibling temp file and a rename, so a
/// crash leaves either the old file or the new one.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[derive(Serialize, Deserialize, Clone)]
struct CacheEntry {
    response: PositionResponse,
    created: i64,
}

/// The position cache.
pub struct PositionCache {
    path: Option<PathBuf>,
    entries: RwLock<HashMap<String, CacheEntry>>,
    write_lock: Mutex<()>,
}

impl PositionCache {
    /// Load cache from a specific path.
    pub fn load_from(path: PathBuf) -> Self {
        let entries = Self::read_file(&path).unwrap_or_default();
        Self {
            path: Some(path),
            entries: RwLock::new(entries),
            write_lock: Mutex::new(()),
        }
    }

    /// A cache that lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: RwLock::new(HashMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".position")
            .join("cache.json")
    }

    fn read_file(path: &Path) -> Option<HashMap<String, CacheEntry>> {
        let data = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&data) {
            Ok(entries) => Some(entries),
            Err(e) => {
                warn!("ignoring unreadable cache file {}: {}", path.display(), e);
                None
            }
        }
    }

    fn persist(&self) {
        let Some(path) = &self.path else { return };
        // Serialize writers so an older snapshot never lands after a newer one.
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let json = {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            serde_json::to_string(&*entries)
        };
        let json = match json {
            Ok(json) => json,
            Err(e) => {
                warn!("cannot serialize position cache: {}", e);
                return;
            }
        };
        if let Err(e) = write_atomic(path, json.as_bytes()) {
            warn!("cannot write position cache {}: {}", path.display(), e);
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResolutionCache for PositionCache {
    fn lookup(&self, request: &PositionRequest) -> Option<PositionResponse> {
        let key = fingerprint(request);
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(&key).map(|e| e.response.clone())
    }

    fn insert(&self, request: &PositionRequest, response: &PositionResponse) {
        if response.is_empty() {
            return;
        }
        let entry = CacheEntry {
            response: response.clone(),
            created: chrono::Utc::now().timestamp_millis(),
        };
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(fingerprint(request), entry);
        self.persist();
    }
}
