//! Content-addressed JSON cache for stage outputs.
//!
//! Entries live at `<root>/<hex_key>.json` and are only ever replaced
//! wholesale. Writes go through a temp file in the same directory followed by
//! a rename, so a reader never observes a half-written entry. Concurrent
//! writers of the same key race with last-writer-wins semantics.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use figpipe_types::Result;

use crate::digest::{canonical_json, to_hex};

/// File-backed cache keyed by stable hashes.
#[derive(Debug, Clone)]
pub struct StageCache {
    root_dir: PathBuf,
}

impl StageCache {
    /// Open (and create if needed) a cache rooted at `root_dir`.
    pub fn new(root_dir: impl Into<PathBuf>) -> Result<Self> {
        let root_dir = root_dir.into();
        std::fs::create_dir_all(&root_dir)?;
        Ok(Self { root_dir })
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Hash `base_key || stage_name || canonical_json(payload)`.
    pub fn build_stage_key(&self, base_key: &str, stage_name: &str, payload: &Value) -> String {
        let mut hasher = Sha256::new();
        hasher.update(base_key.as_bytes());
        hasher.update(stage_name.as_bytes());
        hasher.update(canonical_json(payload).as_bytes());
        to_hex(&hasher.finalize())
    }

    fn stage_file(&self, stage_key: &str) -> PathBuf {
        self.root_dir.join(format!("{stage_key}.json"))
    }

    /// Read an entry. Missing, unreadable, or unparsable entries are all a miss.
    pub fn load<T: DeserializeOwned>(&self, stage_key: &str) -> Option<T> {
        let path = self.stage_file(stage_key);
        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Unreadable cache entry treated as miss");
                return None;
            }
        };
        match serde_json::from_str(&data) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Corrupt cache entry treated as miss");
                None
            }
        }
    }

    /// Atomically write an entry and return its path.
    pub fn save<T: Serialize>(&self, stage_key: &str, data: &T) -> Result<PathBuf> {
        let path = self.stage_file(stage_key);
        let json = serde_json::to_string_pretty(data)?;
        let mut temp = tempfile::NamedTempFile::new_in(&self.root_dir)?;
        temp.write_all(json.as_bytes())?;
        temp.flush()?;
        temp.persist(&path).map_err(|e| e.error)?;
        tracing::debug!(path = %path.display(), "Cache entry saved");
        Ok(path)
    }
}
