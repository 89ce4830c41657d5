use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::EpiError;
use crate::estimate::{Method, RtEstimate};

/// Deterministic cache key: SHA-256 over the method tag, the serialized
/// configuration, and the input incidence series. Any change to any input
/// yields a fresh key, so staleness cannot occur.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub fn cache_key<C: Serialize>(method: Method, config: &C, incidence: &[u64]) -> CacheKey {
    let mut hasher = Sha256::new();
    hasher.update(method.tag().as_bytes());
    let config_bytes =
        serde_json::to_vec(config).expect("estimator configuration serializes to JSON");
    hasher.update(&config_bytes);
    for &count in incidence {
        hasher.update(count.to_le_bytes());
    }
    CacheKey(hex::encode(hasher.finalize()))
}

/// Advisory memoization of estimator output, keyed by `cache_key`.
///
/// At most one computation runs per key at a time (per-key lock); other
/// callers for the same key block and then read the stored result. With a
/// directory attached, results are also persisted as `<key>.json`; a
/// present file short-circuits recomputation and deleting it only costs
/// recompute time. File I/O failures fall back to recomputation silently.
pub struct EstimateCache {
    slots: Mutex<HashMap<String, Arc<Mutex<Option<Vec<RtEstimate>>>>>>,
    dir: Option<PathBuf>,
}

impl EstimateCache {
    pub fn in_memory() -> Self {
        EstimateCache {
            slots: Mutex::new(HashMap::new()),
            dir: None,
        }
    }

    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        EstimateCache {
            slots: Mutex::new(HashMap::new()),
            dir: Some(dir.into()),
        }
    }

    pub fn get_or_compute<F>(&self, key: &CacheKey, compute: F) -> Result<Vec<RtEstimate>, EpiError>
    where
        F: FnOnce() -> Result<Vec<RtEstimate>, EpiError>,
    {
        let slot = {
            let mut slots = self.slots.lock().unwrap();
            Arc::clone(slots.entry(key.0.clone()).or_default())
        };
        let mut guard = slot.lock().unwrap();
        if let Some(cached) = guard.as_ref() {
            return Ok(cached.clone());
        }
        if let Some(persisted) = self.read_file(key) {
            *guard = Some(persisted.clone());
            return Ok(persisted);
        }
        let computed = compute()?;
        *guard = Some(computed.clone());
        self.write_file(key, &computed);
        Ok(computed)
    }

    fn file_path(&self, key: &CacheKey) -> Option<PathBuf> {
        self.dir.as_ref().map(|d| d.join(format!("{}.json", key.0)))
    }

    fn read_file(&self, key: &CacheKey) -> Option<Vec<RtEstimate>> {
        let bytes = fs::read(self.file_path(key)?).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    fn write_file(&self, key: &CacheKey, estimates: &[RtEstimate]) {
        let Some(path) = self.file_path(key) else {
            return;
        };
        let Some(dir) = &self.dir else { return };
        // Best effort: the cache is advisory.
        if fs::create_dir_all(dir).is_ok() {
            if let Ok(bytes) = serde_json::to_vec(estimates) {
                let _ = fs::write(path, bytes);
            }
        }
    }
}
