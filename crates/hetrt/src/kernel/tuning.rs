//! Tuning cache: measured kernel timings keyed by kernel and workload vector.

use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use lru::LruCache;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RtError, RtResult};

use super::registry::KernelKey;

pub const DEFAULT_PERF_CACHE_CAPACITY: usize = 256;

static GLOBAL_ENGINE: OnceLock<PerfEngine> = OnceLock::new();

/// Outcome of tuning one kernel on one workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerfRecord {
    pub time: Duration,
}

impl PerfRecord {
    pub fn new(time: Duration) -> Self {
        PerfRecord { time }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PerfKey {
    kernel: KernelKey,
    workload: Vec<i64>,
}

#[derive(Serialize, Deserialize)]
struct PerfEntry {
    kernel: KernelKey,
    workload: Vec<i64>,
    record: PerfRecord,
}

/// Bounded LRU of [`PerfRecord`]s.
pub struct PerfEngine {
    cache: Mutex<LruCache<PerfKey, PerfRecord>>,
}

impl PerfEngine {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        PerfEngine {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Process-wide engine sized from [`crate::config::RuntimeConfig::global`].
    pub fn global() -> &'static PerfEngine {
        GLOBAL_ENGINE.get_or_init(|| {
            PerfEngine::new(crate::config::RuntimeConfig::global().perf_cache_capacity)
        })
    }

    pub fn get(&self, kernel: &KernelKey, workload: &[i64]) -> Option<PerfRecord> {
        let key = PerfKey {
            kernel: *kernel,
            workload: workload.to_vec(),
        };
        self.cache
            .lock()
            .expect("perf cache poisoned")
            .get(&key)
            .copied()
    }

    pub fn put(&self, kernel: KernelKey, workload: Vec<i64>, record: PerfRecord) {
        self.cache
            .lock()
            .expect("perf cache poisoned")
            .put(PerfKey { kernel, workload }, record);
    }

    pub fn len(&self) -> usize {
        self.cache.lock().expect("perf cache poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.cache.lock().expect("perf cache poisoned").clear();
    }

    /// Writes every cached record as JSON, least recently used first.
    pub fn save_json(&self, path: impl AsRef<Path>) -> RtResult<()> {
        let entries: Vec<PerfEntry> = {
            let cache = self.cache.lock().expect("perf cache poisoned");
            cache
                .iter()
                .rev()
                .map(|(key, record)| PerfEntry {
                    kernel: key.kernel,
                    workload: key.workload.clone(),
                    record: *record,
                })
                .collect()
        };
        let json = serde_json::to_string_pretty(&entries)
            .map_err(|err| RtError::invalid(format!("failed to encode perf cache: {}", err)))?;
        fs::write(path.as_ref(), json)?;
        debug!(entries = entries.len(), path = %path.as_ref().display(), "perf cache saved");
        Ok(())
    }

    /// Merges records from a file written by [`PerfEngine::save_json`].
    pub fn load_json(&self, path: impl AsRef<Path>) -> RtResult<usize> {
        let json = fs::read_to_string(path.as_ref())?;
        let entries: Vec<PerfEntry> = serde_json::from_str(&json)
            .map_err(|err| RtError::invalid(format!("failed to decode perf cache: {}", err)))?;
        let count = entries.len();
        let mut cache = self.cache.lock().expect("perf cache poisoned");
        for entry in entries {
            cache.put(
                PerfKey {
                    kernel: entry.kernel,
                    workload: entry.workload,
                },
                entry.record,
            );
        }
        Ok(count)
    }
}

impl Default for PerfEngine {
    fn default() -> Self {
        Self::new(DEFAULT_PERF_CACHE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::OpKind;
    use crate::runtime::Device;
    use crate::tensor::DType;

    fn key(kind: OpKind) -> KernelKey {
        KernelKey::new(Device::Cpu, kind, DType::F32)
    }

    #[test]
    fn evicts_least_recently_used() {
        let engine = PerfEngine::new(2);
        let record = PerfRecord::new(Duration::from_micros(5));
        engine.put(key(OpKind::Reshape), vec![15, 2, 3], record);
        engine.put(key(OpKind::Identity), vec![17, 6], record);
        assert!(engine.get(&key(OpKind::Reshape), &[15, 2, 3]).is_some());
        engine.put(key(OpKind::Flatten), vec![16, 1, 2, 3], record);
        assert_eq!(engine.len(), 2);
        assert!(engine.get(&key(OpKind::Identity), &[17, 6]).is_none());
        assert!(engine.get(&key(OpKind::Reshape), &[15, 2, 3]).is_some());
    }

    #[test]
    fn workload_is_part_of_the_key() {
        let engine = PerfEngine::default();
        engine.put(key(OpKind::Identity), vec![17, 6], PerfRecord::new(Duration::from_nanos(1)));
        assert!(engine.get(&key(OpKind::Identity), &[17, 7]).is_none());
    }
}
