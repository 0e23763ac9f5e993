//! Runtime configuration: tuning, profiling, and tuning-cache sizing.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::env;
use crate::error::{RtError, RtResult};
use crate::kernel::DEFAULT_PERF_CACHE_CAPACITY;

static GLOBAL_CONFIG: OnceLock<RuntimeConfig> = OnceLock::new();

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Tune kernels on tuning-cache misses during `run`.
    pub tune: bool,
    /// Accumulate per-kind execution time and log a summary after `run`.
    pub profile: bool,
    pub perf_cache_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            tune: false,
            profile: false,
            perf_cache_capacity: DEFAULT_PERF_CACHE_CAPACITY,
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden by `HETRT_TUNE`, `HETRT_PROFILE`, and `HETRT_PERF_CACHE`.
    pub fn from_env() -> Self {
        let defaults = RuntimeConfig::default();
        RuntimeConfig {
            tune: env::flag(env::TUNE_VAR).unwrap_or(defaults.tune),
            profile: env::flag(env::PROFILE_VAR).unwrap_or(defaults.profile),
            perf_cache_capacity: env::positive_usize(env::PERF_CACHE_VAR)
                .unwrap_or(defaults.perf_cache_capacity),
        }
    }

    pub fn from_json(json: &str) -> RtResult<Self> {
        serde_json::from_str(json)
            .map_err(|err| RtError::invalid(format!("invalid runtime config: {}", err)))
    }

    /// Configuration read from the environment on first use.
    pub fn global() -> &'static RuntimeConfig {
        GLOBAL_CONFIG.get_or_init(RuntimeConfig::from_env)
    }
}
