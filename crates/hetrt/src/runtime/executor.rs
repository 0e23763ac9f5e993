//! Sequential graph execution on one runtime.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::config::RuntimeConfig;
use crate::error::{RtError, RtResult};
use crate::graph::Graph;
use crate::kernel::{dispatch, KernelKey, KernelRegistry, PerfEngine};
use crate::ops::OpKind;

use super::Runtime;

/// Per-call execution switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Tune kernels whose `(kernel, workload)` pair is not in the tuning cache yet.
    pub tune: bool,
    /// Log accumulated time per operator kind when the run finishes.
    pub profile: bool,
}

impl From<&RuntimeConfig> for RunOptions {
    fn from(config: &RuntimeConfig) -> Self {
        RunOptions {
            tune: config.tune,
            profile: config.profile,
        }
    }
}

#[derive(Default)]
struct KindProfile {
    time: Duration,
    count: usize,
}

impl dyn Runtime {
    /// Runs `graph` with the global kernel table and the global configuration.
    pub fn run(&self, graph: &Graph) -> RtResult<()> {
        let registry = KernelRegistry::global()?;
        self.run_with(registry, graph, RunOptions::from(RuntimeConfig::global()))
    }

    /// Runs every operator of `graph` in insertion order, synchronising after each one.
    ///
    /// The graph must be bound to this runtime and every tensor must already hold a buffer.
    pub fn run_with(
        &self,
        registry: &KernelRegistry,
        graph: &Graph,
        options: RunOptions,
    ) -> RtResult<()> {
        let own = self as *const dyn Runtime as *const ();
        if own != Arc::as_ptr(graph.runtime()) as *const () {
            return Err(RtError::execution(format!(
                "graph is bound to runtime {} but run was called on {}",
                graph.runtime().name(),
                self.name()
            )));
        }
        graph
            .check_topology()
            .map_err(|err| RtError::execution(err.to_string()))?;

        let engine = PerfEngine::global();
        let mut profile: BTreeMap<OpKind, KindProfile> = BTreeMap::new();
        for op in graph.operators() {
            let start = Instant::now();
            if options.tune {
                let key = KernelKey::for_op(&op, self.device())?;
                let workload = op.workload_vector()?;
                if engine.get(&key, &workload).is_some() {
                    dispatch::dispatch(registry, &op, self)?;
                } else {
                    let record = dispatch::tune(registry, &op, self)?;
                    debug!(key = %key, time_us = record.time.as_micros() as u64, "tuned");
                    engine.put(key, workload, record);
                }
            } else {
                dispatch::dispatch(registry, &op, self)?;
            }
            self.sync()?;
            if options.profile {
                let entry = profile.entry(op.kind()).or_default();
                entry.time += start.elapsed();
                entry.count += 1;
            }
        }

        if options.profile {
            let total: Duration = profile.values().map(|p| p.time).sum();
            for (kind, entry) in &profile {
                let share = if total.is_zero() {
                    0.0
                } else {
                    entry.time.as_secs_f64() / total.as_secs_f64() * 100.0
                };
                info!(
                    kind = %kind,
                    count = entry.count,
                    time_ms = entry.time.as_secs_f64() * 1e3,
                    percent = share,
                    "profile"
                );
            }
            info!(total_ms = total.as_secs_f64() * 1e3, runtime = self.name(), "profile total");
        }
        Ok(())
    }
}
