//! # Batch Orchestrator
//!
//! Runs many design requests on a rayon pool.
//!
//! - **Cache**: results are keyed by a SHA-256 of the normalized request
//!   (floats rounded to six decimals, keys sorted, label dropped) plus the
//!   constants and catalog versions. A request seen before, in this batch or
//!   an earlier one, is answered from the cache under its own label.
//! - **Coalescing**: identical requests in flight at the same time share one
//!   computation. Each key owns a `OnceCell`; the first worker fills it and
//!   the rest wait on it.
//! - **Isolation**: a panicking request is caught and reported as a failed
//!   item. It never takes the batch down, and nothing is cached for it.
//! - **Time budget**: work is not interrupted. An item whose computation
//!   took longer than the budget is reported as timed out, along with any
//!   duplicates that were waiting on it, and the result is evicted.
//!
//! Results come back in submission order.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use once_cell::sync::OnceCell;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::diagnostics::{Diagnostic, Severity};
use crate::engine::{DesignEngine, DesignRequest, DesignResult};
use crate::envelope::{Envelope, Outcome};
use crate::errors::{CalcError, CalcResult};
use crate::standards::StandardsSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Worker threads; `None` uses one per core
    pub workers: Option<usize>,
    /// Per-request time budget (ms); `None` disables the check
    pub time_budget_ms: Option<u64>,
}

impl Default for BatchSettings {
    fn default() -> Self {
        BatchSettings {
            workers: None,
            time_budget_ms: Some(5_000),
        }
    }
}

impl BatchSettings {
    pub fn validate(&self) -> CalcResult<()> {
        if self.workers == Some(0) {
            return Err(CalcError::invalid_input("batch.workers", "0", "At least one worker is required"));
        }
        if self.time_budget_ms == Some(0) {
            return Err(CalcError::invalid_input(
                "batch.time_budget_ms",
                "0",
                "Time budget must be positive",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Cache key
// ============================================================================

fn normalize(value: serde_json::Value) -> serde_json::Value {
    use serde_json::Value;
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => {
                let scaled = f * 1e6;
                let rounded = if scaled.is_finite() { scaled.round() / 1e6 } else { f };
                serde_json::Number::from_f64(rounded).map_or(Value::Number(n), Value::Number)
            }
            _ => Value::Number(n),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, normalize(v))).collect()),
        other => other,
    }
}

/// SHA-256 over the normalized request and the standards versions. The
/// label is free text and does not take part.
pub fn cache_key(request: &DesignRequest, snapshot: &StandardsSnapshot) -> CalcResult<String> {
    let mut value = normalize(serde_json::to_value(request).map_err(CalcError::serialization)?);
    if let Some(map) = value.as_object_mut() {
        map.remove("label");
    }
    // serde_json maps are ordered by key, so this text is canonical
    let body = serde_json::to_string(&value).map_err(CalcError::serialization)?;
    let mut hasher = Sha256::new();
    hasher.update(snapshot.constants_version().as_bytes());
    hasher.update([0u8]);
    hasher.update(snapshot.catalog_version().as_bytes());
    hasher.update([0u8]);
    hasher.update(body.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Computed by this item
    Completed,
    /// Answered from the cache or another in-flight item
    CacheHit,
    /// Computed, but over the time budget
    TimedOut,
    /// The computation panicked
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub index: usize,
    pub label: String,
    pub cache_key: String,
    pub status: ItemStatus,
    pub elapsed_ms: f64,
    /// Absent for failed and timed-out items
    pub envelope: Option<Envelope<DesignResult>>,
    pub diagnostic: Option<Diagnostic>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total: usize,
    pub completed: usize,
    pub cache_hits: usize,
    pub timed_out: usize,
    pub failed: usize,
    /// Engine runs performed for this batch
    pub computations: usize,
    pub feasible: usize,
    pub elapsed_ms: f64,
    pub throughput_per_sec: f64,
    pub latency_p50_ms: f64,
    pub latency_p95_ms: f64,
    pub latency_max_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub items: Vec<BatchItem>,
    pub stats: BatchStats,
}

fn percentile_ms(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() - 1) as f64 * q).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

impl BatchStats {
    fn collect(items: &[BatchItem], computations: usize, elapsed_ms: f64) -> Self {
        let count = |s: ItemStatus| items.iter().filter(|i| i.status == s).count();
        let mut latencies: Vec<f64> = items.iter().map(|i| i.elapsed_ms).collect();
        latencies.sort_by(f64::total_cmp);
        BatchStats {
            total: items.len(),
            completed: count(ItemStatus::Completed),
            cache_hits: count(ItemStatus::CacheHit),
            timed_out: count(ItemStatus::TimedOut),
            failed: count(ItemStatus::Failed),
            computations,
            feasible: items
                .iter()
                .filter(|i| i.envelope.as_ref().map_or(false, |e| e.is_feasible()))
                .count(),
            elapsed_ms,
            throughput_per_sec: if elapsed_ms > 0.0 {
                items.len() as f64 / (elapsed_ms / 1000.0)
            } else {
                0.0
            },
            latency_p50_ms: percentile_ms(&latencies, 0.50),
            latency_p95_ms: percentile_ms(&latencies, 0.95),
            latency_max_ms: latencies.last().copied().unwrap_or(0.0),
        }
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

struct Computed {
    envelope: Envelope<DesignResult>,
    solve_ms: f64,
}

type Slot = Arc<OnceCell<Computed>>;

/// Run `f`, turning a panic into its message.
fn isolate<T>(f: impl FnOnce() -> T) -> Result<T, String> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string())
    })
}

/// A cached envelope answered under another request's label.
fn relabel(mut envelope: Envelope<DesignResult>, label: &str) -> Envelope<DesignResult> {
    let label_value = serde_json::Value::String(label.to_string());
    for doc in [&mut envelope.trace.inputs, &mut envelope.trace.outputs] {
        if let Some(slot) = doc.get_mut("label") {
            *slot = label_value.clone();
        }
    }
    if let Outcome::Feasible { result } = &mut envelope.outcome {
        result.label = label.to_string();
    }
    envelope
}

pub struct BatchOrchestrator {
    engine: Arc<DesignEngine>,
    settings: BatchSettings,
    pool: rayon::ThreadPool,
    cache: Mutex<HashMap<String, Slot>>,
    computations: AtomicUsize,
}

impl BatchOrchestrator {
    pub fn new(engine: Arc<DesignEngine>) -> CalcResult<Self> {
        let settings = engine.settings().batch.clone();
        settings.validate()?;
        let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("signcalc-batch-{}", i));
        if let Some(n) = settings.workers {
            builder = builder.num_threads(n);
        }
        let pool = builder.build().map_err(|e| CalcError::Internal {
            message: format!("failed to start batch pool: {}", e),
        })?;
        Ok(BatchOrchestrator {
            engine,
            settings,
            pool,
            cache: Mutex::new(HashMap::new()),
            computations: AtomicUsize::new(0),
        })
    }

    pub fn engine(&self) -> &DesignEngine {
        &self.engine
    }

    /// Engine runs since this orchestrator was created
    pub fn computations(&self) -> usize {
        self.computations.load(Ordering::SeqCst)
    }

    /// Cached results
    pub fn cached(&self) -> usize {
        self.cache
            .lock()
            .map(|c| c.values().filter(|s| s.get().is_some()).count())
            .unwrap_or(0)
    }

    fn slot(&self, key: &str) -> CalcResult<Slot> {
        let mut cache = self.cache.lock().map_err(|_| CalcError::Internal {
            message: "batch cache lock poisoned".to_string(),
        })?;
        Ok(Arc::clone(cache.entry(key.to_string()).or_default()))
    }

    /// Drop `slot` from the cache unless it was already replaced.
    fn evict(&self, key: &str, slot: &Slot) {
        if let Ok(mut cache) = self.cache.lock() {
            if cache.get(key).map_or(false, |s| Arc::ptr_eq(s, slot)) {
                cache.remove(key);
            }
        }
    }

    fn failed(index: usize, request: &DesignRequest, key: String, started: Instant, diagnostic: Diagnostic) -> BatchItem {
        BatchItem {
            index,
            label: request.label.clone(),
            cache_key: key,
            status: ItemStatus::Failed,
            elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
            envelope: None,
            diagnostic: Some(diagnostic),
        }
    }

    fn run_one(&self, index: usize, request: &DesignRequest) -> BatchItem {
        self.run_with(index, request, |r| self.engine.solve(r))
    }

    fn run_with<F>(&self, index: usize, request: &DesignRequest, solve: F) -> BatchItem
    where
        F: FnOnce(&DesignRequest) -> Envelope<DesignResult>,
    {
        let started = Instant::now();
        let key = match cache_key(request, self.engine.snapshot()) {
            Ok(k) => k,
            Err(e) => return Self::failed(index, request, String::new(), started, crate::diagnostics::from_error(&e)),
        };
        let slot = match self.slot(&key) {
            Ok(s) => s,
            Err(e) => return Self::failed(index, request, key, started, crate::diagnostics::from_error(&e)),
        };

        let mut computed = false;
        let result = slot.get_or_try_init(|| {
            computed = true;
            self.computations.fetch_add(1, Ordering::SeqCst);
            let solve_started = Instant::now();
            let envelope = isolate(|| solve(request))?;
            Ok::<_, String>(Computed {
                envelope,
                solve_ms: solve_started.elapsed().as_secs_f64() * 1000.0,
            })
        });
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        let computation = match result {
            Ok(computation) => computation,
            Err(message) => {
                warn!(index, label = %request.label, %message, "request panicked");
                return Self::failed(
                    index,
                    request,
                    key,
                    started,
                    Diagnostic::new("panic", Severity::SolverLimitation, format!("Computation panicked: {}", message)),
                );
            }
        };

        let over_budget = self
            .settings
            .time_budget_ms
            .map_or(false, |budget| computation.solve_ms > budget as f64);
        if over_budget {
            if computed {
                warn!(index, solve_ms = computation.solve_ms, "request exceeded its time budget");
                self.evict(&key, &slot);
            }
            return BatchItem {
                index,
                label: request.label.clone(),
                cache_key: key,
                status: ItemStatus::TimedOut,
                elapsed_ms,
                envelope: None,
                diagnostic: Some(
                    Diagnostic::new(
                        "timeout",
                        Severity::SolverLimitation,
                        format!("Computation took {:.0} ms", computation.solve_ms),
                    )
                    .with_value("time_budget_ms", self.settings.time_budget_ms.unwrap_or_default()),
                ),
            };
        }

        BatchItem {
            index,
            label: request.label.clone(),
            cache_key: key,
            status: if computed {
                ItemStatus::Completed
            } else {
                ItemStatus::CacheHit
            },
            elapsed_ms,
            envelope: Some(relabel(computation.envelope.clone(), &request.label)),
            diagnostic: None,
        }
    }

    /// Run a batch. Items come back in submission order.
    pub fn run(&self, requests: &[DesignRequest]) -> BatchReport {
        let started = Instant::now();
        let before = self.computations();
        let items: Vec<BatchItem> = self.pool.install(|| {
            requests
                .par_iter()
                .enumerate()
                .map(|(i, r)| self.run_one(i, r))
                .collect()
        });
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        let stats = BatchStats::collect(&items, self.computations() - before, elapsed_ms);
        info!(
            total = stats.total,
            computations = stats.computations,
            cache_hits = stats.cache_hits,
            timed_out = stats.timed_out,
            failed = stats.failed,
            elapsed_ms,
            "batch complete"
        );
        BatchReport { items, stats }
    }
}
