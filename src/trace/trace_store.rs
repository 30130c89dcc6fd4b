//! Trace storage with callbacks and filtering
//!
//! This module provides thread-safe storage for distributed traces collected by
//! the diagnostics path, with support for an on-store callback, filtering by
//! status, and building causality graphs for stored traces.

use super::causality_graph::CausalityGraph;
use super::distributed_trace::{DistributedTrace, TraceStatus};
use std::sync::{Arc, Mutex, MutexGuard};

/// Type alias for trace callback functions
pub type TraceCallback = Arc<dyn Fn(&DistributedTrace) + Send + Sync>;

/// Store for collecting and querying distributed traces
///
/// Storing a trace whose id is already present replaces the earlier copy, so a
/// trace can be stored while active and again once it finishes.
pub struct TraceStore {
    traces: Arc<Mutex<Vec<DistributedTrace>>>,
    on_store_callback: Option<TraceCallback>,
}

impl TraceStore {
    /// Create a new trace store
    ///
    /// # Arguments
    ///
    /// * `on_store_callback` - Optional callback called whenever a trace is stored
    pub fn new(on_store_callback: Option<TraceCallback>) -> Self {
        Self {
            traces: Arc::new(Mutex::new(Vec::new())),
            on_store_callback,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<DistributedTrace>> {
        self.traces.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store a trace, replacing any stored trace with the same id
    pub fn store(&self, trace: DistributedTrace) {
        if let Some(callback) = &self.on_store_callback {
            callback(&trace);
        }

        let mut traces = self.lock();
        match traces.iter_mut().find(|t| t.trace_id() == trace.trace_id()) {
            Some(existing) => *existing = trace,
            None => traces.push(trace),
        }
    }

    pub fn get(&self, trace_id: &str) -> Option<DistributedTrace> {
        self.lock().iter().find(|t| t.trace_id() == trace_id).cloned()
    }

    /// Get traces, optionally restricted to one status
    ///
    /// # Arguments
    ///
    /// * `status` - Only include traces with this status
    /// * `filter_func` - Custom filter function to apply to traces
    pub fn get_traces(
        &self,
        status: Option<TraceStatus>,
        filter_func: Option<&dyn Fn(&DistributedTrace) -> bool>,
    ) -> Vec<DistributedTrace> {
        self.lock()
            .iter()
            .filter(|t| status.map_or(true, |s| t.status() == s))
            .filter(|t| filter_func.map_or(true, |f| f(*t)))
            .cloned()
            .collect()
    }

    /// Get the last N stored traces in insertion order
    pub fn get_last_n(&self, n: usize) -> Vec<DistributedTrace> {
        let traces = self.lock();
        let start_idx = traces.len().saturating_sub(n);
        traces[start_idx..].to_vec()
    }

    /// Build the causality graph for a stored trace
    pub fn causality_graph(&self, trace_id: &str) -> Option<CausalityGraph> {
        self.lock()
            .iter()
            .find(|t| t.trace_id() == trace_id)
            .map(DistributedTrace::causality_graph)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Default for TraceStore {
    fn default() -> Self {
        Self::new(None)
    }
}
