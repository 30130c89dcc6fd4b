//! Distributed traces built from vector clocks
//!
//! A [`DistributedTrace`] records every hop of one logical operation as a
//! vector-clock event. Passing the clock of one hop as the parent of the next
//! carries causal history across agents.

use super::causality_graph::{build_causality_graph, CausalityGraph};
use crate::clock::VectorClock;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Lifecycle status of a trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStatus {
    Active,
    Completed,
    Failed,
}

impl TraceStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TraceStatus::Active)
    }
}

impl fmt::Display for TraceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TraceStatus::Active => "active",
            TraceStatus::Completed => "completed",
            TraceStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Append-only sequence of causally stamped events for one operation
///
/// The trace is terminated exactly once. The first call to
/// [`complete`](DistributedTrace::complete) or [`fail`](DistributedTrace::fail)
/// sets the status and end time; later calls are ignored and return `false`.
/// Events may still be appended after termination so late hops are not lost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributedTrace {
    trace_id: String,
    root_event: VectorClock,
    events: Vec<VectorClock>,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    status: TraceStatus,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

impl DistributedTrace {
    /// Start a trace whose root event is the first tick of `root_agent`
    pub fn new(trace_id: impl Into<String>, root_agent: impl Into<String>) -> Self {
        let mut root_event = VectorClock::new(root_agent);
        root_event.increment();

        Self {
            trace_id: trace_id.into(),
            events: vec![root_event.clone()],
            root_event,
            start_time: Utc::now(),
            end_time: None,
            status: TraceStatus::Active,
            metadata: BTreeMap::new(),
        }
    }

    /// Record a hop performed by `agent`
    ///
    /// Builds a fresh clock for `agent`, merges `parent` into it when given,
    /// increments it, appends it and returns a copy for the caller to pass on.
    pub fn add_event(
        &mut self,
        agent: impl Into<String>,
        parent: Option<&VectorClock>,
    ) -> VectorClock {
        let mut event = VectorClock::new(agent);
        if let Some(parent) = parent {
            event.update(parent);
        }
        event.increment();

        self.events.push(event.clone());
        event
    }

    /// Mark the trace completed. Returns false if it had already terminated.
    pub fn complete(&mut self) -> bool {
        self.finish(TraceStatus::Completed)
    }

    /// Mark the trace failed. Returns false if it had already terminated.
    pub fn fail(&mut self) -> bool {
        self.finish(TraceStatus::Failed)
    }

    fn finish(&mut self, status: TraceStatus) -> bool {
        if self.status.is_terminal() {
            debug!(
                trace_id = self.trace_id.as_str(),
                current = %self.status,
                requested = %status,
                "Ignoring second terminal transition"
            );
            return false;
        }

        self.end_time = Some(Utc::now());
        self.status = status;
        true
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn root_event(&self) -> &VectorClock {
        &self.root_event
    }

    /// All events in insertion order, starting with the root
    pub fn events(&self) -> &[VectorClock] {
        &self.events
    }

    pub fn status(&self) -> TraceStatus {
        self.status
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Elapsed time until the end of the trace, or until now while active
    pub fn duration(&self) -> Duration {
        let end = self.end_time.unwrap_or_else(Utc::now);
        (end - self.start_time).to_std().unwrap_or_default()
    }

    /// Snapshot causality graph over the events recorded so far
    pub fn causality_graph(&self) -> CausalityGraph {
        build_causality_graph(&self.events)
    }
}
