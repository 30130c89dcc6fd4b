//! Causal tracing built on vector clocks
//!
//! The tracing layer stamps each hop of an operation with a vector clock and
//! collects the hops into a [`DistributedTrace`]. Diagnostics tooling gathers
//! traces in a [`TraceStore`] and turns their events into a
//! [`CausalityGraph`] of happens-before and concurrent edges.
//!
//! # Usage Example
//!
//! ```
//! use causeway::trace::{DistributedTrace, TraceStore};
//!
//! let store = TraceStore::default();
//!
//! let mut trace = DistributedTrace::new("req-42", "gateway");
//! let root = trace.root_event().copy();
//! let auth = trace.add_event("auth", Some(&root));
//! trace.add_event("billing", Some(&auth));
//! trace.complete();
//! store.store(trace);
//!
//! let graph = store.causality_graph("req-42").unwrap();
//! assert_eq!(graph.happens_before_edges().count(), 3);
//! ```

pub mod causality_graph;
pub mod distributed_trace;
pub mod trace_store;

pub use causality_graph::{build_causality_graph, CausalityEdge, CausalityGraph, EdgeType};
pub use distributed_trace::{DistributedTrace, TraceStatus};
pub use trace_store::{TraceCallback, TraceStore};
