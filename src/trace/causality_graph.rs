//! Pairwise causality graphs over a snapshot of events
//!
//! [`build_causality_graph`] classifies every unordered pair of events once.
//! Happens-before pairs become a directed edge from the earlier event to the
//! later one; concurrent pairs become a single undirected edge. Distinct
//! events with identical clocks are concurrent. Two copies of the same event
//! (same event id) get no edge. The graph is a static snapshot and does not
//! follow events recorded after it was built.

use crate::clock::VectorClock;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Relationship carried by a [`CausalityEdge`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    HappensBefore,
    Concurrent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CausalityEdge {
    pub from_event_id: String,
    pub to_event_id: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CausalityGraph {
    events: Vec<VectorClock>,
    edges: Vec<CausalityEdge>,
    #[serde(default)]
    metadata: BTreeMap<String, serde_json::Value>,
}

impl CausalityGraph {
    pub fn events(&self) -> &[VectorClock] {
        &self.events
    }

    pub fn edges(&self) -> &[CausalityEdge] {
        &self.edges
    }

    pub fn metadata(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.metadata
    }

    pub fn happens_before_edges(&self) -> impl Iterator<Item = &CausalityEdge> {
        self.edges.iter().filter(|e| e.edge_type == EdgeType::HappensBefore)
    }

    pub fn concurrent_edges(&self) -> impl Iterator<Item = &CausalityEdge> {
        self.edges.iter().filter(|e| e.edge_type == EdgeType::Concurrent)
    }

    /// Ids of events that `event_id` happens-before
    pub fn successors<'a>(&'a self, event_id: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.happens_before_edges()
            .filter(move |e| e.from_event_id == event_id)
            .map(|e| e.to_event_id.as_str())
    }
}

/// Classify every unordered pair in `events`
pub fn build_causality_graph(events: &[VectorClock]) -> CausalityGraph {
    let mut edges = Vec::new();

    for (i, earlier) in events.iter().enumerate() {
        for later in &events[i + 1..] {
            let edge = match earlier.compare(later) {
                Some(Ordering::Less) => (earlier, later, EdgeType::HappensBefore),
                Some(Ordering::Greater) => (later, earlier, EdgeType::HappensBefore),
                None => (earlier, later, EdgeType::Concurrent),
                Some(Ordering::Equal) if earlier.event_id() == later.event_id() => continue,
                Some(Ordering::Equal) => (earlier, later, EdgeType::Concurrent),
            };

            edges.push(CausalityEdge {
                from_event_id: edge.0.event_id().to_string(),
                to_event_id: edge.1.event_id().to_string(),
                edge_type: edge.2,
            });
        }
    }

    let happens_before = edges.iter().filter(|e| e.edge_type == EdgeType::HappensBefore).count();
    let mut metadata = BTreeMap::new();
    metadata.insert("event_count".to_string(), serde_json::json!(events.len()));
    metadata.insert("happens_before_count".to_string(), serde_json::json!(happens_before));
    metadata.insert(
        "concurrent_count".to_string(),
        serde_json::json!(edges.len() - happens_before),
    );

    CausalityGraph {
        events: events.to_vec(),
        edges,
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(agent: &str, parent: Option<&VectorClock>) -> VectorClock {
        let mut vc = VectorClock::new(agent);
        if let Some(parent) = parent {
            vc.update(parent);
        }
        vc.increment();
        vc
    }

    #[test]
    fn test_empty_and_single_event() {
        assert!(build_causality_graph(&[]).edges().is_empty());

        let only = tick("a", None);
        let graph = build_causality_graph(&[only]);
        assert_eq!(graph.events().len(), 1);
        assert!(graph.edges().is_empty());
    }

    #[test]
    fn test_chain_produces_forward_edges() {
        let a = tick("a", None);
        let b = tick("b", Some(&a));
        let c = tick("c", Some(&b));

        let graph = build_causality_graph(&[a.clone(), b.clone(), c.clone()]);

        assert_eq!(graph.edges().len(), 3);
        assert_eq!(graph.concurrent_edges().count(), 0);
        let from_a: Vec<&str> = graph.successors(a.event_id()).collect();
        assert_eq!(from_a, vec![b.event_id(), c.event_id()]);
        assert_eq!(graph.successors(c.event_id()).count(), 0);
    }

    #[test]
    fn test_edge_direction_follows_causality_not_input_order() {
        let a = tick("a", None);
        let b = tick("b", Some(&a));

        let graph = build_causality_graph(&[b.clone(), a.clone()]);

        assert_eq!(graph.edges().len(), 1);
        let edge = &graph.edges()[0];
        assert_eq!(edge.from_event_id, a.event_id());
        assert_eq!(edge.to_event_id, b.event_id());
        assert_eq!(edge.edge_type, EdgeType::HappensBefore);
    }

    #[test]
    fn test_concurrent_pair_emitted_once() {
        let x = tick("x", None);
        let y = tick("y", None);

        let graph = build_causality_graph(&[x, y]);

        assert_eq!(graph.edges().len(), 1);
        assert_eq!(graph.concurrent_edges().count(), 1);
        assert_eq!(graph.metadata()["concurrent_count"], serde_json::json!(1));
    }

    #[test]
    fn test_copies_of_one_event_have_no_edge() {
        let a = tick("a", None);
        let copy = a.copy();
        let graph = build_causality_graph(&[a, copy]);
        assert!(graph.edges().is_empty());
    }

    #[test]
    fn test_distinct_events_with_equal_clocks_are_concurrent() {
        let root = tick("gateway", None);
        let first = tick("worker", Some(&root));
        let second = tick("worker", Some(&root));
        assert!(first.equals(&second));
        assert_ne!(first.event_id(), second.event_id());

        let graph = build_causality_graph(&[first.clone(), second.clone()]);

        assert_eq!(graph.edges().len(), 1);
        let edge = &graph.edges()[0];
        assert_eq!(edge.edge_type, EdgeType::Concurrent);
        assert_eq!(edge.from_event_id, first.event_id());
        assert_eq!(edge.to_event_id, second.event_id());
        assert_eq!(graph.metadata()["concurrent_count"], serde_json::json!(1));
    }

    #[test]
    fn test_fork_and_join() {
        let root = tick("root", None);
        let left = tick("left", Some(&root));
        let right = tick("right", Some(&root));
        let mut join = tick("join", Some(&left));
        join.update(&right);
        join.increment();

        let graph = build_causality_graph(&[root, left, right, join]);

        // 6 pairs: only left/right are concurrent
        assert_eq!(graph.edges().len(), 6);
        assert_eq!(graph.happens_before_edges().count(), 5);
        assert_eq!(graph.concurrent_edges().count(), 1);
        assert_eq!(graph.metadata()["event_count"], serde_json::json!(4));
    }

    #[test]
    fn test_edge_serializes_type_field() {
        let edge = CausalityEdge {
            from_event_id: "e1".to_string(),
            to_event_id: "e2".to_string(),
            edge_type: EdgeType::HappensBefore,
        };
        let json = serde_json::to_string(&edge).unwrap();
        assert_eq!(json, r#"{"from_event_id":"e1","to_event_id":"e2","type":"happens_before"}"#);
    }
}
