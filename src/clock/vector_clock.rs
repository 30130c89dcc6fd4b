//! Vector clocks for causal ordering of events
//!
//! A [`VectorClock`] holds one counter per agent. Comparing two clocks yields
//! a partial order: one event happens-before the other, the two are equal, or
//! they are concurrent.
//!
//! # Ownership
//!
//! Vector clocks are plain values with no internal synchronization. Create one
//! per traced operation and mutate it from a single owner at a time. Take a
//! [`copy`](VectorClock::copy) before handing a snapshot to another thread,
//! since [`increment`](VectorClock::increment) and [`update`](VectorClock::update)
//! mutate in place.
//!
//! # Examples
//!
//! ```
//! use causeway::clock::VectorClock;
//!
//! let mut sender = VectorClock::new("orders");
//! sender.increment();
//!
//! let mut receiver = VectorClock::new("billing");
//! receiver.update(&sender);
//! receiver.increment();
//!
//! assert!(sender.happens_before(&receiver));
//! assert!(!receiver.happens_before(&sender));
//! ```

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Logical timestamp for one event produced by one agent
///
/// Serializes to the object `{agent, clock, event_id, timestamp, metadata}`.
/// The wall-clock `timestamp` is informational only and never takes part in
/// ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorClock {
    #[serde(alias = "agent_name")]
    agent: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    clock: BTreeMap<String, u64>,
    event_id: String,
    timestamp: DateTime<Utc>,
    #[serde(default, deserialize_with = "null_as_empty")]
    metadata: BTreeMap<String, String>,
}

/// Accepts a missing or `null` collection and materializes it as empty
fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl VectorClock {
    /// Create a zeroed clock owned by `agent` with a fresh event id
    pub fn new(agent: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            clock: BTreeMap::new(),
            event_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    /// Attach a metadata entry, builder style
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_metadata(key, value);
        self
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Per-agent counters, sorted by agent
    pub fn clock(&self) -> &BTreeMap<String, u64> {
        &self.clock
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Counter for `agent`, reading absent entries as zero
    pub fn get(&self, agent: &str) -> u64 {
        self.clock.get(agent).copied().unwrap_or(0)
    }

    /// Advance this agent's own counter
    pub fn increment(&mut self) {
        let counter = self.clock.entry(self.agent.clone()).or_insert(0);
        *counter = counter.saturating_add(1);
        self.timestamp = Utc::now();
    }

    /// Merge `other` into this clock by taking the elementwise maximum
    ///
    /// The merge is commutative and idempotent and never lowers an entry.
    pub fn update(&mut self, other: &VectorClock) {
        for (agent, &theirs) in &other.clock {
            let mine = self.clock.entry(agent.clone()).or_insert(0);
            if theirs > *mine {
                *mine = theirs;
            }
        }
        self.timestamp = Utc::now();
    }

    /// True if this event causally precedes `other`
    ///
    /// Every entry here must be `<=` the matching entry in `other` and at
    /// least one must be strictly smaller. A clock never happens-before itself.
    pub fn happens_before(&self, other: &VectorClock) -> bool {
        let mut strictly_less = false;
        for (agent, &mine) in &self.clock {
            let theirs = other.get(agent);
            if mine > theirs {
                return false;
            }
            if mine < theirs {
                strictly_less = true;
            }
        }

        strictly_less
            || other
                .clock
                .iter()
                .any(|(agent, &theirs)| theirs > 0 && !self.clock.contains_key(agent))
    }

    /// True if neither clock happens-before the other and they are not equal
    pub fn concurrent(&self, other: &VectorClock) -> bool {
        !self.happens_before(other) && !other.happens_before(self) && !self.equals(other)
    }

    /// True if both clocks carry the same counters
    ///
    /// Absent entries read as zero, so `{a:0}` equals `{}`. Event ids,
    /// timestamps and metadata are ignored.
    pub fn equals(&self, other: &VectorClock) -> bool {
        self.clock.iter().all(|(agent, &mine)| other.get(agent) == mine)
            && other.clock.iter().all(|(agent, &theirs)| self.get(agent) == theirs)
    }

    /// Partial-order comparison of the two clocks
    ///
    /// `Some(Less)` means this clock happens-before `other`; `None` means the
    /// clocks are concurrent.
    pub fn compare(&self, other: &VectorClock) -> Option<Ordering> {
        if self.equals(other) {
            Some(Ordering::Equal)
        } else if self.happens_before(other) {
            Some(Ordering::Less)
        } else if other.happens_before(self) {
            Some(Ordering::Greater)
        } else {
            None
        }
    }

    /// Deep copy of the clock, including its event id
    pub fn copy(&self) -> VectorClock {
        self.clone()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a clock, failing without a partial result on malformed input
    pub fn from_json(data: &str) -> Result<VectorClock> {
        Ok(serde_json::from_str(data)?)
    }
}

impl fmt::Display for VectorClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> =
            self.clock.iter().map(|(agent, ts)| format!("{}:{}", agent, ts)).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CausewayError;
    use proptest::prelude::*;

    fn clock_of(agent: &str, entries: &[(&str, u64)]) -> VectorClock {
        let mut vc = VectorClock::new(agent);
        for (a, v) in entries {
            vc.clock.insert(a.to_string(), *v);
        }
        vc
    }

    #[test]
    fn test_new_clock_is_empty() {
        let vc = VectorClock::new("agent-a");
        assert_eq!(vc.agent(), "agent-a");
        assert!(vc.clock().is_empty());
        assert!(vc.metadata().is_empty());
        assert!(!vc.event_id().is_empty());
    }

    #[test]
    fn test_event_ids_are_unique() {
        let a = VectorClock::new("a");
        let b = VectorClock::new("a");
        assert_ne!(a.event_id(), b.event_id());
    }

    #[test]
    fn test_increment_touches_only_own_entry() {
        let mut vc = clock_of("a", &[("b", 3)]);
        vc.increment();
        vc.increment();
        assert_eq!(vc.get("a"), 2);
        assert_eq!(vc.get("b"), 3);
    }

    #[test]
    fn test_update_takes_elementwise_max() {
        let mut a = clock_of("a", &[("a", 3), ("b", 1)]);
        let b = clock_of("b", &[("a", 1), ("b", 4), ("c", 2)]);
        a.update(&b);

        assert_eq!(a.get("a"), 3);
        assert_eq!(a.get("b"), 4);
        assert_eq!(a.get("c"), 2);
    }

    #[test]
    fn test_update_is_idempotent() {
        let mut once = clock_of("a", &[("a", 2)]);
        let other = clock_of("b", &[("b", 5)]);
        once.update(&other);
        let snapshot = once.copy();
        once.update(&other);
        assert!(once.equals(&snapshot));
    }

    #[test]
    fn test_happens_before_via_message() {
        let mut a = VectorClock::new("a");
        a.increment();

        let mut b = VectorClock::new("b");
        b.update(&a);
        b.increment();

        assert!(a.happens_before(&b));
        assert!(!b.happens_before(&a));
        assert!(!a.concurrent(&b));
    }

    #[test]
    fn test_happens_before_is_irreflexive() {
        let vc = clock_of("a", &[("a", 1), ("b", 2)]);
        assert!(!vc.happens_before(&vc));
        assert!(vc.equals(&vc.copy()));
    }

    #[test]
    fn test_disjoint_agents_are_concurrent() {
        let a = clock_of("x", &[("x", 1)]);
        let b = clock_of("y", &[("y", 1)]);

        assert!(a.concurrent(&b));
        assert!(b.concurrent(&a));
        assert!(!a.happens_before(&b));
        assert!(!b.happens_before(&a));
        assert_eq!(a.compare(&b), None);
    }

    #[test]
    fn test_missing_key_counts_as_zero() {
        let a = clock_of("a", &[("a", 1)]);
        let b = clock_of("b", &[("a", 1), ("b", 1)]);
        assert!(a.happens_before(&b));
        assert_eq!(a.compare(&b), Some(Ordering::Less));
        assert_eq!(b.compare(&a), Some(Ordering::Greater));
    }

    #[test]
    fn test_zero_entries_do_not_break_equality() {
        let a = clock_of("a", &[("a", 1), ("z", 0)]);
        let b = clock_of("b", &[("a", 1)]);
        assert!(a.equals(&b));
        assert!(!a.concurrent(&b));
        assert_eq!(a.compare(&b), Some(Ordering::Equal));
    }

    #[test]
    fn test_copy_is_independent() {
        let mut original = clock_of("a", &[("a", 1)]).with_metadata("op", "checkout");
        let snapshot = original.copy();
        original.increment();
        original.set_metadata("op", "refund");

        assert_eq!(snapshot.get("a"), 1);
        assert_eq!(snapshot.metadata().get("op").map(String::as_str), Some("checkout"));
        assert_eq!(snapshot.event_id(), original.event_id());
    }

    #[test]
    fn test_display_is_sorted() {
        let vc = clock_of("b", &[("b", 2), ("a", 1)]);
        assert_eq!(vc.to_string(), "[a:1, b:2]");
        assert_eq!(VectorClock::new("x").to_string(), "[]");
    }

    #[test]
    fn test_serialized_field_set() {
        let vc = clock_of("a", &[("a", 1)]);
        let value = serde_json::to_value(&vc).unwrap();
        let object = value.as_object().unwrap();

        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(keys, vec!["agent", "clock", "event_id", "metadata", "timestamp"]);
    }

    #[test]
    fn test_json_round_trip() {
        let mut vc = VectorClock::new("a").with_metadata("trace", "t-1");
        vc.increment();
        let json = vc.to_json().unwrap();
        let decoded = VectorClock::from_json(&json).unwrap();

        assert!(decoded.equals(&vc));
        assert_eq!(decoded.event_id(), vc.event_id());
        assert_eq!(decoded.agent(), "a");
        assert_eq!(decoded.timestamp(), vc.timestamp());
        assert_eq!(decoded.metadata(), vc.metadata());
    }

    #[test]
    fn test_missing_collections_are_materialized() {
        let json = r#"{"agent":"a","event_id":"e-1","timestamp":"2024-01-01T00:00:00Z"}"#;
        let vc = VectorClock::from_json(json).unwrap();
        assert!(vc.clock().is_empty());
        assert!(vc.metadata().is_empty());

        let json = concat!(
            r#"{"agent":"a","clock":null,"event_id":"e-1","#,
            r#""timestamp":"2024-01-01T00:00:00Z","metadata":null}"#
        );
        let vc = VectorClock::from_json(json).unwrap();
        assert!(vc.clock().is_empty());
        assert!(vc.metadata().is_empty());
    }

    #[test]
    fn test_legacy_agent_name_field() {
        let json = concat!(
            r#"{"agent_name":"legacy","clock":{"legacy":3},"event_id":"e-2","#,
            r#""timestamp":"2024-01-01T00:00:00Z"}"#
        );
        let vc = VectorClock::from_json(json).unwrap();
        assert_eq!(vc.agent(), "legacy");
        assert_eq!(vc.get("legacy"), 3);
    }

    #[test]
    fn test_malformed_json_fails() {
        let result = VectorClock::from_json(r#"{"agent":"a","clock":{"a":"not-a-number"}}"#);
        assert!(matches!(result, Err(CausewayError::SerializationError(_))));

        let result = VectorClock::from_json("not json");
        assert!(result.is_err());
    }

    fn arb_clock() -> impl Strategy<Value = VectorClock> {
        prop::collection::btree_map("[a-d]", 0u64..5, 0..4).prop_map(|entries| {
            let mut vc = VectorClock::new("p");
            vc.clock = entries;
            vc
        })
    }

    proptest! {
        #[test]
        fn prop_merge_is_idempotent(a in arb_clock(), b in arb_clock()) {
            let mut once = a.copy();
            once.update(&b);
            let mut twice = once.copy();
            twice.update(&b);
            prop_assert!(once.equals(&twice));
        }

        #[test]
        fn prop_merge_is_commutative(a in arb_clock(), b in arb_clock(), c in arb_clock()) {
            let mut bc = a.copy();
            bc.update(&b);
            bc.update(&c);
            let mut cb = a.copy();
            cb.update(&c);
            cb.update(&b);
            prop_assert!(bc.equals(&cb));
        }

        #[test]
        fn prop_merge_never_decreases(a in arb_clock(), b in arb_clock()) {
            let mut merged = a.copy();
            merged.update(&b);
            for (agent, &v) in a.clock() {
                prop_assert!(merged.get(agent) >= v);
            }
            prop_assert!(!merged.happens_before(&a));
        }

        #[test]
        fn prop_exactly_one_relation_holds(a in arb_clock(), b in arb_clock()) {
            let relations = [
                a.happens_before(&b),
                b.happens_before(&a),
                a.concurrent(&b),
                a.equals(&b),
            ];
            prop_assert_eq!(relations.iter().filter(|r| **r).count(), 1);
        }

        #[test]
        fn prop_json_round_trip(a in arb_clock()) {
            let decoded = VectorClock::from_json(&a.to_json().unwrap()).unwrap();
            prop_assert!(decoded.equals(&a));
            prop_assert_eq!(decoded.clock(), a.clock());
        }
    }
}
