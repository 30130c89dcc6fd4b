//! Version vectors for write-conflict detection
//!
//! Each replica bumps its own counter when it writes. Comparing two vectors
//! tells a clean overwrite (one dominates) from a genuine conflict (concurrent).
//! Like [`VectorClock`](super::VectorClock), a version vector is a plain value
//! with a single-owner contract.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Result of comparing two version vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionComparison {
    Equal,
    /// This vector has seen everything the other has, and more
    Dominates,
    /// The other vector has seen everything this one has, and more
    Dominated,
    /// Each side has writes the other has not seen
    Concurrent,
}

/// Per-replica write counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionVector {
    versions: BTreeMap<String, u64>,
}

impl VersionVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a write by `replica`
    pub fn increment(&mut self, replica: impl Into<String>) {
        let version = self.versions.entry(replica.into()).or_insert(0);
        *version = version.saturating_add(1);
    }

    /// Counter for `replica`, reading absent entries as zero
    pub fn get(&self, replica: &str) -> u64 {
        self.versions.get(replica).copied().unwrap_or(0)
    }

    pub fn versions(&self) -> &BTreeMap<String, u64> {
        &self.versions
    }

    /// Merge `other` by taking the elementwise maximum
    pub fn update(&mut self, other: &VersionVector) {
        for (replica, &theirs) in &other.versions {
            let mine = self.versions.entry(replica.clone()).or_insert(0);
            if theirs > *mine {
                *mine = theirs;
            }
        }
    }

    pub fn compare(&self, other: &VersionVector) -> VersionComparison {
        let this_dominates = other
            .versions
            .iter()
            .all(|(replica, &theirs)| self.get(replica) >= theirs);
        let other_dominates = self
            .versions
            .iter()
            .all(|(replica, &mine)| other.get(replica) >= mine);

        match (this_dominates, other_dominates) {
            (true, true) => VersionComparison::Equal,
            (true, false) => VersionComparison::Dominates,
            (false, true) => VersionComparison::Dominated,
            (false, false) => VersionComparison::Concurrent,
        }
    }
}

impl fmt::Display for VersionVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> =
            self.versions.iter().map(|(replica, v)| format!("{}:{}", replica, v)).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_increment() {
        let mut vv = VersionVector::new();
        vv.increment("r1");
        vv.increment("r1");
        vv.increment("r2");
        assert_eq!(vv.get("r1"), 2);
        assert_eq!(vv.get("r2"), 1);
        assert_eq!(vv.get("r3"), 0);
    }

    #[test]
    fn test_equal_vectors() {
        let mut a = VersionVector::new();
        a.increment("r1");
        let b = a.clone();
        assert_eq!(a.compare(&b), VersionComparison::Equal);
        assert_eq!(VersionVector::new().compare(&VersionVector::new()), VersionComparison::Equal);
    }

    #[test]
    fn test_clean_overwrite_dominates() {
        let mut base = VersionVector::new();
        base.increment("r1");

        let mut newer = base.clone();
        newer.increment("r1");

        assert_eq!(newer.compare(&base), VersionComparison::Dominates);
        assert_eq!(base.compare(&newer), VersionComparison::Dominated);
    }

    #[test]
    fn test_divergent_writes_conflict() {
        let mut base = VersionVector::new();
        base.increment("r1");

        let mut left = base.clone();
        left.increment("r1");
        let mut right = base.clone();
        right.increment("r2");

        assert_eq!(left.compare(&right), VersionComparison::Concurrent);
        assert_eq!(right.compare(&left), VersionComparison::Concurrent);

        left.update(&right);
        assert_eq!(left.compare(&right), VersionComparison::Dominates);
    }

    #[test]
    fn test_display_and_serde() {
        let mut vv = VersionVector::new();
        vv.increment("b");
        vv.increment("a");
        assert_eq!(vv.to_string(), "{a:1, b:1}");

        let json = serde_json::to_string(&vv).unwrap();
        assert_eq!(json, r#"{"a":1,"b":1}"#);
        let decoded: VersionVector = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, vv);
    }

    fn arb_vector() -> impl Strategy<Value = VersionVector> {
        prop::collection::btree_map("[a-c]", 0u64..4, 0..3)
            .prop_map(|versions| VersionVector { versions })
    }

    proptest! {
        #[test]
        fn prop_compare_is_antisymmetric(a in arb_vector(), b in arb_vector()) {
            let expected = match a.compare(&b) {
                VersionComparison::Dominates => VersionComparison::Dominated,
                VersionComparison::Dominated => VersionComparison::Dominates,
                other => other,
            };
            prop_assert_eq!(b.compare(&a), expected);
        }

        #[test]
        fn prop_merge_dominates_both(a in arb_vector(), b in arb_vector()) {
            let mut merged = a.clone();
            merged.update(&b);
            prop_assert_ne!(merged.compare(&a), VersionComparison::Dominated);
            prop_assert_ne!(merged.compare(&a), VersionComparison::Concurrent);
            prop_assert_ne!(merged.compare(&b), VersionComparison::Dominated);
            prop_assert_ne!(merged.compare(&b), VersionComparison::Concurrent);
        }
    }
}
