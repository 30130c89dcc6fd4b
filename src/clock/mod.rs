//! Logical clocks
//!
//! - **AtomicCounter**: lock-free integer counter shared by the other primitives
//! - **LamportClock**: scalar clock giving a total order consistent with causality
//! - **VectorClock**: per-agent counters giving the full happens-before partial order
//! - **VersionVector**: per-replica counters for detecting write conflicts
//!
//! Only the counter and the Lamport clock are safe to share between threads.
//! Vector clocks and version vectors follow a single-owner contract; wrap them
//! in a mutex if more than one thread must mutate the same instance.

pub mod atomic_counter;
pub mod lamport;
pub mod vector_clock;
pub mod version_vector;

pub use atomic_counter::{AtomicCounter, SequenceGenerator};
pub use lamport::LamportClock;
pub use vector_clock::VectorClock;
pub use version_vector::{VersionComparison, VersionVector};
