//! Causal tracing example.
//!
//! Follows one request through a small service graph and shows how vector
//! clocks expose which hops were causally ordered and which ran concurrently.
//! It demonstrates:
//! - DistributedTrace with parent clocks carried between hops
//! - TraceStore feeding the causality-graph diagnostics path
//! - LamportClock for cheap total ordering of messages
//! - VersionVector for telling overwrites from conflicts

use causeway::clock::{LamportClock, VersionComparison, VersionVector};
use causeway::trace::{DistributedTrace, TraceStore};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> causeway::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let callback: causeway::trace::TraceCallback = Arc::new(|trace: &DistributedTrace| {
        println!(
            "stored trace {} ({}, {} events)",
            trace.trace_id(),
            trace.status(),
            trace.events().len()
        );
    });
    let store = TraceStore::new(Some(callback));

    // gateway fans out to auth and inventory, billing waits for both
    let mut trace = DistributedTrace::new("checkout-1001", "gateway");
    trace.set_metadata("route", "/checkout");
    let root = trace.root_event().copy();

    let auth = trace.add_event("auth", Some(&root));
    let inventory = trace.add_event("inventory", Some(&root));

    let mut joined = auth.copy();
    joined.update(&inventory);
    let billing = trace.add_event("billing", Some(&joined));
    trace.complete();

    println!("auth      {}", auth);
    println!("inventory {}", inventory);
    println!("billing   {}", billing);
    println!("auth || inventory: {}", auth.concurrent(&inventory));
    println!("auth -> billing:   {}", auth.happens_before(&billing));

    println!("\nwire format of the billing clock:\n{}", billing.to_json()?);

    store.store(trace);
    if let Some(graph) = store.causality_graph("checkout-1001") {
        println!("\ncausality graph:\n{}", serde_json::to_string_pretty(graph.edges())?);
    }

    let lamport = LamportClock::new();
    let sent = lamport.tick();
    let received = lamport.update(sent + 5);
    println!("\nlamport: sent at {}, received remote 6 -> {}", sent, received);

    let mut base = VersionVector::new();
    base.increment("eu-west");
    let mut left = base.clone();
    left.increment("eu-west");
    let mut right = base.clone();
    right.increment("us-east");

    match left.compare(&right) {
        VersionComparison::Concurrent => println!("replicas {} and {} conflict", left, right),
        other => println!("replicas ordered: {:?}", other),
    }

    Ok(())
}
