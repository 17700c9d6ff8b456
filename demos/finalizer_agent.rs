//! Deferred release example for handle-lifecycle.
//!
//! Wrapper objects whose `Drop` must not run native teardown inline hand
//! their handle to an unregistration agent instead. The agent's worker thread
//! performs every release in FIFO order.
//!
//! Demonstrates:
//! - `DeferredLifecycle` with a named worker thread
//! - Wrappers dropped from several threads in arbitrary order
//! - Observing errors raised by deferred releases
//! - Logging through `tracing-subscriber`
//!
//! Run with: `RUST_LOG=handle_lifecycle=debug cargo run --example finalizer_agent`

use handle_lifecycle::{AgentConfig, Callbacks, DeferredLifecycle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tracing_subscriber::EnvFilter;

static NEXT_HANDLE: AtomicUsize = AtomicUsize::new(0x100);

/// A native object wrapper whose drop is a deferred release.
struct Wrapper<'a> {
    handle: usize,
    lifecycle: &'a DeferredLifecycle<usize>,
}

impl<'a> Wrapper<'a> {
    fn new(
        lifecycle: &'a DeferredLifecycle<usize>,
        destroyed: &Arc<AtomicUsize>,
        deps: &[usize],
    ) -> Self {
        let handle = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
        let destroyed = Arc::clone(destroyed);
        lifecycle
            .register(
                handle,
                Callbacks::destroy(move |_: &usize| {
                    destroyed.fetch_add(1, Ordering::Relaxed);
                }),
                deps.iter().copied(),
            )
            .unwrap();
        Self { handle, lifecycle }
    }
}

impl Drop for Wrapper<'_> {
    fn drop(&mut self) {
        self.lifecycle.unregister(self.handle);
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== handle-lifecycle: Finalizer Agent ===\n");

    let lifecycle = DeferredLifecycle::with_config(
        AgentConfig::default().with_thread_name("finalizer"),
    )
    .unwrap();
    lifecycle.on_unregister_error(|err| println!("   [agent error] {err}"));

    // -------------------------------------------------------------------------
    // 1. Build a few object graphs
    // -------------------------------------------------------------------------
    println!("1. Creating 100 sessions, each with 5 statements...");

    let destroyed = Arc::new(AtomicUsize::new(0));
    let mut sessions = Vec::new();
    let mut statements = Vec::new();
    for _ in 0..100 {
        let session = Wrapper::new(&lifecycle, &destroyed, &[]);
        for _ in 0..5 {
            statements.push(Wrapper::new(&lifecycle, &destroyed, &[session.handle]));
        }
        sessions.push(session);
    }
    println!("   tracked handles: {}", lifecycle.registry().len());

    // -------------------------------------------------------------------------
    // 2. Drop wrappers from two threads
    // -------------------------------------------------------------------------
    println!("\n2. Dropping sessions and statements concurrently...");

    thread::scope(|scope| {
        scope.spawn(move || drop(sessions));
        scope.spawn(move || drop(statements));
    });

    // -------------------------------------------------------------------------
    // 3. A release that fails
    // -------------------------------------------------------------------------
    println!("\n3. Queueing a release for a handle nobody registered...");

    lifecycle.unregister(0xdead);

    // -------------------------------------------------------------------------
    // 4. Drain and stop
    // -------------------------------------------------------------------------
    println!("\n4. Stopping the agent...");

    lifecycle.stop_agent();
    println!("   destroyed: {}", destroyed.load(Ordering::Relaxed));
    println!("   registry empty: {}", lifecycle.registry().is_empty());

    println!("\n=== Example completed successfully! ===");
}
