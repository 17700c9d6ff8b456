//! Basic usage example for handle-lifecycle.
//!
//! Demonstrates:
//! - Registering handles with destroy/free callbacks and dependencies
//! - Releasing wrappers in the "wrong" order without destroying too early
//! - Rewiring dependencies after registration
//! - Watching the registry with a trace callback
//!
//! Run with: `cargo run --example basic_usage`

use handle_lifecycle::{define_lifecycle, Callbacks};

// A process-global registry for a pretend native library.
define_lifecycle!(native, usize);

fn release(kind: &'static str) -> Callbacks<usize> {
    Callbacks::destroy(move |h: &usize| println!("   -> {kind}_release({h:#x})"))
}

fn main() {
    println!("=== handle-lifecycle: Basic Usage ===\n");

    // -------------------------------------------------------------------------
    // 1. Register a context and two buffers allocated from it
    // -------------------------------------------------------------------------
    println!("1. Registering a context and two buffers...");

    let context = 0x1000;
    let (buffer_a, buffer_b) = (0x2000, 0x3000);
    native::register(context, release("context"), []).unwrap();
    native::register(buffer_a, release("buffer"), [context]).unwrap();
    native::register(buffer_b, release("buffer"), [context]).unwrap();

    println!(
        "   context refcount: {:?} (own + one per buffer)",
        native::ref_count(&context)
    );

    // -------------------------------------------------------------------------
    // 2. Release the context wrapper first
    // -------------------------------------------------------------------------
    println!("\n2. Releasing the context wrapper before its buffers...");

    native::unregister(context).unwrap();
    println!("   context still tracked: {}", native::is_tracked(&context));

    // -------------------------------------------------------------------------
    // 3. Trace the rest
    // -------------------------------------------------------------------------
    println!("\n3. Installing a trace callback...");

    native::set_trace_callback(|event| println!("   [trace] {event}"));

    // -------------------------------------------------------------------------
    // 4. Release the buffers
    // -------------------------------------------------------------------------
    println!("\n4. Releasing buffer A, then buffer B...");

    native::unregister(buffer_a).unwrap();
    native::unregister(buffer_b).unwrap();
    println!("   registry empty: {}", native::registry().is_empty());

    // -------------------------------------------------------------------------
    // 5. Add and break a dependency after the fact
    // -------------------------------------------------------------------------
    println!("\n5. Rewiring dependencies...");

    let device = 0x4000;
    let queue = 0x5000;
    native::register(device, release("device"), []).unwrap();
    native::register(queue, release("queue"), []).unwrap();
    native::add_dependency(queue, device).unwrap();
    native::unregister(device).unwrap();
    println!("   device kept alive by queue: {}", native::is_tracked(&device));

    native::remove_dependency(queue, device).unwrap();
    native::unregister(queue).unwrap();

    native::clear_trace_callback();

    // -------------------------------------------------------------------------
    // 6. Errors
    // -------------------------------------------------------------------------
    println!("\n6. Releasing an untracked handle...");

    match native::unregister(0xdead) {
        Ok(()) => println!("   unexpected success"),
        Err(err) => println!("   error: {err}"),
    }

    println!("\n=== Example completed successfully! ===");
}
