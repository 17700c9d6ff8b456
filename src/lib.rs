//! # Handle Lifecycle
//!
//! A thread-safe, reference-counted lifecycle registry for unmanaged handles.
//! Built for binding layers whose wrapper objects are released in no
//! particular order (garbage collectors, finalizers, `Drop` in arbitrary
//! order) but whose native objects must be destroyed dependents-first.
//!
//! Each handle is registered with destroy/free callbacks and the handles it
//! depends on. A dependency edge holds a reference on its target, so a native
//! object is only destroyed once its own owner and every dependent have
//! released it.
//!
//! ## Quick Start
//!
//! ```rust
//! use handle_lifecycle::{Callbacks, LifecycleRegistry};
//!
//! let registry = LifecycleRegistry::<usize>::new();
//!
//! // A context and a buffer allocated from it.
//! registry.register(0x10, Callbacks::destroy(|h: &usize| println!("free context {h:#x}")), []).unwrap();
//! registry.register(0x20, Callbacks::destroy(|h: &usize| println!("free buffer {h:#x}")), [0x10]).unwrap();
//!
//! // The context wrapper goes away first; the buffer keeps it alive.
//! registry.unregister(0x10).unwrap();
//! assert!(registry.is_tracked(&0x10));
//!
//! // Releasing the buffer destroys both, buffer first.
//! registry.unregister(0x20).unwrap();
//! assert!(registry.is_empty());
//! ```
//!
//! ## Features
//!
//! - **Thread-safe**: no global lock; per-handle state is locked on its own
//! - **Handle reuse**: a handle value recycled by the native side while its
//!   previous lifetime is still tearing down starts a clean new lifetime
//! - **Deferred release**: [`UnregistrationAgent`] runs destroy callbacks on a
//!   dedicated thread, for finalizer-style callers
//! - **Tracing support**: optional callback for monitoring registry operations,
//!   plus `tracing` logs
//!
//! ## Limitations
//!
//! Dependency cycles are not detected. Members of a cycle stay alive until a
//! caller breaks it with [`LifecycleRegistry::remove_dependency`].
//!
//! ## Main Types
//!
//! - [`LifecycleRegistry`] - register, unregister and rewire handles
//! - [`UnregistrationAgent`] - background unregistration worker
//! - [`DeferredLifecycle`] - a registry whose releases all go through an agent
//! - [`define_lifecycle!`] - declare a process-global registry
//! - [`TrackedHandle`] - `(kind, raw handle)` key for shared handle spaces

mod dependency_set;
mod deferred_lifecycle;
mod handle;
mod lifecycle_error;
mod lifecycle_event;
mod lifecycle_registry;
mod macros;
mod object_context;
mod remover_trait;
mod unregistration_agent;

pub use dependency_set::DependencySet;
pub use deferred_lifecycle::DeferredLifecycle;
pub use handle::{Handle, TrackedHandle};
pub use lifecycle_error::LifecycleError;
pub use lifecycle_event::LifecycleEvent;
pub use lifecycle_registry::{LifecycleRegistry, TraceCallback};
pub use object_context::{CallbackFn, Callbacks};
pub use remover_trait::HandleRemover;
pub use unregistration_agent::{AgentConfig, ErrorObserver, UnregistrationAgent};
