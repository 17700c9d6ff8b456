//! Macro for declaring process-global lifecycle registries.
//!
//! Binding layers usually keep one registry per wrapped native library for
//! the whole life of the process. The macro declares it as a lazily
//! initialized static behind a module of free functions.

/// Creates an isolated, process-global lifecycle registry with a single
/// macro invocation.
///
/// The macro generates a module containing:
/// - the registry static (hidden)
/// - `registry()` for direct access
/// - free functions delegating to it
///
/// # Examples
///
/// ```rust
/// use handle_lifecycle::{define_lifecycle, Callbacks};
///
/// define_lifecycle!(sqlite, usize);
///
/// sqlite::register(0x10, Callbacks::new(), []).unwrap();
/// sqlite::register(0x20, Callbacks::new(), [0x10]).unwrap();
/// assert_eq!(sqlite::ref_count(&0x10), Some(2));
///
/// sqlite::unregister(0x10).unwrap();
/// sqlite::unregister(0x20).unwrap();
/// assert!(!sqlite::is_tracked(&0x10));
/// ```
///
/// # Multiple Registries
///
/// Each invocation is its own table, so the same raw handle value can be
/// tracked independently by different libraries:
///
/// ```rust
/// use handle_lifecycle::{define_lifecycle, Callbacks};
///
/// define_lifecycle!(gl, u32);
/// define_lifecycle!(audio, u32);
///
/// gl::register(1, Callbacks::new(), []).unwrap();
/// assert!(gl::is_tracked(&1));
/// assert!(!audio::is_tracked(&1));
/// ```
#[macro_export]
macro_rules! define_lifecycle {
    ($name:ident, $handle:ty) => {
        pub mod $name {
            #[allow(unused_imports)]
            use super::*;
            use std::sync::LazyLock;

            static REGISTRY: LazyLock<$crate::LifecycleRegistry<$handle>> =
                LazyLock::new($crate::LifecycleRegistry::new);

            /// The underlying registry.
            pub fn registry() -> &'static $crate::LifecycleRegistry<$handle> {
                &REGISTRY
            }

            /// Register a handle with its callbacks and dependencies.
            pub fn register<I>(
                handle: $handle,
                callbacks: $crate::Callbacks<$handle>,
                dependencies: I,
            ) -> Result<(), $crate::LifecycleError<$handle>>
            where
                I: IntoIterator<Item = $handle>,
            {
                REGISTRY.register(handle, callbacks, dependencies)
            }

            /// Release one reference on a handle.
            pub fn unregister(handle: $handle) -> Result<(), $crate::LifecycleError<$handle>> {
                REGISTRY.unregister(handle)
            }

            /// Add a dependency edge.
            pub fn add_dependency(
                handle: $handle,
                dependency: $handle,
            ) -> Result<(), $crate::LifecycleError<$handle>> {
                REGISTRY.add_dependency(handle, dependency)
            }

            /// Remove a dependency edge, releasing its reference.
            pub fn remove_dependency(
                handle: $handle,
                dependency: $handle,
            ) -> Result<(), $crate::LifecycleError<$handle>> {
                REGISTRY.remove_dependency(handle, dependency)
            }

            /// Check if a handle is tracked.
            pub fn is_tracked(handle: &$handle) -> bool {
                REGISTRY.is_tracked(handle)
            }

            /// Current reference count of a handle.
            pub fn ref_count(handle: &$handle) -> Option<i64> {
                REGISTRY.ref_count(handle)
            }

            /// Set a tracing callback for registry operations.
            pub fn set_trace_callback(
                callback: impl Fn(&$crate::LifecycleEvent<$handle>) + Send + Sync + 'static,
            ) {
                REGISTRY.set_trace_callback(callback)
            }

            /// Clear the tracing callback.
            pub fn clear_trace_callback() {
                REGISTRY.clear_trace_callback()
            }
        }
    };
}
