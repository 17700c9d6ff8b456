//! Per-handle state tracked by the registry.
//!
//! The reference count is an atomic so a dependency can gain a reference
//! while only its dependent's lock is held. Every transition that matters for
//! destruction (the drop to zero, and edge mutation on the owner) happens
//! under the context's own mutex, so a context never gains an edge once it
//! has started tearing down.

use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicI64, Ordering};

use parking_lot::{Mutex, MutexGuard};

use crate::{DependencySet, Handle, LifecycleError};

/// Boxed one-shot callback receiving the handle being torn down.
pub type CallbackFn<H> = Box<dyn FnOnce(&H) + Send + 'static>;

/// Destroy and free actions attached to a registration.
///
/// Both run at most once, when the handle's reference count reaches zero:
/// `destroy` first, then `free`. Keeping them apart lets a binding separate
/// "tear the object down" from "release its backing memory".
///
/// # Examples
///
/// ```rust
/// use handle_lifecycle::Callbacks;
///
/// let callbacks = Callbacks::destroy(|handle: &u32| println!("destroy {handle}"))
///     .on_free(|handle: &u32| println!("free {handle}"));
/// assert!(!callbacks.is_empty());
/// ```
pub struct Callbacks<H> {
    destroy: Option<CallbackFn<H>>,
    free: Option<CallbackFn<H>>,
}

impl<H> Callbacks<H> {
    /// No callbacks; the registration only participates in refcounting.
    pub fn new() -> Self {
        Self {
            destroy: None,
            free: None,
        }
    }

    /// Shorthand for `Callbacks::new().on_destroy(f)`.
    pub fn destroy(f: impl FnOnce(&H) + Send + 'static) -> Self {
        Self::new().on_destroy(f)
    }

    pub fn on_destroy(mut self, f: impl FnOnce(&H) + Send + 'static) -> Self {
        self.destroy = Some(Box::new(f));
        self
    }

    pub fn on_free(mut self, f: impl FnOnce(&H) + Send + 'static) -> Self {
        self.free = Some(Box::new(f));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.destroy.is_none() && self.free.is_none()
    }

    fn run(self, handle: &H) {
        if let Some(destroy) = self.destroy {
            destroy(handle);
        }
        if let Some(free) = self.free {
            free(handle);
        }
    }
}

impl<H> Default for Callbacks<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> fmt::Debug for Callbacks<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("destroy", &self.destroy.is_some())
            .field("free", &self.free.is_some())
            .finish()
    }
}

struct ContextState<H: Handle> {
    dependencies: DependencySet<H>,
    prior_dependencies: Vec<H>,
}

/// One live registration.
pub(crate) struct ObjectContext<H: Handle> {
    handle: H,
    ref_count: AtomicI64,
    state: Mutex<ContextState<H>>,
    callbacks: Mutex<Callbacks<H>>,
}

impl<H: Handle> ObjectContext<H> {
    /// A fresh context owning one reference.
    pub(crate) fn new(handle: H, callbacks: Callbacks<H>, dependencies: DependencySet<H>) -> Self {
        Self {
            handle,
            ref_count: AtomicI64::new(1),
            state: Mutex::new(ContextState {
                dependencies,
                prior_dependencies: Vec::new(),
            }),
            callbacks: Mutex::new(callbacks),
        }
    }

    pub(crate) fn handle(&self) -> &H {
        &self.handle
    }

    pub(crate) fn ref_count(&self) -> i64 {
        self.ref_count.load(Ordering::Acquire)
    }

    /// Unconditionally takes one more reference and returns the new count.
    ///
    /// Only sound while the caller already pins the count above zero, for
    /// example by holding this context's dependency lock while it is live.
    pub(crate) fn add_ref(&self) -> i64 {
        self.ref_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Takes one more reference and returns the new count.
    ///
    /// Returns `None` when the count is already zero: the context is being
    /// torn down and must not be resurrected.
    pub(crate) fn try_add_ref(&self) -> Option<i64> {
        let mut current = self.ref_count.load(Ordering::Acquire);
        loop {
            if current <= 0 {
                return None;
            }
            match self.ref_count.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(current + 1),
                Err(actual) => current = actual,
            }
        }
    }

    /// Drops one reference and returns the count this call left behind. Zero
    /// means this call brought the count to exactly zero, in which case the
    /// dependency set has been moved into the prior-dependency stash.
    pub(crate) fn release_ref(&self) -> Result<i64, LifecycleError<H>> {
        let mut state = self.state.lock();
        let remaining = self.ref_count.fetch_sub(1, Ordering::AcqRel) - 1;
        if remaining < 0 {
            self.ref_count.fetch_add(1, Ordering::AcqRel);
            return Err(LifecycleError::InvalidRefCount {
                handle: self.handle.clone(),
                ref_count: remaining,
            });
        }
        if remaining > 0 {
            return Ok(remaining);
        }
        let dependencies = mem::take(&mut state.dependencies);
        state.prior_dependencies = dependencies.snapshot();
        Ok(0)
    }

    /// Locks refcount and dependency set together.
    pub(crate) fn lock_dependencies(&self) -> DependencyGuard<'_, H> {
        DependencyGuard {
            context: self,
            state: self.state.lock(),
        }
    }

    /// Dependencies captured when the count reached zero. Empty afterwards.
    pub(crate) fn take_prior_dependencies(&self) -> Vec<H> {
        mem::take(&mut self.state.lock().prior_dependencies)
    }

    pub(crate) fn replace_callbacks(&self, callbacks: Callbacks<H>) {
        *self.callbacks.lock() = callbacks;
    }

    pub(crate) fn take_callbacks(&self) -> Callbacks<H> {
        mem::take(&mut *self.callbacks.lock())
    }

    /// Runs destroy then free. The callbacks lock is released first, so the
    /// callbacks may call back into the registry.
    pub(crate) fn destroy_and_free(&self) {
        let callbacks = self.take_callbacks();
        callbacks.run(&self.handle);
    }
}

impl<H: Handle> fmt::Debug for ObjectContext<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectContext")
            .field("handle", &self.handle)
            .field("ref_count", &self.ref_count())
            .finish_non_exhaustive()
    }
}

/// Critical section over one context's refcount and dependency set.
pub(crate) struct DependencyGuard<'a, H: Handle> {
    context: &'a ObjectContext<H>,
    state: MutexGuard<'a, ContextState<H>>,
}

impl<H: Handle> DependencyGuard<'_, H> {
    /// `false` once the count has reached zero. Stable while the guard is held.
    pub(crate) fn is_live(&self) -> bool {
        self.context.ref_count() > 0
    }

    pub(crate) fn add(&self, dependency: H) -> bool {
        self.state.dependencies.add(dependency)
    }

    pub(crate) fn remove(&self, dependency: &H) -> bool {
        self.state.dependencies.remove(dependency)
    }

    pub(crate) fn contains(&self, dependency: &H) -> bool {
        self.state.dependencies.contains(dependency)
    }

    pub(crate) fn snapshot(&self) -> Vec<H> {
        self.state.dependencies.snapshot()
    }
}
