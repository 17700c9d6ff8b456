//! Reference-counted lifecycle registry for unmanaged handles.
//!
//! Each registered handle carries a reference count and the set of handles it
//! depends on. A dependency edge holds one reference on its target, so a
//! dependency outlives every dependent. When a count reaches zero the entry
//! leaves the table, its destroy/free callbacks run, and one reference is
//! released on each of its former dependencies, cascading down the graph.
//!
//! # Examples
//!
//! ```
//! use handle_lifecycle::{Callbacks, LifecycleRegistry};
//! use std::sync::{Arc, Mutex};
//!
//! let registry = LifecycleRegistry::<u32>::new();
//! let destroyed = Arc::new(Mutex::new(Vec::new()));
//!
//! let log = destroyed.clone();
//! registry.register(1, Callbacks::destroy(move |h: &u32| log.lock().unwrap().push(*h)), []).unwrap();
//! let log = destroyed.clone();
//! registry.register(2, Callbacks::destroy(move |h: &u32| log.lock().unwrap().push(*h)), [1]).unwrap();
//!
//! // 2 still holds a reference on 1.
//! registry.unregister(1).unwrap();
//! assert!(destroyed.lock().unwrap().is_empty());
//!
//! registry.unregister(2).unwrap();
//! assert_eq!(*destroyed.lock().unwrap(), vec![2, 1]);
//! ```

use std::sync::Arc;
use std::thread;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;

use crate::object_context::ObjectContext;
use crate::{Callbacks, DependencySet, Handle, HandleRemover, LifecycleError, LifecycleEvent};

/// Type alias for the user-supplied tracing callback.
///
/// The callback receives every [`LifecycleEvent`] the registry emits. It is
/// invoked without any registry lock held, so it may call back into the
/// registry.
pub type TraceCallback<H> = dyn Fn(&LifecycleEvent<H>) + Send + Sync + 'static;

/// Table of live registrations keyed by handle.
///
/// All operations take `&self` and are safe to call from any number of
/// threads. There is no global lock: the table is sharded, and per-handle
/// state is guarded by that handle's own context. At most one context lock is
/// held at a time.
pub struct LifecycleRegistry<H: Handle> {
    objects: DashMap<H, Arc<ObjectContext<H>>>,
    trace: RwLock<Option<Arc<TraceCallback<H>>>>,
}

impl<H: Handle> LifecycleRegistry<H> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Pre-sizes the table for `capacity` live handles.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            objects: DashMap::with_capacity(capacity),
            trace: RwLock::new(None),
        }
    }

    // -------------------------------------------------------------------------------------------------
    // Tracing
    // -------------------------------------------------------------------------------------------------

    /// Sets a callback that observes every registry operation.
    pub fn set_trace_callback(&self, callback: impl Fn(&LifecycleEvent<H>) + Send + Sync + 'static) {
        *self.trace.write() = Some(Arc::new(callback));
    }

    /// Clears the tracing callback.
    pub fn clear_trace_callback(&self) {
        *self.trace.write() = None;
    }

    /// Builds the event only when a callback is installed.
    fn emit_event(&self, event: impl FnOnce() -> LifecycleEvent<H>) {
        let callback = self.trace.read().clone();
        if let Some(callback) = callback {
            callback(&event());
        }
    }

    // -------------------------------------------------------------------------------------------------
    // Registration
    // -------------------------------------------------------------------------------------------------

    /// Registers `handle` with its callbacks and the handles it depends on.
    ///
    /// A fresh handle starts with one reference. Registering a handle that is
    /// already tracked counts as a re-registration: it adds one reference,
    /// replaces the stored callbacks and merges the new dependencies. This is
    /// what happens when the native side hands out a handle value again while
    /// a stale wrapper for it has not been released yet.
    ///
    /// If the handle is currently being torn down by another thread, the call
    /// yields until that entry has left the table and then registers a new
    /// lifetime.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::ObjectNotFound`] if a dependency is not tracked. In
    /// that case nothing changes: no references taken for earlier
    /// dependencies are kept.
    pub fn register<I>(
        &self,
        handle: H,
        callbacks: Callbacks<H>,
        dependencies: I,
    ) -> Result<(), LifecycleError<H>>
    where
        I: IntoIterator<Item = H>,
    {
        let dependencies: DependencySet<H> = dependencies.into_iter().collect();
        self.acquire_all(&dependencies)?;

        let fresh = Arc::new(ObjectContext::new(handle.clone(), callbacks, dependencies));
        loop {
            let existing = match self.objects.entry(handle.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(Arc::clone(&fresh));
                    None
                }
                Entry::Occupied(entry) => Some(Arc::clone(entry.get())),
            };

            let Some(existing) = existing else {
                tracing::debug!(handle = ?handle, "registered");
                self.emit_event(|| LifecycleEvent::Register {
                    handle: handle.clone(),
                    fresh: true,
                });
                return Ok(());
            };

            if existing.try_add_ref().is_none() {
                // The previous lifetime of this handle value is mid-teardown.
                self.wait_for_removal(&handle, &existing);
                continue;
            }

            tracing::debug!(handle = ?handle, ref_count = existing.ref_count(), "re-registered");
            existing.replace_callbacks(fresh.take_callbacks());
            self.emit_event(|| LifecycleEvent::Register {
                handle: handle.clone(),
                fresh: false,
            });
            let edges = fresh.lock_dependencies().snapshot();
            return self.merge_edges(&existing, edges);
        }
    }

    /// Takes one reference on every dependency, or none at all.
    fn acquire_all(&self, dependencies: &DependencySet<H>) -> Result<(), LifecycleError<H>> {
        let mut acquired = Vec::with_capacity(dependencies.len());
        for dependency in dependencies.iter() {
            let taken = self
                .lookup(&dependency)
                .and_then(|context| context.try_add_ref())
                .is_some();
            if !taken {
                self.release_all(acquired);
                return Err(LifecycleError::ObjectNotFound(dependency));
            }
            acquired.push(dependency);
        }
        Ok(())
    }

    /// Turns already-acquired references into edges of `owner`. References for
    /// edges that already existed are given back.
    fn merge_edges(
        &self,
        owner: &ObjectContext<H>,
        dependencies: Vec<H>,
    ) -> Result<(), LifecycleError<H>> {
        let mut surplus = Vec::new();
        let live = {
            let guard = owner.lock_dependencies();
            let live = guard.is_live();
            for dependency in dependencies {
                if live && guard.add(dependency.clone()) {
                    continue;
                }
                surplus.push(dependency);
            }
            live
        };
        self.release_all(surplus);
        if live {
            Ok(())
        } else {
            Err(LifecycleError::ObjectNotFound(owner.handle().clone()))
        }
    }

    fn release_all(&self, handles: Vec<H>) {
        for handle in handles {
            if let Err(err) = self.unregister(handle) {
                tracing::warn!(error = %err, "failed to give back dependency reference");
            }
        }
    }

    /// Spins until `stale` is no longer the table entry for `handle`.
    fn wait_for_removal(&self, handle: &H, stale: &Arc<ObjectContext<H>>) {
        tracing::trace!(handle = ?handle, "waiting for teardown of recycled handle");
        while self
            .objects
            .get(handle)
            .is_some_and(|current| Arc::ptr_eq(current.value(), stale))
        {
            thread::yield_now();
        }
    }

    // -------------------------------------------------------------------------------------------------
    // Unregistration
    // -------------------------------------------------------------------------------------------------

    /// Releases one reference on `handle`.
    ///
    /// When the count reaches zero the handle is removed, its destroy and free
    /// callbacks run on the calling thread, and one reference is released on
    /// each handle it depended on, cascading. The cascade runs to completion
    /// even if one branch fails; the first failure is returned.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::ObjectNotFound`] if `handle` is not tracked
    /// - [`LifecycleError::InvalidRefCount`] on a release past zero
    /// - [`LifecycleError::FailedObjectRemoval`] if the entry vanished under us
    pub fn unregister(&self, handle: H) -> Result<(), LifecycleError<H>> {
        let mut pending = vec![handle];
        let mut first_error = None;
        while let Some(current) = pending.pop() {
            match self.release(current) {
                Ok(prior) => pending.extend(prior),
                Err(err) if first_error.is_none() => first_error = Some(err),
                Err(err) => tracing::warn!(error = %err, "cascading release failed"),
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// One step of [`unregister`](Self::unregister). Returns the dependencies
    /// to release next.
    fn release(&self, handle: H) -> Result<Vec<H>, LifecycleError<H>> {
        let context = self
            .lookup(&handle)
            .ok_or_else(|| LifecycleError::ObjectNotFound(handle.clone()))?;

        let remaining = context.release_ref()?;
        if remaining > 0 {
            tracing::trace!(handle = ?handle, ref_count = remaining, "released reference");
            self.emit_event(|| LifecycleEvent::Unregister {
                handle: handle.clone(),
                remaining,
            });
            return Ok(Vec::new());
        }

        let removed = self
            .objects
            .remove_if(&handle, |_, current| Arc::ptr_eq(current, &context));
        if removed.is_none() {
            return Err(LifecycleError::FailedObjectRemoval(handle));
        }

        tracing::debug!(handle = ?handle, "destroying");
        self.emit_event(|| LifecycleEvent::Unregister {
            handle: handle.clone(),
            remaining: 0,
        });
        self.emit_event(|| LifecycleEvent::Destroy {
            handle: handle.clone(),
        });
        context.destroy_and_free();
        Ok(context.take_prior_dependencies())
    }

    // -------------------------------------------------------------------------------------------------
    // Dependency graph
    // -------------------------------------------------------------------------------------------------

    /// Makes `handle` depend on `dependency`. Adding an edge that already
    /// exists changes nothing.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::ObjectNotFound`] if either side is not tracked or is
    /// being torn down.
    pub fn add_dependency(&self, handle: H, dependency: H) -> Result<(), LifecycleError<H>> {
        self.link(handle, dependency).map(|_| ())
    }

    /// Like [`add_dependency`](Self::add_dependency), but a duplicate edge is
    /// an error.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::DependencyAlreadyExists`] for a duplicate edge, plus
    /// everything [`add_dependency`](Self::add_dependency) returns.
    pub fn add_dependency_strict(&self, handle: H, dependency: H) -> Result<(), LifecycleError<H>> {
        if self.link(handle.clone(), dependency.clone())? {
            Ok(())
        } else {
            Err(LifecycleError::DependencyAlreadyExists { handle, dependency })
        }
    }

    /// Returns whether a new edge was created.
    fn link(&self, handle: H, dependency: H) -> Result<bool, LifecycleError<H>> {
        let owner = self
            .lookup(&handle)
            .ok_or_else(|| LifecycleError::ObjectNotFound(handle.clone()))?;
        let target = self
            .lookup(&dependency)
            .ok_or_else(|| LifecycleError::ObjectNotFound(dependency.clone()))?;

        let added = {
            let guard = owner.lock_dependencies();
            if !guard.is_live() {
                return Err(LifecycleError::ObjectNotFound(handle));
            }
            if guard.contains(&dependency) {
                false
            } else {
                if Arc::ptr_eq(&owner, &target) {
                    // Self edge: the held lock keeps our own count above zero.
                    owner.add_ref();
                } else if target.try_add_ref().is_none() {
                    return Err(LifecycleError::ObjectNotFound(dependency));
                }
                guard.add(dependency.clone())
            }
        };

        tracing::trace!(handle = ?handle, dependency = ?dependency, added, "add dependency");
        self.emit_event(|| LifecycleEvent::AddDependency {
            handle: handle.clone(),
            dependency: dependency.clone(),
            added,
        });
        Ok(added)
    }

    /// Removes the edge `handle -> dependency` and releases the reference it
    /// held, which may destroy `dependency`.
    ///
    /// This is the only way to break a dependency cycle.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::ObjectNotFound`] if either side is not tracked
    /// - [`LifecycleError::DependencyNotFound`] if the edge does not exist
    /// - anything [`unregister`](Self::unregister) returns for `dependency`
    pub fn remove_dependency(&self, handle: H, dependency: H) -> Result<(), LifecycleError<H>> {
        self.detach(handle, dependency.clone())?;
        self.unregister(dependency)
    }

    /// Removes the edge without releasing the reference it held. The caller
    /// owns that reference afterwards and must release it.
    pub(crate) fn detach(&self, handle: H, dependency: H) -> Result<(), LifecycleError<H>> {
        let owner = self
            .lookup(&handle)
            .ok_or_else(|| LifecycleError::ObjectNotFound(handle.clone()))?;
        if !self.objects.contains_key(&dependency) {
            return Err(LifecycleError::ObjectNotFound(dependency));
        }

        if !owner.lock_dependencies().remove(&dependency) {
            return Err(LifecycleError::DependencyNotFound { handle, dependency });
        }

        tracing::trace!(handle = ?handle, dependency = ?dependency, "remove dependency");
        self.emit_event(|| LifecycleEvent::RemoveDependency {
            handle: handle.clone(),
            dependency: dependency.clone(),
        });
        Ok(())
    }

    // -------------------------------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------------------------------

    fn lookup(&self, handle: &H) -> Option<Arc<ObjectContext<H>>> {
        self.objects.get(handle).map(|entry| Arc::clone(entry.value()))
    }

    /// Current reference count, or `None` if the handle is not tracked or is
    /// being torn down.
    pub fn ref_count(&self, handle: &H) -> Option<i64> {
        self.lookup(handle)
            .map(|context| context.ref_count())
            .filter(|count| *count > 0)
    }

    pub fn is_tracked(&self, handle: &H) -> bool {
        self.ref_count(handle).is_some()
    }

    /// Snapshot of the handles `handle` currently depends on.
    pub fn dependencies_of(&self, handle: &H) -> Option<Vec<H>> {
        self.lookup(handle)
            .map(|context| context.lock_dependencies().snapshot())
    }

    /// Snapshot of every tracked handle. Like [`is_tracked`](Self::is_tracked),
    /// it skips entries whose count already reached zero.
    pub fn handles(&self) -> Vec<H> {
        self.objects
            .iter()
            .filter(|entry| entry.value().ref_count() > 0)
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Number of table entries, including one whose count just reached zero
    /// and that is about to be removed. Use [`handles`](Self::handles) for
    /// the live set.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// `true` once every entry has left the table, so no destroy is pending.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl<H: Handle> Default for LifecycleRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Handle> HandleRemover<H> for LifecycleRegistry<H> {
    fn remove_handle(&self, handle: H) -> Result<(), LifecycleError<H>> {
        self.unregister(handle)
    }
}

// -------------------------------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------------------------------
