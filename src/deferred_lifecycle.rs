//! Registry paired with its own unregistration agent.
//!
//! This is the shape a binding layer usually wants: wrappers register and
//! rewire dependencies synchronously when they are created, and every
//! release (from `Drop`, a finalizer, or an explicit dispose) is deferred to
//! the agent, so destroy callbacks always run on the agent's thread.

use std::io;
use std::sync::Arc;

use crate::{
    AgentConfig, Callbacks, Handle, LifecycleError, LifecycleRegistry, UnregistrationAgent,
};

/// A [`LifecycleRegistry`] whose releases all go through an
/// [`UnregistrationAgent`].
///
/// Dropping it stops the agent after draining the queue.
///
/// # Examples
///
/// ```
/// use handle_lifecycle::{Callbacks, DeferredLifecycle};
///
/// let lifecycle = DeferredLifecycle::<usize>::new().unwrap();
/// lifecycle.register(0x1000, Callbacks::new(), []).unwrap();
/// lifecycle.register(0x2000, Callbacks::new(), [0x1000]).unwrap();
///
/// lifecycle.unregister(0x1000);
/// lifecycle.unregister(0x2000);
/// lifecycle.stop_agent();
///
/// assert!(lifecycle.registry().is_empty());
/// ```
pub struct DeferredLifecycle<H: Handle> {
    registry: Arc<LifecycleRegistry<H>>,
    agent: UnregistrationAgent<H>,
}

impl<H: Handle> DeferredLifecycle<H> {
    /// # Errors
    ///
    /// Returns the OS error if the agent thread cannot be spawned.
    pub fn new() -> io::Result<Self> {
        Self::with_config(AgentConfig::default())
    }

    /// # Errors
    ///
    /// Returns the OS error if the agent thread cannot be spawned.
    pub fn with_config(config: AgentConfig) -> io::Result<Self> {
        let registry = Arc::new(LifecycleRegistry::new());
        let agent = UnregistrationAgent::spawn(Arc::clone(&registry), config)?;
        Ok(Self { registry, agent })
    }

    /// See [`LifecycleRegistry::register`].
    ///
    /// # Errors
    ///
    /// [`LifecycleError::ObjectNotFound`] if a dependency is not tracked.
    pub fn register<I>(
        &self,
        handle: H,
        callbacks: Callbacks<H>,
        dependencies: I,
    ) -> Result<(), LifecycleError<H>>
    where
        I: IntoIterator<Item = H>,
    {
        self.registry.register(handle, callbacks, dependencies)
    }

    /// Queues the release of one reference on `handle`. Failures are reported
    /// to the observer installed with [`on_unregister_error`](Self::on_unregister_error).
    pub fn unregister(&self, handle: H) {
        self.agent.enqueue_unregister(handle);
    }

    /// See [`LifecycleRegistry::add_dependency`].
    ///
    /// # Errors
    ///
    /// [`LifecycleError::ObjectNotFound`] if either side is not tracked.
    pub fn add_dependency(&self, handle: H, dependency: H) -> Result<(), LifecycleError<H>> {
        self.registry.add_dependency(handle, dependency)
    }

    /// Removes the edge now and queues the release of the reference it held.
    ///
    /// If the agent cannot take the release (stopped, or its queue is full)
    /// the reference is released on the calling thread instead.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::ObjectNotFound`] or [`LifecycleError::DependencyNotFound`],
    /// plus anything a synchronous release returns.
    pub fn remove_dependency(&self, handle: H, dependency: H) -> Result<(), LifecycleError<H>> {
        self.registry.detach(handle, dependency.clone())?;
        match self.agent.try_enqueue(dependency) {
            Ok(()) => Ok(()),
            Err(rejected) => {
                tracing::debug!(error = %rejected, "agent rejected release, releasing inline");
                self.registry.unregister(rejected.handle().clone())
            }
        }
    }

    /// Installs the callback for errors raised by deferred releases.
    pub fn on_unregister_error(&self, observer: impl Fn(&LifecycleError<H>) + Send + Sync + 'static) {
        self.agent.set_error_observer(observer);
    }

    pub fn registry(&self) -> &Arc<LifecycleRegistry<H>> {
        &self.registry
    }

    pub fn agent(&self) -> &UnregistrationAgent<H> {
        &self.agent
    }

    /// Drains the queue and stops the agent. Later
    /// [`unregister`](Self::unregister) calls are rejected.
    pub fn stop_agent(&self) {
        self.agent.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_destroy_runs_on_agent_thread() {
        let lifecycle = DeferredLifecycle::with_config(
            AgentConfig::default().with_thread_name("lifecycle-test-agent"),
        )
        .unwrap();
        let thread_name = Arc::new(Mutex::new(None));
        let seen = thread_name.clone();
        lifecycle
            .register(
                1u32,
                Callbacks::destroy(move |_: &u32| {
                    *seen.lock() = thread::current().name().map(str::to_owned);
                }),
                [],
            )
            .unwrap();

        lifecycle.unregister(1);
        lifecycle.stop_agent();

        assert_eq!(thread_name.lock().as_deref(), Some("lifecycle-test-agent"));
    }

    #[test]
    fn test_remove_dependency_defers_release() {
        let lifecycle = DeferredLifecycle::new().unwrap();
        let destroyed = Arc::new(AtomicUsize::new(0));
        let counter = destroyed.clone();
        lifecycle
            .register(
                1u32,
                Callbacks::destroy(move |_: &u32| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
                [],
            )
            .unwrap();
        lifecycle.register(2, Callbacks::new(), [1]).unwrap();
        lifecycle.unregister(1);

        lifecycle.remove_dependency(2, 1).unwrap();
        lifecycle.stop_agent();

        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
        assert!(lifecycle.registry().is_tracked(&2));
    }

    fn released_inline(lifecycle: &DeferredLifecycle<u32>) {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = errors.clone();
        lifecycle.on_unregister_error(move |err| sink.lock().push(err.clone()));
        lifecycle.register(1, Callbacks::new(), []).unwrap();
        lifecycle.register(2, Callbacks::new(), [1]).unwrap();
        assert_eq!(lifecycle.registry().ref_count(&1), Some(2));

        lifecycle.remove_dependency(2, 1).unwrap();

        assert_eq!(lifecycle.registry().dependencies_of(&2), Some(vec![]));
        assert_eq!(lifecycle.registry().ref_count(&1), Some(1));
        assert!(errors.lock().is_empty());

        lifecycle.registry().unregister(1).unwrap();
        lifecycle.registry().unregister(2).unwrap();
        assert!(lifecycle.registry().is_empty());
    }

    #[test]
    fn test_remove_dependency_after_stop_releases_inline() {
        let lifecycle = DeferredLifecycle::new().unwrap();
        lifecycle.stop_agent();
        released_inline(&lifecycle);
    }

    #[test]
    fn test_remove_dependency_with_full_queue_releases_inline() {
        let lifecycle =
            DeferredLifecycle::with_config(AgentConfig::default().with_queue_capacity(0)).unwrap();
        released_inline(&lifecycle);
    }

    #[test]
    fn test_errors_reach_observer() {
        let lifecycle = DeferredLifecycle::new().unwrap();
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = errors.clone();
        lifecycle.on_unregister_error(move |err| sink.lock().push(err.clone()));

        lifecycle.register(1u32, Callbacks::new(), []).unwrap();
        lifecycle.unregister(1);
        lifecycle.unregister(1);
        lifecycle.stop_agent();
        lifecycle.unregister(1);

        assert_eq!(
            *errors.lock(),
            vec![
                LifecycleError::ObjectNotFound(1),
                LifecycleError::AgentStopped(1)
            ]
        );
    }
}
