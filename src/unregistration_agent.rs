//! Background worker that performs unregistrations off the calling thread.
//!
//! Finalizer-style callers must not block or run arbitrary destroy code on
//! their own thread. They hand the handle to [`UnregistrationAgent::enqueue_unregister`],
//! which never blocks and never fails; a dedicated worker thread drains the
//! queue in FIFO order and calls the [`HandleRemover`] for each request.
//! Failures (including panics raised by destroy callbacks) go to an error
//! observer and the worker carries on with the next request.
//!
//! # Examples
//!
//! ```
//! use handle_lifecycle::{AgentConfig, Callbacks, LifecycleRegistry, UnregistrationAgent};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(LifecycleRegistry::<u64>::new());
//! registry.register(1, Callbacks::new(), []).unwrap();
//!
//! let agent = UnregistrationAgent::spawn(Arc::clone(&registry), AgentConfig::default()).unwrap();
//! agent.enqueue_unregister(1);
//! agent.stop();
//!
//! assert!(!registry.is_tracked(&1));
//! ```

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::{Receiver, SendError, Sender};
use parking_lot::{Mutex, RwLock};

use crate::{Handle, HandleRemover, LifecycleError};

/// Callback receiving every error the agent swallows.
///
/// Runs on the worker thread for failed requests, and on the enqueuing
/// thread for rejected ones.
pub type ErrorObserver<H> = dyn Fn(&LifecycleError<H>) + Send + Sync + 'static;

type SharedObserver<H> = Arc<RwLock<Option<Arc<ErrorObserver<H>>>>>;

/// Worker settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Name given to the worker thread.
    pub thread_name: String,
    /// Soft limit on queued requests; `None` for unbounded. Concurrent
    /// enqueuers may overshoot it by one request each.
    pub queue_capacity: Option<usize>,
}

impl AgentConfig {
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            thread_name: "unregistration-agent".to_string(),
            queue_capacity: None,
        }
    }
}

enum Request<H> {
    Unregister(H),
    Stop,
}

/// Single-threaded FIFO unregistration worker.
///
/// Dropping the agent stops it: everything queued so far is processed, then
/// the worker is joined.
pub struct UnregistrationAgent<H: Handle> {
    sender: Sender<Request<H>>,
    capacity: Option<usize>,
    /// `true` once stop was requested. Enqueuers hold the read side while
    /// sending so no request can land behind the stop marker.
    stopped: RwLock<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
    observer: SharedObserver<H>,
}

impl<H: Handle> UnregistrationAgent<H> {
    /// Starts the worker thread.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn spawn<R>(remover: R, config: AgentConfig) -> io::Result<Self>
    where
        R: HandleRemover<H> + Send + 'static,
    {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let observer = SharedObserver::default();
        let worker_observer = Arc::clone(&observer);
        let worker = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || run(receiver, remover, worker_observer))?;

        tracing::debug!(thread = %config.thread_name, capacity = ?config.queue_capacity, "unregistration agent started");
        Ok(Self {
            sender,
            capacity: config.queue_capacity,
            stopped: RwLock::new(false),
            worker_id: worker.thread().id(),
            worker: Mutex::new(Some(worker)),
            observer,
        })
    }

    /// Installs the callback that receives swallowed errors.
    pub fn set_error_observer(&self, observer: impl Fn(&LifecycleError<H>) + Send + Sync + 'static) {
        *self.observer.write() = Some(Arc::new(observer));
    }

    /// Removes the error observer; errors are then only logged.
    pub fn clear_error_observer(&self) {
        *self.observer.write() = None;
    }

    /// Queues one unregistration. Never blocks and never fails: a request
    /// that cannot be queued is reported to the error observer as
    /// [`LifecycleError::AgentStopped`] or [`LifecycleError::QueueFull`].
    pub fn enqueue_unregister(&self, handle: H) {
        if let Err(rejected) = self.try_enqueue(handle) {
            report(&self.observer, &rejected);
        }
    }

    /// Like [`enqueue_unregister`](Self::enqueue_unregister), but hands a
    /// rejection back to the caller instead of the observer.
    pub(crate) fn try_enqueue(&self, handle: H) -> Result<(), LifecycleError<H>> {
        let stopped = self.stopped.read();
        if *stopped {
            return Err(LifecycleError::AgentStopped(handle));
        }
        if self
            .capacity
            .is_some_and(|capacity| self.sender.len() >= capacity)
        {
            return Err(LifecycleError::QueueFull(handle));
        }
        match self.sender.send(Request::Unregister(handle)) {
            Ok(()) => Ok(()),
            Err(SendError(Request::Unregister(handle))) => Err(LifecycleError::AgentStopped(handle)),
            Err(SendError(Request::Stop)) => Ok(()),
        }
    }

    /// Number of requests waiting for the worker.
    pub fn pending(&self) -> usize {
        self.sender.len()
    }

    pub fn is_stopped(&self) -> bool {
        *self.stopped.read()
    }

    /// Stops accepting requests, lets the worker finish everything queued
    /// before this call and joins it. Idempotent; concurrent callers all
    /// return only after the worker has exited.
    ///
    /// Called from the worker itself (for example from a destroy callback)
    /// it only marks the agent stopped, since a thread cannot join itself.
    pub fn stop(&self) {
        let first = !std::mem::replace(&mut *self.stopped.write(), true);
        if first && self.sender.send(Request::Stop).is_err() {
            tracing::warn!("unregistration agent worker already gone");
        }
        if thread::current().id() == self.worker_id {
            return;
        }

        let mut worker = self.worker.lock();
        let Some(handle) = worker.take() else {
            return;
        };
        if handle.join().is_err() {
            tracing::warn!("unregistration agent worker panicked");
        }
        tracing::debug!("unregistration agent stopped");
    }
}

impl<H: Handle> Drop for UnregistrationAgent<H> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run<H, R>(receiver: Receiver<Request<H>>, remover: R, observer: SharedObserver<H>)
where
    H: Handle,
    R: HandleRemover<H>,
{
    for request in receiver.iter() {
        let handle = match request {
            Request::Unregister(handle) => handle,
            Request::Stop => break,
        };
        tracing::trace!(handle = ?handle, "deferred unregister");

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| remover.remove_handle(handle.clone())));
        let err = match outcome {
            Ok(Ok(())) => continue,
            Ok(Err(err)) => err,
            Err(payload) => LifecycleError::CallbackPanicked {
                handle,
                message: panic_message(payload.as_ref()),
            },
        };
        report(&observer, &err);
    }
}

fn report<H: Handle>(observer: &SharedObserver<H>, err: &LifecycleError<H>) {
    let observer = observer.read().clone();
    match observer {
        Some(observer) => observer(err),
        None => tracing::warn!(error = %err, "unregistration failed"),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
