//! The seam between the unregistration agent and whatever performs releases.
//!
//! [`LifecycleRegistry`](crate::LifecycleRegistry) is the implementor used in
//! practice; the agent only needs something it can hand a handle to from its
//! worker thread.

use std::sync::Arc;

use crate::LifecycleError;

/// Releases one reference on a handle.
pub trait HandleRemover<H> {
    /// Releases one reference on `handle`, destroying it (and cascading) when
    /// the count reaches zero.
    ///
    /// # Errors
    ///
    /// Whatever the implementor reports; the agent forwards it to its error
    /// observer.
    fn remove_handle(&self, handle: H) -> Result<(), LifecycleError<H>>;
}

impl<H, R: HandleRemover<H> + ?Sized> HandleRemover<H> for Arc<R> {
    fn remove_handle(&self, handle: H) -> Result<(), LifecycleError<H>> {
        (**self).remove_handle(handle)
    }
}

impl<H, R: HandleRemover<H> + ?Sized> HandleRemover<H> for &R {
    fn remove_handle(&self, handle: H) -> Result<(), LifecycleError<H>> {
        (**self).remove_handle(handle)
    }
}
