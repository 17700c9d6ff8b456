use thiserror::Error;

/// Errors raised by the lifecycle registry and the unregistration agent.
///
/// Every variant carries the handle it is about, so the error can be routed
/// back to the wrapper that owns it. All of them describe a broken caller
/// contract (double release, release of something never registered, a
/// dependency registered out of order); none are retried internally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError<H> {
    #[error("object not found ({0:?})")]
    ObjectNotFound(H),

    #[error("dependency not found ({dependency:?} of {handle:?})")]
    DependencyNotFound { handle: H, dependency: H },

    #[error("dependency already exists ({dependency:?} of {handle:?})")]
    DependencyAlreadyExists { handle: H, dependency: H },

    #[error("invalid refcount value reached: {ref_count} ({handle:?})")]
    InvalidRefCount { handle: H, ref_count: i64 },

    #[error("failed to remove object ({0:?})")]
    FailedObjectRemoval(H),

    /// Bounded agent queue was full; the request was not queued.
    #[error("unregistration queue full ({0:?})")]
    QueueFull(H),

    /// The agent was stopped before the request arrived.
    #[error("unregistration agent stopped ({0:?})")]
    AgentStopped(H),

    #[error("destroy callback panicked ({handle:?}): {message}")]
    CallbackPanicked { handle: H, message: String },
}

impl<H> LifecycleError<H> {
    /// The handle the operation was acting on when it failed.
    pub fn handle(&self) -> &H {
        match self {
            LifecycleError::ObjectNotFound(handle)
            | LifecycleError::FailedObjectRemoval(handle)
            | LifecycleError::QueueFull(handle)
            | LifecycleError::AgentStopped(handle) => handle,
            LifecycleError::DependencyNotFound { handle, .. }
            | LifecycleError::DependencyAlreadyExists { handle, .. }
            | LifecycleError::InvalidRefCount { handle, .. }
            | LifecycleError::CallbackPanicked { handle, .. } => handle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_not_found_display() {
        let err = LifecycleError::ObjectNotFound(7u32);
        assert_eq!(err.to_string(), "object not found (7)");
    }

    #[test]
    fn test_invalid_ref_count_display() {
        let err = LifecycleError::InvalidRefCount {
            handle: 3u32,
            ref_count: -1,
        };
        assert_eq!(err.to_string(), "invalid refcount value reached: -1 (3)");
    }

    #[test]
    fn test_dependency_not_found_display() {
        let err = LifecycleError::DependencyNotFound {
            handle: 1u32,
            dependency: 2u32,
        };
        assert_eq!(err.to_string(), "dependency not found (2 of 1)");
    }

    #[test]
    fn test_handle_accessor() {
        let err = LifecycleError::DependencyAlreadyExists {
            handle: "a",
            dependency: "b",
        };
        assert_eq!(*err.handle(), "a");
        assert_eq!(*LifecycleError::FailedObjectRemoval(9u8).handle(), 9);
    }

    #[test]
    fn test_equality() {
        assert_eq!(
            LifecycleError::ObjectNotFound(1u32),
            LifecycleError::ObjectNotFound(1u32)
        );
        assert_ne!(
            LifecycleError::ObjectNotFound(1u32),
            LifecycleError::FailedObjectRemoval(1u32)
        );
    }

    #[test]
    fn test_error_trait() {
        let err: &dyn std::error::Error = &LifecycleError::AgentStopped(5u32);
        assert_eq!(err.to_string(), "unregistration agent stopped (5)");
    }
}
