use std::fmt;

/// Events emitted by the registry during operations.
///
/// These events are passed to the callback set via
/// [`LifecycleRegistry::set_trace_callback`](crate::LifecycleRegistry::set_trace_callback).
/// The `Clone` derive allows callbacks to store or forward events if needed.
///
/// # Examples
///
/// ```rust
/// use handle_lifecycle::LifecycleEvent;
///
/// let event = LifecycleEvent::Destroy { handle: 1u32 };
/// assert_eq!(event.to_string(), "destroy { handle: 1 }");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent<H> {
    /// A handle was registered.
    Register {
        handle: H,
        /// `false` when an already tracked handle was re-registered.
        fresh: bool,
    },

    /// A reference on a handle was released.
    Unregister {
        handle: H,
        /// References left after the release; zero means the handle is gone.
        remaining: i64,
    },

    /// The destroy/free callbacks of a handle are about to run.
    Destroy { handle: H },

    /// An edge `handle -> dependency` was requested.
    AddDependency {
        handle: H,
        dependency: H,
        /// `false` when the edge already existed.
        added: bool,
    },

    /// The edge `handle -> dependency` was removed.
    RemoveDependency { handle: H, dependency: H },
}

impl<H: fmt::Debug> fmt::Display for LifecycleEvent<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleEvent::Register { handle, fresh } => {
                write!(f, "register {{ handle: {handle:?}, fresh: {fresh} }}")
            }
            LifecycleEvent::Unregister { handle, remaining } => {
                write!(
                    f,
                    "unregister {{ handle: {handle:?}, remaining: {remaining} }}"
                )
            }
            LifecycleEvent::Destroy { handle } => write!(f, "destroy {{ handle: {handle:?} }}"),
            LifecycleEvent::AddDependency {
                handle,
                dependency,
                added,
            } => write!(
                f,
                "add_dependency {{ handle: {handle:?}, dependency: {dependency:?}, added: {added} }}"
            ),
            LifecycleEvent::RemoveDependency { handle, dependency } => write!(
                f,
                "remove_dependency {{ handle: {handle:?}, dependency: {dependency:?} }}"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_event_display() {
        let event = LifecycleEvent::Register {
            handle: 1u32,
            fresh: true,
        };
        assert_eq!(event.to_string(), "register { handle: 1, fresh: true }");

        let event = LifecycleEvent::Unregister {
            handle: 2u32,
            remaining: 0,
        };
        assert_eq!(event.to_string(), "unregister { handle: 2, remaining: 0 }");

        let event = LifecycleEvent::AddDependency {
            handle: 3u32,
            dependency: 1,
            added: false,
        };
        assert_eq!(
            event.to_string(),
            "add_dependency { handle: 3, dependency: 1, added: false }"
        );

        let event = LifecycleEvent::RemoveDependency {
            handle: "a",
            dependency: "b",
        };
        assert_eq!(
            event.to_string(),
            "remove_dependency { handle: \"a\", dependency: \"b\" }"
        );
    }

    #[test]
    fn test_lifecycle_event_clone() {
        let event = LifecycleEvent::Destroy { handle: 4u64 };
        let cloned = event.clone();
        assert_eq!(event, cloned);
    }
}
