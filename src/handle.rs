//! Handle keys.
//!
//! Handles are opaque values supplied by the caller. The registry never
//! allocates them; it only compares and hashes them.

use std::fmt;
use std::hash::Hash;

/// Bound satisfied by every type usable as a registry key.
///
/// Blanket-implemented, so raw integers, `usize` addresses, newtypes and
/// [`TrackedHandle`] pairs all work without extra code.
pub trait Handle: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static {}

impl<T> Handle for T where T: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static {}

/// A raw handle qualified by the kind of object it refers to.
///
/// Native libraries frequently hand out handles from one integer space for
/// several object kinds. Keying on `(class, raw)` keeps a recycled raw value
/// of one kind from colliding with a live object of another kind.
///
/// # Examples
///
/// ```rust
/// use handle_lifecycle::TrackedHandle;
///
/// let conn = TrackedHandle::new("connection", 0x10usize);
/// let stmt = TrackedHandle::new("statement", 0x10usize);
/// assert_ne!(conn, stmt);
/// assert_eq!(conn.to_string(), "connection 16");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackedHandle<C, H> {
    /// Object kind.
    pub class: C,
    /// Raw handle value handed out by the native side.
    pub raw: H,
}

impl<C, H> TrackedHandle<C, H> {
    pub const fn new(class: C, raw: H) -> Self {
        Self { class, raw }
    }
}

impl<C: fmt::Display, H: fmt::Display> fmt::Display for TrackedHandle<C, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.class, self.raw)
    }
}

impl<C, H> From<(C, H)> for TrackedHandle<C, H> {
    fn from((class, raw): (C, H)) -> Self {
        Self { class, raw }
    }
}
