//! Shared test fixture: a wrapper object owning one registered handle, the
//! way a binding layer would wrap a native object.

#![allow(dead_code)]

use handle_lifecycle::{Callbacks, LifecycleRegistry};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

static NEXT_HANDLE: AtomicUsize = AtomicUsize::new(1);

/// Fresh handle value, unique across the whole test binary.
pub fn next_handle() -> usize {
    NEXT_HANDLE.fetch_add(1, Ordering::Relaxed)
}

/// What the destroy callback observed.
#[derive(Default)]
pub struct DestroyRecord {
    calls: AtomicUsize,
    handle: Mutex<Option<usize>>,
}

impl DestroyRecord {
    pub fn destroyed(&self) -> bool {
        self.calls.load(Ordering::SeqCst) > 0
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn destroyed_handle(&self) -> Option<usize> {
        *self.handle.lock().unwrap()
    }
}

/// Callbacks that record into `record`.
pub fn recording(record: &Arc<DestroyRecord>) -> Callbacks<usize> {
    let record = Arc::clone(record);
    Callbacks::destroy(move |handle: &usize| {
        *record.handle.lock().unwrap() = Some(*handle);
        record.calls.fetch_add(1, Ordering::SeqCst);
    })
}

/// A registered object.
pub struct Tester {
    pub handle: usize,
    pub record: Arc<DestroyRecord>,
}

impl Tester {
    pub fn new(registry: &LifecycleRegistry<usize>, deps: &[usize]) -> Self {
        let handle = next_handle();
        let record = Arc::new(DestroyRecord::default());
        registry
            .register(handle, recording(&record), deps.iter().copied())
            .unwrap();
        Self { handle, record }
    }

    pub fn dispose(&self, registry: &LifecycleRegistry<usize>) {
        registry.unregister(self.handle).unwrap();
    }

    pub fn destroyed(&self) -> bool {
        self.record.destroyed()
    }

    /// Destroyed exactly once, with its own handle.
    pub fn assert_destroyed_once(&self) {
        assert_eq!(self.record.calls(), 1, "handle {}", self.handle);
        assert_eq!(self.record.destroyed_handle(), Some(self.handle));
    }
}
