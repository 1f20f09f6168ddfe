//! Running-process registry
//!
//! Tracks live child processes for introspection and emergency shutdown.
//! Entries are added at spawn time and removed by the housekeeping sweep
//! once their liveness flag goes false, or drained wholesale by shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One live child as seen by the registry
pub(crate) struct RegisteredProcess {
    pub test_name: String,
    pub pid: i32,
    /// Shared with the owning supervisor; false once termination observed
    pub running: Arc<AtomicBool>,
}

/// Mutex-protected collection of live process entries
#[derive(Clone, Default)]
pub(crate) struct ProcessRegistry {
    inner: Arc<Mutex<Vec<RegisteredProcess>>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RegisteredProcess>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a freshly spawned process
    pub fn register(&self, test_name: impl Into<String>, pid: i32, running: Arc<AtomicBool>) {
        self.lock().push(RegisteredProcess {
            test_name: test_name.into(),
            pid,
            running,
        });
    }

    /// Remove entries whose process has been observed to terminate
    pub fn sweep(&self) {
        self.lock().retain(|p| p.running.load(Ordering::SeqCst));
    }

    /// Take every entry out of the registry, leaving it empty.
    ///
    /// Used by shutdown so no lock is held while processes are killed.
    pub fn drain(&self) -> Vec<RegisteredProcess> {
        std::mem::take(&mut *self.lock())
    }

    pub fn has_running(&self) -> bool {
        !self.lock().is_empty()
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    pub fn names(&self) -> Vec<String> {
        self.lock().iter().map(|p| p.test_name.clone()).collect()
    }
}
