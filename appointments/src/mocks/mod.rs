//! In-memory collaborator doubles for tests and local runs.
//!
//! Every double is cheap to clone; clones share state, so a test can keep a
//! handle for assertions after moving one into the service.

pub mod directory;
pub mod notifications;

pub use directory::{MockEventRegistry, MockIdentityLookup};
pub use notifications::RecordingDispatcher;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a panicking test poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
