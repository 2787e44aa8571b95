//! Mutex lock recovery so a panicking payload callback cannot wedge the session.

use std::sync::{Mutex, MutexGuard};

pub(crate) fn lock_or_recover<'a, T>(lock: &'a Mutex<T>, context: &str) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!(context, "session mutex poisoned; recovering");
            poisoned.into_inner()
        }
    }
}
