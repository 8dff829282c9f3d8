//! Per-automation serialization — the single-writer discipline.
//!
//! Every mutating path (lifecycle transition, approval decision, emergency
//! stop, restore) acquires the automation's lock before touching its state,
//! so two operations on the same automation can never interleave
//! mid-transition. Operations on different automations proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use govhub_domain::id::AutomationId;

/// Registry of per-automation async locks.
///
/// Guards are *owned* so a caller can pass the held lock down into the
/// lifecycle engine's `*_locked` entry points without re-acquiring.
#[derive(Default)]
pub struct AutomationLocks {
    inner: Mutex<HashMap<AutomationId, Arc<Mutex<()>>>>,
}

impl AutomationLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for one automation, waiting if another operation
    /// on the same automation is in flight.
    pub async fn acquire(&self, id: AutomationId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            Arc::clone(map.entry(id).or_default())
        };
        lock.lock_owned().await
    }
}
