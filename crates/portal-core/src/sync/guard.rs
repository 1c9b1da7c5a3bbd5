use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

/// Tracks whether the owning context is still mounted and which operations
/// are in flight, so late continuations can be discarded.
#[derive(Debug)]
pub struct LifecycleGuard {
    mounted: AtomicBool,
    initial_fetch_claimed: AtomicBool,
    reconciling: AtomicBool,
    /// Ticket sequence of the operation that raised the loading flag
    loading_owner: Mutex<Option<u64>>,
}

impl Default for LifecycleGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleGuard {
    /// A guard for a freshly activated, mounted engine.
    pub fn new() -> Self {
        Self {
            mounted: AtomicBool::new(true),
            initial_fetch_claimed: AtomicBool::new(false),
            reconciling: AtomicBool::new(false),
            loading_owner: Mutex::new(None),
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }

    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::Release);
    }

    /// Returns true exactly once per guard.
    pub fn claim_initial_fetch(&self) -> bool {
        !self.initial_fetch_claimed.swap(true, Ordering::AcqRel)
    }

    pub fn is_reconciling(&self) -> bool {
        self.reconciling.load(Ordering::Acquire)
    }

    /// Marks a reconciliation pass as in flight until the returned token is
    /// dropped. `None` if one is already running.
    pub fn begin_reconcile(&self) -> Option<InFlight<'_>> {
        self.reconciling
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight {
                flag: &self.reconciling,
            })
    }

    pub fn claim_loading(&self, seq: u64) {
        *self.loading_owner.lock() = Some(seq);
    }

    /// Releases the loading flag if `seq` still owns it.
    pub fn release_loading(&self, seq: u64) -> bool {
        let mut owner = self.loading_owner.lock();
        if *owner == Some(seq) {
            *owner = None;
            true
        } else {
            false
        }
    }
}

/// Drop guard clearing the reconciliation flag, also when the pass is aborted.
#[derive(Debug)]
pub struct InFlight<'a> {
    flag: &'a AtomicBool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
