use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{FetchError, SyncError};
use crate::models::NotificationId;
use crate::store::{FeedState, ReadReceipt};

/// Where a notification stands in the mark-as-read state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadPhase {
    Unread,
    /// Shown as read, confirmation outstanding
    PendingRead,
    Read,
}

/// How a confirmation call ended for the local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Confirmed,
    RolledBack,
    /// A newer call for the same id owns the pending transition
    Superseded,
}

/// Optimistic mark-as-read with one compensating transition.
///
/// `Unread -> PendingRead` is applied before the service is asked;
/// `PendingRead -> Read` on success, `PendingRead -> Unread` on failure.
#[derive(Debug, Default)]
pub struct Mutator {
    pending: Mutex<HashMap<NotificationId, ReadReceipt>>,
}

impl Mutator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self, state: &FeedState, id: &NotificationId) -> Option<ReadPhase> {
        let entry = state.get(id)?;
        Some(if self.pending.lock().contains_key(id) {
            ReadPhase::PendingRead
        } else if entry.is_read {
            ReadPhase::Read
        } else {
            ReadPhase::Unread
        })
    }

    /// Apply the optimistic transition. Returns false when the entry was
    /// absent or already read, in which case no counter changes.
    pub fn begin(&self, state: &mut FeedState, id: &NotificationId, now: DateTime<Utc>) -> bool {
        match state.apply_read(id, now) {
            Some(receipt) => {
                self.pending.lock().insert(id.clone(), receipt);
                true
            }
            None => false,
        }
    }

    /// Resolve the pending transition for `id` with the confirmation outcome.
    pub fn settle(
        &self,
        state: &mut FeedState,
        id: &NotificationId,
        outcome: Result<(), FetchError>,
    ) -> Settlement {
        match outcome {
            Ok(()) => {
                self.pending.lock().remove(id);
                Settlement::Confirmed
            }
            Err(FetchError::Cancelled) => {
                debug!(%id, "mark-read confirmation superseded");
                Settlement::Superseded
            }
            Err(FetchError::Service(source)) => {
                let receipt = self.pending.lock().remove(id);
                if let Some(receipt) = receipt {
                    state.revert_read(&receipt);
                }
                let error = SyncError::Mutation {
                    id: id.clone(),
                    source,
                };
                warn!(%error, "rolling back optimistic read");
                state.set_error(Some(error.to_string()));
                Settlement::RolledBack
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }
}
