use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{FetchError, ServiceError};
use crate::models::NotificationId;

/// Supersession scope of a service call. A new call cancels the previous one
/// in the same category.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Category {
    List,
    UnreadCount,
    MarkRead(NotificationId),
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::List => f.write_str("list"),
            Category::UnreadCount => f.write_str("unreadCount"),
            Category::MarkRead(id) => write!(f, "markRead:{}", id),
        }
    }
}

/// Handle for one issued call.
#[derive(Debug)]
pub struct Ticket {
    category: Category,
    seq: u64,
    token: CancellationToken,
}

impl Ticket {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn category(&self) -> &Category {
        &self.category
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Re-check a result at the moment it is about to be applied; a ticket
    /// superseded since the call resolved turns it into `Cancelled`.
    pub fn current<T>(&self, result: Result<T, FetchError>) -> Result<T, FetchError> {
        if self.is_cancelled() {
            Err(FetchError::Cancelled)
        } else {
            result
        }
    }
}

/// Issues cancellable service calls, one live call per category.
#[derive(Debug)]
pub struct Fetcher {
    root: CancellationToken,
    inflight: Mutex<HashMap<Category, (u64, CancellationToken)>>,
    next_seq: AtomicU64,
}

impl Fetcher {
    pub fn new(root: CancellationToken) -> Self {
        Self {
            root,
            inflight: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(1),
        }
    }

    /// Register a new call in `category`, cancelling its predecessor.
    pub fn begin(&self, category: Category) -> Ticket {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let token = self.root.child_token();
        let previous = self
            .inflight
            .lock()
            .insert(category.clone(), (seq, token.clone()));
        if let Some((previous_seq, previous_token)) = previous {
            debug!(%category, previous_seq, seq, "superseding in-flight call");
            previous_token.cancel();
        }
        Ticket {
            category,
            seq,
            token,
        }
    }

    /// Drive `call` under `ticket`. The value is returned only if the ticket
    /// is still live once the call resolves.
    pub async fn run<T, F>(&self, ticket: &Ticket, call: F) -> Result<T, FetchError>
    where
        F: Future<Output = Result<T, ServiceError>>,
    {
        let result = tokio::select! {
            biased;
            _ = ticket.token.cancelled() => Err(FetchError::Cancelled),
            result = call => {
                if ticket.is_cancelled() {
                    Err(FetchError::Cancelled)
                } else {
                    result.map_err(FetchError::from)
                }
            }
        };
        self.finish(ticket);
        result
    }

    /// Cancel every outstanding call; calls issued afterwards are born
    /// cancelled.
    pub fn cancel_all(&self) {
        self.root.cancel();
        self.inflight.lock().clear();
    }

    pub fn in_flight(&self) -> usize {
        self.inflight.lock().len()
    }

    fn finish(&self, ticket: &Ticket) {
        let mut inflight = self.inflight.lock();
        if inflight.get(&ticket.category).map(|(seq, _)| *seq) == Some(ticket.seq) {
            inflight.remove(&ticket.category);
        }
    }
}
