use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::NotificationService;
use crate::error::ServiceError;
use crate::models::{NotificationEntry, NotificationId};

/// A call observed by [`ScriptedService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List { limit: usize, offset: usize },
    UnreadCount,
    MarkRead(NotificationId),
}

struct Reply<T> {
    result: Result<T, String>,
    gate: Option<oneshot::Receiver<()>>,
}

impl<T> Reply<T> {
    async fn resolve(self) -> Result<T, ServiceError> {
        if let Some(gate) = self.gate {
            // A dropped sender releases the reply as well
            let _ = gate.await;
        }
        self.result.map_err(ServiceError::Unavailable)
    }
}

/// In-memory notification service answering from per-operation queues.
///
/// Replies can be gated so a test decides when (and in which order) calls
/// resolve. Empty queues answer with an empty page, a zero count and a
/// successful acknowledgement.
#[derive(Default)]
pub struct ScriptedService {
    lists: Mutex<VecDeque<Reply<Vec<NotificationEntry>>>>,
    counts: Mutex<VecDeque<Reply<u64>>>,
    marks: Mutex<VecDeque<Reply<()>>>,
    calls: Mutex<Vec<Call>>,
}

fn push<T>(queue: &Mutex<VecDeque<Reply<T>>>, result: Result<T, String>) {
    queue.lock().push_back(Reply { result, gate: None });
}

fn push_gated<T>(queue: &Mutex<VecDeque<Reply<T>>>, result: Result<T, String>) -> oneshot::Sender<()> {
    let (tx, rx) = oneshot::channel();
    queue.lock().push_back(Reply {
        result,
        gate: Some(rx),
    });
    tx
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_list(&self, result: Result<Vec<NotificationEntry>, &str>) {
        push(&self.lists, result.map_err(String::from));
    }

    pub fn push_list_gated(&self, result: Result<Vec<NotificationEntry>, &str>) -> oneshot::Sender<()> {
        push_gated(&self.lists, result.map_err(String::from))
    }

    pub fn push_count(&self, result: Result<u64, &str>) {
        push(&self.counts, result.map_err(String::from));
    }

    pub fn push_count_gated(&self, result: Result<u64, &str>) -> oneshot::Sender<()> {
        push_gated(&self.counts, result.map_err(String::from))
    }

    pub fn push_mark(&self, result: Result<(), &str>) {
        push(&self.marks, result.map_err(String::from));
    }

    pub fn push_mark_gated(&self, result: Result<(), &str>) -> oneshot::Sender<()> {
        push_gated(&self.marks, result.map_err(String::from))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn list_calls(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, Call::List { .. }))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl NotificationService for ScriptedService {
    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<NotificationEntry>, ServiceError> {
        self.record(Call::List { limit, offset });
        let reply = self.lists.lock().pop_front();
        match reply {
            Some(reply) => reply.resolve().await,
            None => Ok(Vec::new()),
        }
    }

    async fn unread_count(&self) -> Result<u64, ServiceError> {
        self.record(Call::UnreadCount);
        let reply = self.counts.lock().pop_front();
        match reply {
            Some(reply) => reply.resolve().await,
            None => Ok(0),
        }
    }

    async fn mark_read(&self, id: &NotificationId) -> Result<(), ServiceError> {
        self.record(Call::MarkRead(id.clone()));
        let reply = self.marks.lock().pop_front();
        match reply {
            Some(reply) => reply.resolve().await,
            None => Ok(()),
        }
    }
}
