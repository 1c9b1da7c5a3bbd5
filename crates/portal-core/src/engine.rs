//! The notification feed engine: one explicitly constructed instance per
//! activation, owning the feed state and every task working on it.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::FeedConfig;
use crate::error::{FetchError, SyncError};
use crate::models::{FeedSnapshot, NotificationId};
use crate::service::DynNotificationService;
use crate::store::FeedState;
use crate::sync::{Category, Fetcher, LifecycleGuard, Mutator, Poller, Settlement, Ticket};

struct Inner {
    service: DynNotificationService,
    config: FeedConfig,
    state: Mutex<FeedState>,
    enabled: AtomicBool,
    root: CancellationToken,
    guard: LifecycleGuard,
    fetcher: Fetcher,
    mutator: Mutator,
    poller: Mutex<Option<Poller>>,
    updates: watch::Sender<FeedSnapshot>,
}

/// Keeps a local view of the server's notification feed fresh and applies
/// read mutations optimistically.
///
/// Operations return futures whose synchronous prefix (issuing tickets,
/// optimistic changes, no-op checks) has already run when the call returns;
/// awaiting them drives the network part. Dropping the feed tears it down.
pub struct NotificationFeed {
    inner: Arc<Inner>,
}

impl NotificationFeed {
    /// Build a feed for `service`. Fails when `config` does not validate.
    pub fn new(service: DynNotificationService, config: FeedConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let root = CancellationToken::new();
        let (updates, _) = watch::channel(FeedSnapshot::default());
        let inner = Inner {
            service,
            enabled: AtomicBool::new(config.enabled),
            config,
            state: Mutex::new(FeedState::new()),
            fetcher: Fetcher::new(root.clone()),
            root,
            guard: LifecycleGuard::new(),
            mutator: Mutator::new(),
            poller: Mutex::new(None),
            updates,
        };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Load the first page (once per feed) and start polling if enabled.
    ///
    /// Returns the initial load task when this call started it.
    pub fn activate(&self) -> Option<JoinHandle<()>> {
        if !self.inner.is_active() {
            debug!("activation skipped: feed disabled or torn down");
            return None;
        }
        if self.inner.config.auto_poll {
            self.inner.start_poller();
        }
        if !self.inner.guard.claim_initial_fetch() {
            debug!("initial fetch already issued");
            return None;
        }
        info!(limit = self.inner.config.initial_limit, "activating notification feed");
        Some(tokio::spawn(self.refetch()))
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.inner.state.lock().snapshot()
    }

    /// Receiver notified on every visible state change.
    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.inner.updates.subscribe()
    }

    pub fn config(&self) -> &FeedConfig {
        &self.inner.config
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Acquire)
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.guard.is_mounted()
    }

    /// Reset the cursor and reload the first page and the unread count.
    pub fn refetch(&self) -> impl Future<Output = ()> + Send + 'static {
        let inner = self.inner.clone();
        let started = inner.begin_refetch();
        async move {
            if let Some((list, count)) = started {
                inner.complete_refetch(list, count).await;
            }
        }
    }

    /// Append the next page. No network call when there is nothing more to
    /// load or a load is already running.
    pub fn load_more(&self) -> impl Future<Output = ()> + Send + 'static {
        let inner = self.inner.clone();
        let started = inner.begin_load_more();
        async move {
            if let Some((ticket, offset)) = started {
                inner.complete_load_more(ticket, offset).await;
            }
        }
    }

    /// Mark one notification read. The optimistic change is visible as soon
    /// as this returns; awaiting confirms or rolls it back.
    pub fn mark_as_read(&self, id: impl Into<NotificationId>) -> impl Future<Output = ()> + Send + 'static {
        let id = id.into();
        let inner = self.inner.clone();
        let ticket = inner.begin_mark_read(&id);
        async move {
            if let Some(ticket) = ticket {
                inner.complete_mark_read(id, ticket).await;
            }
        }
    }

    pub fn clear_error(&self) {
        self.inner.apply(|state| state.set_error(None));
    }

    /// Suspend or resume fetching and polling; state is kept either way.
    pub fn set_enabled(&self, enabled: bool) -> Option<JoinHandle<()>> {
        if self.inner.enabled.swap(enabled, Ordering::AcqRel) == enabled {
            return None;
        }
        if enabled {
            info!("notification feed enabled");
            self.activate()
        } else {
            info!("notification feed disabled");
            self.inner.stop_poller();
            None
        }
    }

    /// Cancel all outstanding calls and stop polling. Responses arriving
    /// afterwards are discarded.
    pub fn teardown(&self) {
        self.inner.teardown();
    }
}

impl Drop for NotificationFeed {
    fn drop(&mut self) {
        self.inner.teardown();
    }
}

impl Inner {
    fn is_active(&self) -> bool {
        self.enabled.load(Ordering::Acquire) && self.guard.is_mounted()
    }

    fn should_tick(&self) -> bool {
        self.is_active() && !self.guard.is_reconciling()
    }

    /// Run `f` on the state unless torn down, then publish the change.
    fn apply<R>(&self, f: impl FnOnce(&mut FeedState) -> R) -> Option<R> {
        let mut state = self.state.lock();
        if !self.guard.is_mounted() {
            debug!("discarding state mutation after teardown");
            return None;
        }
        let result = f(&mut state);
        let next = state.snapshot();
        self.updates.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        Some(result)
    }

    fn record_failure(&self, state: &mut FeedState, category: &Category, error: FetchError) {
        match error {
            FetchError::Cancelled => debug!(%category, "dropping superseded response"),
            FetchError::Service(source) => {
                let error = SyncError::Transient(source);
                warn!(%category, %error, "fetch failed, keeping current feed");
                state.set_error(Some(error.to_string()));
            }
        }
    }

    // ===== refetch =====

    fn begin_refetch(&self) -> Option<(Ticket, Ticket)> {
        if !self.is_active() {
            debug!("refetch skipped: feed inactive");
            return None;
        }
        self.apply(|state| {
            let list = self.fetcher.begin(Category::List);
            let count = self.fetcher.begin(Category::UnreadCount);
            self.guard.claim_loading(list.seq());
            state.set_loading(true);
            state.set_error(None);
            (list, count)
        })
    }

    async fn complete_refetch(&self, list: Ticket, count: Ticket) {
        let limit = self.config.initial_limit;

        let first_page = async {
            let result = self.fetcher.run(&list, self.service.list(limit, 0)).await;
            self.apply(|state| {
                match list.current(result) {
                    Ok(entries) => {
                        debug!(len = entries.len(), "first page loaded");
                        state.replace_first_page(entries, limit);
                    }
                    Err(error) => self.record_failure(state, list.category(), error),
                }
                if self.guard.release_loading(list.seq()) {
                    state.set_loading(false);
                }
            });
        };
        let unread = async {
            let result = self.fetcher.run(&count, self.service.unread_count()).await;
            self.apply(|state| match count.current(result) {
                Ok(n) => state.set_unread_count(n),
                Err(error) => self.record_failure(state, count.category(), error),
            });
        };
        tokio::join!(first_page, unread);
    }

    // ===== load more =====

    fn begin_load_more(&self) -> Option<(Ticket, usize)> {
        if !self.is_active() {
            debug!("load more skipped: feed inactive");
            return None;
        }
        self.apply(|state| {
            if !state.has_more() || state.is_loading() {
                debug!(
                    has_more = state.has_more(),
                    loading = state.is_loading(),
                    "load more is a no-op"
                );
                return None;
            }
            let ticket = self.fetcher.begin(Category::List);
            self.guard.claim_loading(ticket.seq());
            state.set_loading(true);
            Some((ticket, state.offset()))
        })
        .flatten()
    }

    async fn complete_load_more(&self, ticket: Ticket, offset: usize) {
        let limit = self.config.load_more_limit;
        let result = self.fetcher.run(&ticket, self.service.list(limit, offset)).await;
        self.apply(|state| {
            match ticket.current(result) {
                Ok(entries) => {
                    debug!(offset, len = entries.len(), "page appended");
                    state.append_page(entries, limit);
                }
                Err(error) => self.record_failure(state, ticket.category(), error),
            }
            if self.guard.release_loading(ticket.seq()) {
                state.set_loading(false);
            }
        });
    }

    // ===== mark as read =====

    fn begin_mark_read(&self, id: &NotificationId) -> Option<Ticket> {
        self.apply(|state| {
            if !self.mutator.begin(state, id, Utc::now()) {
                debug!(%id, "already read or unknown, confirming only");
            }
            self.fetcher.begin(Category::MarkRead(id.clone()))
        })
    }

    async fn complete_mark_read(&self, id: NotificationId, ticket: Ticket) {
        let result = self.fetcher.run(&ticket, self.service.mark_read(&id)).await;
        let settlement = self.apply(|state| self.mutator.settle(state, &id, ticket.current(result)));
        if settlement == Some(Settlement::Confirmed) {
            debug!(%id, "read confirmed");
        }
    }

    // ===== polling =====

    /// One reconciliation pass: unread count and first page, merged together.
    async fn reconcile(&self) {
        let Some(_in_flight) = self.guard.begin_reconcile() else {
            debug!("poll tick dropped: reconciliation in flight");
            return;
        };
        if !self.is_active() {
            return;
        }
        // A user load owning `loading` keeps the list category to itself
        let Some((list, count)) = self
            .apply(|state| {
                if state.is_loading() {
                    return None;
                }
                Some((
                    self.fetcher.begin(Category::List),
                    self.fetcher.begin(Category::UnreadCount),
                ))
            })
            .flatten()
        else {
            debug!("poll tick dropped: page load in flight");
            return;
        };

        let limit = self.config.initial_limit;
        let (page, unread) = tokio::join!(
            self.fetcher.run(&list, self.service.list(limit, 0)),
            self.fetcher.run(&count, self.service.unread_count()),
        );

        self.apply(|state| match (list.current(page), count.current(unread)) {
            (Ok(entries), Ok(unread)) => {
                let added = state.merge_new(entries);
                state.set_unread_count(unread);
                debug!(added, unread, "poll merged");
            }
            (Err(FetchError::Cancelled), _) | (_, Err(FetchError::Cancelled)) => {
                debug!("poll result superseded");
            }
            (Err(error), _) => self.record_failure(state, list.category(), error),
            (_, Err(error)) => self.record_failure(state, count.category(), error),
        });
    }

    fn start_poller(self: &Arc<Self>) {
        let mut poller = self.poller.lock();
        if poller.as_ref().is_some_and(Poller::is_running) {
            return;
        }

        let gate = Arc::downgrade(self);
        let tick = Arc::downgrade(self);
        *poller = Some(Poller::start(
            self.config.poll_interval(),
            self.root.child_token(),
            move || gate.upgrade().is_some_and(|inner| inner.should_tick()),
            move || {
                let inner = tick.upgrade();
                async move {
                    if let Some(inner) = inner {
                        inner.reconcile().await;
                    }
                }
            },
        ));
    }

    fn stop_poller(&self) {
        if let Some(poller) = self.poller.lock().take() {
            poller.stop();
            debug!("poller stopped");
        }
    }

    fn teardown(&self) {
        let _state = self.state.lock();
        if !self.guard.is_mounted() {
            return;
        }
        self.guard.unmount();
        self.fetcher.cancel_all();
        self.stop_poller();
        info!("notification feed torn down");
    }
}
