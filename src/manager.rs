//! Poll orchestration and entity lifecycle.
//!
//! [`FeedManager`] keeps the entries of the last successful poll (the
//! snapshot) and, after every poll, reports the difference to the consumer
//! as `generate` / `update` / `remove` callbacks keyed by external id.
//!
//! # Callback semantics
//!
//! - New ids get `generate`, in the order they appear in the feed.
//! - Ids present before and now get `update` on every poll, whether or not
//!   their content changed. Consumers are expected to be idempotent.
//! - Vanished ids get `remove`, in the order they were previously seen.
//!
//! The three passes run in that order, sequentially. The snapshot is only
//! replaced after all of them have finished, so callbacks observe the
//! previous snapshot through [`FeedManager::entry`] and friends. A handler
//! returning an error is logged and counted; the remaining callbacks still
//! run and the snapshot is still replaced.

use crate::feed::{Feed, FeedEntry, FeedSource, Poll, UpdateStatus};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;

/// Handler for one lifecycle event, called with the entity's external id.
pub type EntityCallback = Box<dyn Fn(String) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Observer for the outcome of each poll.
pub type StatusCallback = Box<dyn Fn(StatusUpdate) -> BoxFuture<'static, ()> + Send + Sync>;

/// The consumer side of a [`FeedManager`].
pub struct Callbacks {
    generate: EntityCallback,
    update: EntityCallback,
    remove: EntityCallback,
    status: Option<StatusCallback>,
}

impl Callbacks {
    /// Wraps three async handlers.
    ///
    /// ```
    /// use tasalert::manager::Callbacks;
    ///
    /// let callbacks = Callbacks::new(
    ///     |id| async move { println!("new incident {id}"); Ok(()) },
    ///     |_id| async { Ok(()) },
    ///     |id| async move { println!("incident {id} is over"); Ok(()) },
    /// );
    /// ```
    pub fn new<G, GF, U, UF, R, RF>(generate: G, update: U, remove: R) -> Self
    where
        G: Fn(String) -> GF + Send + Sync + 'static,
        GF: Future<Output = anyhow::Result<()>> + Send + 'static,
        U: Fn(String) -> UF + Send + Sync + 'static,
        UF: Future<Output = anyhow::Result<()>> + Send + 'static,
        R: Fn(String) -> RF + Send + Sync + 'static,
        RF: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            generate: Box::new(move |id| generate(id).boxed()),
            update: Box::new(move |id| update(id).boxed()),
            remove: Box::new(move |id| remove(id).boxed()),
            status: None,
        }
    }

    /// Adds an observer that receives a [`StatusUpdate`] after every poll.
    pub fn with_status<F, Fut>(mut self, status: F) -> Self
    where
        F: Fn(StatusUpdate) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.status = Some(Box::new(move |update| status(update).boxed()));
        self
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("status", &self.status.is_some())
            .finish_non_exhaustive()
    }
}

/// Where the manager is in its poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    /// No poll has completed yet
    Initial,
    /// The last poll succeeded; the snapshot reflects it
    Updated,
    /// The last poll failed; the snapshot is from the poll before
    Error,
}

/// Summary passed to the status observer after each poll.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: UpdateStatus,
    pub last_update: Option<DateTime<Utc>>,
    pub last_update_successful: Option<DateTime<Utc>>,
    pub last_timestamp: Option<DateTime<Utc>>,
    /// Entries in the snapshot after this poll
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    /// Handlers that returned an error during this poll
    pub failed_callbacks: usize,
}

#[derive(Debug, Default, Clone, Copy)]
struct Counts {
    created: usize,
    updated: usize,
    removed: usize,
    failed: usize,
}

/// Entries by external id, remembering source order.
struct Snapshot<E> {
    order: Vec<String>,
    entries: HashMap<String, E>,
}

impl<E: FeedEntry> Snapshot<E> {
    fn empty() -> Self {
        Self {
            order: Vec::new(),
            entries: HashMap::new(),
        }
    }

    /// A repeated id keeps its first position and its last record.
    fn from_entries(list: Vec<E>) -> Self {
        let mut order = Vec::with_capacity(list.len());
        let mut entries = HashMap::with_capacity(list.len());
        for entry in list {
            let id = entry.external_id().to_owned();
            if entries.insert(id.clone(), entry).is_some() {
                tracing::debug!(id = %id, "Duplicate external id in feed, keeping latest record");
            } else {
                order.push(id);
            }
        }
        Self { order, entries }
    }

    fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    fn iter(&self) -> impl Iterator<Item = &E> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }
}

/// Polls a [`Feed`] and turns successive snapshots into lifecycle callbacks.
///
/// `update` takes `&mut self`, so polls on one manager are serialised by
/// construction. Share a manager across tasks behind a
/// `tokio::sync::Mutex`. Independent managers share nothing.
pub struct FeedManager<S: FeedSource> {
    feed: Feed<S>,
    callbacks: Callbacks,
    snapshot: Snapshot<S::Entry>,
    state: ManagerState,
    last_status: Option<UpdateStatus>,
    last_update: Option<DateTime<Utc>>,
    last_update_successful: Option<DateTime<Utc>>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl<S: FeedSource> FeedManager<S> {
    pub fn new(feed: Feed<S>, callbacks: Callbacks) -> Self {
        Self {
            feed,
            callbacks,
            snapshot: Snapshot::empty(),
            state: ManagerState::Initial,
            last_status: None,
            last_update: None,
            last_update_successful: None,
            last_timestamp: None,
        }
    }

    /// Runs one poll and fires the resulting callbacks.
    ///
    /// Never returns an error. On [`UpdateStatus::Error`] the snapshot and
    /// watermark are left exactly as they were and no entity callback fires.
    /// On [`UpdateStatus::OkNoData`] the snapshot is kept as is. Cancelling
    /// the returned future before the callbacks complete leaves the snapshot
    /// and the feed's cache validators untouched; the next poll fetches the
    /// full payload and reports the same changes again.
    pub async fn update(&mut self) -> UpdateStatus {
        let Poll {
            status,
            entries,
            commit,
        } = self.feed.poll().await;
        self.last_update = self.feed.last_update();

        let counts = match status {
            UpdateStatus::Ok => {
                let counts = self.apply(Snapshot::from_entries(entries)).await;
                // Validators and watermark only count once every callback ran
                if let Some(commit) = commit {
                    self.feed.commit(commit);
                }
                self.state = ManagerState::Updated;
                self.last_update_successful = self.feed.last_update_successful();
                self.last_timestamp = self.feed.last_timestamp();
                tracing::info!(
                    feed = S::NAME,
                    total = self.snapshot.entries.len(),
                    created = counts.created,
                    updated = counts.updated,
                    removed = counts.removed,
                    "Feed update applied"
                );
                counts
            }
            UpdateStatus::OkNoData => {
                self.state = ManagerState::Updated;
                self.last_update_successful = self.feed.last_update_successful();
                tracing::debug!(feed = S::NAME, "Update successful, no new data");
                Counts::default()
            }
            UpdateStatus::Error => {
                self.state = ManagerState::Error;
                tracing::warn!(
                    feed = S::NAME,
                    retained = self.snapshot.entries.len(),
                    "Update failed, keeping previous entries"
                );
                Counts::default()
            }
        };

        self.last_status = Some(status);
        self.notify_status(status, counts).await;
        status
    }

    async fn apply(&mut self, next: Snapshot<S::Entry>) -> Counts {
        let mut counts = Counts::default();

        let (new_ids, kept_ids): (Vec<&String>, Vec<&String>) =
            next.order.iter().partition(|id| !self.snapshot.contains(id));
        let removed_ids: Vec<&String> = self
            .snapshot
            .order
            .iter()
            .filter(|id| !next.contains(id))
            .collect();

        for id in new_ids {
            counts.created += 1;
            if !run_callback(&self.callbacks.generate, "generate", id).await {
                counts.failed += 1;
            }
        }
        for id in kept_ids {
            counts.updated += 1;
            if !run_callback(&self.callbacks.update, "update", id).await {
                counts.failed += 1;
            }
        }
        for id in removed_ids {
            counts.removed += 1;
            if !run_callback(&self.callbacks.remove, "remove", id).await {
                counts.failed += 1;
            }
        }

        self.snapshot = next;
        counts
    }

    async fn notify_status(&self, status: UpdateStatus, counts: Counts) {
        let Some(observer) = &self.callbacks.status else {
            return;
        };
        let update = StatusUpdate {
            status,
            last_update: self.last_update,
            last_update_successful: self.last_update_successful,
            last_timestamp: self.last_timestamp,
            total: self.snapshot.entries.len(),
            created: counts.created,
            updated: counts.updated,
            removed: counts.removed,
            failed_callbacks: counts.failed,
        };
        observer(update).await;
    }

    /// Entries of the last successful poll, in feed order.
    pub fn feed_entries(&self) -> Vec<&S::Entry> {
        self.snapshot.iter().collect()
    }

    pub fn entry(&self, external_id: &str) -> Option<&S::Entry> {
        self.snapshot.entries.get(external_id)
    }

    /// External ids of the retained entries, in feed order.
    pub fn external_ids(&self) -> &[String] {
        &self.snapshot.order
    }

    /// Watermark of the last successful poll that delivered data.
    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_timestamp
    }

    pub fn last_status(&self) -> Option<UpdateStatus> {
        self.last_status
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    pub fn last_update_successful(&self) -> Option<DateTime<Utc>> {
        self.last_update_successful
    }

    pub fn state(&self) -> ManagerState {
        self.state
    }

    pub fn feed(&self) -> &Feed<S> {
        &self.feed
    }
}

impl<S: FeedSource> fmt::Display for FeedManager<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FeedManager(feed={})", self.feed)
    }
}

/// Returns `false` if the handler failed.
async fn run_callback(callback: &EntityCallback, kind: &'static str, id: &str) -> bool {
    match callback(id.to_owned()).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(callback = kind, id = %id, error = %e, "Entity callback failed");
            false
        }
    }
}
