//! Generic GeoJSON feed pipeline.
//!
//! One call to [`Feed::update`] runs a whole poll (or [`Feed::poll`] followed
//! by [`Feed::commit`] when the caller records it later):
//!
//! - **Fetching**: a single HTTP request with a timeout and conditional headers
//! - **Parsing**: GeoJSON `FeatureCollection` into [`RawFeature`]s
//! - **Entries**: the [`FeedSource`] adapter turns each feature into a typed entry
//! - **Filtering**: radius first, then the source's attribute filters
//! - **Watermark**: newest `changed` timestamp among the survivors
//!
//! # Architecture
//!
//! - [`entry`] - the [`FeedEntry`] contract shared by all sources
//! - [`parser`] - GeoJSON boundary
//! - [`fetcher`] - HTTP transport
//! - [`filter`] - radius and allow-list predicates

mod entry;
mod fetcher;
mod filter;
mod parser;

pub use entry::{FeedEntry, RecordError};
pub use fetcher::{FetchError, Validators};
pub use filter::{filter_by_radius, AllowList};
pub use parser::{parse_feature_collection, ParseError, ParseResult, RawFeature};

use crate::geo::Coordinate;
use chrono::{DateTime, Utc};
use fetcher::FetchOutcome;
use std::fmt;
use std::time::Duration;

/// Default time allowed for one fetch, body included.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateStatus {
    /// Fetch and parse succeeded; the entry list may be empty
    Ok,
    /// The source answered but reported nothing new (304 / 204)
    OkNoData,
    /// Fetch or parse failed; no entries are returned
    Error,
}

impl fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ok => "OK",
            Self::OkNoData => "OK_NO_DATA",
            Self::Error => "ERROR",
        })
    }
}

/// Adapter between the generic pipeline and one feed's attribute schema.
pub trait FeedSource: Send + Sync {
    type Entry: FeedEntry + Send + Sync + 'static;

    /// Short name used in logs and `Display`.
    const NAME: &'static str;

    fn url(&self) -> &str;

    /// Builds an entry from one feature. Errors skip just this feature.
    fn parse_entry(&self, home: Coordinate, feature: RawFeature)
        -> Result<Self::Entry, RecordError>;

    /// Attribute filters, applied after the radius filter. Every configured
    /// predicate must hold.
    fn retain(&self, _entry: &Self::Entry) -> bool {
        true
    }
}

/// Outcome of [`Feed::poll`].
#[derive(Debug)]
pub struct Poll<E> {
    pub status: UpdateStatus,
    /// Filtered entries in source order; empty unless `status` is `Ok`
    pub entries: Vec<E>,
    /// Present exactly when `status` is `Ok`
    pub commit: Option<Commit>,
}

impl<E> Poll<E> {
    fn failed() -> Self {
        Self {
            status: UpdateStatus::Error,
            entries: Vec::new(),
            commit: None,
        }
    }
}

/// Bookkeeping of a successful poll that has not been recorded yet.
#[derive(Debug, Clone)]
#[must_use]
pub struct Commit {
    validators: Validators,
    last_timestamp: Option<DateTime<Utc>>,
    started: DateTime<Utc>,
}

impl Commit {
    /// Watermark the feed will report once this is committed.
    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_timestamp
    }
}

/// A pollable feed: transport, parsing and filtering for one source and one
/// home location.
pub struct Feed<S: FeedSource> {
    client: reqwest::Client,
    home: Coordinate,
    radius: Option<f64>,
    timeout: Duration,
    source: S,
    validators: Validators,
    last_timestamp: Option<DateTime<Utc>>,
    last_update: Option<DateTime<Utc>>,
    last_update_successful: Option<DateTime<Utc>>,
}

impl<S: FeedSource> Feed<S> {
    pub fn new(client: reqwest::Client, home: Coordinate, source: S) -> Self {
        Self {
            client,
            home,
            radius: None,
            timeout: DEFAULT_TIMEOUT,
            source,
            validators: Validators::default(),
            last_timestamp: None,
            last_update: None,
            last_update_successful: None,
        }
    }

    /// Radius in kilometres around home; `None` disables the filter.
    pub fn with_radius(mut self, radius: Option<f64>) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn home(&self) -> Coordinate {
        self.home
    }

    pub fn radius(&self) -> Option<f64> {
        self.radius
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Newest `changed` timestamp among the entries of the last successful
    /// poll. Informational only; it never causes entries to be skipped.
    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_timestamp
    }

    /// When the last poll started, successful or not.
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    pub fn last_update_successful(&self) -> Option<DateTime<Utc>> {
        self.last_update_successful
    }

    /// Runs one poll and records it immediately.
    ///
    /// Returns the filtered entries in source order. Never fails: transport
    /// and payload errors are logged and reported as [`UpdateStatus::Error`]
    /// with an empty list. Callers that act on the entries before they count
    /// as delivered should use [`Feed::poll`] and [`Feed::commit`] instead.
    pub async fn update(&mut self) -> (UpdateStatus, Vec<S::Entry>) {
        let Poll {
            status,
            entries,
            commit,
        } = self.poll().await;
        if let Some(commit) = commit {
            self.commit(commit);
        }
        (status, entries)
    }

    /// Runs one poll without recording its cache validators or watermark.
    ///
    /// Features the source cannot read are skipped individually. On
    /// [`UpdateStatus::Ok`] the returned [`Commit`] must be passed to
    /// [`Feed::commit`] once the entries have been handled; until then the
    /// next poll asks for the full payload again. Dropping the future leaves
    /// the feed unchanged apart from `last_update`.
    pub async fn poll(&mut self) -> Poll<S::Entry> {
        let started = Utc::now();
        self.last_update = Some(started);

        let outcome = match fetcher::fetch(
            &self.client,
            self.source.url(),
            &self.validators,
            self.timeout,
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(feed = S::NAME, url = %self.source.url(), error = %e, "Fetching feed failed");
                return Poll::failed();
            }
        };

        let (bytes, validators) = match outcome {
            FetchOutcome::NotModified => {
                self.last_update_successful = Some(started);
                return Poll {
                    status: UpdateStatus::OkNoData,
                    entries: Vec::new(),
                    commit: None,
                };
            }
            FetchOutcome::Body { bytes, validators } => (bytes, validators),
        };

        let parsed = match parse_feature_collection(&bytes) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(feed = S::NAME, url = %self.source.url(), error = %e, "Feed payload is not a feature collection");
                return Poll::failed();
            }
        };

        let entries = self.build_entries(parsed);
        let entries = self.filter_entries(entries);
        let last_timestamp = latest_changed(&entries);

        tracing::debug!(
            feed = S::NAME,
            entries = entries.len(),
            last_timestamp = ?last_timestamp,
            "Feed polled"
        );

        Poll {
            status: UpdateStatus::Ok,
            entries,
            commit: Some(Commit {
                validators,
                last_timestamp,
                started,
            }),
        }
    }

    /// Records a successful poll: its watermark, its completion time and the
    /// validators sent with the next request.
    pub fn commit(&mut self, commit: Commit) {
        self.last_timestamp = commit.last_timestamp;
        self.validators = commit.validators;
        self.last_update_successful = Some(commit.started);
    }

    fn build_entries(&self, parsed: ParseResult) -> Vec<S::Entry> {
        let mut skipped = parsed.skipped;
        let mut entries = Vec::with_capacity(parsed.features.len());

        for feature in parsed.features {
            match self.source.parse_entry(self.home, feature) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::debug!(feed = S::NAME, error = %e, "Skipping feature");
                    skipped += 1;
                }
            }
        }

        if skipped > 0 {
            tracing::warn!(feed = S::NAME, skipped = skipped, "Unreadable features skipped");
        }

        entries
    }

    fn filter_entries(&self, entries: Vec<S::Entry>) -> Vec<S::Entry> {
        let entries = filter_by_radius(entries, self.radius);
        entries
            .into_iter()
            .filter(|entry| self.source.retain(entry))
            .collect()
    }
}

impl<S: FeedSource> fmt::Display for Feed<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(home={}, url={}, radius=", S::NAME, self.home, self.source.url())?;
        match self.radius {
            Some(radius) => write!(f, "{radius})"),
            None => f.write_str("None)"),
        }
    }
}

impl<S: FeedSource + fmt::Debug> fmt::Debug for Feed<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Feed")
            .field("home", &self.home)
            .field("radius", &self.radius)
            .field("timeout", &self.timeout)
            .field("source", &self.source)
            .field("last_timestamp", &self.last_timestamp)
            .finish_non_exhaustive()
    }
}

/// Newest `changed` timestamp in `entries`, ignoring entries without one.
pub fn latest_changed<E: FeedEntry>(entries: &[E]) -> Option<DateTime<Utc>> {
    entries.iter().filter_map(|entry| entry.changed()).max()
}
