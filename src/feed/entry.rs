use crate::geo::Coordinate;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// The minimal view of a parsed record the generic engine relies on.
///
/// Implementations are immutable projections over one feature; every
/// accessor returns `None` for missing data instead of failing. Feed-specific
/// attributes (title, alert level, ...) live on the concrete type.
pub trait FeedEntry {
    /// Identity key across polls. Never empty.
    fn external_id(&self) -> &str;

    /// Representative location of the entry, if its geometry is usable.
    fn coordinates(&self) -> Option<Coordinate>;

    /// Distance in kilometres from the home location the entry was built
    /// with. `None` exactly when the geometry is unusable.
    fn distance_to_home(&self) -> Option<f64>;

    /// Last-changed timestamp, used for the feed watermark.
    fn changed(&self) -> Option<DateTime<Utc>>;
}

/// A single feature that could not be turned into an entry.
///
/// Record errors never fail a poll; the feature is skipped and logged.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The feature carries no usable identity
    #[error("Feature has no external id")]
    MissingId,
    /// The properties object could not be read into the typed record
    #[error("Invalid feature properties: {0}")]
    Properties(#[from] serde_json::Error),
}
