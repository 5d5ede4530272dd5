//! TasALERT incidents and warnings feed.
//!
//! TasALERT publishes every current Tasmanian emergency incident and warning
//! as one GeoJSON `FeatureCollection`. This module maps its property schema
//! onto [`TasIncidentEntry`] and wires the generic [`Feed`] and
//! [`FeedManager`] to it.

mod entry;

pub use entry::{parse_timestamp, TasIncidentEntry, TasProperties};

use crate::feed::{AllowList, Feed, FeedSource, RawFeature, RecordError};
use crate::geo::Coordinate;
use crate::manager::{Callbacks, FeedManager};

pub const URL: &str = "https://alert.tas.gov.au/data/data.geojson";

pub const ATTRIBUTION: &str = "TasALERT Department of Premier and Cabinet";

/// Values the feed uses for `feedType`.
pub const VALID_FEED_TYPES: [&str; 2] = ["warning", "incident"];

/// Values the feed uses for `alertLevel`.
pub const VALID_ALERT_LEVELS: [&str; 4] =
    ["emergency_warning", "watch_and_act", "advice", "not_applicable"];

/// Filter settings for a TasALERT feed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TasFilters {
    /// Kilometres around home
    pub radius: Option<f64>,
    pub feed_types: AllowList,
    pub alert_levels: AllowList,
}

/// [`FeedSource`] for TasALERT.
#[derive(Debug, Clone)]
pub struct TasIncidents {
    url: String,
    feed_types: AllowList,
    alert_levels: AllowList,
}

impl TasIncidents {
    pub fn new(feed_types: AllowList, alert_levels: AllowList) -> Self {
        Self {
            url: URL.to_owned(),
            feed_types,
            alert_levels,
        }
    }

    /// Points the source at a different endpoint (mirrors, tests).
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn feed_types(&self) -> &AllowList {
        &self.feed_types
    }

    pub fn alert_levels(&self) -> &AllowList {
        &self.alert_levels
    }
}

impl Default for TasIncidents {
    fn default() -> Self {
        Self::new(AllowList::default(), AllowList::default())
    }
}

impl FeedSource for TasIncidents {
    type Entry = TasIncidentEntry;

    const NAME: &'static str = "TasIncidentsFeed";

    fn url(&self) -> &str {
        &self.url
    }

    fn parse_entry(
        &self,
        home: Coordinate,
        feature: RawFeature,
    ) -> Result<TasIncidentEntry, RecordError> {
        TasIncidentEntry::from_feature(home, feature)
    }

    // Feed type first, then alert level
    fn retain(&self, entry: &TasIncidentEntry) -> bool {
        self.feed_types.permits(entry.feed_type()) && self.alert_levels.permits(entry.alert_level())
    }
}

pub type TasIncidentsFeed = Feed<TasIncidents>;

pub type TasIncidentsFeedManager = FeedManager<TasIncidents>;

/// Builds a TasALERT feed for `home` with the given filters.
pub fn feed(client: reqwest::Client, home: Coordinate, filters: TasFilters) -> TasIncidentsFeed {
    Feed::new(
        client,
        home,
        TasIncidents::new(filters.feed_types, filters.alert_levels),
    )
    .with_radius(filters.radius)
}

/// Builds a TasALERT feed manager for `home` with the given filters.
pub fn feed_manager(
    client: reqwest::Client,
    callbacks: Callbacks,
    home: Coordinate,
    filters: TasFilters,
) -> TasIncidentsFeedManager {
    FeedManager::new(feed(client, home, filters), callbacks)
}
