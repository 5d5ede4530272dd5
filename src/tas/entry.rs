use super::ATTRIBUTION;
use crate::feed::{FeedEntry, RawFeature, RecordError};
use crate::geo::{Coordinate, Geometry};
use crate::util::strip_html;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{de, Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;

/// Feature properties of the TasALERT feed, read once at parse time.
///
/// Scalar fields accept strings or numbers (numbers are kept in their JSON
/// text form); `null`, arrays and objects read as absent. The `id` is the
/// exception: an array or object there is an error, since the record cannot
/// be tracked. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TasProperties {
    #[serde(default, deserialize_with = "identifier")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub feed_type: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub alert_level: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub body_html: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub pub_date: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub area: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub created: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub changed: Option<String>,
    /// `type` is an object such as `{"name": "Bushfire"}`
    #[serde(rename = "type", default, deserialize_with = "named")]
    pub incident_type: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub burnt_area: Option<String>,
}

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn scalar<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(scalar_text))
}

fn identifier<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value @ (Value::String(_) | Value::Number(_))) => Ok(scalar_text(value)),
        Some(_) => Err(de::Error::custom("id must be a string or a number")),
    }
}

fn named<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Object(mut object)) => object.remove("name").and_then(scalar_text),
        Some(other) => scalar_text(other),
        None => None,
    })
}

/// Parses the timestamp formats seen in the feed.
///
/// RFC 3339 / ISO 8601 with an offset, the same without an offset (read as
/// UTC), and RFC 2822 for `pubDate`. Anything else is absent.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    DateTime::parse_from_rfc2822(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// One incident or warning from the TasALERT feed.
#[derive(Debug, Clone, PartialEq)]
pub struct TasIncidentEntry {
    external_id: String,
    geometry: Option<Geometry>,
    coordinates: Option<Coordinate>,
    distance_to_home: Option<f64>,
    created: Option<DateTime<Utc>>,
    changed: Option<DateTime<Utc>>,
    published: Option<DateTime<Utc>>,
    properties: TasProperties,
}

impl TasIncidentEntry {
    /// Builds an entry from a raw feature, computing its distance to `home`.
    ///
    /// # Errors
    ///
    /// [`RecordError::MissingId`] when neither `properties.id` nor the
    /// feature-level `id` yields a non-blank identifier.
    /// [`RecordError::Properties`] when `properties.id` is an array or object.
    pub fn from_feature(home: Coordinate, feature: RawFeature) -> Result<Self, RecordError> {
        let RawFeature {
            id,
            geometry,
            properties,
        } = feature;

        let properties: TasProperties = serde_json::from_value(Value::Object(properties))?;

        let external_id = properties
            .id
            .clone()
            .or_else(|| id.and_then(scalar_text))
            .map(|id| id.trim().to_owned())
            .filter(|id| !id.is_empty())
            .ok_or(RecordError::MissingId)?;

        let coordinates = geometry.as_ref().and_then(Geometry::centroid);
        let distance_to_home = geometry.as_ref().and_then(|g| g.distance_from(home));

        let timestamp = |field: &Option<String>, name: &str| {
            let raw = field.as_deref()?;
            let parsed = parse_timestamp(raw);
            if parsed.is_none() {
                tracing::debug!(id = %external_id, field = name, value = raw, "Unreadable timestamp");
            }
            parsed
        };
        let created = timestamp(&properties.created, "created");
        let changed = timestamp(&properties.changed, "changed");
        let published = timestamp(&properties.pub_date, "pubDate");

        Ok(Self {
            external_id,
            geometry,
            coordinates,
            distance_to_home,
            created,
            changed,
            published,
            properties,
        })
    }

    pub fn title(&self) -> Option<&str> {
        self.properties.title.as_deref()
    }

    /// `warning` or `incident`.
    pub fn feed_type(&self) -> Option<&str> {
        self.properties.feed_type.as_deref()
    }

    pub fn alert_level(&self) -> Option<&str> {
        self.properties.alert_level.as_deref()
    }

    pub fn body_html(&self) -> Option<&str> {
        self.properties.body_html.as_deref()
    }

    /// `body_html` with markup removed.
    pub fn description(&self) -> Option<String> {
        self.body_html().map(|body| strip_html(body).into_owned())
    }

    /// Street address or locality.
    pub fn location(&self) -> Option<&str> {
        self.properties.address.as_deref()
    }

    pub fn status(&self) -> Option<&str> {
        self.properties.status.as_deref()
    }

    pub fn incident_type(&self) -> Option<&str> {
        self.properties.incident_type.as_deref()
    }

    pub fn burnt_area(&self) -> Option<&str> {
        self.properties.burnt_area.as_deref()
    }

    pub fn area(&self) -> Option<&str> {
        self.properties.area.as_deref()
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.created
    }

    pub fn published(&self) -> Option<DateTime<Utc>> {
        self.published
    }

    pub fn geometry(&self) -> Option<&Geometry> {
        self.geometry.as_ref()
    }

    pub fn properties(&self) -> &TasProperties {
        &self.properties
    }

    pub fn attribution(&self) -> &'static str {
        ATTRIBUTION
    }
}

impl FeedEntry for TasIncidentEntry {
    fn external_id(&self) -> &str {
        &self.external_id
    }

    fn coordinates(&self) -> Option<Coordinate> {
        self.coordinates
    }

    fn distance_to_home(&self) -> Option<f64> {
        self.distance_to_home
    }

    fn changed(&self) -> Option<DateTime<Utc>> {
        self.changed
    }
}

impl fmt::Display for TasIncidentEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TasIncidentEntry(id={})", self.external_id)
    }
}
