//! Great-circle distance and the GeoJSON geometry subset used by the feed.
//!
//! Distances are always in kilometres. Only linear scans are performed; there
//! is no spatial index.

use geo::{Closest, ClosestPoint, Contains, Coord, LineString, Point, Polygon};
use serde::Deserialize;
use std::fmt;

/// Mean Earth radius used by [`distance`], in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// GeoJSON positions are `[longitude, latitude, ...]`.
    fn from_position(position: &[f64]) -> Option<Self> {
        match position {
            [lon, lat, ..] if lat.is_finite() && lon.is_finite() => Some(Self::new(*lat, *lon)),
            _ => None,
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.latitude, self.longitude)
    }
}

impl From<Coordinate> for Coord {
    fn from(c: Coordinate) -> Self {
        Coord {
            x: c.longitude,
            y: c.latitude,
        }
    }
}

impl From<Coord> for Coordinate {
    fn from(c: Coord) -> Self {
        Self::new(c.y, c.x)
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((latitude, longitude): (f64, f64)) -> Self {
        Self::new(latitude, longitude)
    }
}

/// Calculates the great-circle distance between two coordinates using the
/// haversine formula.
///
/// Symmetric, non-negative, and zero for identical points. Antipodal points
/// are accepted; the intermediate term is clamped so rounding cannot push it
/// outside `[0, 1]`.
///
/// # Examples
///
/// ```
/// use tasalert::geo::{distance, Coordinate};
///
/// let hobart = Coordinate::new(-42.8821, 147.3272);
/// let launceston = Coordinate::new(-41.4332, 147.1441);
/// let km = distance(hobart, launceston);
/// assert!((km - 161.8).abs() < 1.0);
/// ```
pub fn distance(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let h = h.clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// GeoJSON geometry as it appears in a feature.
///
/// Positions are kept as raw `[lon, lat]` arrays until a coordinate is
/// needed, so a single bad position does not discard the whole geometry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point {
        coordinates: Vec<f64>,
    },
    MultiPoint {
        coordinates: Vec<Vec<f64>>,
    },
    LineString {
        coordinates: Vec<Vec<f64>>,
    },
    Polygon {
        coordinates: Vec<Vec<Vec<f64>>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<Vec<f64>>>>,
    },
    GeometryCollection {
        geometries: Vec<Geometry>,
    },
}

impl Geometry {
    /// Representative coordinate of this geometry.
    ///
    /// Points map to themselves; everything else uses the mean of the
    /// vertices of its first part. Collections use their first member that
    /// has a centroid.
    pub fn centroid(&self) -> Option<Coordinate> {
        match self {
            Self::Point { coordinates } => Coordinate::from_position(coordinates),
            Self::MultiPoint { coordinates } | Self::LineString { coordinates } => {
                mean(&positions(coordinates))
            }
            Self::Polygon { coordinates } => coordinates
                .first()
                .and_then(|ring| mean(&positions(ring))),
            Self::MultiPolygon { coordinates } => coordinates
                .first()
                .and_then(|polygon| polygon.first())
                .and_then(|ring| mean(&positions(ring))),
            Self::GeometryCollection { geometries } => {
                geometries.iter().find_map(Geometry::centroid)
            }
        }
    }

    /// Shortest distance in kilometres from `home` to this geometry.
    ///
    /// Zero when `home` lies inside a polygon (not in one of its holes) or on
    /// a line. `None` when the geometry has no usable positions.
    pub fn distance_from(&self, home: Coordinate) -> Option<f64> {
        match self {
            Self::Point { coordinates } => {
                Coordinate::from_position(coordinates).map(|point| distance(home, point))
            }
            Self::MultiPoint { coordinates } => min_distance(
                positions(coordinates)
                    .into_iter()
                    .map(|point| distance(home, point)),
            ),
            Self::LineString { coordinates } => path_distance(home, &line_string(coordinates)),
            Self::Polygon { coordinates } => polygon_distance(home, coordinates),
            Self::MultiPolygon { coordinates } => min_distance(
                coordinates
                    .iter()
                    .filter_map(|polygon| polygon_distance(home, polygon)),
            ),
            Self::GeometryCollection { geometries } => min_distance(
                geometries
                    .iter()
                    .filter_map(|geometry| geometry.distance_from(home)),
            ),
        }
    }
}

fn positions(raw: &[Vec<f64>]) -> Vec<Coordinate> {
    raw.iter()
        .filter_map(|position| Coordinate::from_position(position))
        .collect()
}

fn mean(points: &[Coordinate]) -> Option<Coordinate> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (lat, lon) = points.iter().fold((0.0, 0.0), |(lat, lon), p| {
        (lat + p.latitude, lon + p.longitude)
    });
    Some(Coordinate::new(lat / n, lon / n))
}

fn min_distance(distances: impl Iterator<Item = f64>) -> Option<f64> {
    distances.fold(None, |best, d| match best {
        Some(b) if b <= d => Some(b),
        _ => Some(d),
    })
}

fn line_string(raw: &[Vec<f64>]) -> LineString {
    positions(raw).into_iter().map(Coord::from).collect()
}

/// Rings after the first are holes; home inside a hole is outside the
/// polygon.
fn polygon_distance(home: Coordinate, rings: &[Vec<Vec<f64>>]) -> Option<f64> {
    let (exterior, interiors) = rings.split_first()?;
    let exterior = line_string(exterior);
    if exterior.0.is_empty() {
        return None;
    }
    let polygon = Polygon::new(
        exterior,
        interiors.iter().map(|ring| line_string(ring)).collect(),
    );

    let point = Point::from(Coord::from(home));
    if polygon.contains(&point) {
        return Some(0.0);
    }
    nearest(home, polygon.closest_point(&point))
}

fn path_distance(home: Coordinate, path: &LineString) -> Option<f64> {
    match path.0.as_slice() {
        [] => None,
        [single] => Some(distance(home, Coordinate::from(*single))),
        _ => nearest(home, path.closest_point(&Point::from(Coord::from(home)))),
    }
}

/// The closest point is found in the lon/lat plane, then measured with
/// [`distance`].
fn nearest(home: Coordinate, closest: Closest<f64>) -> Option<f64> {
    match closest {
        Closest::Intersection(_) => Some(0.0),
        Closest::SinglePoint(point) => Some(distance(home, Coordinate::from(point.0))),
        Closest::Indeterminate => None,
    }
}
