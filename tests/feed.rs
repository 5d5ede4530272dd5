//! Integration tests for the TasALERT feed: fetch, parse, filter, watermark.
//!
//! Each test runs against its own wiremock server serving a JSON fixture
//! from `tests/fixtures/`.

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use std::time::Duration;
use tasalert::feed::{AllowList, Feed, FeedEntry, UpdateStatus};
use tasalert::geo::Coordinate;
use tasalert::tas::{TasIncidents, TasIncidentsFeed, ATTRIBUTION};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HOME: Coordinate = Coordinate::new(-42.0, 147.0);

fn load_fixture(name: &str) -> String {
    let path = format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"));
    std::fs::read_to_string(&path).unwrap()
}

async fn serve(body: impl Into<String>) -> MockServer {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/data.geojson"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body.into())
                .insert_header("Content-Type", "application/geo+json"),
        )
        .mount(&mock_server)
        .await;
    mock_server
}

fn feed_for(server: &MockServer, source: TasIncidents) -> TasIncidentsFeed {
    let source = source.with_url(format!("{}/data/data.geojson", server.uri()));
    Feed::new(reqwest::Client::new(), HOME, source)
}

fn ids(entries: &[tasalert::tas::TasIncidentEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.external_id()).collect()
}

// ============================================================================
// Unfiltered
// ============================================================================

#[tokio::test]
async fn test_update_ok() {
    let server = serve(load_fixture("incidents-1.json")).await;
    let mut feed = feed_for(&server, TasIncidents::default());

    let (status, entries) = feed.update().await;
    assert_eq!(status, UpdateStatus::Ok);
    assert_eq!(entries.len(), 3);

    let entry = &entries[0];
    assert_eq!(entry.title(), Some("Title 1"));
    assert_eq!(entry.feed_type(), Some("Type 1"));
    assert_eq!(entry.external_id(), "1234");
    assert_eq!(
        entry.coordinates(),
        Some(Coordinate::new(-42.292141, 146.506805))
    );
    assert!((entry.distance_to_home().unwrap() - 52.0).abs() < 0.05);
    assert_eq!(entry.to_string(), "TasIncidentEntry(id=1234)");
    assert_eq!(
        entry.created(),
        Some(Utc.with_ymd_and_hms(2024, 2, 21, 5, 29, 0).unwrap())
    );
    assert_eq!(
        entry.published(),
        Some(Utc.with_ymd_and_hms(2024, 2, 21, 5, 30, 0).unwrap())
    );
    assert_eq!(entry.location(), Some("Location 1"));
    assert_eq!(entry.status(), Some("Status 1"));
    assert_eq!(entry.incident_type(), Some("Type 1"));
    assert_eq!(entry.burnt_area(), Some("1.234"));
    assert_eq!(entry.area(), Some("Area 1"));
    assert_eq!(entry.description().as_deref(), Some("Body 1"));
    assert_eq!(entry.attribution(), ATTRIBUTION);

    let entry = &entries[1];
    assert_eq!(entry.title(), Some("Title 2"));
    assert_eq!(entry.incident_type(), Some("Type 2"));
    assert_eq!(entry.alert_level(), None);
    assert_eq!(entry.distance_to_home(), Some(0.0));
    assert_eq!(entry.description().as_deref(), Some("Body 2"));

    let entry = &entries[2];
    assert_eq!(entry.title(), Some("Title 3"));
    assert_eq!(entry.external_id(), "9012");
    assert_eq!(entry.alert_level(), Some("alertLevel 3"));
    assert_eq!(entry.burnt_area(), Some("12"));
    assert_eq!(entry.coordinates(), None);
    assert_eq!(entry.distance_to_home(), None);

    assert_eq!(
        feed.last_timestamp(),
        Some(Utc.with_ymd_and_hms(2024, 2, 23, 5, 3, 0).unwrap())
    );
    assert!(feed.last_update().is_some());
    assert_eq!(feed.last_update(), feed.last_update_successful());
}

#[tokio::test]
async fn test_feed_display() {
    let server = serve(load_fixture("incidents-2.json")).await;
    let feed = feed_for(&server, TasIncidents::default());
    assert_eq!(
        feed.to_string(),
        format!(
            "TasIncidentsFeed(home=(-42, 147), url={}/data/data.geojson, radius=None)",
            server.uri()
        )
    );

    let feed = feed.with_radius(Some(10.0));
    assert!(feed.to_string().ends_with("radius=10)"));
}

#[tokio::test]
async fn test_empty_feed() {
    let server = serve(load_fixture("incidents-2.json")).await;
    let mut feed = feed_for(&server, TasIncidents::default());

    let (status, entries) = feed.update().await;
    assert_eq!(status, UpdateStatus::Ok);
    assert!(entries.is_empty());
    assert_eq!(feed.last_timestamp(), None);
}

#[tokio::test]
async fn test_unreadable_features_are_skipped() {
    let server = serve(load_fixture("incidents-3.json")).await;
    let mut feed = feed_for(&server, TasIncidents::default());

    let (status, entries) = feed.update().await;
    assert_eq!(status, UpdateStatus::Ok);
    assert_eq!(ids(&entries), vec!["1234", "9012", "3456"]);
    assert_eq!(
        feed.last_timestamp(),
        Some(Utc.with_ymd_and_hms(2024, 2, 24, 2, 0, 0).unwrap())
    );
}

// ============================================================================
// Filters
// ============================================================================

#[tokio::test]
async fn test_update_ok_with_feed_types() {
    let server = serve(load_fixture("incidents-1.json")).await;
    let source = TasIncidents::new(["Type 1"].into_iter().collect(), AllowList::default());
    let mut feed = feed_for(&server, source);

    let (status, entries) = feed.update().await;
    assert_eq!(status, UpdateStatus::Ok);
    assert_eq!(ids(&entries), vec!["1234", "9012"]);
    assert_eq!(entries[0].title(), Some("Title 1"));
    assert_eq!(entries[0].feed_type(), Some("Type 1"));
}

#[tokio::test]
async fn test_update_ok_with_alert_levels() {
    let server = serve(load_fixture("incidents-1.json")).await;
    let source = TasIncidents::new(AllowList::default(), ["advice"].into_iter().collect());
    let mut feed = feed_for(&server, source);

    let (_, entries) = feed.update().await;
    // 5678 has a null alert level and never passes a non-empty list
    assert_eq!(ids(&entries), vec!["1234"]);
    assert_eq!(
        feed.last_timestamp(),
        Some(Utc.with_ymd_and_hms(2024, 2, 22, 1, 0, 0).unwrap())
    );
}

#[tokio::test]
async fn test_filters_are_anded() {
    let server = serve(load_fixture("incidents-1.json")).await;
    let source = TasIncidents::new(
        ["Type 1"].into_iter().collect(),
        ["alertLevel 3"].into_iter().collect(),
    );
    let mut feed = feed_for(&server, source);

    let (_, entries) = feed.update().await;
    assert_eq!(ids(&entries), vec!["9012"]);
}

#[tokio::test]
async fn test_radius_excludes_distant_entry() {
    let server = serve(load_fixture("incidents-1.json")).await;
    let mut feed = feed_for(&server, TasIncidents::default()).with_radius(Some(10.0));

    let (status, entries) = feed.update().await;
    assert_eq!(status, UpdateStatus::Ok);
    // 1234 is ~52 km away; 5678's polygon contains home; 9012 has no geometry
    assert_eq!(ids(&entries), vec!["5678", "9012"]);
    assert_eq!(
        feed.last_timestamp(),
        Some(Utc.with_ymd_and_hms(2024, 2, 23, 5, 3, 0).unwrap())
    );
}

#[tokio::test]
async fn test_filtered_output_is_subset_of_parse() {
    let server = serve(load_fixture("incidents-1.json")).await;
    let mut unfiltered = feed_for(&server, TasIncidents::default());
    let (_, all) = unfiltered.update().await;

    let source = TasIncidents::new(["Type 1"].into_iter().collect(), AllowList::default());
    let mut filtered = feed_for(&server, source).with_radius(Some(100.0));
    let (_, some) = filtered.update().await;

    for entry in &some {
        assert!(all.contains(entry));
        assert_eq!(entry.feed_type(), Some("Type 1"));
        assert!(entry.distance_to_home().map_or(true, |d| d <= 100.0));
    }
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_http_error_is_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    let mut feed = feed_for(&server, TasIncidents::default());

    let (status, entries) = feed.update().await;
    assert_eq!(status, UpdateStatus::Error);
    assert!(entries.is_empty());
    assert!(feed.last_update().is_some());
    assert_eq!(feed.last_update_successful(), None);
}

#[tokio::test]
async fn test_malformed_payload_is_error_status() {
    let server = serve("<html>Service unavailable</html>").await;
    let mut feed = feed_for(&server, TasIncidents::default());

    let (status, entries) = feed.update().await;
    assert_eq!(status, UpdateStatus::Error);
    assert!(entries.is_empty());
}

#[tokio::test]
async fn test_timeout_is_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(load_fixture("incidents-1.json"))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;
    let mut feed =
        feed_for(&server, TasIncidents::default()).with_timeout(Duration::from_millis(100));

    let (status, entries) = feed.update().await;
    assert_eq!(status, UpdateStatus::Error);
    assert!(entries.is_empty());
    assert_eq!(feed.last_timestamp(), None);
}

#[tokio::test]
async fn test_error_keeps_previous_watermark() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(load_fixture("incidents-1.json")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let mut feed = feed_for(&server, TasIncidents::default());

    feed.update().await;
    let watermark = feed.last_timestamp();
    assert!(watermark.is_some());

    let (status, _) = feed.update().await;
    assert_eq!(status, UpdateStatus::Error);
    assert_eq!(feed.last_timestamp(), watermark);
}

// ============================================================================
// Conditional requests
// ============================================================================

#[tokio::test]
async fn test_not_modified_is_ok_no_data() {
    use wiremock::matchers::header;

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("If-None-Match", "\"abc\""))
        .respond_with(ResponseTemplate::new(304))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(load_fixture("incidents-1.json"))
                .insert_header("ETag", "\"abc\""),
        )
        .mount(&server)
        .await;
    let mut feed = feed_for(&server, TasIncidents::default());

    let (status, entries) = feed.update().await;
    assert_eq!(status, UpdateStatus::Ok);
    assert_eq!(entries.len(), 3);
    let watermark = feed.last_timestamp();

    let (status, entries) = feed.update().await;
    assert_eq!(status, UpdateStatus::OkNoData);
    assert!(entries.is_empty());
    assert_eq!(feed.last_timestamp(), watermark);
}

#[tokio::test]
async fn test_uncommitted_poll_keeps_previous_validators() {
    use wiremock::matchers::header;

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("If-None-Match", "\"abc\""))
        .respond_with(ResponseTemplate::new(304))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(load_fixture("incidents-1.json"))
                .insert_header("ETag", "\"abc\""),
        )
        .mount(&server)
        .await;
    let mut feed = feed_for(&server, TasIncidents::default());

    let poll = feed.poll().await;
    assert_eq!(poll.status, UpdateStatus::Ok);
    let commit = poll.commit.unwrap();
    assert_eq!(
        commit.last_timestamp(),
        Some(Utc.with_ymd_and_hms(2024, 2, 23, 5, 3, 0).unwrap())
    );
    assert_eq!(feed.last_timestamp(), None);
    assert_eq!(feed.last_update_successful(), None);

    // Not committed: the full payload is requested again
    let poll = feed.poll().await;
    assert_eq!(poll.status, UpdateStatus::Ok);
    assert_eq!(poll.entries.len(), 3);

    feed.commit(poll.commit.unwrap());
    assert!(feed.last_timestamp().is_some());
    assert!(feed.last_update_successful().is_some());
    let poll = feed.poll().await;
    assert_eq!(poll.status, UpdateStatus::OkNoData);
    assert!(poll.commit.is_none());
}
