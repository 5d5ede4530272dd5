//! Async client for the TasALERT GeoJSON incidents feed.
//!
//! Polls the feed, keeps the incidents near a home location, and tells the
//! caller which ones appeared, are still active, or went away.
//!
//! ```no_run
//! use tasalert::geo::Coordinate;
//! use tasalert::manager::Callbacks;
//! use tasalert::tas::{self, TasFilters};
//!
//! # async fn run() {
//! let callbacks = Callbacks::new(
//!     |id| async move { println!("new: {id}"); Ok(()) },
//!     |_id| async { Ok(()) },
//!     |id| async move { println!("gone: {id}"); Ok(()) },
//! );
//! let filters = TasFilters { radius: Some(50.0), ..TasFilters::default() };
//! let mut manager = tas::feed_manager(
//!     reqwest::Client::new(),
//!     callbacks,
//!     Coordinate::new(-42.88, 147.33),
//!     filters,
//! );
//! manager.update().await;
//! # }
//! ```

pub mod config;
pub mod feed;
pub mod geo;
pub mod manager;
pub mod tas;
pub mod util;
