//! Text helpers for feed content.
//!
//! - **Markup stripping**: turn an HTML body into plain text
//! - **Control characters**: make feed text safe to print to a terminal

mod text;

pub use text::{strip_control_chars, strip_html};
