//! Storage keys
//!
//! A key names a series: an application name plus an optional tag set, written
//! as `app.name{env=prod,region=eu}`.

mod key;

pub use key::{Key, KeyError, KeyParser, SegmentKeyParser};
