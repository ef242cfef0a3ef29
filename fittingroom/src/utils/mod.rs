//! Utility functions for timestamps and object naming.

pub mod naming;
pub mod timestamps;

pub use naming::{content_digest, object_key};
pub use timestamps::{iso_timestamp, now_utc, unix_seconds, Timestamp};
