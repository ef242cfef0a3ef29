//! Unique object names for generated artifacts.
//!
//! Names combine second-resolution time with a digest of the content, so two
//! different artifacts written in the same second never share a key.

use sha2::{Digest, Sha256};

/// Number of digest bytes kept in object names.
const DIGEST_BYTES: usize = 6;

/// Returns a short hex digest of `bytes`.
#[must_use]
pub fn content_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let result = hasher.finalize();
    hex::encode(&result[..DIGEST_BYTES])
}

/// Builds `<prefix>/<stem>_<unix-seconds>_<digest>.<extension>`.
///
/// A trailing slash on `prefix` is tolerated; an empty prefix yields a
/// top-level key.
#[must_use]
pub fn object_key(prefix: &str, stem: &str, unix_seconds: i64, bytes: &[u8], extension: &str) -> String {
    let name = format!("{stem}_{unix_seconds}_{}.{extension}", content_digest(bytes));
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        name
    } else {
        format!("{prefix}/{name}")
    }
}

/// Returns the file stem of an object key (`vto/vto_1_ab.png` -> `vto_1_ab`).
#[must_use]
pub fn key_stem(key: &str) -> &str {
    let file = key.rsplit('/').next().unwrap_or(key);
    match file.rfind('.') {
        Some(idx) if idx > 0 => &file[..idx],
        _ => file,
    }
}
