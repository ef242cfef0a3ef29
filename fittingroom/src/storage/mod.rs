//! Blob store bindings that need no cloud account.
//!
//! - [`MemoryBlobStore`]: process-local, addressed like a Cloud Storage bucket
//! - [`LocalBlobStore`]: files under a directory, served from a base URL

mod local;
mod memory;

pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;

use base64::{engine::general_purpose::STANDARD, Engine};
use md5::{Digest, Md5};

/// Returns the base64 MD5 digest of `bytes` (Cloud Storage `md5Hash` format).
#[must_use]
pub fn md5_base64(bytes: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(bytes);
    STANDARD.encode(hasher.finalize())
}
