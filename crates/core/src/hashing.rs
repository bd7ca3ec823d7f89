//! Shared SHA-256 hex digest utility.
//!
//! Used for report markdown change detection and for API cache keys.

use sha2::{Digest, Sha256};

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Hash report markdown for change detection between runs.
pub fn hash_markdown(markdown: &str) -> String {
    sha256_hex(markdown.as_bytes())
}
