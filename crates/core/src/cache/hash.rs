//! Cache key generation for request identities.

use sha2::{Digest, Sha256};

/// Compute the cache key for a request.
///
/// Header-dependent variants are resolved at match time from the stored
/// `Vary` record, so only the method and URL take part in the key.
pub fn compute_entry_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
