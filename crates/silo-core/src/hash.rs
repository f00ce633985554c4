use serde_json::Value;
use sha2::{Digest, Sha256};

/// Content hash of a payload: SHA-256 over the canonical JSON serialization,
/// returned as 64-char hex.
///
/// `serde_json` keeps object keys in a sorted map, so serialization is
/// stable for structurally equal values.
pub fn content_hash(value: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Compare a new payload against the previously stored hash.
///
/// Returns whether the payload changed plus its hash. The very first fetch
/// (no prior hash) always counts as changed.
pub fn has_changed(previous: Option<&str>, payload: &Value) -> (bool, String) {
    let hash = content_hash(payload);
    let changed = previous != Some(hash.as_str());
    (changed, hash)
}
