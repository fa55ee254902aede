//! ID generation utilities for chainpilot
//!
//! Provides functions for generating unique identifiers for task records
//! and synthetic transaction hashes.

use rand::Rng;
use sha2::{Digest, Sha256};

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Generate a unique task ID
///
/// Format: `task-{timestamp_ms}-{random_hex}`
/// Example: `task-1738300800123-a1b2c3d4`
pub fn generate_task_id() -> String {
    let timestamp = now_ms();
    let random: u32 = rand::rng().random();
    format!("task-{}-{:08x}", timestamp, random)
}

/// Generate a wallet ID
///
/// Format: `wallet-{random_hex}`
pub fn generate_wallet_id() -> String {
    let random: u64 = rand::rng().random();
    format!("wallet-{:016x}", random)
}

/// Derive a 0x-prefixed hex digest from the given parts.
///
/// `len` is the number of hex characters kept (40 for addresses, 64 for hashes).
pub fn hex_digest(parts: &[&str], len: usize) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hex::encode(hasher.finalize());
    format!("0x{}", &digest[..len.min(digest.len())])
}
