//! Merkle-based tamper detection over record hashes.
//!
//! The root is rebuilt in full from the current record set on every check
//! (O(n), no persisted tree) and compared against a previously published
//! root. Per-record hashes can additionally be recomputed from decrypted
//! records to locate which entries diverged.

use crate::error::ClientResult;
use crate::resource::ResourceCrypter;
use crate::types::{EncryptedResource, PlainResource};
use keeply_crypto::merkle;
use tracing::warn;

/// Computes the Merkle root (hex) over the ordered `record_hash` leaves.
pub fn compute_root(records: &[EncryptedResource]) -> String {
    let leaves: Vec<&str> = records.iter().map(|r| r.record_hash.as_str()).collect();
    hex::encode(merkle::compute_root(&leaves))
}

/// Checks the current record set against a previously published root.
pub fn verify(records: &[EncryptedResource], published_root: &str) -> bool {
    let matches = compute_root(records) == published_root;
    if !matches {
        warn!(record_count = records.len(), "integrity root mismatch");
    }
    matches
}

/// Recomputes each decrypted record's hash and returns the ids whose
/// stored `record_hash` no longer matches. Used to triage a root mismatch
/// down to individual records.
pub fn diverging_records(
    records: &[EncryptedResource],
    decrypted: &[PlainResource],
) -> ClientResult<Vec<String>> {
    let mut diverged = Vec::new();
    for plain in decrypted {
        let expected = ResourceCrypter::record_hash(plain)?;
        let stored = records
            .iter()
            .find(|r| r.resource_id == plain.resource_id)
            .map(|r| r.record_hash.as_str());
        if stored != Some(expected.as_str()) {
            diverged.push(plain.resource_id.clone());
        }
    }
    Ok(diverged)
}
