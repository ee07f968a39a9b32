//! Shared types for encrypted records and sharing payloads.

use keeply_crypto::{CryptoResult, KeyEnvelope};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An encrypted domain record as stored and synced.
///
/// Wire format of the cryptographic fields:
/// - `encrypted_data`: `hex(iv) + ":" + hex(ciphertext)`
/// - `encapsulated_key`: `hex(KEM ciphertext)`, `"FOLDER"`, or `"GLOBAL"`
/// - `encrypted_symmetric_key`: `hex(iv ‖ wrapped DEK)`
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedResource {
    pub resource_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
    pub encrypted_data: String,
    pub encapsulated_key: String,
    pub encrypted_symmetric_key: String,
    pub record_hash: String,
    /// Plaintext-adjacent metadata that participates in integrity checks
    /// (e.g. status, due date). Stored unencrypted.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl EncryptedResource {
    /// Decodes the `encapsulated_key` field into its tagged form.
    pub fn key_envelope(&self) -> CryptoResult<KeyEnvelope> {
        KeyEnvelope::from_wire(&self.encapsulated_key, self.folder_id.as_deref())
    }
}

/// A wrapped-key record: the `EncryptedResource`-shaped record returned by
/// the vault-key and folder-key endpoints. Its "DEK" is the vault or
/// folder key itself; `encrypted_data` is unused and empty.
pub type WrappedKeyRecord = EncryptedResource;

/// A decrypted domain record: the encrypted field map plus the plaintext
/// metadata that participates in integrity hashing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlainResource {
    pub resource_id: String,
    /// Encrypted-at-rest fields. BTreeMap gives a canonical (sorted-key)
    /// serialization for payload bytes and record hashing.
    pub fields: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl PlainResource {
    pub fn new(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            fields: BTreeMap::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A resource DEK re-wrapped for a specific recipient identity.
///
/// `encrypted_shared_key` is `hex(KEM ciphertext) + ":" + hex(iv ‖ wrapped
/// DEK)`: the ciphertext lets the recipient decapsulate the shared secret
/// that unwraps the DEK. Immutable once issued; revocation deletes it
/// server-side without rotating the underlying DEK.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareGrant {
    pub resource_id: String,
    /// Recipient's published KEM public key, hex-encoded.
    pub recipient_public_key: String,
    pub encrypted_shared_key: String,
}

/// Payload submitted to create a share link. The link key itself never
/// appears here — it exists only in the URL fragment.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareLinkRequest {
    pub resource_id: String,
    /// `hex(iv ‖ DEK wrapped under the link key)`.
    pub encrypted_key: String,
    pub is_public: bool,
}

/// Outcome of a batch decryption. One record's authentication failure
/// never aborts the rest of the batch.
#[derive(Debug, Default)]
pub struct BatchDecryptOutcome {
    pub decrypted: Vec<PlainResource>,
    /// `(resource_id, error)` for each record that failed.
    pub failed: Vec<(String, crate::error::ClientError)>,
}
