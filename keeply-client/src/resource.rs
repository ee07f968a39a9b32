//! Record encryption and decryption.
//!
//! Every record gets a fresh random DEK. The plaintext field map is
//! serialized canonically (sorted keys), AEAD-encrypted with the DEK, and
//! the DEK is wrapped under the resolved wrapping key. `record_hash`
//! covers the canonical plaintext fields plus the plaintext-adjacent
//! metadata, binding tamper-evidence to both.

use crate::error::ClientResult;
use crate::resolver::KeyResolver;
use crate::session::Session;
use crate::types::{BatchDecryptOutcome, EncryptedResource, PlainResource};
use keeply_crypto::{
    decode_encrypted_data, decode_wrapped_key, decrypt_bytes, encode_encrypted_data,
    encode_wrapped_key, encrypt_bytes, unwrap_key, wrap_key, KeyEnvelope, SymmetricKey,
};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Fixed key for legacy `GLOBAL`-tagged records. Read-only compatibility:
/// these records predate per-identity key binding and can never be
/// re-shared.
fn legacy_global_key() -> SymmetricKey {
    let digest = Sha256::digest(b"keeply-legacy-global-key-v1");
    SymmetricKey::from_bytes(digest.into())
}

/// Encrypts and decrypts domain records (files, tasks, events, courses).
#[derive(Clone)]
pub struct ResourceCrypter {
    session: Session,
    resolver: KeyResolver,
}

impl ResourceCrypter {
    pub fn new(session: Session, resolver: KeyResolver) -> Self {
        Self { session, resolver }
    }

    /// Content hash over the record id, canonical plaintext fields and the
    /// integrity-participating metadata (status, due date, …).
    pub fn record_hash(plain: &PlainResource) -> ClientResult<String> {
        let mut hasher = Sha256::new();
        hasher.update(plain.resource_id.as_bytes());
        hasher.update(serde_json::to_vec(&plain.fields)?);
        hasher.update(serde_json::to_vec(&plain.metadata)?);
        Ok(hex::encode(hasher.finalize()))
    }

    /// Encrypts a brand-new owned record: the DEK is wrapped under a fresh
    /// shared secret encapsulated to the owner's own identity, producing a
    /// real KEM ciphertext (never a sentinel).
    pub async fn encrypt_owned(&self, plain: &PlainResource) -> ClientResult<EncryptedResource> {
        let public_key = self.session.public_key().await?;
        let (shared, ciphertext) = self.session.encapsulate(public_key).await?;
        self.encrypt_with(plain, &shared, KeyEnvelope::Direct(ciphertext), None)
    }

    /// Encrypts a record scoped to a folder: the DEK is wrapped under the
    /// folder's key and the record is tagged `FOLDER`.
    pub async fn encrypt_in_folder(
        &self,
        plain: &PlainResource,
        folder_id: &str,
    ) -> ClientResult<EncryptedResource> {
        let folder_key = self.resolver.folder_key(folder_id).await?;
        self.encrypt_with(
            plain,
            &folder_key,
            KeyEnvelope::Folder(folder_id.to_string()),
            Some(folder_id),
        )
    }

    fn encrypt_with(
        &self,
        plain: &PlainResource,
        wrapping_key: &SymmetricKey,
        envelope: KeyEnvelope,
        folder_id: Option<&str>,
    ) -> ClientResult<EncryptedResource> {
        let dek = SymmetricKey::generate();
        let payload = serde_json::to_vec(&plain.fields)?;
        let encrypted = encrypt_bytes(&dek, &payload)?;
        let wrapped = wrap_key(dek.as_bytes(), wrapping_key)?;

        Ok(EncryptedResource {
            resource_id: plain.resource_id.clone(),
            folder_id: folder_id.map(str::to_string),
            encrypted_data: encode_encrypted_data(&encrypted)?,
            encapsulated_key: envelope.to_wire(),
            encrypted_symmetric_key: encode_wrapped_key(&wrapped),
            record_hash: Self::record_hash(plain)?,
            metadata: plain.metadata.clone(),
        })
    }

    /// Decrypts a record. Legacy `GLOBAL` records decrypt read-only under
    /// the fixed legacy key; everything else resolves through the key
    /// resolver.
    pub async fn decrypt(&self, resource: &EncryptedResource) -> ClientResult<PlainResource> {
        let dek = self.unwrap_dek(resource).await?;
        self.decrypt_with_key(resource, &dek)
    }

    /// Decrypts a record with an already-unwrapped DEK (e.g. one obtained
    /// from a share grant or a link fragment).
    pub fn decrypt_with_key(
        &self,
        resource: &EncryptedResource,
        dek: &SymmetricKey,
    ) -> ClientResult<PlainResource> {
        let blob = decode_encrypted_data(&resource.encrypted_data)?;
        let payload = decrypt_bytes(dek, &blob)?;
        let fields: BTreeMap<String, serde_json::Value> = serde_json::from_slice(&payload)?;

        Ok(PlainResource {
            resource_id: resource.resource_id.clone(),
            fields,
            metadata: resource.metadata.clone(),
        })
    }

    /// Decrypts a batch. Partial-failure tolerant: a record that fails
    /// authentication is skipped and reported, never re-thrown, so one
    /// tampered record cannot hide the rest of the data set.
    pub async fn decrypt_batch(&self, resources: &[EncryptedResource]) -> BatchDecryptOutcome {
        let mut outcome = BatchDecryptOutcome::default();
        for resource in resources {
            match self.decrypt(resource).await {
                Ok(plain) => outcome.decrypted.push(plain),
                Err(err) => {
                    warn!(
                        resource_id = %resource.resource_id,
                        error = %err,
                        "batch decrypt: skipping record"
                    );
                    outcome.failed.push((resource.resource_id.clone(), err));
                }
            }
        }
        outcome
    }

    /// Re-wraps an owned record's DEK under a folder key, retagging it
    /// `FOLDER`. Used when a record is organized into a folder after
    /// creation. Payload bytes and record hash are untouched.
    pub async fn rewrap_for_folder(
        &self,
        resource: &EncryptedResource,
        folder_id: &str,
    ) -> ClientResult<EncryptedResource> {
        let dek = self.unwrap_dek(resource).await?;
        let folder_key = self.resolver.folder_key(folder_id).await?;
        let wrapped = wrap_key(dek.as_bytes(), &folder_key)?;

        debug!(resource_id = %resource.resource_id, folder_id, "rewrapped record DEK");
        Ok(EncryptedResource {
            folder_id: Some(folder_id.to_string()),
            encapsulated_key: KeyEnvelope::Folder(folder_id.to_string()).to_wire(),
            encrypted_symmetric_key: encode_wrapped_key(&wrapped),
            ..resource.clone()
        })
    }

    /// Unwraps a record's DEK for decryption. Unlike the resolver path,
    /// legacy records are allowed here — read access only.
    async fn unwrap_dek(&self, resource: &EncryptedResource) -> ClientResult<SymmetricKey> {
        let wrapping = match resource.key_envelope()? {
            KeyEnvelope::LegacyGlobal => legacy_global_key(),
            _ => self.resolver.resolve_wrapping_key(resource).await?,
        };
        let wrapped = decode_wrapped_key(&resource.encrypted_symmetric_key)?;
        let dek_bytes = unwrap_key(&wrapped, &wrapping)?;
        Ok(SymmetricKey::from_slice(&dek_bytes)?)
    }
}

/// Encrypts a legacy-format record under the fixed global key. Only used
/// by migration tooling and tests; new records must never be written in
/// this mode.
pub fn encrypt_legacy_global(plain: &PlainResource) -> ClientResult<EncryptedResource> {
    let dek = SymmetricKey::generate();
    let payload = serde_json::to_vec(&plain.fields)?;
    let encrypted = encrypt_bytes(&dek, &payload)?;
    let wrapped = wrap_key(dek.as_bytes(), &legacy_global_key())?;

    Ok(EncryptedResource {
        resource_id: plain.resource_id.clone(),
        folder_id: None,
        encrypted_data: encode_encrypted_data(&encrypted)?,
        encapsulated_key: KeyEnvelope::LegacyGlobal.to_wire(),
        encrypted_symmetric_key: encode_wrapped_key(&wrapped),
        record_hash: ResourceCrypter::record_hash(plain)?,
        metadata: plain.metadata.clone(),
    })
}
