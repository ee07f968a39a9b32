//! Vault and folder key resolution.
//!
//! Every domain encryption path funnels through
//! [`KeyResolver::resolve_wrapping_key`]: given an encrypted record, it
//! produces the symmetric key that unwraps the record's DEK. Folder keys
//! are cached for the session, and concurrent resolutions of the same
//! folder share exactly one in-flight fetch — decapsulation and the key
//! fetch are both too expensive to duplicate.

use crate::error::{ClientError, ClientResult};
use crate::session::Session;
use crate::types::EncryptedResource;
use keeply_crypto::{decode_wrapped_key, unwrap_key, CryptoError, KeyEnvelope, SymmetricKey};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

/// Session-scoped folder-key cache. Entries are created lazily on first
/// access and evicted only on sign-out. The per-folder `OnceCell` is what
/// collapses concurrent resolutions into a single in-flight fetch.
#[derive(Clone, Default)]
pub struct FolderKeyCache {
    cells: Arc<Mutex<HashMap<String, Arc<OnceCell<SymmetricKey>>>>>,
}

impl FolderKeyCache {
    async fn cell(&self, folder_id: &str) -> Arc<OnceCell<SymmetricKey>> {
        let mut cells = self.cells.lock().await;
        cells
            .entry(folder_id.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    pub(crate) async fn clear(&self) {
        self.cells.lock().await.clear();
    }
}

/// Resolves the wrapping key for any encrypted record.
#[derive(Clone)]
pub struct KeyResolver {
    session: Session,
}

type BoxedKeyFuture<'a> = Pin<Box<dyn Future<Output = ClientResult<SymmetricKey>> + Send + 'a>>;

impl KeyResolver {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// Produces the symmetric key that unwraps `resource`'s DEK.
    ///
    /// - `Direct` envelopes decapsulate with the session identity.
    /// - `Folder` envelopes resolve the folder key (cached, single-flight),
    ///   recursing through the folder's own key record.
    /// - `LegacyGlobal` is rejected: such records are readable through the
    ///   fixed legacy key on the decrypt path only and must never feed the
    ///   sharing protocol.
    pub async fn resolve_wrapping_key(
        &self,
        resource: &EncryptedResource,
    ) -> ClientResult<SymmetricKey> {
        match resource.key_envelope()? {
            KeyEnvelope::LegacyGlobal => Err(CryptoError::UnsupportedLegacyMode.into()),
            KeyEnvelope::Folder(folder_id) => self.folder_key(&folder_id).await,
            KeyEnvelope::Direct(ciphertext) => self.session.decapsulate(ciphertext).await,
        }
    }

    /// Resolves and unwraps a resource's DEK. Rejects legacy records.
    pub async fn resource_dek(&self, resource: &EncryptedResource) -> ClientResult<SymmetricKey> {
        let wrapping = self.resolve_wrapping_key(resource).await?;
        let wrapped = decode_wrapped_key(&resource.encrypted_symmetric_key)?;
        let dek_bytes = unwrap_key(&wrapped, &wrapping)?;
        Ok(SymmetricKey::from_slice(&dek_bytes)?)
    }

    /// The folder's symmetric key, from cache or a deduplicated fetch.
    pub async fn folder_key(&self, folder_id: &str) -> ClientResult<SymmetricKey> {
        let mut trail = HashSet::new();
        self.folder_key_with_trail(folder_id, &mut trail).await
    }

    /// Cache lookup with the resolution trail threaded through. The server
    /// is untrusted: a key record whose parent chain loops back on itself
    /// must surface an error, never re-enter an in-flight cell and hang.
    fn folder_key_with_trail<'a>(
        &'a self,
        folder_id: &'a str,
        trail: &'a mut HashSet<String>,
    ) -> BoxedKeyFuture<'a> {
        Box::pin(async move {
            if !trail.insert(folder_id.to_string()) {
                return Err(CryptoError::Encoding(format!(
                    "folder key chain loops back to {folder_id}"
                ))
                .into());
            }
            let cell = self.session.folder_cache().cell(folder_id).await;
            cell.get_or_try_init(|| self.fetch_and_unwrap_folder_key(folder_id, trail))
                .await
                .map(|key| key.clone())
        })
    }

    /// Fetches a folder's wrapped-key record and unwraps it by resolving
    /// the folder's own wrapping key (the vault binding or a shared
    /// secret, or recursively a parent folder).
    ///
    /// Boxed because folder records can nest.
    fn fetch_and_unwrap_folder_key<'a>(
        &'a self,
        folder_id: &'a str,
        trail: &'a mut HashSet<String>,
    ) -> BoxedKeyFuture<'a> {
        Box::pin(async move {
            if !self.session.is_unlocked().await {
                return Err(ClientError::Locked);
            }
            debug!(folder_id, "fetching folder key record");
            let record = self.session.api().fetch_folder_key(folder_id).await?;

            let wrapping = match record.key_envelope()? {
                KeyEnvelope::LegacyGlobal => {
                    return Err(CryptoError::UnsupportedLegacyMode.into());
                }
                KeyEnvelope::Folder(parent_id) => {
                    self.folder_key_with_trail(&parent_id, trail).await?
                }
                KeyEnvelope::Direct(ciphertext) => self.session.decapsulate(ciphertext).await?,
            };

            let wrapped = decode_wrapped_key(&record.encrypted_symmetric_key)?;
            let key_bytes = unwrap_key(&wrapped, &wrapping)?;
            let key = SymmetricKey::from_slice(&key_bytes)?;
            debug!(folder_id, "folder key cached");
            Ok(key)
        })
    }
}
