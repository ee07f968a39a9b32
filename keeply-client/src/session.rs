//! Session key state.
//!
//! A session is created at sign-in by deriving the identity keypair from
//! the password and salt, then fetching and unwrapping the vault key.
//! Sign-out clears the identity secret (held by the KEM worker), the vault
//! key and the folder-key cache; any operation that races a sign-out fails
//! with [`ClientError::Locked`] rather than seeing stale key material.

use crate::api::CoreApi;
use crate::error::{ClientError, ClientResult};
use crate::resolver::FolderKeyCache;
use crate::types::WrappedKeyRecord;
use crate::worker::KemWorkerHandle;
use keeply_crypto::{
    decode_wrapped_key, derive_seed, encode_wrapped_key, unwrap_key, wrap_key, CryptoError,
    KemCiphertext, KeyEnvelope, PublicKey, SymmetricKey,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

struct SessionState {
    public_key: PublicKey,
    vault_key: SymmetricKey,
}

/// The signed-in identity's key state. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Session {
    api: Arc<dyn CoreApi>,
    worker: KemWorkerHandle,
    state: Arc<RwLock<Option<SessionState>>>,
    folder_cache: FolderKeyCache,
}

impl Session {
    pub fn new(api: Arc<dyn CoreApi>, worker: KemWorkerHandle) -> Self {
        Self {
            api,
            worker,
            state: Arc::new(RwLock::new(None)),
            folder_cache: FolderKeyCache::default(),
        }
    }

    /// Derives the identity keypair from password + salt and unwraps the
    /// server-stored vault key. The same password and salt always recover
    /// the same identity.
    ///
    /// A failed sign-in (wrong password, missing record, transport error)
    /// leaves the session locked: the worker already holds the unverified
    /// identity at that point, so any prior session state would no longer
    /// match it and is cleared along with it.
    pub async fn sign_in(&self, password: &str, salt: &[u8]) -> ClientResult<()> {
        let seed = derive_seed(password, salt);
        let public_key = self.worker.keygen(seed).await?;

        let vault_key = match self.fetch_and_unwrap_vault_key().await {
            Ok(key) => key,
            Err(err) => {
                let _ = self.worker.clear().await;
                *self.state.write().await = None;
                self.folder_cache.clear().await;
                return Err(err);
            }
        };

        let mut state = self.state.write().await;
        *state = Some(SessionState {
            public_key,
            vault_key,
        });
        info!("session signed in");
        Ok(())
    }

    async fn fetch_and_unwrap_vault_key(&self) -> ClientResult<SymmetricKey> {
        let record = self.api.fetch_vault_key().await?;
        self.unwrap_key_record(&record).await
    }

    /// First-time account setup: generates a fresh vault key, wraps it
    /// under the identity, and returns the record for the server to store.
    /// The caller must already be keyed (via [`Session::sign_in`] against
    /// an account with a vault record, or a prior `keygen`).
    pub async fn initialize_vault(
        &self,
        password: &str,
        salt: &[u8],
    ) -> ClientResult<WrappedKeyRecord> {
        let seed = derive_seed(password, salt);
        let public_key = self.worker.keygen(seed).await?;

        let vault_key = SymmetricKey::generate();
        let (shared, ciphertext) = self.worker.encapsulate(public_key.clone()).await?;
        let wrapped = wrap_key(vault_key.as_bytes(), &shared)?;

        let record = WrappedKeyRecord {
            resource_id: "vault".to_string(),
            folder_id: None,
            encrypted_data: String::new(),
            encapsulated_key: KeyEnvelope::Direct(ciphertext).to_wire(),
            encrypted_symmetric_key: encode_wrapped_key(&wrapped),
            record_hash: String::new(),
            metadata: Default::default(),
        };

        let mut state = self.state.write().await;
        *state = Some(SessionState {
            public_key,
            vault_key,
        });
        info!("vault initialized");
        Ok(record)
    }

    /// Clears the identity secret, vault key and folder-key cache. Pending
    /// operations fail closed afterwards.
    pub async fn sign_out(&self) -> ClientResult<()> {
        self.worker.clear().await?;
        *self.state.write().await = None;
        self.folder_cache.clear().await;
        info!("session signed out");
        Ok(())
    }

    pub async fn is_unlocked(&self) -> bool {
        self.state.read().await.is_some()
    }

    /// The identity's published public key.
    pub async fn public_key(&self) -> ClientResult<PublicKey> {
        self.state
            .read()
            .await
            .as_ref()
            .map(|s| s.public_key.clone())
            .ok_or(ClientError::Locked)
    }

    /// The unwrapped vault master key.
    pub async fn vault_key(&self) -> ClientResult<SymmetricKey> {
        self.state
            .read()
            .await
            .as_ref()
            .map(|s| s.vault_key.clone())
            .ok_or(ClientError::Locked)
    }

    /// Decapsulates with the identity secret key (on the KEM worker).
    pub async fn decapsulate(&self, ciphertext: KemCiphertext) -> ClientResult<SymmetricKey> {
        self.worker.decapsulate(ciphertext).await
    }

    /// Encapsulates a fresh shared secret under `public_key` (on the KEM
    /// worker).
    pub async fn encapsulate(
        &self,
        public_key: PublicKey,
    ) -> ClientResult<(SymmetricKey, KemCiphertext)> {
        self.worker.encapsulate(public_key).await
    }

    pub(crate) fn folder_cache(&self) -> &FolderKeyCache {
        &self.folder_cache
    }

    pub(crate) fn api(&self) -> &Arc<dyn CoreApi> {
        &self.api
    }

    /// Unwraps a key record whose envelope is a KEM ciphertext bound to
    /// this identity (the vault-key record shape).
    async fn unwrap_key_record(&self, record: &WrappedKeyRecord) -> ClientResult<SymmetricKey> {
        let ciphertext = match record.key_envelope()? {
            KeyEnvelope::Direct(ct) => ct,
            other => {
                debug!(?other, "vault key record with non-direct envelope");
                return Err(CryptoError::Encoding(
                    "vault key record must carry a KEM ciphertext".to_string(),
                )
                .into());
            }
        };
        let shared = self.worker.decapsulate(ciphertext).await?;
        let wrapped = decode_wrapped_key(&record.encrypted_symmetric_key)?;
        let key_bytes = unwrap_key(&wrapped, &shared)?;
        Ok(SymmetricKey::from_slice(&key_bytes)?)
    }
}
