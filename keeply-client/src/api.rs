//! Collaborator endpoints consumed by the session core.
//!
//! Transport, routing, persistence and retries are black boxes behind
//! [`CoreApi`]; this core only defines the payload shapes it produces and
//! accepts. The in-memory implementation backs the test suite and records
//! every submitted payload so tests can inspect exactly what would cross
//! the wire.

use crate::error::{ClientError, ClientResult};
use crate::types::{ShareGrant, ShareLinkRequest, WrappedKeyRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// The endpoints this core consumes, specified only by payload shape.
#[async_trait]
pub trait CoreApi: Send + Sync {
    /// Discovery lookup: the published KEM public key for an address, or
    /// `None` when no key is registered.
    async fn lookup_public_key(&self, address: &str) -> ClientResult<Option<Vec<u8>>>;

    /// The current identity's wrapped vault-key record.
    async fn fetch_vault_key(&self) -> ClientResult<WrappedKeyRecord>;

    /// A folder's wrapped-key record.
    async fn fetch_folder_key(&self, folder_id: &str) -> ClientResult<WrappedKeyRecord>;

    /// Submits a direct share grant.
    async fn submit_share_grant(&self, grant: &ShareGrant) -> ClientResult<()>;

    /// Submits a share link request, returning the opaque token.
    async fn submit_share_link(&self, request: &ShareLinkRequest) -> ClientResult<String>;

    /// Fetches a share link's `encrypted_key` by token.
    async fn fetch_share_link(&self, token: &str) -> ClientResult<String>;

    /// Deletes a grant server-side. Does not rotate the underlying DEK;
    /// a recipient who cached the unwrapped key retains access.
    async fn revoke_share_grant(&self, resource_id: &str, address: &str) -> ClientResult<()>;

    /// Deletes a share link server-side. Same non-rotation caveat.
    async fn revoke_share_link(&self, token: &str) -> ClientResult<()>;
}

#[derive(Default)]
struct MemoryState {
    public_keys: HashMap<String, Vec<u8>>,
    vault_key_record: Option<WrappedKeyRecord>,
    folder_key_records: HashMap<String, WrappedKeyRecord>,
    grants: Vec<ShareGrant>,
    links: HashMap<String, ShareLinkRequest>,
    /// Raw JSON of every submitted payload, in order.
    submissions: Vec<serde_json::Value>,
    folder_fetch_counts: HashMap<String, u64>,
}

/// In-memory API double for tests. No transport involved.
#[derive(Clone, Default)]
pub struct MemoryApi {
    state: Arc<Mutex<MemoryState>>,
    token_counter: Arc<AtomicU64>,
}

impl MemoryApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_public_key(&self, address: &str, public_key: Vec<u8>) {
        self.state
            .lock()
            .await
            .public_keys
            .insert(address.to_string(), public_key);
    }

    pub async fn put_vault_key_record(&self, record: WrappedKeyRecord) {
        self.state.lock().await.vault_key_record = Some(record);
    }

    pub async fn put_folder_key_record(&self, folder_id: &str, record: WrappedKeyRecord) {
        self.state
            .lock()
            .await
            .folder_key_records
            .insert(folder_id.to_string(), record);
    }

    /// Everything submitted so far, as raw JSON. Lets tests assert on the
    /// exact payloads that would cross the wire (e.g. link-key secrecy).
    pub async fn submissions(&self) -> Vec<serde_json::Value> {
        self.state.lock().await.submissions.clone()
    }

    pub async fn grants(&self) -> Vec<ShareGrant> {
        self.state.lock().await.grants.clone()
    }

    /// How many times a folder's key record has been fetched.
    pub async fn folder_fetch_count(&self, folder_id: &str) -> u64 {
        self.state
            .lock()
            .await
            .folder_fetch_counts
            .get(folder_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl CoreApi for MemoryApi {
    async fn lookup_public_key(&self, address: &str) -> ClientResult<Option<Vec<u8>>> {
        Ok(self.state.lock().await.public_keys.get(address).cloned())
    }

    async fn fetch_vault_key(&self) -> ClientResult<WrappedKeyRecord> {
        self.state
            .lock()
            .await
            .vault_key_record
            .clone()
            .ok_or_else(|| ClientError::NotFound("vault key record".to_string()))
    }

    async fn fetch_folder_key(&self, folder_id: &str) -> ClientResult<WrappedKeyRecord> {
        let mut state = self.state.lock().await;
        *state
            .folder_fetch_counts
            .entry(folder_id.to_string())
            .or_insert(0) += 1;
        // Yield so concurrent resolutions overlap in tests
        let record = state.folder_key_records.get(folder_id).cloned();
        drop(state);
        tokio::task::yield_now().await;

        record.ok_or_else(|| ClientError::NotFound(format!("folder key for {folder_id}")))
    }

    async fn submit_share_grant(&self, grant: &ShareGrant) -> ClientResult<()> {
        let mut state = self.state.lock().await;
        state.submissions.push(serde_json::to_value(grant)?);
        state.grants.push(grant.clone());
        Ok(())
    }

    async fn submit_share_link(&self, request: &ShareLinkRequest) -> ClientResult<String> {
        let token = format!("tok-{}", self.token_counter.fetch_add(1, Ordering::SeqCst));
        let mut state = self.state.lock().await;
        state.submissions.push(serde_json::to_value(request)?);
        state.links.insert(token.clone(), request.clone());
        Ok(token)
    }

    async fn fetch_share_link(&self, token: &str) -> ClientResult<String> {
        self.state
            .lock()
            .await
            .links
            .get(token)
            .map(|req| req.encrypted_key.clone())
            .ok_or_else(|| ClientError::NotFound(format!("share link {token}")))
    }

    async fn revoke_share_grant(&self, resource_id: &str, address: &str) -> ClientResult<()> {
        let mut state = self.state.lock().await;
        let before = state.grants.len();
        state.grants.retain(|g| g.resource_id != resource_id);
        if state.grants.len() == before {
            return Err(ClientError::NotFound(format!(
                "grant for {resource_id} -> {address}"
            )));
        }
        Ok(())
    }

    async fn revoke_share_link(&self, token: &str) -> ClientResult<()> {
        self.state
            .lock()
            .await
            .links
            .remove(token)
            .map(|_| ())
            .ok_or_else(|| ClientError::NotFound(format!("share link {token}")))
    }
}
