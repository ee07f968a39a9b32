//! The two sharing protocols.
//!
//! Both re-wrap a resource's DEK without ever exposing it to the server:
//!
//! - **Direct sharing** encapsulates a fresh shared secret under the
//!   recipient's published KEM public key and wraps the DEK under it.
//! - **Link sharing** wraps the DEK under a locally generated link key
//!   that travels only in the URL fragment — never in a request body,
//!   query string, header or log line.
//!
//! Legacy `GLOBAL` records are rejected up front by both variants.
//! Revoking a grant or link deletes it server-side but does not rotate
//! the underlying DEK: a recipient who already cached the unwrapped key
//! retains access. Known, documented limitation.

use crate::api::CoreApi;
use crate::error::{ClientError, ClientResult};
use crate::resolver::KeyResolver;
use crate::session::Session;
use crate::types::{EncryptedResource, ShareGrant, ShareLinkRequest};
use keeply_crypto::{
    compose_share_link, decode_wrapped_key, parse_share_link, unwrap_key, wrap_key, CryptoError,
    KemCiphertext, KeyEnvelope, PublicKey, SymmetricKey, LINK_KEY_SIZE,
};
use rand::rngs::OsRng;
use rand::RngCore;
use std::sync::Arc;
use tracing::{debug, info};

/// Orchestrates direct and link sharing.
#[derive(Clone)]
pub struct ShareManager {
    api: Arc<dyn CoreApi>,
    session: Session,
    resolver: KeyResolver,
}

impl ShareManager {
    pub fn new(api: Arc<dyn CoreApi>, session: Session, resolver: KeyResolver) -> Self {
        Self {
            api,
            session,
            resolver,
        }
    }

    /// Re-wraps `resource`'s DEK for the identity registered at `address`
    /// and submits the grant.
    ///
    /// Fails with [`ClientError::RecipientNotFound`] when no public key is
    /// registered for the address, and with `UnsupportedLegacyMode` when
    /// the source record is `GLOBAL`-tagged.
    pub async fn share_direct(
        &self,
        resource: &EncryptedResource,
        address: &str,
    ) -> ClientResult<ShareGrant> {
        reject_legacy(resource)?;
        let dek = self.resolver.resource_dek(resource).await?;

        let pk_bytes = self
            .api
            .lookup_public_key(address)
            .await?
            .ok_or_else(|| ClientError::RecipientNotFound {
                address: address.to_string(),
            })?;
        let recipient_key = PublicKey::from_bytes(&pk_bytes)?;

        let (shared, ciphertext) = self.session.encapsulate(recipient_key).await?;
        let wrapped = wrap_key(dek.as_bytes(), &shared)?;

        let grant = ShareGrant {
            resource_id: resource.resource_id.clone(),
            recipient_public_key: hex::encode(&pk_bytes),
            encrypted_shared_key: format!(
                "{}:{}",
                hex::encode(ciphertext.as_bytes()),
                hex::encode(&wrapped)
            ),
        };
        self.api.submit_share_grant(&grant).await?;
        info!(resource_id = %resource.resource_id, "shared record with {address}");
        Ok(grant)
    }

    /// Recipient side of direct sharing: decapsulates the grant's shared
    /// secret with the session identity and unwraps the DEK.
    pub async fn accept_grant(&self, grant: &ShareGrant) -> ClientResult<SymmetricKey> {
        let (ct_hex, wrapped_hex) = grant.encrypted_shared_key.split_once(':').ok_or_else(|| {
            CryptoError::Encoding("grant shared key missing ':'".to_string())
        })?;

        let ct_bytes = hex::decode(ct_hex)
            .map_err(|e| CryptoError::Encoding(format!("bad grant ciphertext: {e}")))?;
        let ciphertext = KemCiphertext::from_bytes(&ct_bytes)?;
        let wrapped = decode_wrapped_key(wrapped_hex)?;

        let shared = self.session.decapsulate(ciphertext).await?;
        let dek_bytes = unwrap_key(&wrapped, &shared)?;
        Ok(SymmetricKey::from_slice(&dek_bytes)?)
    }

    /// Creates a public share link: wraps the DEK under a fresh link key
    /// and returns the full shareable address. The link key leaves this
    /// function only inside the returned URL fragment.
    pub async fn create_share_link(
        &self,
        resource: &EncryptedResource,
        origin: &str,
        is_public: bool,
    ) -> ClientResult<String> {
        reject_legacy(resource)?;
        let dek = self.resolver.resource_dek(resource).await?;

        let mut link_key_bytes = [0u8; LINK_KEY_SIZE];
        OsRng.fill_bytes(&mut link_key_bytes);
        let link_key = SymmetricKey::from_bytes(link_key_bytes);

        let wrapped = wrap_key(dek.as_bytes(), &link_key)?;
        let request = ShareLinkRequest {
            resource_id: resource.resource_id.clone(),
            encrypted_key: hex::encode(&wrapped),
            is_public,
        };
        let token = self.api.submit_share_link(&request).await?;
        debug!(resource_id = %resource.resource_id, token, "share link created");

        Ok(compose_share_link(origin, &token, &link_key_bytes))
    }

    /// Visitor side of link sharing: extracts the fragment key, fetches
    /// the wrapped DEK by token, and unwraps it locally.
    pub async fn open_share_link(&self, address: &str) -> ClientResult<SymmetricKey> {
        let (token, link_key_bytes) = parse_share_link(address)?;
        let link_key = SymmetricKey::from_bytes(link_key_bytes);

        let encrypted_key = self.api.fetch_share_link(&token).await?;
        let wrapped = decode_wrapped_key(&encrypted_key)?;
        let dek_bytes = unwrap_key(&wrapped, &link_key)?;
        Ok(SymmetricKey::from_slice(&dek_bytes)?)
    }

    /// Deletes a grant. The DEK is not rotated.
    pub async fn revoke_grant(&self, resource_id: &str, address: &str) -> ClientResult<()> {
        self.api.revoke_share_grant(resource_id, address).await?;
        info!(resource_id, "revoked grant for {address}");
        Ok(())
    }

    /// Deletes a share link. The DEK is not rotated.
    pub async fn revoke_link(&self, token: &str) -> ClientResult<()> {
        self.api.revoke_share_link(token).await?;
        info!(token, "revoked share link");
        Ok(())
    }
}

/// Legacy records can never be shared, by either variant. Checked before
/// any network call so the rejection is unconditional.
fn reject_legacy(resource: &EncryptedResource) -> ClientResult<()> {
    if matches!(resource.key_envelope()?, KeyEnvelope::LegacyGlobal) {
        return Err(CryptoError::UnsupportedLegacyMode.into());
    }
    Ok(())
}
