//! Shared test environment: an in-memory API with a signed-in session.

use keeply_client::api::{CoreApi, MemoryApi};
use keeply_client::{
    spawn_kem_worker, KeyResolver, PlainResource, ResourceCrypter, Session, ShareManager,
    WrappedKeyRecord,
};
use keeply_crypto::{encode_wrapped_key, wrap_key, KeyEnvelope, SymmetricKey};
use serde_json::json;
use std::sync::Arc;

pub struct TestEnv {
    pub api: MemoryApi,
    pub session: Session,
    pub resolver: KeyResolver,
    pub crypter: ResourceCrypter,
    pub shares: ShareManager,
}

/// Builds an identity on the shared API. Only the first environment's
/// vault record is registered; secondary identities (share recipients)
/// keep their session state without a server-side vault record.
pub async fn identity_env(api: &MemoryApi, password: &str, salt: &[u8], primary: bool) -> TestEnv {
    let api_arc: Arc<dyn CoreApi> = Arc::new(api.clone());
    let worker = spawn_kem_worker();
    let session = Session::new(api_arc.clone(), worker);

    let vault_record = session.initialize_vault(password, salt).await.unwrap();
    if primary {
        api.put_vault_key_record(vault_record).await;
    }

    let resolver = KeyResolver::new(session.clone());
    let crypter = ResourceCrypter::new(session.clone(), resolver.clone());
    let shares = ShareManager::new(api_arc, session.clone(), resolver.clone());

    TestEnv {
        api: api.clone(),
        session,
        resolver,
        crypter,
        shares,
    }
}

pub async fn signed_in_env() -> TestEnv {
    let api = MemoryApi::new();
    identity_env(&api, "correct-horse-battery-staple", b"user-salt-1", true).await
}

/// Creates a folder key record on the API, wrapped under a fresh shared
/// secret encapsulated to this environment's identity. Returns the folder
/// key for direct comparison in tests.
pub async fn make_folder(env: &TestEnv, folder_id: &str) -> SymmetricKey {
    let folder_key = SymmetricKey::generate();
    let record = folder_record_for(env, folder_id, &folder_key, None).await;
    env.api.put_folder_key_record(folder_id, record).await;
    folder_key
}

/// Creates a folder whose own key record is wrapped under a parent
/// folder's key (nested folder).
pub async fn make_nested_folder(
    env: &TestEnv,
    folder_id: &str,
    parent_id: &str,
    parent_key: &SymmetricKey,
) -> SymmetricKey {
    let folder_key = SymmetricKey::generate();
    let wrapped = wrap_key(folder_key.as_bytes(), parent_key).unwrap();
    let record = WrappedKeyRecord {
        resource_id: format!("folder-{folder_id}"),
        folder_id: Some(parent_id.to_string()),
        encrypted_data: String::new(),
        encapsulated_key: KeyEnvelope::Folder(parent_id.to_string()).to_wire(),
        encrypted_symmetric_key: encode_wrapped_key(&wrapped),
        record_hash: String::new(),
        metadata: Default::default(),
    };
    env.api.put_folder_key_record(folder_id, record).await;
    folder_key
}

async fn folder_record_for(
    env: &TestEnv,
    folder_id: &str,
    folder_key: &SymmetricKey,
    parent: Option<&str>,
) -> WrappedKeyRecord {
    let public_key = env.session.public_key().await.unwrap();
    let (shared, ciphertext) = env.session.encapsulate(public_key).await.unwrap();
    let wrapped = wrap_key(folder_key.as_bytes(), &shared).unwrap();
    WrappedKeyRecord {
        resource_id: format!("folder-{folder_id}"),
        folder_id: parent.map(str::to_string),
        encrypted_data: String::new(),
        encapsulated_key: KeyEnvelope::Direct(ciphertext).to_wire(),
        encrypted_symmetric_key: encode_wrapped_key(&wrapped),
        record_hash: String::new(),
        metadata: Default::default(),
    }
}

pub fn sample_task(resource_id: &str) -> PlainResource {
    PlainResource::new(resource_id)
        .with_field("title", json!("finish lab report"))
        .with_field("notes", json!("sections 3 and 4 still missing"))
        .with_field("priority", json!(2))
        .with_metadata("status", "in_progress")
        .with_metadata("due_date", "2026-09-15")
}
