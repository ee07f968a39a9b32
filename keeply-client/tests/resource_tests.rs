mod support;

use keeply_client::{encrypt_legacy_global, ResourceCrypter};
use keeply_crypto::{decode_encrypted_data, decode_wrapped_key, encode_encrypted_data, encode_wrapped_key};
use pretty_assertions::assert_eq;
use serde_json::json;
use support::{make_folder, sample_task, signed_in_env};

#[tokio::test]
async fn owned_record_roundtrip() {
    let env = signed_in_env().await;
    let plain = sample_task("task-1");

    let encrypted = env.crypter.encrypt_owned(&plain).await.unwrap();
    // A brand-new owned record carries a real KEM ciphertext, not a sentinel
    assert_ne!(encrypted.encapsulated_key, "FOLDER");
    assert_ne!(encrypted.encapsulated_key, "GLOBAL");
    assert!(encrypted.encrypted_data.contains(':'));

    let decrypted = env.crypter.decrypt(&encrypted).await.unwrap();
    assert_eq!(decrypted, plain);
}

#[tokio::test]
async fn folder_record_roundtrip() {
    let env = signed_in_env().await;
    make_folder(&env, "folder-x").await;
    let plain = sample_task("task-2");

    let encrypted = env.crypter.encrypt_in_folder(&plain, "folder-x").await.unwrap();
    assert_eq!(encrypted.encapsulated_key, "FOLDER");
    assert_eq!(encrypted.folder_id.as_deref(), Some("folder-x"));

    let decrypted = env.crypter.decrypt(&encrypted).await.unwrap();
    assert_eq!(decrypted, plain);
}

#[tokio::test]
async fn bit_flip_in_encrypted_data_fails_authentication() {
    let env = signed_in_env().await;
    let mut encrypted = env.crypter.encrypt_owned(&sample_task("task-3")).await.unwrap();

    let mut blob = decode_encrypted_data(&encrypted.encrypted_data).unwrap();
    let last = blob.len() - 1;
    blob[last] ^= 0x01;
    encrypted.encrypted_data = encode_encrypted_data(&blob).unwrap();

    let err = env.crypter.decrypt(&encrypted).await.unwrap_err();
    assert!(err.is_authentication_failure(), "got {err}");
}

#[tokio::test]
async fn bit_flip_in_wrapped_dek_fails_authentication() {
    let env = signed_in_env().await;
    let mut encrypted = env.crypter.encrypt_owned(&sample_task("task-4")).await.unwrap();

    let mut blob = decode_wrapped_key(&encrypted.encrypted_symmetric_key).unwrap();
    blob[20] ^= 0x80;
    encrypted.encrypted_symmetric_key = encode_wrapped_key(&blob);

    let err = env.crypter.decrypt(&encrypted).await.unwrap_err();
    assert!(err.is_authentication_failure(), "got {err}");
}

#[tokio::test]
async fn bit_flip_in_encapsulated_key_fails_authentication() {
    let env = signed_in_env().await;
    let mut encrypted = env.crypter.encrypt_owned(&sample_task("task-5")).await.unwrap();

    // A corrupted KEM ciphertext decapsulates to a pseudorandom secret
    // (implicit rejection); the AEAD unwrap is what catches it.
    let mut ct = hex::decode(&encrypted.encapsulated_key).unwrap();
    ct[100] ^= 0x04;
    encrypted.encapsulated_key = hex::encode(ct);

    let err = env.crypter.decrypt(&encrypted).await.unwrap_err();
    assert!(err.is_authentication_failure(), "got {err}");
}

#[tokio::test]
async fn batch_decrypt_skips_and_reports_failures() {
    let env = signed_in_env().await;
    let mut records = Vec::new();
    for i in 0..5 {
        let plain = sample_task(&format!("task-{i}"));
        records.push(env.crypter.encrypt_owned(&plain).await.unwrap());
    }

    // Tamper with the middle record only
    let mut blob = decode_wrapped_key(&records[2].encrypted_symmetric_key).unwrap();
    blob[15] ^= 0xff;
    records[2].encrypted_symmetric_key = encode_wrapped_key(&blob);

    let outcome = env.crypter.decrypt_batch(&records).await;
    assert_eq!(outcome.decrypted.len(), 4);
    assert_eq!(outcome.failed.len(), 1);
    let (failed_id, err) = &outcome.failed[0];
    assert_eq!(failed_id, "task-2");
    assert!(err.is_authentication_failure());
}

#[tokio::test]
async fn legacy_global_record_is_readable() {
    let env = signed_in_env().await;
    let plain = sample_task("legacy-1");

    let encrypted = encrypt_legacy_global(&plain).unwrap();
    assert_eq!(encrypted.encapsulated_key, "GLOBAL");

    let decrypted = env.crypter.decrypt(&encrypted).await.unwrap();
    assert_eq!(decrypted, plain);
}

#[tokio::test]
async fn rewrap_for_folder_preserves_payload_and_hash() {
    let env = signed_in_env().await;
    make_folder(&env, "archive").await;
    let plain = sample_task("task-6");

    let owned = env.crypter.encrypt_owned(&plain).await.unwrap();
    let rewrapped = env.crypter.rewrap_for_folder(&owned, "archive").await.unwrap();

    assert_eq!(rewrapped.encapsulated_key, "FOLDER");
    assert_eq!(rewrapped.encrypted_data, owned.encrypted_data);
    assert_eq!(rewrapped.record_hash, owned.record_hash);

    let decrypted = env.crypter.decrypt(&rewrapped).await.unwrap();
    assert_eq!(decrypted, plain);
}

#[test]
fn record_hash_covers_integrity_metadata() {
    let plain = sample_task("task-7");
    let hash = ResourceCrypter::record_hash(&plain).unwrap();

    // Changing a mutable integrity field (status) must change the hash
    let mut moved = plain.clone();
    moved.metadata.insert("status".to_string(), "done".to_string());
    assert_ne!(ResourceCrypter::record_hash(&moved).unwrap(), hash);

    // Changing an encrypted field must change the hash
    let mut edited = plain.clone();
    edited.fields.insert("title".to_string(), json!("new title"));
    assert_ne!(ResourceCrypter::record_hash(&edited).unwrap(), hash);

    // Field insertion order must not matter (canonical serialization)
    let mut reordered = keeply_client::PlainResource::new("task-7");
    for (k, v) in plain.fields.iter().rev() {
        reordered.fields.insert(k.clone(), v.clone());
    }
    reordered.metadata = plain.metadata.clone();
    assert_eq!(ResourceCrypter::record_hash(&reordered).unwrap(), hash);
}
