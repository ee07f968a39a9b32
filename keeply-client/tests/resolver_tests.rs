mod support;

use keeply_client::ClientError;
use keeply_crypto::{CryptoError, SymmetricKey};
use support::{make_folder, make_nested_folder, sample_task, signed_in_env};

#[tokio::test]
async fn folder_tagged_record_resolves_to_the_folder_key() {
    let env = signed_in_env().await;
    let folder_key = make_folder(&env, "notes").await;

    let encrypted = env
        .crypter
        .encrypt_in_folder(&sample_task("task-1"), "notes")
        .await
        .unwrap();

    let resolved = env.resolver.resolve_wrapping_key(&encrypted).await.unwrap();
    assert_eq!(resolved, folder_key);
}

#[tokio::test]
async fn nested_folder_resolution_recurses_through_the_parent() {
    let env = signed_in_env().await;
    let parent_key = make_folder(&env, "semester").await;
    let child_key = make_nested_folder(&env, "semester/week-3", "semester", &parent_key).await;

    let encrypted = env
        .crypter
        .encrypt_in_folder(&sample_task("task-2"), "semester/week-3")
        .await
        .unwrap();

    let resolved = env.resolver.resolve_wrapping_key(&encrypted).await.unwrap();
    assert_eq!(resolved, child_key);
}

#[tokio::test]
async fn concurrent_resolutions_share_one_fetch() {
    let env = signed_in_env().await;
    make_folder(&env, "busy-folder").await;

    let mut handles = Vec::new();
    for _ in 0..16 {
        let resolver = env.resolver.clone();
        handles.push(tokio::spawn(async move {
            resolver.folder_key("busy-folder").await.unwrap()
        }));
    }

    let mut keys = Vec::new();
    for handle in handles {
        keys.push(handle.await.unwrap());
    }
    assert!(keys.windows(2).all(|w| w[0] == w[1]));

    assert_eq!(env.api.folder_fetch_count("busy-folder").await, 1);
}

#[tokio::test]
async fn cached_key_is_not_refetched() {
    let env = signed_in_env().await;
    make_folder(&env, "cached").await;

    env.resolver.folder_key("cached").await.unwrap();
    env.resolver.folder_key("cached").await.unwrap();
    env.resolver.folder_key("cached").await.unwrap();

    assert_eq!(env.api.folder_fetch_count("cached").await, 1);
}

#[tokio::test]
async fn missing_folder_surfaces_not_found_and_allows_retry() {
    let env = signed_in_env().await;

    let err = env.resolver.folder_key("ghost").await.unwrap_err();
    assert!(matches!(err, ClientError::NotFound(_)));

    // A failed fetch must not poison the cache entry
    make_folder(&env, "ghost").await;
    env.resolver.folder_key("ghost").await.unwrap();
}

#[tokio::test]
async fn sign_out_clears_the_cache_and_fails_closed() {
    let env = signed_in_env().await;
    make_folder(&env, "private").await;
    env.resolver.folder_key("private").await.unwrap();

    env.session.sign_out().await.unwrap();

    // The cached key must not survive the session
    let err = env.resolver.folder_key("private").await.unwrap_err();
    assert!(matches!(err, ClientError::Locked), "got {err}");

    // Direct resolution fails closed too
    let err = env
        .resolver
        .resolve_wrapping_key(
            &keeply_client::encrypt_legacy_global(&sample_task("x")).unwrap(),
        )
        .await
        .unwrap_err();
    assert!(err.is_unsupported_legacy_mode());
}

#[tokio::test]
async fn self_parented_folder_record_fails_instead_of_hanging() {
    let env = signed_in_env().await;
    // A malicious or corrupt server can hand back a key record that
    // claims to be wrapped under itself
    make_nested_folder(&env, "looped", "looped", &SymmetricKey::generate()).await;

    let err = env.resolver.folder_key("looped").await.unwrap_err();
    assert!(
        matches!(err, ClientError::Crypto(CryptoError::Encoding(_))),
        "got {err}"
    );
}

#[tokio::test]
async fn folder_parent_cycle_fails_instead_of_hanging() {
    let env = signed_in_env().await;
    let decoy = SymmetricKey::generate();
    make_nested_folder(&env, "ping", "pong", &decoy).await;
    make_nested_folder(&env, "pong", "ping", &decoy).await;

    let err = env.resolver.folder_key("ping").await.unwrap_err();
    assert!(
        matches!(err, ClientError::Crypto(CryptoError::Encoding(_))),
        "got {err}"
    );

    // The failed chain must not poison either cache entry: repairing the
    // root of the chain makes both folders resolvable again
    let parent_key = make_folder(&env, "pong").await;
    make_nested_folder(&env, "ping", "pong", &parent_key).await;
    env.resolver.folder_key("ping").await.unwrap();
}

#[tokio::test]
async fn legacy_records_are_rejected_by_the_resolver() {
    let env = signed_in_env().await;
    let legacy = keeply_client::encrypt_legacy_global(&sample_task("legacy")).unwrap();

    let err = env.resolver.resolve_wrapping_key(&legacy).await.unwrap_err();
    assert!(err.is_unsupported_legacy_mode());
}
