//! Client session layer for Keeply's zero-knowledge encryption core.
//!
//! The server only ever sees wrapped keys and ciphertext. This crate ties
//! the primitives from `keeply-crypto` into the client-side workflows:
//!
//! - **Session**: identity keypair derived from password + salt, vault key
//!   unwrapping, fail-closed sign-out
//! - **Key resolution**: per-record wrapping keys, with a session-scoped
//!   folder-key cache and single-flight fetch deduplication
//! - **Record encryption**: per-record DEKs, canonical field
//!   serialization, partial-failure-tolerant batch decryption
//! - **Sharing**: direct (identity-addressed) re-encapsulation and
//!   link (capability-addressed) sharing via URL-fragment keys
//! - **Integrity**: Merkle roots over record hashes
//! - **KEM worker**: expensive asymmetric operations offloaded to a
//!   background task, message-passing with correlation ids
//!
//! Transport, persistence and UI are collaborators behind the
//! [`api::CoreApi`] trait; this crate never performs I/O beyond it.

pub mod api;
pub mod error;
pub mod integrity;
pub mod resolver;
pub mod resource;
pub mod session;
pub mod sharing;
pub mod types;
pub mod worker;

pub use api::{CoreApi, MemoryApi};
pub use error::{ClientError, ClientResult};
pub use resolver::KeyResolver;
pub use resource::{encrypt_legacy_global, ResourceCrypter};
pub use session::Session;
pub use sharing::ShareManager;
pub use types::{
    BatchDecryptOutcome, EncryptedResource, PlainResource, ShareGrant, ShareLinkRequest,
    WrappedKeyRecord,
};
pub use worker::{spawn_kem_worker, KemWorkerHandle};
