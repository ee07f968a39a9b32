//! Client-side encryption primitives for Keeply.
//!
//! Provides zero-knowledge record encryption using:
//! - ML-KEM-768 for identity keypairs and key encapsulation
//! - AES-256-GCM for authenticated encryption and key wrapping
//! - SHA-256 for record hashing and Merkle integrity roots
//!
//! # Architecture
//!
//! The key hierarchy has three tiers:
//!
//! 1. **Identity keypair**: an ML-KEM-768 keypair derived deterministically
//!    from the user's password and a per-user salt. The secret key exists
//!    only in the client session; the public key is published for discovery.
//!
//! 2. **Vault key**: a symmetric master key, one per identity. The server
//!    stores only a wrapped copy whose data-encryption key is bound to the
//!    identity via a KEM ciphertext.
//!
//! 3. **Data encryption keys (DEKs)**: a fresh random key per record,
//!    wrapped under the vault key, a folder key, or a KEM-derived shared
//!    secret. Sharing re-wraps a DEK without ever exposing it to the server.
//!
//! This architecture allows:
//! - Key recovery from password + salt without server-side secret storage
//! - Sharing individual records by re-wrapping just that record's DEK
//! - Tamper detection on every decrypt via the AEAD tag

mod error;
pub mod identity;
pub mod merkle;
pub mod wire;
mod wrap;

pub use error::{CryptoError, CryptoResult};
pub use identity::{
    derive_seed, encapsulate, IdentityKeyPair, KemCiphertext, PublicKey, Seed,
    KEM_CIPHERTEXT_SIZE, KEM_PUBLIC_KEY_SIZE, SEED_SIZE, SHARED_SECRET_SIZE,
};
pub use wire::{
    compose_share_link, decode_encrypted_data, decode_wrapped_key, encode_encrypted_data,
    encode_wrapped_key, parse_share_link, KeyEnvelope, LINK_KEY_SIZE,
};
pub use wrap::{
    decrypt_bytes, encrypt_bytes, unwrap_key, wrap_key, SymmetricKey, IV_SIZE, KEY_SIZE, TAG_SIZE,
};
