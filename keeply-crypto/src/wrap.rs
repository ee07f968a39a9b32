//! AES-256-GCM authenticated encryption and key wrapping.
//!
//! Every ciphertext in the system is `iv ‖ ciphertext+tag` with a fresh
//! random 12-byte IV per call. Key wrapping and payload encryption use the
//! same construction; the distinction is what the plaintext is.

use crate::error::{CryptoError, CryptoResult};
use aes_gcm::aead::{Aead, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, KeyInit, Nonce};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// AES-256 key size in bytes.
pub const KEY_SIZE: usize = 32;
/// AES-GCM IV size in bytes.
pub const IV_SIZE: usize = 12;
/// Poly1305/GCM tag size in bytes.
pub const TAG_SIZE: usize = 16;

/// A 256-bit symmetric key. Zeroized on drop.
///
/// Used for the vault key, folder keys, per-record DEKs, KEM shared
/// secrets, and link keys — the type does not distinguish roles.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_SIZE]);

impl SymmetricKey {
    /// Generates a fresh random key from the OS RNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Reconstructs a key from a slice, validating the length.
    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; KEY_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material
        f.write_str("SymmetricKey(..)")
    }
}

/// Encrypts `plaintext` with AES-256-GCM, returning `iv ‖ ciphertext+tag`.
pub fn encrypt_bytes(key: &SymmetricKey, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| CryptoError::Encoding("AEAD encryption failed".to_string()))?;

    let mut out = Vec::with_capacity(IV_SIZE + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypts `iv ‖ ciphertext+tag` produced by [`encrypt_bytes`].
///
/// Fails with [`CryptoError::AuthenticationFailure`] when the tag does not
/// verify — wrong key or tampered ciphertext.
pub fn decrypt_bytes(key: &SymmetricKey, blob: &[u8]) -> CryptoResult<Vec<u8>> {
    if blob.len() < IV_SIZE + TAG_SIZE {
        return Err(CryptoError::Encoding(format!(
            "ciphertext too short: {} bytes",
            blob.len()
        )));
    }
    let (iv, ciphertext) = blob.split_at(IV_SIZE);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

    cipher
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map_err(|_| CryptoError::AuthenticationFailure)
}

/// Wraps key material under a wrapping key, returning `iv ‖ wrapped`.
pub fn wrap_key(plain_key: &[u8], wrapping_key: &SymmetricKey) -> CryptoResult<Vec<u8>> {
    encrypt_bytes(wrapping_key, plain_key)
}

/// Unwraps key material previously wrapped with [`wrap_key`].
pub fn unwrap_key(blob: &[u8], wrapping_key: &SymmetricKey) -> CryptoResult<Vec<u8>> {
    decrypt_bytes(wrapping_key, blob)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_iv_per_call() {
        let key = SymmetricKey::generate();
        let a = encrypt_bytes(&key, b"same plaintext").unwrap();
        let b = encrypt_bytes(&key, b"same plaintext").unwrap();
        assert_ne!(a[..IV_SIZE], b[..IV_SIZE]);
        assert_ne!(a, b);
    }

    #[test]
    fn short_blob_is_an_encoding_error_not_auth_failure() {
        let key = SymmetricKey::generate();
        let err = decrypt_bytes(&key, &[0u8; 8]).unwrap_err();
        assert!(matches!(err, CryptoError::Encoding(_)));
    }
}
