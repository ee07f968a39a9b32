//! Error types for the encryption primitives.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur in cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The KEM seed had the wrong length. Fatal caller error: the seed must
    /// never be truncated or padded to fit.
    #[error("invalid seed length: expected {expected}, got {actual}")]
    InvalidSeedLength { expected: usize, actual: usize },

    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// AEAD tag verification failed: wrong key or tampered ciphertext.
    /// This is the single tamper signal used throughout the system and
    /// must never be swallowed into a generic "not found".
    #[error("authentication failure: wrong key or tampered ciphertext")]
    AuthenticationFailure,

    /// Legacy `GLOBAL`-keyed records are readable but can never be
    /// re-shared or used as a wrapping-key source.
    #[error("unsupported legacy mode: GLOBAL-keyed records cannot be shared")]
    UnsupportedLegacyMode,

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("encapsulation error: {0}")]
    Encapsulation(String),
}
