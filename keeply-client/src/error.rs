//! Client session error types.

use keeply_crypto::CryptoError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client session layer.
///
/// Decrypt/unwrap failures (`Crypto(AuthenticationFailure)`) are kept
/// distinct from `NotFound`: conflating the two would hide tampering as a
/// missing-data bug.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The session is signed out; no key material is available.
    #[error("session locked")]
    Locked,

    /// The background KEM worker has shut down; pending and subsequent
    /// requests fail closed.
    #[error("kem worker closed")]
    WorkerClosed,

    /// No public key is registered for the given address. Surfaced
    /// verbatim as a discovery failure, never conflated with transport
    /// errors.
    #[error("recipient not found: {address}")]
    RecipientNotFound { address: String },

    #[error("not found: {0}")]
    NotFound(String),

    /// Transport-level failure from a collaborator endpoint. Retry policy
    /// belongs to the transport, not this core.
    #[error("API request failed: {0}")]
    Api(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// Whether this error is the AEAD tamper/wrong-key signal.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::Crypto(CryptoError::AuthenticationFailure))
    }

    /// Whether this error is the legacy-mode sharing rejection.
    pub fn is_unsupported_legacy_mode(&self) -> bool {
        matches!(self, Self::Crypto(CryptoError::UnsupportedLegacyMode))
    }
}
