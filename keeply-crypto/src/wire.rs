//! Wire-level encodings for encrypted records and share links.
//!
//! These formats are consumed by the transport and persistence layers and
//! must stay bit-exact:
//!
//! - `encrypted_data`: `hex(iv) + ":" + hex(ciphertext)`
//! - `encrypted_symmetric_key`: `hex(iv ‖ ciphertext)`
//! - `encapsulated_key`: `hex(KEM ciphertext)`, `"FOLDER"`, or `"GLOBAL"`
//! - share link: `<origin>/share/view/<token>#<hex(32-byte link key)>`

use crate::error::{CryptoError, CryptoResult};
use crate::identity::{KemCiphertext, KEM_CIPHERTEXT_SIZE};
use crate::wrap::{IV_SIZE, TAG_SIZE};

/// Link key length for public-link sharing.
pub const LINK_KEY_SIZE: usize = 32;

const FOLDER_TAG: &str = "FOLDER";
const GLOBAL_TAG: &str = "GLOBAL";

/// How a record's DEK wrapping key is obtained.
///
/// This replaces the legacy three-way string overload of the
/// `encapsulated_key` field ("FOLDER" / "GLOBAL" / hex ciphertext) with a
/// variant resolved by pattern match instead of string comparison.
#[derive(Clone, Debug, PartialEq)]
pub enum KeyEnvelope {
    /// A real KEM ciphertext binding the DEK to one identity's keypair.
    Direct(KemCiphertext),
    /// Resolve via the named folder's key.
    Folder(String),
    /// Legacy fixed-key mode: readable, never shareable.
    LegacyGlobal,
}

impl KeyEnvelope {
    /// Encodes to the `encapsulated_key` wire string.
    pub fn to_wire(&self) -> String {
        match self {
            Self::Direct(ct) => hex::encode(ct.as_bytes()),
            Self::Folder(_) => FOLDER_TAG.to_string(),
            Self::LegacyGlobal => GLOBAL_TAG.to_string(),
        }
    }

    /// Decodes the `encapsulated_key` wire string.
    ///
    /// `folder_id` is the record's own folder field; it is required when
    /// the tag is `"FOLDER"` so the variant carries the id it resolves by.
    pub fn from_wire(encapsulated_key: &str, folder_id: Option<&str>) -> CryptoResult<Self> {
        match encapsulated_key {
            FOLDER_TAG => {
                let id = folder_id.ok_or_else(|| {
                    CryptoError::Encoding("FOLDER-keyed record without folder id".to_string())
                })?;
                Ok(Self::Folder(id.to_string()))
            }
            GLOBAL_TAG => Ok(Self::LegacyGlobal),
            other => {
                let bytes = hex::decode(other)
                    .map_err(|e| CryptoError::Encoding(format!("bad encapsulated key: {e}")))?;
                if bytes.len() != KEM_CIPHERTEXT_SIZE {
                    return Err(CryptoError::Encoding(format!(
                        "bad encapsulated key length: {}",
                        bytes.len()
                    )));
                }
                Ok(Self::Direct(KemCiphertext::from_bytes(&bytes)?))
            }
        }
    }
}

/// Encodes `iv ‖ ciphertext` as the `encrypted_data` field.
pub fn encode_encrypted_data(blob: &[u8]) -> CryptoResult<String> {
    if blob.len() < IV_SIZE + TAG_SIZE {
        return Err(CryptoError::Encoding(format!(
            "encrypted data too short: {} bytes",
            blob.len()
        )));
    }
    let (iv, ciphertext) = blob.split_at(IV_SIZE);
    Ok(format!("{}:{}", hex::encode(iv), hex::encode(ciphertext)))
}

/// Decodes the `encrypted_data` field back to `iv ‖ ciphertext`.
pub fn decode_encrypted_data(field: &str) -> CryptoResult<Vec<u8>> {
    let (iv_hex, ct_hex) = field
        .split_once(':')
        .ok_or_else(|| CryptoError::Encoding("encrypted data missing ':'".to_string()))?;

    let iv = hex::decode(iv_hex)
        .map_err(|e| CryptoError::Encoding(format!("bad encrypted data iv: {e}")))?;
    if iv.len() != IV_SIZE {
        return Err(CryptoError::Encoding(format!(
            "bad iv length: {}",
            iv.len()
        )));
    }
    let ciphertext = hex::decode(ct_hex)
        .map_err(|e| CryptoError::Encoding(format!("bad encrypted data body: {e}")))?;

    let mut blob = iv;
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Encodes `iv ‖ wrapped key` as the `encrypted_symmetric_key` field.
pub fn encode_wrapped_key(blob: &[u8]) -> String {
    hex::encode(blob)
}

/// Decodes the `encrypted_symmetric_key` field. The first 12 bytes are the
/// AEAD IV, the remainder is ciphertext + tag.
pub fn decode_wrapped_key(field: &str) -> CryptoResult<Vec<u8>> {
    let blob = hex::decode(field)
        .map_err(|e| CryptoError::Encoding(format!("bad wrapped key: {e}")))?;
    if blob.len() < IV_SIZE + TAG_SIZE {
        return Err(CryptoError::Encoding(format!(
            "wrapped key too short: {} bytes",
            blob.len()
        )));
    }
    Ok(blob)
}

/// Composes a shareable link address. The link key lives only in the URL
/// fragment, which is never sent as part of an HTTP request.
pub fn compose_share_link(origin: &str, token: &str, link_key: &[u8; LINK_KEY_SIZE]) -> String {
    format!(
        "{}/share/view/{}#{}",
        origin.trim_end_matches('/'),
        token,
        hex::encode(link_key)
    )
}

/// Extracts the token and fragment-held link key from a share address.
pub fn parse_share_link(address: &str) -> CryptoResult<(String, [u8; LINK_KEY_SIZE])> {
    let (base, fragment) = address
        .split_once('#')
        .ok_or_else(|| CryptoError::Encoding("share link missing fragment".to_string()))?;

    let token = base
        .rsplit_once("/share/view/")
        .map(|(_, t)| t)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| CryptoError::Encoding("share link missing token".to_string()))?;

    let key_bytes = hex::decode(fragment)
        .map_err(|e| CryptoError::Encoding(format!("bad link key fragment: {e}")))?;
    if key_bytes.len() != LINK_KEY_SIZE {
        return Err(CryptoError::Encoding(format!(
            "bad link key length: {}",
            key_bytes.len()
        )));
    }
    let mut key = [0u8; LINK_KEY_SIZE];
    key.copy_from_slice(&key_bytes);

    Ok((token.to_string(), key))
}
