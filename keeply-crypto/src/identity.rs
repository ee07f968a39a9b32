//! Identity key management: ML-KEM-768 keypairs derived from a password.
//!
//! The keypair is derived deterministically from `SHA-512(password ‖ salt)`,
//! so the same password and salt always recover the same identity without
//! any server-side secret storage. The 64-byte digest splits into the
//! ML-KEM `d` and `z` seed halves.
//!
//! Note the seed derivation is deliberately a fast hash, not the
//! memory-hard KDF used for authentication secrets elsewhere in the app.
//! Changing this would break key recovery for existing accounts.

use crate::error::{CryptoError, CryptoResult};
use crate::wrap::SymmetricKey;
use aes_gcm::aead::OsRng;
use ml_kem::kem::{Decapsulate, DecapsulationKey, Encapsulate, EncapsulationKey};
use ml_kem::{Ciphertext, Encoded, EncodedSizeUser, KemCore, MlKem768, MlKem768Params, B32};
use sha2::{Digest, Sha512};
use zeroize::Zeroizing;

/// KEM seed length: SHA-512 output, split into ML-KEM `d` and `z`.
pub const SEED_SIZE: usize = 64;
/// ML-KEM-768 encapsulation (public) key encoded length.
pub const KEM_PUBLIC_KEY_SIZE: usize = 1184;
/// ML-KEM-768 ciphertext encoded length.
pub const KEM_CIPHERTEXT_SIZE: usize = 1088;
/// KEM shared secret length (doubles as an AES-256 key).
pub const SHARED_SECRET_SIZE: usize = 32;

/// A 64-byte KEM seed. Zeroized on drop.
pub struct Seed(Zeroizing<[u8; SEED_SIZE]>);

impl std::fmt::Debug for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Seed(redacted)")
    }
}

impl Seed {
    /// Validates the seed length. Callers must not pad or truncate a
    /// wrong-length seed and retry.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != SEED_SIZE {
            return Err(CryptoError::InvalidSeedLength {
                expected: SEED_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = Zeroizing::new([0u8; SEED_SIZE]);
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; SEED_SIZE] {
        &self.0
    }
}

/// Derives the KEM seed from a password and per-user salt.
///
/// Pure and deterministic: the same inputs always yield the same seed,
/// which is what makes password-based key recovery possible.
pub fn derive_seed(password: &str, salt: &[u8]) -> Seed {
    let mut hasher = Sha512::new();
    hasher.update(password.as_bytes());
    hasher.update(salt);
    let digest = hasher.finalize();

    let mut arr = Zeroizing::new([0u8; SEED_SIZE]);
    arr.copy_from_slice(&digest);
    Seed(arr)
}

/// An ML-KEM-768 public (encapsulation) key.
#[derive(Clone)]
pub struct PublicKey(EncapsulationKey<MlKem768Params>);

impl PublicKey {
    /// Reconstructs a public key from its 1184-byte encoding.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let encoded = Encoded::<EncapsulationKey<MlKem768Params>>::try_from(bytes).map_err(
            |_| CryptoError::InvalidKeyLength {
                expected: KEM_PUBLIC_KEY_SIZE,
                actual: bytes.len(),
            },
        )?;
        Ok(Self(EncapsulationKey::from_bytes(&encoded)))
    }

    /// Returns the encoded public key, as published for discovery.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.as_bytes().to_vec()
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes() == other.0.as_bytes()
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PublicKey(ml-kem-768)")
    }
}

/// An ML-KEM ciphertext binding a shared secret to one identity's keypair.
#[derive(Clone, PartialEq, Eq)]
pub struct KemCiphertext(Vec<u8>);

impl KemCiphertext {
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != KEM_CIPHERTEXT_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEM_CIPHERTEXT_SIZE,
                actual: bytes.len(),
            });
        }
        Ok(Self(bytes.to_vec()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for KemCiphertext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KemCiphertext(ml-kem-768)")
    }
}

/// An identity's ML-KEM-768 keypair.
///
/// The decapsulation key never leaves this struct and is never serialized;
/// it is re-derived from the password seed each session.
pub struct IdentityKeyPair {
    decapsulation: DecapsulationKey<MlKem768Params>,
    encapsulation: EncapsulationKey<MlKem768Params>,
}

impl IdentityKeyPair {
    /// Deterministic keypair generation from a 64-byte seed.
    pub fn from_seed(seed: &Seed) -> Self {
        let mut d = [0u8; 32];
        let mut z = [0u8; 32];
        d.copy_from_slice(&seed.as_bytes()[..32]);
        z.copy_from_slice(&seed.as_bytes()[32..]);

        let (decapsulation, encapsulation) =
            MlKem768::generate_deterministic(&B32::from(d), &B32::from(z));
        Self {
            decapsulation,
            encapsulation,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.encapsulation.clone())
    }

    /// Recovers the shared secret from a KEM ciphertext.
    ///
    /// ML-KEM uses implicit rejection: a foreign or corrupted ciphertext
    /// yields a pseudorandom secret rather than an error here. The wrong
    /// key is then caught by the AEAD tag on the following unwrap.
    pub fn decapsulate(&self, ciphertext: &KemCiphertext) -> CryptoResult<SymmetricKey> {
        let ct = Ciphertext::<MlKem768>::try_from(ciphertext.as_bytes()).map_err(|_| {
            CryptoError::InvalidKeyLength {
                expected: KEM_CIPHERTEXT_SIZE,
                actual: ciphertext.as_bytes().len(),
            }
        })?;
        let shared = self
            .decapsulation
            .decapsulate(&ct)
            .map_err(|_| CryptoError::Encapsulation("decapsulation failed".to_string()))?;
        SymmetricKey::from_slice(&shared)
    }
}

impl std::fmt::Debug for IdentityKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("IdentityKeyPair(ml-kem-768)")
    }
}

/// Encapsulates a fresh shared secret under a public key.
///
/// The shared secret becomes a wrapping key; the ciphertext is what gets
/// stored in a record's `encapsulated_key` field or a share grant.
pub fn encapsulate(public_key: &PublicKey) -> CryptoResult<(SymmetricKey, KemCiphertext)> {
    let (ct, shared) = public_key
        .0
        .encapsulate(&mut OsRng)
        .map_err(|_| CryptoError::Encapsulation("encapsulation failed".to_string()))?;
    Ok((
        SymmetricKey::from_slice(&shared)?,
        KemCiphertext(ct.to_vec()),
    ))
}
