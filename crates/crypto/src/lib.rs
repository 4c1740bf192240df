//! # Crypto — Key Derivation and AEAD
//!
//! The primitives behind nokhal's envelope encryption:
//!
//! - **Argon2id** turns a password and a 32-byte salt into the 32-byte KEK
//!   (key-encryption key). Parameters are fixed: time cost 1, memory cost
//!   64 MiB, parallelism 4.
//! - **AES-256-GCM** is the AEAD for both levels of the hierarchy: the KEK
//!   seals the DEK (data-encryption key) into the file header, and the DEK
//!   seals every record value. Nonces are 12 bytes, tags 16 bytes.
//! - Salts, nonces, and the DEK itself come from the operating system CSPRNG.
//!
//! Nonce reuse under the same key destroys GCM's guarantees; every seal gets
//! a fresh [`generate_nonce`] value.

use aes_gcm::aead::{Aead as _, Payload};
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

/// Salt length for key derivation.
pub const SALT_SIZE: usize = 32;

/// Symmetric key length (both KEK and DEK).
pub const KEY_SIZE: usize = 32;

/// AEAD nonce length.
pub const NONCE_SIZE: usize = 12;

/// AEAD authentication tag length, appended to every ciphertext.
pub const TAG_SIZE: usize = 16;

/// Argon2id time cost (iterations).
const ARGON2_TIME_COST: u32 = 1;
/// Argon2id memory cost in KiB (64 MiB).
const ARGON2_MEMORY_KIB: u32 = 64 * 1024;
/// Argon2id lane count.
const ARGON2_PARALLELISM: u32 = 4;

/// Errors from the crypto layer.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Argon2 rejected its parameters or inputs.
    #[error("key derivation failed")]
    KeyDerivation,

    /// The cipher refused to seal. Practically unreachable with well-formed
    /// inputs, surfaced rather than swallowed.
    #[error("encryption failed")]
    Seal,

    /// AEAD verification failed: wrong key, wrong associated data, or a
    /// tampered ciphertext.
    #[error("AEAD verification failed")]
    Verification,
}

/// Derives the 32-byte KEK from a password and salt with Argon2id.
pub fn derive_key(password: &str, salt: &[u8; SALT_SIZE]) -> Result<[u8; KEY_SIZE], CryptoError> {
    let params = Params::new(
        ARGON2_MEMORY_KIB,
        ARGON2_TIME_COST,
        ARGON2_PARALLELISM,
        Some(KEY_SIZE),
    )
    .map_err(|_| CryptoError::KeyDerivation)?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = [0u8; KEY_SIZE];
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut key)
        .map_err(|_| CryptoError::KeyDerivation)?;
    Ok(key)
}

/// Draws a fresh random salt from the OS CSPRNG.
pub fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Draws a fresh random AEAD nonce from the OS CSPRNG.
pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Draws a fresh random 32-byte key (the DEK) from the OS CSPRNG.
pub fn generate_key() -> [u8; KEY_SIZE] {
    let mut key = [0u8; KEY_SIZE];
    OsRng.fill_bytes(&mut key);
    key
}

/// Fills an arbitrary buffer from the OS CSPRNG (used by secure erase).
pub fn fill_random(buf: &mut [u8]) {
    OsRng.fill_bytes(buf);
}

/// An AES-256-GCM cipher bound to one key.
pub struct Sealer {
    cipher: Aes256Gcm,
}

impl Sealer {
    /// Builds the cipher for a 32-byte key.
    #[must_use]
    pub fn new(key: &[u8; KEY_SIZE]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        }
    }

    /// Seals `plaintext` under `nonce`, binding `aad`. The returned buffer is
    /// `plaintext.len() + TAG_SIZE` bytes.
    ///
    /// The caller must never reuse a nonce under the same key.
    pub fn seal(
        &self,
        nonce: &[u8; NONCE_SIZE],
        plaintext: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        self.cipher
            .encrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|_| CryptoError::Seal)
    }

    /// Opens `ciphertext`, verifying the tag against `nonce` and `aad`.
    pub fn open(
        &self,
        nonce: &[u8; NONCE_SIZE],
        ciphertext: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        self.cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad,
                },
            )
            .map_err(|_| CryptoError::Verification)
    }
}

impl std::fmt::Debug for Sealer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        f.debug_struct("Sealer").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
