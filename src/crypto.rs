// ABOUTME: Secret encryption-at-rest primitive for OAuth client secrets
// ABOUTME: AES-256-GCM cipher with nonce-prefixed ciphertext behind an injectable trait
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! # Secret Cipher
//!
//! The auth core treats encryption-at-rest as an injected capability: an
//! implementation of [`SecretCipher`] is handed to the OAuth coordinator,
//! which uses it to protect provider client secrets. [`MasterCipher`] is the
//! production implementation: AES-256-GCM with a random nonce prepended to
//! the ciphertext, base64-encoded for storage in a text column.

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::{aead::Aead, Aes256Gcm, KeyInit};
use anyhow::{anyhow, Result};
use base64::{engine::general_purpose, Engine};
use rand::RngCore;

/// Length of the AES-GCM nonce prepended to every ciphertext
const NONCE_LEN: usize = 12;

/// Injected encrypt/decrypt capability for secrets at rest
pub trait SecretCipher: Send + Sync {
    /// Encrypt a plaintext secret into its storage form
    ///
    /// # Errors
    /// Returns an error if encryption fails
    fn encrypt(&self, plaintext: &str) -> Result<String>;

    /// Decrypt a stored secret back to plaintext
    ///
    /// # Errors
    /// Returns an error if the stored form is malformed or the key is wrong
    fn decrypt(&self, stored: &str) -> Result<String>;
}

/// AES-256-GCM cipher keyed by a 32-byte master key
pub struct MasterCipher {
    key: [u8; 32],
}

impl MasterCipher {
    /// Create a cipher from raw key bytes
    #[must_use]
    pub const fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Load a cipher from a base64-encoded 32-byte key
    ///
    /// # Errors
    /// Returns an error if the encoding is invalid or the key is not 32 bytes
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let key_bytes = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| anyhow!("invalid base64 master key: {e}"))?;

        if key_bytes.len() != 32 {
            return Err(anyhow!(
                "master key must be exactly 32 bytes, got {}",
                key_bytes.len()
            ));
        }

        let mut key = [0u8; 32];
        key.copy_from_slice(&key_bytes);
        Ok(Self { key })
    }
}

impl SecretCipher for MasterCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        let cipher = Aes256Gcm::new(GenericArray::from_slice(&self.key));

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = GenericArray::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| anyhow!("encryption failed: {e}"))?;

        // Nonce travels with the ciphertext
        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(general_purpose::STANDARD.encode(combined))
    }

    fn decrypt(&self, stored: &str) -> Result<String> {
        let combined = general_purpose::STANDARD
            .decode(stored)
            .map_err(|e| anyhow!("invalid base64 ciphertext: {e}"))?;

        if combined.len() < NONCE_LEN {
            return Err(anyhow!("ciphertext too short to contain a nonce"));
        }

        let cipher = Aes256Gcm::new(GenericArray::from_slice(&self.key));
        let nonce = GenericArray::from_slice(&combined[..NONCE_LEN]);

        let plaintext = cipher
            .decrypt(nonce, &combined[NONCE_LEN..])
            .map_err(|e| anyhow!("decryption failed: {e}"))?;

        String::from_utf8(plaintext).map_err(|e| anyhow!("decrypted secret is not UTF-8: {e}"))
    }
}

/// Generate a random 32-byte encryption key
#[must_use]
pub fn generate_encryption_key() -> [u8; 32] {
    let mut key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut key);
    key
}
