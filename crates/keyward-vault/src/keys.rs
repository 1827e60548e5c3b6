//! Imported key material.
//!
//! [`KeyMaterial`] holds two opaque `ring` handles: an AES-256-GCM key for
//! sealing credential payloads and an HMAC-SHA256 key for owner hashes and
//! storage addresses. Raw key bytes are only touched during import and are
//! wiped afterwards.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ring::{aead, hmac};
use zeroize::Zeroizing;

use crate::crypto;
use crate::error::{Result, VaultError};

/// Length of the AES-256-GCM key in bytes.
pub const ENCRYPTION_KEY_LEN: usize = 32;

/// Minimum accepted HMAC key length in bytes (the SHA-256 output size).
pub const MIN_MAC_KEY_LEN: usize = 32;

/// Opaque handles to the vault's symmetric keys.
pub struct KeyMaterial {
    encryption: aead::LessSafeKey,
    mac: hmac::Key,
}

impl KeyMaterial {
    /// Import raw key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Configuration`] if the encryption key is not
    /// exactly 32 bytes or the MAC key is shorter than 32 bytes.
    pub fn from_bytes(encryption_key: &[u8], mac_key: &[u8]) -> Result<Self> {
        if encryption_key.len() != ENCRYPTION_KEY_LEN {
            return Err(VaultError::Configuration {
                reason: format!(
                    "encryption key must be {} bytes, got {}",
                    ENCRYPTION_KEY_LEN,
                    encryption_key.len()
                ),
            });
        }
        if mac_key.len() < MIN_MAC_KEY_LEN {
            return Err(VaultError::Configuration {
                reason: format!(
                    "mac key must be at least {} bytes, got {}",
                    MIN_MAC_KEY_LEN,
                    mac_key.len()
                ),
            });
        }

        let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, encryption_key).map_err(|_| {
            VaultError::Configuration {
                reason: "failed to import AES-256-GCM key".into(),
            }
        })?;

        tracing::debug!("imported vault key material");

        Ok(Self {
            encryption: aead::LessSafeKey::new(unbound),
            mac: hmac::Key::new(hmac::HMAC_SHA256, mac_key),
        })
    }

    /// Import base64-encoded (standard alphabet, padded) keys.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Configuration`] on invalid base64 or bad key
    /// lengths.
    pub fn from_base64(encryption_key: &str, mac_key: &str) -> Result<Self> {
        let encryption = decode_key("encryption", encryption_key)?;
        let mac = decode_key("mac", mac_key)?;
        Self::from_bytes(&encryption, &mac)
    }

    /// Generate fresh random keys. Intended for tests and key bootstrap.
    pub fn generate() -> Result<Self> {
        let encryption = Zeroizing::new(crypto::random_bytes(ENCRYPTION_KEY_LEN)?);
        let mac = Zeroizing::new(crypto::random_bytes(MIN_MAC_KEY_LEN)?);
        Self::from_bytes(&encryption, &mac)
    }

    pub(crate) fn encryption(&self) -> &aead::LessSafeKey {
        &self.encryption
    }

    pub(crate) fn mac(&self) -> &hmac::Key {
        &self.mac
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial").finish_non_exhaustive()
    }
}

fn decode_key(which: &str, encoded: &str) -> Result<Zeroizing<Vec<u8>>> {
    BASE64
        .decode(encoded.trim())
        .map(Zeroizing::new)
        .map_err(|e| VaultError::Configuration {
            reason: format!("{which} key is not valid base64: {e}"),
        })
}
