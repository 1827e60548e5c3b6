//! AES-256-GCM sealing of credential payloads using the `ring` crate.
//!
//! # Security Notes
//!
//! - A fresh random 96-bit nonce is drawn for every encryption. With random
//!   nonces the collision probability stays negligible for up to ~2^32
//!   encryptions under one key.
//! - The 128-bit authentication tag is appended to the ciphertext, so any
//!   altered bit in the nonce or ciphertext fails decryption.
//! - Plaintext buffers are wiped on drop via `zeroize`.

use std::sync::Arc;

use chrono::Utc;
use ring::aead::{self, Aad, NONCE_LEN, Nonce};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

use crate::address;
use crate::credential::{Credential, TenantIdentity, truncate_to_millis};
use crate::envelope::Envelope;
use crate::error::{Result, VaultError};
use crate::keys::KeyMaterial;

/// Length of the AES-256-GCM nonce in bytes (96 bits).
pub const NONCE_LEN_BYTES: usize = NONCE_LEN;

/// Length of the GCM authentication tag in bytes (128 bits).
pub const TAG_LEN_BYTES: usize = 16;

// ---------------------------------------------------------------------------
// Cipher
// ---------------------------------------------------------------------------

/// Authenticated encryption of [`Credential`] payloads into [`Envelope`]s.
#[derive(Clone)]
pub struct Cipher {
    keys: Arc<KeyMaterial>,
    rng: SystemRandom,
}

impl Cipher {
    pub fn new(keys: Arc<KeyMaterial>) -> Self {
        Self {
            keys,
            rng: SystemRandom::new(),
        }
    }

    /// Seal `credential` for `identity`.
    ///
    /// The envelope's owner hash is the hex HMAC of `identity` and its expiry
    /// is copied from the credential. Two calls with identical input never
    /// share a nonce or a ciphertext.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Entropy`] if no nonce can be drawn and
    /// [`VaultError::Encryption`] if sealing fails.
    pub fn encrypt(&self, credential: &Credential, identity: &TenantIdentity) -> Result<Envelope> {
        let mut nonce_bytes = [0u8; NONCE_LEN_BYTES];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| VaultError::Entropy)?;

        let mut in_out = Zeroizing::new(serde_json::to_vec(credential)?);
        let plaintext_len = in_out.len();

        self.keys
            .encryption()
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::empty(),
                &mut *in_out,
            )
            .map_err(|_| VaultError::Encryption {
                reason: "seal_in_place failed".into(),
            })?;

        tracing::trace!(
            plaintext_len,
            ciphertext_len = in_out.len(),
            "sealed credential payload"
        );

        Ok(Envelope {
            nonce: nonce_bytes.to_vec(),
            ciphertext: in_out.to_vec(),
            owner_hash: address::owner_hash(self.keys.mac(), identity),
            created_at: truncate_to_millis(Utc::now()),
            expires_at: credential.expires_at,
        })
    }

    /// Open `envelope` and parse the credential inside.
    ///
    /// Deterministic for a given key and envelope; no side effects.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Decryption`] if the nonce has the wrong length
    /// or tag verification fails, and [`VaultError::MalformedData`] if an
    /// authentic payload is not a credential.
    pub fn decrypt(&self, envelope: &Envelope) -> Result<Credential> {
        if envelope.nonce.len() != NONCE_LEN_BYTES {
            return Err(VaultError::Decryption {
                reason: format!(
                    "nonce is {} bytes, expected {}",
                    envelope.nonce.len(),
                    NONCE_LEN_BYTES
                ),
            });
        }
        let nonce = Nonce::try_assume_unique_for_key(&envelope.nonce).map_err(|_| {
            VaultError::Decryption {
                reason: "invalid nonce".into(),
            }
        })?;

        let mut in_out = Zeroizing::new(envelope.ciphertext.clone());
        let plaintext = self
            .keys
            .encryption()
            .open_in_place(nonce, Aad::empty(), &mut in_out[..])
            .map_err(|_| VaultError::Decryption {
                reason: "authentication failed".into(),
            })?;

        serde_json::from_slice(plaintext).map_err(|e| VaultError::MalformedData {
            reason: format!("decrypted payload is not a credential: {e}"),
        })
    }
}

impl std::fmt::Debug for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cipher")
            .field("algorithm", &aead::AES_256_GCM)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Random bytes
// ---------------------------------------------------------------------------

/// Generate `len` cryptographically secure random bytes.
///
/// # Errors
///
/// Returns [`VaultError::Entropy`] if the system CSPRNG fails.
pub fn random_bytes(len: usize) -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let mut buf = vec![0u8; len];
    rng.fill(&mut buf).map_err(|_| VaultError::Entropy)?;
    Ok(buf)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
