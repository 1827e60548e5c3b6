//! Two independent ownership checks.
//!
//! - The stored-hash check compares `HMAC(identity)` with the envelope's
//!   owner hash before any decryption happens. It rejects ciphertext moved
//!   from another tenant's address.
//! - The embedded-owner check compares the decrypted credential's
//!   `owner_id` with the requesting identity. It rejects a stolen plaintext
//!   that was re-encrypted under the victim's hash.
//!
//! Neither check alone covers both attacks.

use std::sync::Arc;

use ring::hmac;

use crate::audit::AuditLog;
use crate::credential::{Credential, TenantIdentity};
use crate::envelope::Envelope;
use crate::error::{Result, VaultError};
use crate::keys::KeyMaterial;

#[derive(Clone)]
pub struct OwnershipValidator {
    keys: Arc<KeyMaterial>,
    audit: AuditLog,
}

impl OwnershipValidator {
    pub fn new(keys: Arc<KeyMaterial>, audit: AuditLog) -> Self {
        Self { keys, audit }
    }

    /// Whether `envelope` was sealed for `identity`.
    ///
    /// Never fails: an undecodable hash is a mismatch. The comparison is
    /// constant-time and both outcomes are audited.
    pub fn validate_stored_hash(&self, identity: &TenantIdentity, envelope: &Envelope) -> bool {
        let valid = hex::decode(&envelope.owner_hash)
            .is_ok_and(|tag| hmac::verify(self.keys.mac(), identity.as_bytes(), &tag).is_ok());

        let reason = if valid {
            "owner hash matched"
        } else {
            "owner hash mismatch"
        };
        self.audit.session_validation(identity, valid, reason);

        valid
    }

    /// Require the decrypted credential to belong to `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Ownership`] on mismatch.
    pub fn validate_embedded_owner(
        &self,
        identity: &TenantIdentity,
        credential: &Credential,
    ) -> Result<()> {
        if credential.owner_id != *identity {
            return Err(VaultError::Ownership {
                expected: identity.to_string(),
                actual: credential.owner_id.to_string(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for OwnershipValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnershipValidator").finish_non_exhaustive()
    }
}
