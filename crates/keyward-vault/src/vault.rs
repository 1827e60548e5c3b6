//! The credential vault.
//!
//! [`Vault`] ties the pieces together:
//!
//! ```text
//! store:     derive address ─► Cipher::encrypt ─► KvStore::put ─► audit
//! retrieve:  derive address ─► KvStore::get ─► parse envelope
//!            ─► stored-hash check ─► Cipher::decrypt ─► embedded-owner check
//!            ─► audit ─► Credential
//! ```
//!
//! Every retrieve failure is typed and audited; nothing retries. Concurrent
//! writes for the same tenant are last-write-wins.

use std::sync::Arc;
use std::time::Duration;

use keyward_store::KvStore;

use crate::address::{AddressDeriver, DEFAULT_NAMESPACE, StorageAddress};
use crate::audit::{AuditLog, user_metadata};
use crate::credential::{Credential, TenantIdentity};
use crate::crypto::Cipher;
use crate::envelope::Envelope;
use crate::error::{Result, VaultError};
use crate::keys::KeyMaterial;
use crate::ownership::OwnershipValidator;

/// Construction options for a [`Vault`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultOptions {
    /// Storage key namespace (the part before `:`).
    pub namespace: String,
    /// Expiry handed to the store for every record; `None` keeps records
    /// until overwritten or revoked.
    pub record_ttl: Option<Duration>,
}

impl Default for VaultOptions {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            record_ttl: None,
        }
    }
}

/// Steps of a retrieve, in order. Reported in audit metadata so the trail
/// shows where a request was stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetrieveStage {
    Fetched,
    HashChecked,
    Decrypted,
    OwnerChecked,
}

impl RetrieveStage {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Fetched => "fetched",
            Self::HashChecked => "hash_checked",
            Self::Decrypted => "decrypted",
            Self::OwnerChecked => "owner_checked",
        }
    }
}

/// Encrypted, tenant-isolated credential storage.
///
/// `Vault` holds no mutable state of its own and is `Send + Sync`; share it
/// behind an `Arc`.
pub struct Vault {
    store: Arc<dyn KvStore>,
    deriver: AddressDeriver,
    cipher: Cipher,
    validator: OwnershipValidator,
    audit: AuditLog,
    record_ttl: Option<Duration>,
}

impl Vault {
    /// Build a vault over `store` with the given keys and audit log.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Configuration`] if the namespace is invalid.
    pub fn new(
        keys: Arc<KeyMaterial>,
        store: Arc<dyn KvStore>,
        audit: AuditLog,
        options: VaultOptions,
    ) -> Result<Self> {
        let deriver = AddressDeriver::new(Arc::clone(&keys), options.namespace)?;
        tracing::info!(namespace = deriver.namespace(), "credential vault ready");

        Ok(Self {
            store,
            deriver,
            cipher: Cipher::new(Arc::clone(&keys)),
            validator: OwnershipValidator::new(keys, audit.clone()),
            audit,
            record_ttl: options.record_ttl,
        })
    }

    /// The storage address a tenant's record lives at.
    pub fn address_of(&self, identity: &TenantIdentity) -> Result<StorageAddress> {
        ensure_identity(identity)?;
        Ok(self.deriver.derive(identity))
    }

    /// Encrypt and persist `credential` for `identity`, replacing any
    /// previous record.
    ///
    /// Concurrent stores for the same identity are not serialized: the last
    /// write wins.
    pub async fn store(&self, identity: &TenantIdentity, credential: &Credential) -> Result<()> {
        self.write(identity, credential).await?;
        self.audit.token_access(identity, "store");
        Ok(())
    }

    /// Persist the credential produced by a completed authorization flow.
    pub async fn complete_authorization(
        &self,
        identity: &TenantIdentity,
        credential: &Credential,
    ) -> Result<()> {
        self.store(identity, credential).await?;
        self.audit.auth_success(identity);
        Ok(())
    }

    /// Persist a refreshed credential, auditing the refresh outcome.
    pub async fn store_refreshed(
        &self,
        identity: &TenantIdentity,
        credential: &Credential,
    ) -> Result<()> {
        match self.store(identity, credential).await {
            Ok(()) => {
                self.audit.token_refresh(identity, true, None);
                Ok(())
            }
            Err(err) => {
                self.audit
                    .token_refresh(identity, false, Some(&err.to_string()));
                Err(err)
            }
        }
    }

    /// Fetch, validate and decrypt the credential stored for `identity`.
    ///
    /// # Errors
    ///
    /// - [`VaultError::NotFound`] if nothing is stored.
    /// - [`VaultError::MalformedData`] if the record cannot be parsed.
    /// - [`VaultError::SessionValidation`] if the owner hash does not match;
    ///   decryption is not attempted.
    /// - [`VaultError::Decryption`] if authentication fails.
    /// - [`VaultError::Ownership`] if the embedded owner differs.
    pub async fn retrieve(&self, identity: &TenantIdentity) -> Result<Credential> {
        ensure_identity(identity)?;
        let address = self.deriver.derive(identity);

        let raw = self
            .store
            .get(address.as_str())
            .await
            .inspect_err(|err| {
                tracing::error!(%address, error = %err, "failed to read credential record");
                self.violation(identity, RetrieveStage::Fetched, "store read failed");
            })?
            .ok_or_else(|| {
                self.violation(identity, RetrieveStage::Fetched, "not found");
                VaultError::NotFound
            })?;

        let envelope = Envelope::from_json(&raw).inspect_err(|_| {
            self.violation(identity, RetrieveStage::Fetched, "malformed record");
        })?;

        if !self.validator.validate_stored_hash(identity, &envelope) {
            tracing::warn!(%address, "owner hash mismatch, skipping decryption");
            return Err(VaultError::SessionValidation);
        }

        let credential = self.cipher.decrypt(&envelope).inspect_err(|err| {
            let reason = match err {
                VaultError::Decryption { .. } => "decryption failed",
                _ => "malformed payload",
            };
            self.violation(identity, RetrieveStage::HashChecked, reason);
        })?;

        if let Err(err) = self.validator.validate_embedded_owner(identity, &credential) {
            let mut details = user_metadata(identity);
            details.insert("stage".into(), RetrieveStage::Decrypted.as_str().into());
            details.insert("expected_owner".into(), identity.as_str().into());
            details.insert("embedded_owner".into(), credential.owner_id.as_str().into());
            self.audit.security_violation("ownership mismatch", details);
            return Err(err);
        }

        tracing::debug!(
            %address,
            stage = RetrieveStage::OwnerChecked.as_str(),
            "credential retrieved"
        );
        self.audit.token_access(identity, "retrieve");
        Ok(credential)
    }

    /// Remove the record stored for `identity`. Succeeds if none exists.
    pub async fn revoke(&self, identity: &TenantIdentity) -> Result<()> {
        ensure_identity(identity)?;
        let address = self.deriver.derive(identity);
        self.store.delete(address.as_str()).await?;
        tracing::info!(%address, "credential revoked");
        self.audit.token_access(identity, "revoke");
        Ok(())
    }

    async fn write(&self, identity: &TenantIdentity, credential: &Credential) -> Result<()> {
        ensure_identity(identity)?;
        let address = self.deriver.derive(identity);
        let envelope = self.cipher.encrypt(credential, identity)?;
        let value = envelope.to_json()?;

        self.store
            .put(address.as_str(), value, self.record_ttl)
            .await
            .inspect_err(|err| tracing::error!(%address, error = %err, "failed to persist credential"))?;

        tracing::debug!(%address, "credential persisted");
        Ok(())
    }

    fn violation(&self, identity: &TenantIdentity, stage: RetrieveStage, reason: &str) {
        let mut details = user_metadata(identity);
        details.insert("stage".into(), stage.as_str().into());
        self.audit.security_violation(reason, details);
    }
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("namespace", &self.deriver.namespace())
            .field("record_ttl", &self.record_ttl)
            .finish_non_exhaustive()
    }
}

fn ensure_identity(identity: &TenantIdentity) -> Result<()> {
    if identity.is_empty() {
        return Err(VaultError::InvalidIdentity);
    }
    Ok(())
}
