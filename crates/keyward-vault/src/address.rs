//! Non-enumerable storage addressing.
//!
//! A tenant's record lives at `"<namespace>:" + hex(HMAC-SHA256(identity))`.
//! The mapping is deterministic under one MAC key, so the same identity always
//! finds its record, but it cannot be inverted or predicted without the key.

use std::sync::Arc;

use ring::hmac;

use crate::credential::TenantIdentity;
use crate::error::{Result, VaultError};
use crate::keys::KeyMaterial;

/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "oauth_tokens";

/// Length of a hex-encoded owner hash.
pub const OWNER_HASH_HEX_LEN: usize = 64;

/// Hex HMAC-SHA256 of `identity` under `key`.
pub(crate) fn owner_hash(key: &hmac::Key, identity: &TenantIdentity) -> String {
    hex::encode(hmac::sign(key, identity.as_bytes()))
}

/// A derived key in the external store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageAddress(String);

impl StorageAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StorageAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Maps tenant identities to storage addresses.
#[derive(Clone)]
pub struct AddressDeriver {
    keys: Arc<KeyMaterial>,
    namespace: String,
}

impl AddressDeriver {
    /// Create a deriver for `namespace`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Configuration`] if the namespace is empty or
    /// contains `:`.
    pub fn new(keys: Arc<KeyMaterial>, namespace: impl Into<String>) -> Result<Self> {
        let namespace = namespace.into();
        if namespace.is_empty() || namespace.contains(':') {
            return Err(VaultError::Configuration {
                reason: format!("invalid storage namespace {namespace:?}"),
            });
        }
        Ok(Self { keys, namespace })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The storage address for `identity`.
    pub fn derive(&self, identity: &TenantIdentity) -> StorageAddress {
        StorageAddress(format!("{}:{}", self.namespace, self.owner_hash(identity)))
    }

    /// The bare hex HMAC of `identity`, as embedded in envelopes.
    pub fn owner_hash(&self, identity: &TenantIdentity) -> String {
        owner_hash(self.keys.mac(), identity)
    }
}

impl std::fmt::Debug for AddressDeriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressDeriver")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}
