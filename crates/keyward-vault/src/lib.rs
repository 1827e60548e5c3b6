//! Multi-tenant OAuth credential vault.
//!
//! Credentials are sealed with AES-256-GCM and stored at an HMAC-derived
//! address, so neither the stored bytes nor the storage keys reveal which
//! tenant they belong to. Every retrieve passes three ownership layers in
//! order: the stored owner hash, authenticated decryption, and the owner
//! embedded in the plaintext. A separate [`CsrfGuard`] issues the single-use
//! tickets that protect the authorization redirect.
//!
//! # Modules
//!
//! - [`keys`]: AES and HMAC key material.
//! - [`crypto`]: sealing and opening credentials.
//! - [`envelope`]: the persisted record format.
//! - [`address`]: HMAC storage addressing.
//! - [`ownership`]: owner hash and embedded owner checks.
//! - [`vault`]: the store/retrieve orchestrator.
//! - [`csrf`]: anti-forgery tickets.
//! - [`audit`]: structured security audit events.
//! - [`reauth`]: the user-facing re-authorization prompt.
//! - [`config`]: TOML and environment configuration.
//! - [`error`]: unified error types.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use keyward_store::MemoryStore;
//! use keyward_vault::{
//!     AuditLog, Credential, KeyMaterial, TenantIdentity, TokenGrant, Vault, VaultOptions,
//! };
//!
//! # async fn example(grant: TokenGrant) -> keyward_vault::Result<()> {
//! let keys = Arc::new(KeyMaterial::generate()?);
//! let vault = Vault::new(
//!     keys,
//!     Arc::new(MemoryStore::new()),
//!     AuditLog::tracing(),
//!     VaultOptions::default(),
//! )?;
//!
//! let alice = TenantIdentity::from("alice@example.com");
//! let credential = Credential::from_grant(grant, &alice, "alice@example.com");
//! vault.complete_authorization(&alice, &credential).await?;
//!
//! let restored = vault.retrieve(&alice).await?;
//! assert_eq!(restored, credential);
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod audit;
pub mod config;
pub mod credential;
pub mod crypto;
pub mod csrf;
pub mod envelope;
pub mod error;
pub mod keys;
pub mod ownership;
pub mod reauth;
pub mod vault;

// Re-export the most commonly used types at the crate root for convenience.
pub use address::{AddressDeriver, StorageAddress};
pub use audit::{AuditCategory, AuditEvent, AuditLevel, AuditLog, AuditSink, MemoryAuditSink};
pub use config::KeywardConfig;
pub use credential::{Credential, TenantIdentity, TokenGrant};
pub use crypto::Cipher;
pub use csrf::{CsrfGuard, CsrfTicket};
pub use envelope::Envelope;
pub use error::{CsrfError, Result, VaultError};
pub use keys::KeyMaterial;
pub use ownership::OwnershipValidator;
pub use reauth::ReauthPrompt;
pub use vault::{Vault, VaultOptions};
