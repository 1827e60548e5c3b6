//! Single-use anti-forgery tickets for the authorization redirect.
//!
//! [`CsrfGuard::issue`] draws 256 random bits, stores the requesting tenant
//! under `csrf:<64 hex>` with a time-to-live, and returns the hex token for
//! the outbound `state` parameter. [`CsrfGuard::validate`] checks the token
//! on the callback and deletes the ticket before returning, so a ticket is
//! accepted at most once.
//!
//! A mismatched identity does not consume the ticket: the rightful tenant
//! can still complete the flow.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use keyward_store::KvStore;
use serde::{Deserialize, Serialize};

use crate::audit::{AuditLog, Metadata, user_metadata};
use crate::credential::{TenantIdentity, truncate_to_millis};
use crate::crypto;
use crate::error::{CsrfError, Result, VaultError};

/// Storage key prefix for tickets.
pub const CSRF_KEY_PREFIX: &str = "csrf:";

/// Default ticket lifetime in seconds.
pub const DEFAULT_TICKET_TTL_SECS: u64 = 600;

/// Extra store lifetime past the ticket lifetime. The `issuedAt` age check
/// rejects a stale ticket as expired; the store TTL only reclaims it later.
pub const TICKET_EVICTION_GRACE: Duration = Duration::from_secs(60);

/// Random bytes per token (256 bits).
pub const TOKEN_BYTES: usize = 32;

/// What a ticket remembers about the redirect it was issued for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsrfTicket {
    #[serde(rename = "userId")]
    pub tenant_identity: TenantIdentity,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub issued_at: DateTime<Utc>,
}

/// Issues and redeems anti-forgery tickets.
#[derive(Clone)]
pub struct CsrfGuard {
    store: Arc<dyn KvStore>,
    audit: AuditLog,
    ttl: Duration,
}

impl CsrfGuard {
    /// Create a guard with the default 600 second lifetime.
    pub fn new(store: Arc<dyn KvStore>, audit: AuditLog) -> Self {
        Self {
            store,
            audit,
            ttl: Duration::from_secs(DEFAULT_TICKET_TTL_SECS),
        }
    }

    /// Override the ticket lifetime.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Storage key for `token`.
    pub fn ticket_key(token: &str) -> String {
        format!("{CSRF_KEY_PREFIX}{token}")
    }

    /// Issue a ticket bound to `identity` and return its token.
    pub async fn issue(&self, identity: &TenantIdentity) -> Result<String> {
        if identity.is_empty() {
            return Err(VaultError::InvalidIdentity);
        }

        let token = hex::encode(crypto::random_bytes(TOKEN_BYTES)?);
        let ticket = CsrfTicket {
            tenant_identity: identity.clone(),
            issued_at: truncate_to_millis(Utc::now()),
        };

        self.store
            .put(
                &Self::ticket_key(&token),
                serde_json::to_string(&ticket)?,
                Some(self.ttl.saturating_add(TICKET_EVICTION_GRACE)),
            )
            .await?;

        tracing::debug!(user_id = %identity, ttl_secs = self.ttl.as_secs(), "issued csrf ticket");
        Ok(token)
    }

    /// Redeem `token` for `claimed`.
    ///
    /// # Errors
    ///
    /// - [`CsrfError::MissingTicket`] if no token was supplied.
    /// - [`CsrfError::ExpiredOrUnknown`] if no ticket is stored under it.
    /// - [`CsrfError::IdentityMismatch`] if it was issued to someone else.
    /// - [`CsrfError::Expired`] if it is older than the lifetime.
    pub async fn validate(
        &self,
        token: Option<&str>,
        claimed: &TenantIdentity,
    ) -> Result<CsrfTicket> {
        let token = match token.map(str::trim) {
            Some(token) if !token.is_empty() => token,
            _ => return Err(self.reject(CsrfError::MissingTicket, claimed, None)),
        };

        if !is_token_shaped(token) {
            return Err(self.reject(CsrfError::ExpiredOrUnknown, claimed, None));
        }

        let key = Self::ticket_key(token);
        let Some(raw) = self.store.get(&key).await? else {
            return Err(self.reject(CsrfError::ExpiredOrUnknown, claimed, None));
        };

        let ticket: CsrfTicket = match serde_json::from_str(&raw) {
            Ok(ticket) => ticket,
            Err(err) => {
                tracing::warn!(error = %err, "discarding unreadable csrf ticket");
                self.store.delete(&key).await?;
                return Err(self.reject(CsrfError::ExpiredOrUnknown, claimed, None));
            }
        };

        if ticket.tenant_identity != *claimed {
            return Err(self.reject(
                CsrfError::IdentityMismatch,
                claimed,
                Some(&ticket.tenant_identity),
            ));
        }

        let age = Utc::now().signed_duration_since(ticket.issued_at);
        if age.to_std().is_ok_and(|age| age > self.ttl) {
            self.store.delete(&key).await?;
            return Err(self.reject(CsrfError::Expired, claimed, None));
        }

        self.store.delete(&key).await?;
        self.audit
            .session_validation(claimed, true, "csrf ticket redeemed");
        Ok(ticket)
    }

    fn reject(
        &self,
        error: CsrfError,
        claimed: &TenantIdentity,
        issued_to: Option<&TenantIdentity>,
    ) -> VaultError {
        let mut details: Metadata = user_metadata(claimed);
        details.insert("check".into(), "csrf".into());
        if let Some(issued_to) = issued_to {
            details.insert("ticket_user_id".into(), issued_to.as_str().into());
        }
        self.audit.security_violation(error.reason(), details);
        error.into()
    }
}

impl std::fmt::Debug for CsrfGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsrfGuard")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

fn is_token_shaped(token: &str) -> bool {
    token.len() == TOKEN_BYTES * 2 && token.bytes().all(|b| b.is_ascii_hexdigit())
}
