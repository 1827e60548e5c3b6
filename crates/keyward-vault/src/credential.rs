//! Tenant identities and the plaintext credential payload.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// The stable external identifier (an email address in practice) that owns
/// exactly one credential record.
///
/// Used only as HMAC input when addressing storage; it is never written
/// next to the ciphertext in plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantIdentity(String);

impl TenantIdentity {
    /// Wrap an identity string.
    pub fn new(identity: impl Into<String>) -> Self {
        Self(identity.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for TenantIdentity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TenantIdentity {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for TenantIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Token set returned by an upstream OAuth code exchange or refresh.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
    pub scope: String,
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish()
    }
}

/// A decrypted OAuth credential.
///
/// `owner_id` must equal the tenant identity the credential was stored
/// under; the vault re-checks this on every retrieve.
///
/// Serialized as camelCase JSON with `expiresAt` in epoch milliseconds, so
/// only millisecond precision survives a round trip.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
    pub scope: String,
    /// Account email reported by the OAuth issuer.
    pub issuer_email: String,
    pub owner_id: TenantIdentity,
}

impl Credential {
    /// Bind an upstream token grant to the tenant that authorized it.
    pub fn from_grant(
        grant: TokenGrant,
        owner: &TenantIdentity,
        issuer_email: impl Into<String>,
    ) -> Self {
        Self {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            expires_at: truncate_to_millis(grant.expires_at),
            scope: grant.scope,
            issuer_email: issuer_email.into(),
            owner_id: owner.clone(),
        }
    }

    /// Whether the access token is expired at `now`, treating it as expired
    /// `skew` early.
    pub fn is_expired(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        now + skew >= self.expires_at
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .field("issuer_email", &self.issuer_email)
            .field("owner_id", &self.owner_id)
            .finish()
    }
}

/// Drop sub-millisecond precision, matching what the wire formats keep.
pub(crate) fn truncate_to_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(at.timestamp_millis()).unwrap_or(at)
}
