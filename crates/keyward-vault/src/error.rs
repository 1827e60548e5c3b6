//! Vault error types.
//!
//! Every vault and CSRF operation surfaces errors through [`VaultError`].
//! The variants keep the internal distinctions (which validation layer
//! rejected a request) for the audit trail and for callers that need to
//! branch; user-facing text should come from
//! [`ReauthPrompt`](crate::reauth::ReauthPrompt), which collapses them.

use keyward_store::StoreError;

/// Failures of the single-use anti-forgery ticket check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CsrfError {
    /// No ticket was supplied with the callback.
    #[error("csrf ticket missing")]
    MissingTicket,

    /// The ticket was never issued, was already consumed, or was evicted.
    #[error("csrf ticket expired or unknown")]
    ExpiredOrUnknown,

    /// The ticket was issued for a different tenant.
    #[error("csrf ticket identity mismatch")]
    IdentityMismatch,

    /// The ticket is older than its time-to-live.
    #[error("csrf ticket expired")]
    Expired,
}

impl CsrfError {
    /// Short machine-readable reason used in audit metadata.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingTicket => "missing_ticket",
            Self::ExpiredOrUnknown => "expired_or_unknown",
            Self::IdentityMismatch => "identity_mismatch",
            Self::Expired => "expired",
        }
    }
}

/// Unified error type for the keyward credential vault.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    // -- Startup ------------------------------------------------------------
    /// Key material or configuration is unusable. Fatal at startup.
    #[error("invalid configuration: {reason}")]
    Configuration { reason: String },

    /// An empty tenant identity was supplied.
    #[error("tenant identity must not be empty")]
    InvalidIdentity,

    // -- Retrieval ----------------------------------------------------------
    /// No credential is stored for the tenant.
    #[error("credential not found")]
    NotFound,

    /// The persisted record could not be parsed.
    #[error("malformed credential record: {reason}")]
    MalformedData { reason: String },

    /// The stored owner hash does not match the requesting tenant.
    #[error("session validation failed")]
    SessionValidation,

    /// Authenticated decryption failed (tag mismatch or bad nonce).
    #[error("decryption failed: {reason}")]
    Decryption { reason: String },

    /// The decrypted credential belongs to a different tenant.
    #[error("credential ownership mismatch")]
    Ownership { expected: String, actual: String },

    // -- Storage ------------------------------------------------------------
    /// The system random number generator failed.
    #[error("system randomness unavailable")]
    Entropy,

    /// Encryption failed (sealing error).
    #[error("encryption failed: {reason}")]
    Encryption { reason: String },

    /// Anti-forgery ticket validation failed.
    #[error(transparent)]
    Csrf(#[from] CsrfError),

    /// The key-value backend failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// JSON serialization error on the write path.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl VaultError {
    /// Whether the failure came from one of the ownership or integrity
    /// layers, as opposed to a missing record or infrastructure fault.
    pub fn is_security_violation(&self) -> bool {
        matches!(
            self,
            Self::SessionValidation | Self::Decryption { .. } | Self::Ownership { .. }
        )
    }

    /// Whether the caller should send the tenant through authorization again.
    pub fn requires_reauthorization(&self) -> bool {
        matches!(
            self,
            Self::NotFound
                | Self::MalformedData { .. }
                | Self::SessionValidation
                | Self::Decryption { .. }
                | Self::Ownership { .. }
                | Self::Csrf(_)
        )
    }
}

/// Convenience alias used throughout the vault crate.
pub type Result<T> = std::result::Result<T, VaultError>;
