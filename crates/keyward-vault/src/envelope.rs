//! The persisted, encrypted form of a credential.
//!
//! # Wire format
//!
//! ```json
//! {
//!   "iv": "<base64 96-bit nonce>",
//!   "ciphertext": "<base64 ciphertext || 128-bit GCM tag>",
//!   "tag": "",
//!   "user_id_hash": "<64 hex chars>",
//!   "created_at": 1760000000000,
//!   "expires_at": 1760003600000,
//!   "v": 1
//! }
//! ```
//!
//! `tag` is a legacy field: the authentication tag is embedded in
//! `ciphertext`, so it is always written empty and ignored on read. Records
//! without `v` predate versioning and are read as version 1.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};

/// Current wire format version.
pub const ENVELOPE_VERSION: u8 = 1;

/// An encrypted credential plus its integrity and ownership metadata.
///
/// The ciphertext is opaque; nothing inspects it without decrypting.
#[derive(Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Random nonce, unique per encryption call.
    pub nonce: Vec<u8>,
    /// AES-256-GCM output with the tag appended.
    pub ciphertext: Vec<u8>,
    /// Hex HMAC-SHA256 of the owning tenant identity.
    pub owner_hash: String,
    pub created_at: DateTime<Utc>,
    /// Copied from the credential at encryption time.
    pub expires_at: DateTime<Utc>,
}

impl Envelope {
    /// Serialize to the persisted JSON shape.
    pub fn to_json(&self) -> Result<String> {
        let record = EnvelopeRecord {
            iv: BASE64.encode(&self.nonce),
            ciphertext: BASE64.encode(&self.ciphertext),
            tag: String::new(),
            user_id_hash: self.owner_hash.clone(),
            created_at: self.created_at.timestamp_millis(),
            expires_at: self.expires_at.timestamp_millis(),
            v: ENVELOPE_VERSION,
        };
        Ok(serde_json::to_string(&record)?)
    }

    /// Parse a persisted record.
    ///
    /// Only structure is checked here. Nonce length and owner hash are left
    /// to decryption and ownership validation respectively.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::MalformedData`] if the JSON, base64, timestamps
    /// or version are unusable.
    pub fn from_json(raw: &str) -> Result<Self> {
        let record: EnvelopeRecord = serde_json::from_str(raw).map_err(malformed)?;

        if record.v != ENVELOPE_VERSION {
            return Err(malformed(format!("unsupported envelope version {}", record.v)));
        }

        let nonce = BASE64
            .decode(&record.iv)
            .map_err(|e| malformed(format!("iv: {e}")))?;
        let ciphertext = BASE64
            .decode(&record.ciphertext)
            .map_err(|e| malformed(format!("ciphertext: {e}")))?;
        let created_at = DateTime::from_timestamp_millis(record.created_at)
            .ok_or_else(|| malformed("created_at out of range"))?;
        let expires_at = DateTime::from_timestamp_millis(record.expires_at)
            .ok_or_else(|| malformed("expires_at out of range"))?;

        Ok(Self {
            nonce,
            ciphertext,
            owner_hash: record.user_id_hash,
            created_at,
            expires_at,
        })
    }
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope")
            .field("nonce_len", &self.nonce.len())
            .field("ciphertext_len", &self.ciphertext.len())
            .field("owner_hash", &self.owner_hash)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Serialize, Deserialize)]
struct EnvelopeRecord {
    iv: String,
    ciphertext: String,
    #[serde(default)]
    tag: String,
    user_id_hash: String,
    created_at: i64,
    expires_at: i64,
    #[serde(default = "unversioned")]
    v: u8,
}

fn unversioned() -> u8 {
    1
}

fn malformed(reason: impl std::fmt::Display) -> VaultError {
    VaultError::MalformedData {
        reason: reason.to_string(),
    }
}
