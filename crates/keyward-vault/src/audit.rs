//! Structured security audit log.
//!
//! Every security-relevant vault and CSRF event becomes one [`AuditEvent`]
//! handed to an [`AuditSink`]. The sink is injected when the [`AuditLog`] is
//! built; choosing [`NoopAuditSink`] is an explicit decision, never a
//! default.
//!
//! # Severity
//!
//! | Category             | Level                      |
//! |----------------------|----------------------------|
//! | `auth_success`       | INFO                       |
//! | `token_access`       | INFO                       |
//! | `token_refresh`      | INFO, WARN on failure      |
//! | `session_validation` | WARN                       |
//! | `security_violation` | ERROR                      |
//!
//! Metadata is a flat string/number/boolean map. Keys that name secret
//! material are masked before an event reaches the sink.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::credential::TenantIdentity;

/// Metadata keys whose values are always masked.
const SECRET_KEYS: &[&str] = &[
    "access_token",
    "refresh_token",
    "ciphertext",
    "plaintext",
    "encryption_key",
    "mac_key",
    "iv",
    "nonce",
];

const MASK: &str = "[REDACTED]";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Severity of an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditLevel {
    Info,
    Warn,
    Error,
}

/// What kind of event was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    AuthSuccess,
    TokenRefresh,
    TokenAccess,
    SecurityViolation,
    SessionValidation,
}

impl AuditCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthSuccess => "auth_success",
            Self::TokenRefresh => "token_refresh",
            Self::TokenAccess => "token_access",
            Self::SecurityViolation => "security_violation",
            Self::SessionValidation => "session_validation",
        }
    }
}

impl std::fmt::Display for AuditCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Event metadata, ordered by key for stable output.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// One structured audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// ISO-8601 timestamp.
    pub timestamp: DateTime<Utc>,
    pub level: AuditLevel,
    pub category: AuditCategory,
    pub message: String,
    pub metadata: Metadata,
}

impl AuditEvent {
    /// Look up a text metadata value.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.metadata.get(key) {
            Some(MetadataValue::Text(value)) => Some(value),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Destination for audit events.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Emits each event as a `tracing` event with target `keyward::audit`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        let metadata = serde_json::to_string(&event.metadata).unwrap_or_default();
        let category = event.category.as_str();
        match event.level {
            AuditLevel::Info => tracing::info!(
                target: "keyward::audit",
                category,
                metadata = %metadata,
                "{}",
                event.message
            ),
            AuditLevel::Warn => tracing::warn!(
                target: "keyward::audit",
                category,
                metadata = %metadata,
                "{}",
                event.message
            ),
            AuditLevel::Error => tracing::error!(
                target: "keyward::audit",
                category,
                metadata = %metadata,
                "{}",
                event.message
            ),
        }
    }
}

/// Keeps events in memory for inspection.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.lock().clone()
    }

    /// Events of one category, oldest first.
    pub fn events_in(&self, category: AuditCategory) -> Vec<AuditEvent> {
        self.lock()
            .iter()
            .filter(|e| e.category == category)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<AuditEvent>> {
        self.events.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        self.lock().push(event);
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: AuditEvent) {}
}

// ---------------------------------------------------------------------------
// AuditLog
// ---------------------------------------------------------------------------

/// Typed front-end over an [`AuditSink`], shared by the vault and the CSRF
/// guard.
#[derive(Clone)]
pub struct AuditLog {
    sink: Arc<dyn AuditSink>,
}

impl AuditLog {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Log through [`TracingAuditSink`].
    pub fn tracing() -> Self {
        Self::new(Arc::new(TracingAuditSink))
    }

    /// Log nowhere.
    pub fn noop() -> Self {
        Self::new(Arc::new(NoopAuditSink))
    }

    /// Record an arbitrary event. Secret-named metadata keys are masked.
    pub fn emit(
        &self,
        level: AuditLevel,
        category: AuditCategory,
        message: impl Into<String>,
        mut metadata: Metadata,
    ) {
        for (key, value) in metadata.iter_mut() {
            if SECRET_KEYS.contains(&key.as_str()) {
                *value = MetadataValue::Text(MASK.into());
            }
        }

        self.sink.record(AuditEvent {
            timestamp: Utc::now(),
            level,
            category,
            message: message.into(),
            metadata,
        });
    }

    /// A tenant completed the authorization flow.
    pub fn auth_success(&self, identity: &TenantIdentity) {
        self.emit(
            AuditLevel::Info,
            AuditCategory::AuthSuccess,
            "authorization completed",
            user_metadata(identity),
        );
    }

    /// A token refresh finished.
    pub fn token_refresh(&self, identity: &TenantIdentity, success: bool, detail: Option<&str>) {
        let mut metadata = user_metadata(identity);
        metadata.insert("success".into(), success.into());
        if let Some(detail) = detail {
            metadata.insert("detail".into(), detail.into());
        }
        let (level, message) = if success {
            (AuditLevel::Info, "token refreshed")
        } else {
            (AuditLevel::Warn, "token refresh failed")
        };
        self.emit(level, AuditCategory::TokenRefresh, message, metadata);
    }

    /// A stored credential was read, written or removed.
    pub fn token_access(&self, identity: &TenantIdentity, operation: &str) {
        let mut metadata = user_metadata(identity);
        metadata.insert("operation".into(), operation.into());
        self.emit(
            AuditLevel::Info,
            AuditCategory::TokenAccess,
            format!("token {operation}"),
            metadata,
        );
    }

    /// A validation layer rejected a request.
    pub fn security_violation(&self, reason: &str, details: Metadata) {
        let mut metadata = details;
        metadata.insert("reason".into(), reason.into());
        self.emit(
            AuditLevel::Error,
            AuditCategory::SecurityViolation,
            format!("security violation: {reason}"),
            metadata,
        );
    }

    /// Outcome of a session or ownership check.
    pub fn session_validation(&self, identity: &TenantIdentity, valid: bool, reason: &str) {
        let mut metadata = user_metadata(identity);
        metadata.insert("valid".into(), valid.into());
        metadata.insert("reason".into(), reason.into());
        self.emit(
            AuditLevel::Warn,
            AuditCategory::SessionValidation,
            if valid {
                "session validated"
            } else {
                "session validation failed"
            },
            metadata,
        );
    }
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog").finish_non_exhaustive()
    }
}

/// Metadata seeded with the tenant identity.
pub fn user_metadata(identity: &TenantIdentity) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("user_id".into(), identity.as_str().into());
    metadata
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
