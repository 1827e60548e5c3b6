//! Runtime configuration loaded from `config/keyward.toml`.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working in-memory setup. Key material never lives in the file: the
//! `[keys]` section only names the environment variables that hold the
//! base64-encoded keys.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use keyward_store::{KvStore, MemoryStore, SqliteStore};
use serde::{Deserialize, Serialize};

use crate::address::DEFAULT_NAMESPACE;
use crate::audit::AuditLog;
use crate::csrf::DEFAULT_TICKET_TTL_SECS;
use crate::error::{Result, VaultError};
use crate::keys::KeyMaterial;
use crate::vault::VaultOptions;

/// Default location of the configuration file, relative to the working
/// directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/keyward.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywardConfig {
    pub vault: VaultSection,
    pub keys: KeysSection,
    pub csrf: CsrfSection,
    pub store: StoreSection,
    pub audit: AuditSection,
}

/// `[vault]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultSection {
    /// Storage key namespace.
    pub namespace: String,
    /// Record lifetime in seconds; absent keeps records indefinitely.
    pub record_ttl_secs: Option<u64>,
}

impl Default for VaultSection {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            record_ttl_secs: None,
        }
    }
}

/// `[keys]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysSection {
    /// Environment variable holding the base64 AES-256 key.
    pub encryption_key_env: String,
    /// Environment variable holding the base64 HMAC key.
    pub mac_key_env: String,
}

impl Default for KeysSection {
    fn default() -> Self {
        Self {
            encryption_key_env: "KEYWARD_ENCRYPTION_KEY".to_string(),
            mac_key_env: "KEYWARD_MAC_KEY".to_string(),
        }
    }
}

/// `[csrf]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsrfSection {
    pub ttl_secs: u64,
}

impl Default for CsrfSection {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TICKET_TTL_SECS,
        }
    }
}

/// Which [`KvStore`] backend to open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sqlite,
}

/// `[store]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub backend: StoreBackend,
    /// Database file for the `sqlite` backend.
    pub path: PathBuf,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: PathBuf::from("data/keyward.db"),
        }
    }
}

/// Where audit events go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSinkKind {
    #[default]
    Tracing,
    /// Discard audit events. Must be chosen explicitly.
    None,
}

/// `[audit]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditSection {
    pub sink: AuditSinkKind,
}

impl KeywardConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| VaultError::Configuration {
            reason: format!("invalid config: {e}"),
        })
    }

    /// Read configuration from `path`. A missing file yields the defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(VaultError::Configuration {
                reason: format!("cannot read {}: {e}", path.display()),
            }),
        }
    }

    pub fn vault_options(&self) -> VaultOptions {
        VaultOptions {
            namespace: self.vault.namespace.clone(),
            record_ttl: self.vault.record_ttl_secs.map(Duration::from_secs),
        }
    }

    pub fn csrf_ttl(&self) -> Duration {
        Duration::from_secs(self.csrf.ttl_secs)
    }

    pub fn audit_log(&self) -> AuditLog {
        match self.audit.sink {
            AuditSinkKind::Tracing => AuditLog::tracing(),
            AuditSinkKind::None => {
                tracing::warn!("audit sink disabled by configuration");
                AuditLog::noop()
            }
        }
    }

    /// Load key material from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Configuration`] if either variable is unset or
    /// holds unusable key material.
    pub fn key_material(&self) -> Result<KeyMaterial> {
        self.key_material_from(|name| std::env::var(name).ok())
    }

    /// Load key material through `lookup`, which maps a variable name to
    /// its value.
    pub fn key_material_from<F>(&self, lookup: F) -> Result<KeyMaterial>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| VaultError::Configuration {
                    reason: format!("environment variable {name} is not set"),
                })
        };

        let encryption = zeroize::Zeroizing::new(read(&self.keys.encryption_key_env)?);
        let mac = zeroize::Zeroizing::new(read(&self.keys.mac_key_env)?);
        KeyMaterial::from_base64(&encryption, &mac)
    }

    /// Open the configured store backend.
    pub fn open_store(&self) -> Result<Arc<dyn KvStore>> {
        match self.store.backend {
            StoreBackend::Memory => {
                tracing::info!("using in-memory store");
                Ok(Arc::new(MemoryStore::new()))
            }
            StoreBackend::Sqlite => {
                if let Some(parent) = self.store.path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent).map_err(|e| {
                            VaultError::Configuration {
                                reason: format!("cannot create {}: {e}", parent.display()),
                            }
                        })?;
                    }
                }
                let store = SqliteStore::open(&self.store.path)?;
                tracing::info!(path = %self.store.path.display(), "using sqlite store");
                Ok(Arc::new(store))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = KeywardConfig::from_toml_str("").unwrap();
        assert_eq!(config, KeywardConfig::default());
        assert_eq!(config.vault.namespace, "oauth_tokens");
        assert_eq!(config.csrf_ttl(), Duration::from_secs(600));
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.audit.sink, AuditSinkKind::Tracing);
        assert_eq!(config.vault_options(), VaultOptions::default());
    }

    #[test]
    fn parses_all_sections() {
        let config = KeywardConfig::from_toml_str(
            r#"
            [vault]
            namespace = "gmail_tokens"
            record_ttl_secs = 86400

            [keys]
            encryption_key_env = "ENC"
            mac_key_env = "MAC"

            [csrf]
            ttl_secs = 300

            [store]
            backend = "sqlite"
            path = "/var/lib/keyward/kv.db"

            [audit]
            sink = "none"
            "#,
        )
        .unwrap();

        let options = config.vault_options();
        assert_eq!(options.namespace, "gmail_tokens");
        assert_eq!(options.record_ttl, Some(Duration::from_secs(86400)));
        assert_eq!(config.keys.encryption_key_env, "ENC");
        assert_eq!(config.csrf_ttl(), Duration::from_secs(300));
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.store.path, PathBuf::from("/var/lib/keyward/kv.db"));
        assert_eq!(config.audit.sink, AuditSinkKind::None);
    }

    #[test]
    fn rejects_unknown_backend() {
        let err = KeywardConfig::from_toml_str("[store]\nbackend = \"redis\"").unwrap_err();
        assert!(matches!(err, VaultError::Configuration { .. }));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = KeywardConfig::from_file(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, KeywardConfig::default());
    }

    #[test]
    fn key_material_from_lookup() {
        let config = KeywardConfig::default();
        let env = HashMap::from([
            ("KEYWARD_ENCRYPTION_KEY", STANDARD.encode([1u8; 32])),
            ("KEYWARD_MAC_KEY", STANDARD.encode([2u8; 48])),
        ]);
        assert!(
            config
                .key_material_from(|name| env.get(name).cloned())
                .is_ok()
        );
    }

    #[test]
    fn missing_key_variable_is_configuration_error() {
        let config = KeywardConfig::default();
        let env = HashMap::from([("KEYWARD_ENCRYPTION_KEY", STANDARD.encode([1u8; 32]))]);
        let err = config
            .key_material_from(|name| env.get(name).cloned())
            .unwrap_err();
        match err {
            VaultError::Configuration { reason } => assert!(reason.contains("KEYWARD_MAC_KEY")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn short_key_is_configuration_error() {
        let config = KeywardConfig::default();
        let env = HashMap::from([
            ("KEYWARD_ENCRYPTION_KEY", STANDARD.encode([1u8; 16])),
            ("KEYWARD_MAC_KEY", STANDARD.encode([2u8; 32])),
        ]);
        assert!(matches!(
            config.key_material_from(|name| env.get(name).cloned()),
            Err(VaultError::Configuration { .. })
        ));
    }

    #[tokio::test]
    async fn opens_sqlite_store_under_new_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = KeywardConfig::default();
        config.store.backend = StoreBackend::Sqlite;
        config.store.path = dir.path().join("nested").join("kv.db");

        let store = config.open_store().unwrap();
        store.put("k", "v".into(), None).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        assert!(config.store.path.exists());
    }
}
