//! Shared helper functions used across CLI subcommands.
//!
//! Includes tracing initialization, vault construction from configuration
//! and output formatting.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use keyward_vault::{Credential, CsrfGuard, KeywardConfig, Vault};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber with the given default log level.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

// ---------------------------------------------------------------------------
// Runtime wiring
// ---------------------------------------------------------------------------

/// Everything a subcommand needs, built from one configuration file.
pub struct Runtime {
    pub vault: Vault,
    pub csrf: CsrfGuard,
}

/// Load `.env`, read the configuration and open the vault and CSRF guard
/// over the configured store.
pub fn load_runtime(config_path: &Path) -> Result<Runtime> {
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!(error = %e, "no .env file loaded");
    }

    let config = KeywardConfig::from_file(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    let keys = Arc::new(
        config
            .key_material()
            .context("failed to load vault keys from the environment")?,
    );
    let store = config.open_store().context("failed to open store")?;
    let audit = config.audit_log();

    let vault = Vault::new(keys, Arc::clone(&store), audit.clone(), config.vault_options())
        .context("failed to build vault")?;
    let csrf = CsrfGuard::new(store, audit).with_ttl(config.csrf_ttl());

    Ok(Runtime { vault, csrf })
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Render a credential as pretty JSON, masking token values unless `reveal`
/// is set.
pub fn render_credential(credential: &Credential, reveal: bool) -> Result<String> {
    let mut value = serde_json::to_value(credential)?;
    if !reveal {
        for field in ["accessToken", "refreshToken"] {
            if let Some(slot) = value.get_mut(field) {
                *slot = serde_json::Value::from("[REDACTED]");
            }
        }
    }
    Ok(serde_json::to_string_pretty(&value)?)
}
