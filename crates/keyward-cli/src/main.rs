//! CLI entry point for keyward.
//!
//! This binary provides the `keyward` command for operators: generating
//! keys, inspecting storage addresses, and storing, reading and revoking
//! tenant credentials against the configured store.

mod cli;
mod helpers;

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use clap::Parser;
use keyward_vault::keys::{ENCRYPTION_KEY_LEN, MIN_MAC_KEY_LEN};
use keyward_vault::{Credential, ReauthPrompt, TenantIdentity, TokenGrant};
use tracing::info;
use url::Url;

use crate::cli::{Cli, Commands, CsrfAction};
use crate::helpers::{Runtime, init_tracing, load_runtime, render_credential};

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing("info");

    match cli.command {
        Commands::Keygen => cmd_keygen(),
        Commands::Address { identity } => {
            let rt = load_runtime(&cli.config)?;
            let address = rt.vault.address_of(&TenantIdentity::from(identity))?;
            println!("{address}");
            Ok(())
        }
        Commands::Store {
            identity,
            grant,
            issuer_email,
            refresh,
        } => {
            let rt = load_runtime(&cli.config)?;
            let raw = std::fs::read_to_string(&grant)
                .with_context(|| format!("failed to read {}", grant.display()))?;
            let grant: TokenGrant =
                serde_json::from_str(&raw).context("grant file is not a valid token grant")?;
            cmd_store(&rt, identity, grant, issuer_email, refresh).await
        }
        Commands::Retrieve {
            identity,
            reveal,
            base_url,
        } => {
            let rt = load_runtime(&cli.config)?;
            cmd_retrieve(&rt, identity, reveal, &base_url).await
        }
        Commands::Revoke { identity } => {
            let rt = load_runtime(&cli.config)?;
            rt.vault.revoke(&TenantIdentity::from(identity)).await?;
            println!("revoked");
            Ok(())
        }
        Commands::Csrf { action } => {
            let rt = load_runtime(&cli.config)?;
            cmd_csrf(&rt, action).await
        }
    }
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

fn cmd_keygen() -> Result<()> {
    let encryption = keyward_vault::crypto::random_bytes(ENCRYPTION_KEY_LEN)?;
    let mac = keyward_vault::crypto::random_bytes(MIN_MAC_KEY_LEN)?;
    println!("KEYWARD_ENCRYPTION_KEY={}", STANDARD.encode(encryption));
    println!("KEYWARD_MAC_KEY={}", STANDARD.encode(mac));
    Ok(())
}

async fn cmd_store(
    rt: &Runtime,
    identity: String,
    grant: TokenGrant,
    issuer_email: Option<String>,
    refresh: bool,
) -> Result<()> {
    let identity = TenantIdentity::from(identity);
    let issuer_email = issuer_email.unwrap_or_else(|| identity.as_str().to_string());
    let credential = Credential::from_grant(grant, &identity, issuer_email);

    if refresh {
        rt.vault.store_refreshed(&identity, &credential).await?;
    } else {
        rt.vault.complete_authorization(&identity, &credential).await?;
    }

    info!(user_id = %identity, refresh, "credential stored");
    println!("{}", rt.vault.address_of(&identity)?);
    Ok(())
}

async fn cmd_retrieve(rt: &Runtime, identity: String, reveal: bool, base_url: &str) -> Result<()> {
    let identity = TenantIdentity::from(identity);
    let base_url = Url::parse(base_url).context("invalid --base-url")?;

    match rt.vault.retrieve(&identity).await {
        Ok(credential) => {
            println!("{}", render_credential(&credential, reveal)?);
            Ok(())
        }
        Err(err) => match ReauthPrompt::for_error(&err, &base_url, &identity)? {
            Some(prompt) => {
                println!("{prompt}");
                std::process::exit(2);
            }
            None => Err(err.into()),
        },
    }
}

async fn cmd_csrf(rt: &Runtime, action: CsrfAction) -> Result<()> {
    match action {
        CsrfAction::Issue { identity } => {
            let token = rt.csrf.issue(&TenantIdentity::from(identity)).await?;
            println!("{token}");
        }
        CsrfAction::Validate { identity, token } => {
            let ticket = rt
                .csrf
                .validate(Some(&token), &TenantIdentity::from(identity))
                .await?;
            println!("valid ticket for {} issued at {}", ticket.tenant_identity, ticket.issued_at);
        }
    }
    Ok(())
}
