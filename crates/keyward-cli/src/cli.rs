//! CLI argument definitions for keyward.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// keyward: encrypted multi-tenant OAuth credential vault.
#[derive(Parser)]
#[command(
    name = "keyward",
    version,
    about = "keyward: encrypted multi-tenant OAuth credential vault",
    long_about = "Stores third-party OAuth credentials per tenant with AES-256-GCM \
                  encryption, HMAC-derived storage addresses and ownership checks on \
                  every read."
)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, short, global = true, default_value = keyward_vault::config::DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print a fresh pair of base64 keys in `.env` format.
    Keygen,

    /// Show the storage address for a tenant.
    Address {
        /// Tenant identity (usually an email address).
        identity: String,
    },

    /// Encrypt and store a token grant for a tenant.
    Store {
        identity: String,

        /// JSON file with `accessToken`, `refreshToken`, `expiresAt` (epoch
        /// ms) and `scope`.
        #[arg(long)]
        grant: PathBuf,

        /// Account email reported by the issuer. Defaults to the identity.
        #[arg(long)]
        issuer_email: Option<String>,

        /// Record the write as a token refresh instead of a new
        /// authorization.
        #[arg(long)]
        refresh: bool,
    },

    /// Decrypt and print the credential stored for a tenant.
    Retrieve {
        identity: String,

        /// Print token values instead of redacting them.
        #[arg(long)]
        reveal: bool,

        /// Service base URL used for the re-authorization link.
        #[arg(long, default_value = "http://localhost:8080")]
        base_url: String,
    },

    /// Delete the credential stored for a tenant.
    Revoke { identity: String },

    /// Issue and redeem anti-forgery tickets.
    Csrf {
        #[command(subcommand)]
        action: CsrfAction,
    },
}

#[derive(Subcommand)]
pub enum CsrfAction {
    /// Issue a ticket and print its token.
    Issue { identity: String },

    /// Redeem a ticket for a tenant.
    Validate { identity: String, token: String },
}
