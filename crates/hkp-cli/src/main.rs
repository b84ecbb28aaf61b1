//! # HKP CLI Entry Point
//!
//! ## Usage
//!
//! ```bash
//! # Search a keyserver pool
//! hkp -k hkp://pool.example.net search alice@example.org
//!
//! # Fetch a key by fingerprint
//! hkp -k hkps://keys.example.org get 0123456789ABCDEF0123456789ABCDEF01234567 > alice.asc
//!
//! # Upload a binary key from stdin
//! gpg --export alice@example.org | hkp put -
//!
//! # Show which pool member would be used
//! hkp hosts pool.example.net
//! ```
//!
//! Without `-k` the keyserver comes from `HKP_KEYSERVER`, then defaults to
//! `hkp://localhost`. Logs go to stderr and honour `RUST_LOG`.

use anyhow::Result;
use hkp_cli::args::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // stdout carries key data, keep logs away from it
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = hkp_cli::commands::run(cli).await {
        tracing::error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}
