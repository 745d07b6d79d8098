//! `s3-envelope` — example binary entry point.
//!
//! Demonstrates client-side envelope encryption of an object before upload
//! to S3, using a raw 256-bit AES key held in a keyring. Two flows:
//!
//! 1. `upload`: build the keyring, encrypt the example payload under a fixed
//!    encryption context, put the envelope to the fixed bucket/key.
//! 2. `download`: build an equivalent keyring, get the envelope, decrypt it,
//!    print the recovered plaintext.
//!
//! The wrapping key arrives as `--raw-key-b64`. Passing key material on the
//! command line is visible in process listings and shell history; production
//! use would source it from a secret store instead.

mod cli;
mod flows;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = cli::Cli::parse();
    match args.mode {
        cli::Mode::Upload => flows::encrypt_and_upload(&args.raw_key_b64).await?,
        cli::Mode::Download => flows::download_and_decrypt(&args.raw_key_b64).await?,
    }

    Ok(())
}

fn init_tracing() {
    // Respect RUST_LOG when set; default to info. Confirmation output goes to
    // stdout via println!, log lines to the subscriber.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
