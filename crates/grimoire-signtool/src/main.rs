//! Release signing tool for Grimoire components.
//!
//! `keygen` creates an Ed25519 key pair and prints the release-info
//! fields for the public half; `sign` zips a release directory and
//! appends the detached signature the updater verifies before install.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use grimoire_updater::signing;

#[derive(Parser)]
#[command(
    name = "grimoire-signtool",
    about = "Create signing keys and signed release archives"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a new signing key pair.
    Keygen {
        /// Where to write the private key.
        #[arg(long, default_value = "private.key")]
        out: PathBuf,
    },
    /// Zip a release directory and append its detached signature.
    Sign {
        /// Directory whose contents make up the release.
        source: PathBuf,
        /// Path of the signed archive to create.
        zip: PathBuf,
        /// Private key file created by `keygen`.
        key: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Keygen { out } => {
            let spec = signing::generate_keys(&out)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Saved private key to {}", out.display());
            println!();
            println!("Add these fields to the component's release-info template:");
            println!("\"signatureProviderName\": \"{}\",", spec.provider);
            println!("\"signatureKeyAlgorithm\": \"{}\",", spec.key_algorithm);
            println!("\"signatureAlgorithm\": \"{}\",", spec.algorithm);
            println!("\"signatureKey\": \"{}\"", spec.key);
        }
        Command::Sign { source, zip, key } => {
            signing::zip_and_sign(&source, &zip, &key)
                .with_context(|| format!("failed to sign {}", source.display()))?;
            println!("Created signed archive {}", zip.display());
        }
    }
    Ok(())
}
