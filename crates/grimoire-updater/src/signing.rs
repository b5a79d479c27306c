//! Release signing.
//!
//! Key-pair generation and zip-and-sign for release directories, the
//! counterpart of [`crate::verify`]. Used by the release tooling, not by
//! the running application.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use ed25519_dalek::{Signer as _, SigningKey};
use zip::write::SimpleFileOptions;

use crate::SIGNATURE_ENTRY;
use crate::error::{Result, UpdateError};
use crate::release::SignatureSpec;
use crate::verify::ED25519;

/// Provider name stamped into generated signature specifications.
pub const PROVIDER: &str = "ed25519-dalek";

/// Generates a new signing key pair.
///
/// The private key (raw 32 bytes) is written to `private_key_path`; the
/// returned spec carries the public half, ready for a component's
/// release-info template.
pub fn generate_keys(private_key_path: &Path) -> Result<SignatureSpec> {
    let mut csprng = rand::rngs::OsRng;
    let signing = SigningKey::generate(&mut csprng);
    fs::write(private_key_path, signing.to_bytes()).map_err(|source| UpdateError::Io {
        operation: "write",
        path: private_key_path.to_path_buf(),
        source,
    })?;
    Ok(SignatureSpec {
        provider: PROVIDER.to_string(),
        key_algorithm: ED25519.to_string(),
        algorithm: ED25519.to_string(),
        key: BASE64_STANDARD.encode(signing.verifying_key().as_bytes()),
    })
}

/// Zips the contents of `source` into `zip_path` and appends a
/// `signature.sig` entry signing every entry's name and content bytes in
/// the order they were written.
pub fn zip_and_sign(source: &Path, zip_path: &Path, private_key_path: &Path) -> Result<()> {
    let signing = read_signing_key(private_key_path)?;
    let file = File::create(zip_path).map_err(|source| UpdateError::Io {
        operation: "create",
        path: zip_path.to_path_buf(),
        source,
    })?;
    let mut writer = zip::ZipWriter::new(file);
    let mut message = Vec::new();
    add_directory(source, source, &mut writer, &mut message)?;

    let signature = signing.sign(&message);
    writer
        .start_file(SIGNATURE_ENTRY, SimpleFileOptions::default())
        .map_err(|source| UpdateError::Zip {
            archive: zip_path.display().to_string(),
            source,
        })?;
    writer
        .write_all(&signature.to_bytes())
        .map_err(|source| UpdateError::Io {
            operation: "write",
            path: zip_path.to_path_buf(),
            source,
        })?;
    writer.finish().map_err(|source| UpdateError::Zip {
        archive: zip_path.display().to_string(),
        source,
    })?;
    tracing::info!("signed {} ({} message bytes)", zip_path.display(), message.len());
    Ok(())
}

fn read_signing_key(path: &Path) -> Result<SigningKey> {
    let bytes = fs::read(path).map_err(|source| UpdateError::Io {
        operation: "read",
        path: path.to_path_buf(),
        source,
    })?;
    let array: [u8; 32] =
        bytes
            .as_slice()
            .try_into()
            .map_err(|_| UpdateError::SignatureInvalid {
                archive: path.display().to_string(),
                reason: "private key must be 32 bytes".to_string(),
            })?;
    Ok(SigningKey::from_bytes(&array))
}

fn add_directory(
    root: &Path,
    dir: &Path,
    writer: &mut zip::ZipWriter<File>,
    message: &mut Vec<u8>,
) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|source| UpdateError::Io {
        operation: "read directory",
        path: dir.to_path_buf(),
        source,
    })?;
    let mut paths: Vec<_> = entries.flatten().map(|entry| entry.path()).collect();
    paths.sort();
    for path in paths {
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        let name = relative.to_string_lossy().replace('\\', "/");
        if path.is_dir() {
            // Directory entries are stored with a trailing slash; the
            // signed name must match the stored one.
            let stored = format!("{name}/");
            writer
                .add_directory(name.as_str(), SimpleFileOptions::default())
                .map_err(|source| UpdateError::Zip {
                    archive: dir.display().to_string(),
                    source,
                })?;
            message.extend_from_slice(stored.as_bytes());
            add_directory(root, &path, writer, message)?;
        } else {
            writer
                .start_file(name.as_str(), SimpleFileOptions::default())
                .map_err(|source| UpdateError::Zip {
                    archive: dir.display().to_string(),
                    source,
                })?;
            message.extend_from_slice(name.as_bytes());
            let mut file = File::open(&path).map_err(|source| UpdateError::Io {
                operation: "open",
                path: path.clone(),
                source,
            })?;
            let mut bytes = Vec::new();
            file.read_to_end(&mut bytes).map_err(|source| UpdateError::Io {
                operation: "read",
                path: path.clone(),
                source,
            })?;
            writer.write_all(&bytes).map_err(|source| UpdateError::Io {
                operation: "write",
                path: path.clone(),
                source,
            })?;
            message.extend_from_slice(&bytes);
        }
    }
    Ok(())
}
