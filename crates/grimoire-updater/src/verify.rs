//! Detached-signature verification for update archives.
//!
//! The signature covers every entry except `signature.sig` itself, in
//! archive iteration order: the entry's path-name bytes followed by, for
//! file entries, the full content bytes. The install manifest declares
//! which key and algorithms apply; only Ed25519 is understood, anything
//! else is a trust failure.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use ed25519_dalek::{Signature, VerifyingKey};

use crate::SIGNATURE_ENTRY;
use crate::error::{Result, UpdateError};
use crate::release::SignatureSpec;

/// The signature algorithm this build understands.
pub const ED25519: &str = "Ed25519";

/// Verifies the detached signature embedded in an update archive against
/// the declared parameters.
pub fn verify_archive(path: &Path, spec: &SignatureSpec) -> Result<()> {
    let archive_name = archive_name(path);
    if spec.algorithm != ED25519 || spec.key_algorithm != ED25519 {
        return Err(UpdateError::UnsupportedAlgorithm {
            algorithm: spec.algorithm.clone(),
        });
    }
    let key = parse_public_key(&spec.key).map_err(|reason| UpdateError::SignatureInvalid {
        archive: archive_name.clone(),
        reason,
    })?;

    let file = File::open(path).map_err(|source| UpdateError::Io {
        operation: "open",
        path: path.to_path_buf(),
        source,
    })?;
    let mut archive = zip::ZipArchive::new(file).map_err(|source| UpdateError::Zip {
        archive: archive_name.clone(),
        source,
    })?;

    let mut message = Vec::new();
    let mut signature_bytes: Option<Vec<u8>> = None;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|source| UpdateError::Zip {
            archive: archive_name.clone(),
            source,
        })?;
        let name = entry.name().to_string();
        if name == SIGNATURE_ENTRY {
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes).map_err(|source| UpdateError::Io {
                operation: "read",
                path: path.to_path_buf(),
                source,
            })?;
            signature_bytes = Some(bytes);
            continue;
        }
        message.extend_from_slice(name.as_bytes());
        if !entry.is_dir() {
            entry
                .read_to_end(&mut message)
                .map_err(|source| UpdateError::Io {
                    operation: "read",
                    path: path.to_path_buf(),
                    source,
                })?;
        }
    }

    let Some(signature_bytes) = signature_bytes else {
        return Err(UpdateError::MissingSignature {
            archive: archive_name,
        });
    };
    let signature = Signature::from_slice(&signature_bytes).map_err(|err| {
        UpdateError::SignatureInvalid {
            archive: archive_name.clone(),
            reason: err.to_string(),
        }
    })?;
    key.verify_strict(&message, &signature)
        .map_err(|_| UpdateError::SignatureInvalid {
            archive: archive_name,
            reason: "signature mismatch".to_string(),
        })?;
    tracing::debug!("verified signature over {} message bytes", message.len());
    Ok(())
}

pub(crate) fn parse_public_key(encoded: &str) -> std::result::Result<VerifyingKey, String> {
    let bytes = BASE64_STANDARD
        .decode(encoded.trim())
        .map_err(|err| format!("invalid base64 public key: {err}"))?;
    let array: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| "public key must be 32 bytes".to_string())?;
    VerifyingKey::from_bytes(&array).map_err(|err| format!("invalid public key: {err}"))
}

fn archive_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
