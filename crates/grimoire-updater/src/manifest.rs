//! The pending-install manifest (`update/updateList.txt`).
//!
//! One staged artifact per line, in install order:
//! `filename` for unsigned artifacts, or
//! `filename;provider;keyAlgorithm;signatureAlgorithm;base64Key`.
//! The manifest is the sole durable state between "update staged" and
//! "update applied"; the installer consumes it exactly once.

use std::fs;
use std::path::Path;

use crate::error::{Result, UpdateError};
use crate::release::SignatureSpec;

/// One line of the install manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallEntry {
    /// File name of the staged archive inside the update directory.
    pub file_name: String,
    /// Verification parameters; `None` for unsigned artifacts.
    pub signature: Option<SignatureSpec>,
}

impl InstallEntry {
    /// Parses one manifest line. Lines without all four signature fields
    /// are treated as unsigned.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.splitn(5, ';');
        let file_name = parts.next()?.trim();
        if file_name.is_empty() {
            return None;
        }
        let fields: Vec<&str> = parts.collect();
        let signature = if fields.len() == 4 {
            Some(SignatureSpec {
                provider: fields[0].to_string(),
                key_algorithm: fields[1].to_string(),
                algorithm: fields[2].to_string(),
                key: fields[3].to_string(),
            })
        } else {
            None
        };
        Some(Self {
            file_name: file_name.to_string(),
            signature,
        })
    }

    /// Formats this entry as a manifest line.
    #[must_use]
    pub fn to_line(&self) -> String {
        match &self.signature {
            Some(spec) => format!(
                "{};{};{};{};{}",
                self.file_name, spec.provider, spec.key_algorithm, spec.algorithm, spec.key
            ),
            None => self.file_name.clone(),
        }
    }
}

/// Reads the manifest file.
pub fn read_manifest(path: &Path) -> Result<Vec<InstallEntry>> {
    let content = fs::read_to_string(path).map_err(|source| UpdateError::Io {
        operation: "read",
        path: path.to_path_buf(),
        source,
    })?;
    Ok(content.lines().filter_map(InstallEntry::parse).collect())
}

/// Writes the manifest file, one entry per line.
pub fn write_manifest(path: &Path, entries: &[InstallEntry]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| UpdateError::Io {
            operation: "create directory",
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let mut content = entries
        .iter()
        .map(InstallEntry::to_line)
        .collect::<Vec<_>>()
        .join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    fs::write(path, content).map_err(|source| UpdateError::Io {
        operation: "write",
        path: path.to_path_buf(),
        source,
    })
}
