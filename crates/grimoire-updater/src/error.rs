//! Error types for the update protocol.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while searching for, staging, verifying, or
/// executing updates.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UpdateError {
    /// Network request failed.
    #[error("network error: {0}")]
    Network(String),

    /// I/O error during file operations.
    #[error("failed to {operation} {path}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A staged archive could not be read.
    #[error("archive error in {archive}")]
    Zip {
        archive: String,
        #[source]
        source: zip::result::ZipError,
    },

    /// A release manifest could not be parsed.
    #[error("malformed release manifest from {origin}")]
    Manifest {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    /// A staged archive carries no embedded release manifest.
    #[error("{archive} has no release-info.json entry")]
    MissingReleaseInfo { archive: String },

    /// A signed artifact carries no detached signature.
    #[error("{archive} is not signed")]
    MissingSignature { archive: String },

    /// The detached signature did not verify.
    #[error("signature verification failed for {archive}: {reason}")]
    SignatureInvalid { archive: String, reason: String },

    /// The manifest declares a signature algorithm this build does not
    /// understand.
    #[error("unsupported signature algorithm {algorithm}")]
    UnsupportedAlgorithm { algorithm: String },

    /// An update chain declares a previous release that is not strictly
    /// older than the release itself.
    #[error("inconsistent update chain for {link}: {previous} is not older than {release}")]
    InconsistentChain {
        link: String,
        previous: String,
        release: String,
    },

    /// An update chain names a previous release but no link to it.
    #[error("update chain for {link} names a previous release without a link")]
    MissingPreviousLink { link: String },

    /// A fetched artifact does not supersede the installed release.
    #[error("{archive} does not supersede the installed release")]
    NotNewer { archive: String },
}

impl UpdateError {
    /// Whether this failure means trust in the artifact could not be
    /// established. Such artifacts are deleted from the staging area and
    /// nothing from them is applied.
    #[must_use]
    pub fn is_trust_failure(&self) -> bool {
        matches!(
            self,
            Self::MissingSignature { .. }
                | Self::SignatureInvalid { .. }
                | Self::UnsupportedAlgorithm { .. }
        )
    }
}

impl From<reqwest::Error> for UpdateError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

/// Result type alias for update operations.
pub type Result<T> = std::result::Result<T, UpdateError>;
