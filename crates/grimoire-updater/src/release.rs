//! Release manifests and signature parameters.
//!
//! Release dates are opaque strings compared lexicographically; releases
//! use ISO-8601 dates, which order correctly under that comparison.

use serde::{Deserialize, Serialize};

/// Signature-verification parameters for one release artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureSpec {
    /// Implementation that produced the key, informational.
    pub provider: String,
    /// Algorithm of the public key.
    pub key_algorithm: String,
    /// Signature algorithm.
    pub algorithm: String,
    /// Base64-encoded public key.
    pub key: String,
}

/// A release-info manifest.
///
/// The locally installed `update/*.json` files, the remote "latest
/// release" documents, and the `release-info.json` embedded in update
/// archives all share this shape; each producer fills the fields it has.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReleaseInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,

    /// URL of the remote manifest announcing the latest release.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_info: Option<String>,

    /// Download link of the announced release artifact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_link: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_release_date: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_release_link: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_provider_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_key_algorithm: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_algorithm: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_key: Option<String>,
}

impl ReleaseInfo {
    /// The signature parameters, present only when the manifest declares
    /// all four fields.
    #[must_use]
    pub fn signature_spec(&self) -> Option<SignatureSpec> {
        Some(SignatureSpec {
            provider: self.signature_provider_name.clone()?,
            key_algorithm: self.signature_key_algorithm.clone()?,
            algorithm: self.signature_algorithm.clone()?,
            key: self.signature_key.clone()?,
        })
    }
}
