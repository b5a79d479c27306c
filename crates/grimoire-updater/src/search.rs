//! Update discovery.
//!
//! Every installed component (the application and each plugin) keeps a
//! release-info manifest under `update/`. The search fetches each
//! manifest's declared remote "latest release" document and records a
//! pending update when the remote release date is newer. A failed fetch
//! means "no update available from this source" and stays silent.

use std::fs;
use std::path::Path;

use grimoire_common::{InstallDirs, errlog};

use crate::release::ReleaseInfo;
use crate::source::Fetch;

/// A locally installed component whose remote manifest announces a newer
/// release.
#[derive(Debug, Clone)]
pub struct PendingUpdate {
    /// The locally installed release info.
    pub local: ReleaseInfo,
    /// Download link of the newer artifact.
    pub download_link: String,
}

/// Scans `update/*.json` for components with a newer remote release.
pub fn search_updates(dirs: &InstallDirs, fetch: &dyn Fetch) -> Vec<PendingUpdate> {
    let mut manifests = Vec::new();
    match fs::read_dir(dirs.update_dir()) {
        Ok(entries) => {
            for entry in entries.flatten() {
                let path = entry.path();
                if path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
                {
                    manifests.push(path);
                }
            }
        }
        Err(err) => {
            errlog::log_error(dirs, &err);
            return Vec::new();
        }
    }
    manifests.sort();
    manifests
        .iter()
        .filter_map(|path| search_one(dirs, path, fetch))
        .collect()
}

fn search_one(dirs: &InstallDirs, path: &Path, fetch: &dyn Fetch) -> Option<PendingUpdate> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            errlog::log_error(dirs, &err);
            return None;
        }
    };
    let local: ReleaseInfo = match serde_json::from_slice(&bytes) {
        Ok(info) => info,
        Err(err) => {
            errlog::log_error(dirs, &err);
            return None;
        }
    };
    let link = local.update_info.clone()?;
    let local_date = local.release_date.clone()?;
    let remote = fetch.fetch_manifest(&link).ok()?;
    let remote_date = remote.release_date?;
    if remote_date > local_date {
        tracing::info!(
            "update available for {} ({local_date} -> {remote_date})",
            path.display()
        );
        Some(PendingUpdate {
            local,
            download_link: remote.release_link?,
        })
    } else {
        None
    }
}
