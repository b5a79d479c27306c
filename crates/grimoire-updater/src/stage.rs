//! Artifact staging.
//!
//! Downloads pending updates into the staging directory, follows
//! previous-release chains when releases were skipped, and produces the
//! ordered install list.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use grimoire_common::{InstallDirs, errlog};

use crate::RELEASE_INFO_ENTRY;
use crate::error::{Result, UpdateError};
use crate::manifest::InstallEntry;
use crate::release::{ReleaseInfo, SignatureSpec};
use crate::search::PendingUpdate;
use crate::source::Fetch;

struct StagedInstall {
    release_date: String,
    entry: InstallEntry,
}

/// Downloads every pending update, walking multi-hop chains, and returns
/// the install entries ordered by release date ascending. A failed chain
/// is logged and skipped; other chains still proceed.
pub fn stage_updates(
    dirs: &InstallDirs,
    fetch: &dyn Fetch,
    updates: &[PendingUpdate],
) -> Vec<InstallEntry> {
    let mut staged: Vec<StagedInstall> = Vec::new();
    for update in updates {
        if let Err(err) = stage_chain(dirs, fetch, &update.local, &update.download_link, &mut staged)
        {
            errlog::log_error(dirs, &err);
        }
    }
    staged.sort_by(|a, b| a.release_date.cmp(&b.release_date));
    staged.into_iter().map(|install| install.entry).collect()
}

/// Stages one artifact, recursively completing its predecessor first when
/// the embedded manifest names a previous release newer than the locally
/// installed one.
///
/// An artifact is later verified with the signature parameters inherited
/// from the previously trusted chain link. The returned spec is the one
/// applying to the next link: the artifact's own if its manifest declares
/// one (key rotation), otherwise the inherited spec.
fn stage_chain(
    dirs: &InstallDirs,
    fetch: &dyn Fetch,
    local: &ReleaseInfo,
    link: &str,
    staged: &mut Vec<StagedInstall>,
) -> Result<Option<SignatureSpec>> {
    let file_name = link.rsplit('/').next().unwrap_or(link).to_string();
    let dest = dirs.update_dir().join(&file_name);
    fetch.download(link, &dest)?;
    let info = embedded_release_info(&dest)?;
    let local_date = local.release_date.clone().unwrap_or_default();

    let inherited = match &info.previous_release_date {
        Some(previous) if *previous > local_date => {
            // The declared predecessor must be strictly older than the
            // release itself, or the chain is cyclic/inconsistent.
            let release = info.release_date.as_deref().unwrap_or(previous);
            if previous.as_str() >= release {
                return Err(UpdateError::InconsistentChain {
                    link: file_name,
                    previous: previous.clone(),
                    release: release.to_string(),
                });
            }
            let Some(previous_link) = &info.previous_release_link else {
                return Err(UpdateError::MissingPreviousLink { link: file_name });
            };
            stage_chain(dirs, fetch, local, previous_link, staged)?
        }
        _ => local.signature_spec(),
    };

    match &info.release_date {
        Some(release_date) if *release_date > local_date => {
            tracing::info!("staged {file_name} ({release_date})");
            staged.push(StagedInstall {
                release_date: release_date.clone(),
                entry: InstallEntry {
                    file_name,
                    signature: inherited.clone(),
                },
            });
            Ok(info.signature_spec().or(inherited))
        }
        _ => Err(UpdateError::NotNewer { archive: file_name }),
    }
}

fn embedded_release_info(path: &Path) -> Result<ReleaseInfo> {
    let archive_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let file = File::open(path).map_err(|source| UpdateError::Io {
        operation: "open",
        path: path.to_path_buf(),
        source,
    })?;
    let mut archive = zip::ZipArchive::new(file).map_err(|source| UpdateError::Zip {
        archive: archive_name.clone(),
        source,
    })?;
    let mut entry = match archive.by_name(RELEASE_INFO_ENTRY) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(UpdateError::MissingReleaseInfo {
                archive: archive_name,
            });
        }
        Err(source) => {
            return Err(UpdateError::Zip {
                archive: archive_name,
                source,
            });
        }
    };
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes).map_err(|source| UpdateError::Io {
        operation: "read",
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| UpdateError::Manifest {
        origin: archive_name,
        source,
    })
}
