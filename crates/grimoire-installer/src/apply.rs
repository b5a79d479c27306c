//! Applies staged update archives onto the install root.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;

use grimoire_common::{InstallDirs, errlog};

// Wire format shared with the updater: entry names inside update
// archives that are never extracted onto the install root.
const INSTALLER_ENTRY: &str = "update/grimoire-installer";
const RELEASE_INFO_ENTRY: &str = "release-info.json";
const SIGNATURE_ENTRY: &str = "signature.sig";
const DELETED_LIST_ENTRY: &str = "deleted.txt";

/// How many parent links a deletion target may be away from the install
/// root before it is refused.
const MAX_PARENT_WALK: usize = 20;

/// Applies every archive named in the pending-install manifest, then
/// deletes the manifest.
pub fn apply_pending(dirs: &InstallDirs) {
    let list = dirs.update_list_file();
    let content = match fs::read_to_string(&list) {
        Ok(content) => content,
        Err(err) => {
            errlog::log_error(dirs, &err);
            return;
        }
    };
    for line in content.lines() {
        // Only the file name matters here; the signature fields on the
        // line were consumed during the verification pass.
        let Some(file_name) = line.split(';').next().map(str::trim) else {
            continue;
        };
        if file_name.is_empty() {
            continue;
        }
        apply_archive(dirs, file_name);
    }
    if let Err(err) = fs::remove_file(&list) {
        errlog::log_error(dirs, &err);
    }
}

/// Applies one staged archive. The archive is deleted afterward
/// regardless of the outcome.
fn apply_archive(dirs: &InstallDirs, file_name: &str) {
    let zip_path = dirs.update_dir().join(file_name);
    eprintln!("[installer] applying {file_name}");
    if let Err(err) = extract_archive(dirs, &zip_path) {
        errlog::log_error(dirs, &err);
    }
    if let Err(err) = fs::remove_file(&zip_path) {
        errlog::log_error(dirs, &err);
    }
}

fn extract_archive(dirs: &InstallDirs, zip_path: &Path) -> io::Result<()> {
    let file = File::open(zip_path)?;
    let mut archive = zip::ZipArchive::new(file).map_err(io::Error::other)?;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(io::Error::other)?;
        let name = entry.name().to_string();
        if entry.is_dir() {
            let Some(relative) = entry.enclosed_name() else {
                continue;
            };
            fs::create_dir_all(dirs.root().join(relative))?;
        } else if name == DELETED_LIST_ENTRY {
            let mut listing = String::new();
            entry.read_to_string(&mut listing)?;
            delete_listed(dirs, &listing);
        } else if name == INSTALLER_ENTRY || name == RELEASE_INFO_ENTRY || name == SIGNATURE_ENTRY {
            // The installer never overwrites itself; release metadata
            // stays inside the archive.
        } else {
            let Some(relative) = entry.enclosed_name() else {
                continue;
            };
            let dest = dirs.root().join(relative);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            let _ = fs::remove_file(&dest);
            let mut out = File::create(&dest)?;
            io::copy(&mut entry, &mut out)?;
        }
    }
    Ok(())
}

/// Deletes the files listed in `deleted.txt`, refusing any path that
/// does not resolve to a location inside the install root.
fn delete_listed(dirs: &InstallDirs, listing: &str) {
    let Ok(root) = dirs.root().canonicalize() else {
        return;
    };
    for line in listing.lines() {
        let relative = line.trim();
        if relative.is_empty() {
            continue;
        }
        let target = dirs.root().join(relative);
        if !is_within_root(&target, &root) {
            continue;
        }
        match fs::remove_file(&target) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => errlog::log_error(dirs, &err),
        }
    }
}

/// Canonicalizes the target's parent (resolving `..` and symlinks) and
/// walks up a bounded number of links looking for the install root.
fn is_within_root(target: &Path, root: &Path) -> bool {
    let Some(parent) = target.parent() else {
        return false;
    };
    let Ok(canonical_parent) = parent.canonicalize() else {
        return false;
    };
    let mut current: Option<&Path> = Some(canonical_parent.as_path());
    for _ in 0..MAX_PARENT_WALK {
        match current {
            Some(path) if path == root => return true,
            Some(path) => current = path.parent(),
            None => return false,
        }
    }
    false
}
