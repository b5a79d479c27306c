//! The execute step.
//!
//! Processes the staged-install manifest: verifies each artifact's
//! detached signature, extracts the embedded installer binary, then
//! launches the installer process and terminates. Actual file
//! replacement happens in the installer once this process has exited, so
//! the update never has to overwrite files that are currently open.

use std::fs;
use std::path::Path;
use std::process::Command;

use grimoire_common::{InstallDirs, errlog};

use crate::INSTALLER_ENTRY;
use crate::error::{Result, UpdateError};
use crate::manifest::{self, InstallEntry};
use crate::verify;

/// Whether a pending install manifest from a previous run is present.
/// A leftover manifest found at startup should be executed right away.
#[must_use]
pub fn has_pending_installs(dirs: &InstallDirs) -> bool {
    dirs.update_list_file().exists()
}

/// Processes the install manifest, launches the installer, and
/// terminates the process. Failures are logged; the exit code is always
/// zero.
pub fn execute(dirs: &InstallDirs) -> ! {
    if let Err(err) = run(dirs) {
        errlog::log_error(dirs, &err);
    }
    std::process::exit(0);
}

fn run(dirs: &InstallDirs) -> Result<()> {
    let entries = manifest::read_manifest(&dirs.update_list_file())?;
    for entry in &entries {
        if let Err(err) = process_artifact(dirs, entry) {
            errlog::log_error(dirs, &err);
        }
    }
    let installer = dirs.root().join(INSTALLER_ENTRY);
    Command::new(&installer)
        .arg(std::process::id().to_string())
        .spawn()
        .map_err(|source| UpdateError::Io {
            operation: "launch",
            path: installer,
            source,
        })?;
    Ok(())
}

/// Verifies one staged artifact and extracts its embedded installer.
///
/// A trust failure deletes the artifact from the staging area; nothing
/// from it — the installer entry included — is used.
pub(crate) fn process_artifact(dirs: &InstallDirs, entry: &InstallEntry) -> Result<()> {
    let zip_path = dirs.update_dir().join(&entry.file_name);
    if let Some(spec) = &entry.signature {
        if let Err(err) = verify::verify_archive(&zip_path, spec) {
            if err.is_trust_failure() {
                let _ = fs::remove_file(&zip_path);
            }
            return Err(err);
        }
        tracing::info!("signature of {} verified", entry.file_name);
    }
    extract_installer(dirs, &zip_path)
}

fn extract_installer(dirs: &InstallDirs, zip_path: &Path) -> Result<()> {
    let archive_name = zip_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| zip_path.display().to_string());
    let file = fs::File::open(zip_path).map_err(|source| UpdateError::Io {
        operation: "open",
        path: zip_path.to_path_buf(),
        source,
    })?;
    let mut archive = zip::ZipArchive::new(file).map_err(|source| UpdateError::Zip {
        archive: archive_name.clone(),
        source,
    })?;
    let mut entry = match archive.by_name(INSTALLER_ENTRY) {
        Ok(entry) => entry,
        // This artifact ships no installer of its own.
        Err(zip::result::ZipError::FileNotFound) => return Ok(()),
        Err(source) => {
            return Err(UpdateError::Zip {
                archive: archive_name,
                source,
            });
        }
    };
    let dest = dirs.root().join(INSTALLER_ENTRY);
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|source| UpdateError::Io {
            operation: "create directory",
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let _ = fs::remove_file(&dest);
    let mut out = fs::File::create(&dest).map_err(|source| UpdateError::Io {
        operation: "create",
        path: dest.clone(),
        source,
    })?;
    std::io::copy(&mut entry, &mut out).map_err(|source| UpdateError::Io {
        operation: "write",
        path: dest.clone(),
        source,
    })?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&dest, fs::Permissions::from_mode(0o755)).map_err(|source| {
            UpdateError::Io {
                operation: "set permissions on",
                path: dest.clone(),
                source,
            }
        })?;
    }
    tracing::info!("extracted installer from {archive_name}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing;
    use std::io::Write as _;
    use tempfile::tempdir;

    fn stage_zip(dirs: &InstallDirs, name: &str, entries: &[(&str, &[u8])]) {
        fs::create_dir_all(dirs.update_dir()).unwrap();
        let file = fs::File::create(dirs.update_dir().join(name)).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (entry_name, content) in entries {
            writer
                .start_file(*entry_name, zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_unsigned_artifact_installer_is_extracted() {
        let dir = tempdir().unwrap();
        let dirs = InstallDirs::new(dir.path());
        stage_zip(
            &dirs,
            "update.zip",
            &[("data.json", b"{}"), (INSTALLER_ENTRY, b"fake binary")],
        );
        let entry = InstallEntry {
            file_name: "update.zip".to_string(),
            signature: None,
        };

        process_artifact(&dirs, &entry).unwrap();

        let installed = fs::read(dirs.root().join(INSTALLER_ENTRY)).unwrap();
        assert_eq!(installed, b"fake binary");
    }

    #[test]
    fn test_failed_verification_deletes_artifact_and_extracts_nothing() {
        let dir = tempdir().unwrap();
        let dirs = InstallDirs::new(dir.path());
        stage_zip(
            &dirs,
            "update.zip",
            &[("data.json", b"{}"), (INSTALLER_ENTRY, b"evil binary")],
        );
        // A key that never signed this archive.
        let spec = signing::generate_keys(&dir.path().join("key")).unwrap();
        let entry = InstallEntry {
            file_name: "update.zip".to_string(),
            signature: Some(spec),
        };

        let err = process_artifact(&dirs, &entry).unwrap_err();

        assert!(err.is_trust_failure());
        assert!(!dirs.update_dir().join("update.zip").exists());
        assert!(!dirs.root().join(INSTALLER_ENTRY).exists());
    }

    #[test]
    fn test_signed_artifact_with_installer() {
        let dir = tempdir().unwrap();
        let dirs = InstallDirs::new(dir.path());

        let source = dir.path().join("release");
        fs::create_dir_all(source.join("update")).unwrap();
        fs::write(source.join("data.json"), b"{}").unwrap();
        fs::write(source.join("update/grimoire-installer"), b"new installer").unwrap();
        let key = dir.path().join("private.key");
        let spec = signing::generate_keys(&key).unwrap();
        fs::create_dir_all(dirs.update_dir()).unwrap();
        signing::zip_and_sign(&source, &dirs.update_dir().join("update.zip"), &key).unwrap();

        let entry = InstallEntry {
            file_name: "update.zip".to_string(),
            signature: Some(spec),
        };
        process_artifact(&dirs, &entry).unwrap();

        let installed = fs::read(dirs.root().join(INSTALLER_ENTRY)).unwrap();
        assert_eq!(installed, b"new installer");
    }
}
