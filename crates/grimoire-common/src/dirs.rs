//! Install-directory layout.

use std::path::{Path, PathBuf};

/// Well-known locations inside the Grimoire install directory.
///
/// Constructed once per process (or once per test) and handed to
/// collaborators explicitly instead of living in ambient static state.
#[derive(Debug, Clone)]
pub struct InstallDirs {
    root: PathBuf,
}

impl InstallDirs {
    /// Creates the layout rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The install root itself.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The shipped base data file for a logical resource path.
    #[must_use]
    pub fn general_file(&self, path: &str) -> PathBuf {
        self.root.join(format!("{path}.json"))
    }

    /// The local mod overlay file for a logical resource path.
    #[must_use]
    pub fn mod_file(&self, path: &str) -> PathBuf {
        self.root.join("mod").join(format!("{path}.json"))
    }

    /// The pointer file naming the currently active group archive.
    #[must_use]
    pub fn group_pointer_file(&self) -> PathBuf {
        self.root.join("settings").join("Gruppe.txt")
    }

    /// The directory holding release-info manifests and staged update
    /// archives.
    #[must_use]
    pub fn update_dir(&self) -> PathBuf {
        self.root.join("update")
    }

    /// The pending-install manifest consumed by the installer process.
    #[must_use]
    pub fn update_list_file(&self) -> PathBuf {
        self.update_dir().join("updateList.txt")
    }

    /// The single-event error log.
    #[must_use]
    pub fn error_log_file(&self) -> PathBuf {
        self.root.join("error.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let dirs = InstallDirs::new("/opt/grimoire");
        assert_eq!(
            dirs.general_file("heroes/alrik"),
            Path::new("/opt/grimoire/heroes/alrik.json")
        );
        assert_eq!(
            dirs.mod_file("books/core"),
            Path::new("/opt/grimoire/mod/books/core.json")
        );
        assert_eq!(
            dirs.group_pointer_file(),
            Path::new("/opt/grimoire/settings/Gruppe.txt")
        );
        assert_eq!(
            dirs.update_list_file(),
            Path::new("/opt/grimoire/update/updateList.txt")
        );
        assert_eq!(dirs.error_log_file(), Path::new("/opt/grimoire/error.log"));
    }
}
