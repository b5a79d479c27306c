//! Group archive access and rebuilds.
//!
//! The active archive is a plain zip file. Reads open the file per
//! operation under the read lock; structural changes (entry removal,
//! entry updates, bulk save) rebuild the archive wholesale under the
//! write lock: surviving entries are copied into a temp file next to the
//! archive, which then atomically replaces it. The old archive stays
//! valid until the rename.

use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use zip::CompressionMethod;
use zip::read::ZipArchive;
use zip::result::ZipError;
use zip::write::{SimpleFileOptions, ZipWriter};

use crate::error::{Result, StoreError};

/// Name prefix of rebuild temp files. Stray ones left behind by a crashed
/// rebuild are swept when an archive is activated.
pub(crate) const REBUILD_TMP_PREFIX: &str = "ziptmp";

/// Entry metadata is pinned so that rebuilds are byte-deterministic.
fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
}

struct ArchiveState {
    /// Path of the active archive; `None` while no group is open.
    path: Option<PathBuf>,
    /// Whether the file currently parses as a zip. An empty or otherwise
    /// invalid archive is treated as "no data yet", not as an error.
    readable: bool,
}

pub(crate) struct GroupArchive {
    state: RwLock<ArchiveState>,
}

impl GroupArchive {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ArchiveState {
                path: None,
                readable: false,
            }),
        }
    }

    pub fn is_open(&self) -> bool {
        self.read_state().path.is_some()
    }

    pub fn active_path(&self) -> Option<PathBuf> {
        self.read_state().path.clone()
    }

    /// Makes `path` the active archive.
    ///
    /// The path is recorded even when opening fails, so that a later save
    /// can create the file. Invalid zip data is tolerated as an empty
    /// archive; genuine I/O errors are reported to the caller.
    pub fn activate(&self, path: &Path) -> Result<()> {
        let mut state = self.write_state();
        state.path = Some(path.to_path_buf());
        state.readable = false;
        let file = match File::open(path) {
            Ok(file) => file,
            Err(source) => {
                return Err(StoreError::Io {
                    operation: "open",
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        match ZipArchive::new(file) {
            Ok(_) => {
                state.readable = true;
                Ok(())
            }
            Err(ZipError::InvalidArchive(_)) => Ok(()),
            Err(source) => Err(StoreError::Archive {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Reads the entry for a logical resource path, `None` if absent.
    pub fn read_entry(&self, logical: &str) -> Result<Option<Vec<u8>>> {
        let state = self.read_state();
        let Some(path) = readable_path(&state) else {
            return Ok(None);
        };
        let mut archive = open_archive(path)?;
        let name = format!("{logical}.json");
        match archive.by_name(&name) {
            Ok(mut entry) => {
                let mut buffer = Vec::new();
                entry.read_to_end(&mut buffer).map_err(|source| StoreError::Io {
                    operation: "read entry from",
                    path: path.to_path_buf(),
                    source,
                })?;
                Ok(Some(buffer))
            }
            Err(ZipError::FileNotFound) => Ok(None),
            Err(source) => Err(StoreError::Archive {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Whether the archive holds an entry for the logical path.
    pub fn contains_entry(&self, logical: &str) -> Result<bool> {
        let state = self.read_state();
        let Some(path) = readable_path(&state) else {
            return Ok(false);
        };
        let mut archive = open_archive(path)?;
        let name = format!("{logical}.json");
        Ok(archive.by_name(&name).is_ok())
    }

    /// Logical paths of all resource entries in the archive.
    pub fn entry_paths(&self) -> Result<Vec<String>> {
        let state = self.read_state();
        let Some(path) = readable_path(&state) else {
            return Ok(Vec::new());
        };
        let archive = open_archive(path)?;
        Ok(archive
            .file_names()
            .filter_map(|name| name.strip_suffix(".json"))
            .map(String::from)
            .collect())
    }

    /// Writes one entry, rebuilding the archive.
    pub fn write_entry(&self, logical: &str, bytes: Vec<u8>) -> Result<()> {
        let mut updates = BTreeMap::new();
        updates.insert(logical.to_string(), bytes);
        self.rebuild(&updates, &HashSet::new()).map(|_| ())
    }

    /// Removes one entry, rebuilding the archive. Returns whether the
    /// entry existed.
    pub fn remove_entry(&self, logical: &str) -> Result<bool> {
        let mut removals = HashSet::new();
        removals.insert(logical.to_string());
        self.rebuild(&BTreeMap::new(), &removals)
    }

    /// Rebuilds the archive: existing entries are carried over unless
    /// updated or removed, updates are written from the given bytes, and
    /// the result atomically replaces the old archive.
    ///
    /// Returns whether any of the removal targets actually existed.
    pub fn rebuild(
        &self,
        updates: &BTreeMap<String, Vec<u8>>,
        removals: &HashSet<String>,
    ) -> Result<bool> {
        let mut state = self.write_state();
        let Some(path) = state.path.clone() else {
            return Err(StoreError::NoActiveArchive);
        };

        let mut entries: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        let mut removed_any = false;
        if state.readable {
            let mut archive = open_archive(&path)?;
            for index in 0..archive.len() {
                let mut entry = archive.by_index(index).map_err(|source| StoreError::Archive {
                    path: path.clone(),
                    source,
                })?;
                if entry.is_dir() {
                    continue;
                }
                let name = entry.name().to_string();
                if let Some(logical) = name.strip_suffix(".json") {
                    if removals.contains(logical) {
                        removed_any = true;
                        continue;
                    }
                    if updates.contains_key(logical) {
                        continue;
                    }
                }
                let mut buffer = Vec::new();
                entry.read_to_end(&mut buffer).map_err(|source| StoreError::Io {
                    operation: "read entry from",
                    path: path.clone(),
                    source,
                })?;
                entries.insert(name, buffer);
            }
        }
        for (logical, bytes) in updates {
            entries.insert(format!("{logical}.json"), bytes.clone());
        }

        let dir = path.parent().unwrap_or(Path::new("."));
        let tmp = dir.join(format!("{REBUILD_TMP_PREFIX}{}", std::process::id()));
        write_archive(&tmp, &entries)?;
        fs::rename(&tmp, &path).map_err(|source| StoreError::Io {
            operation: "replace",
            path: path.clone(),
            source,
        })?;
        state.readable = true;
        Ok(removed_any)
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, ArchiveState> {
        self.state.read().expect("archive lock poisoned")
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, ArchiveState> {
        self.state.write().expect("archive lock poisoned")
    }
}

fn readable_path(state: &ArchiveState) -> Option<&Path> {
    if state.readable {
        state.path.as_deref()
    } else {
        None
    }
}

fn open_archive(path: &Path) -> Result<ZipArchive<File>> {
    let file = File::open(path).map_err(|source| StoreError::Io {
        operation: "open",
        path: path.to_path_buf(),
        source,
    })?;
    ZipArchive::new(file).map_err(|source| StoreError::Archive {
        path: path.to_path_buf(),
        source,
    })
}

fn write_archive(path: &Path, entries: &BTreeMap<String, Vec<u8>>) -> Result<()> {
    let file = File::create(path).map_err(|source| StoreError::Io {
        operation: "create",
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = ZipWriter::new(file);
    for (name, bytes) in entries {
        writer
            .start_file(name.as_str(), entry_options())
            .map_err(|source| StoreError::Archive {
                path: path.to_path_buf(),
                source,
            })?;
        writer.write_all(bytes).map_err(|source| StoreError::Io {
            operation: "write entry to",
            path: path.to_path_buf(),
            source,
        })?;
    }
    writer.finish().map_err(|source| StoreError::Archive {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Creates a valid empty archive at `path`.
pub(crate) fn create_empty(path: &Path) -> Result<()> {
    write_archive(path, &BTreeMap::new())
}

/// Removes temp files left behind by a crashed rebuild.
pub(crate) fn clean_stray_rebuild_files(dir: &Path) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        if entry
            .file_name()
            .to_string_lossy()
            .starts_with(REBUILD_TMP_PREFIX)
        {
            let _ = fs::remove_file(entry.path());
        }
    }
}
