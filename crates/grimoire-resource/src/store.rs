//! The layered JSON resource store.
//!
//! A resource is a JSON document addressed by a slash-delimited logical
//! path and merged from up to three layers: the shipped base file, a
//! local mod overlay, and the entry inside the active group archive.
//! Later layers overlay earlier ones value by value; an explicit `null`
//! deletes a key. Documents are cached on first load and handed out as
//! stable [`DocId`] handles.
//!
//! Failures never cross the public API as errors: they are written to the
//! error log and show up as `false`/`None` returns.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use grimoire_common::{InstallDirs, errlog};

use crate::archive::{self, GroupArchive};
use crate::discriminate::{DiscriminationTable, Discriminator};
use crate::error::{Result, StoreError};
use crate::listeners::{ListenerId, PathListeners};
use crate::merge::overlay_object;

/// Reserved resource path of the settings document. It is the only path
/// whose General/Mod backing files are ever written back on save.
pub const SETTINGS_PATH: &str = "settings/general";

const SETTINGS_PREFIX: &str = "settings";

/// Default name of the discriminating book field.
pub const DEFAULT_DISCRIMINATING_FIELD: &str = "books";

/// Opaque, copyable handle to a cached resource document.
///
/// Handle identity is stable for the session: requesting the same path
/// again yields the same handle until the cache is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocId(u64);

/// The layer that last determined a resource's merged content, and the
/// place it is written back to on save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Shipped base data file under the install root.
    General,
    /// Local override file under `mod/`.
    Mod,
    /// Entry inside the active group archive.
    Zip,
}

struct CachedDoc {
    value: Value,
    source: Source,
}

/// Sanitizer applied to every freshly acquired document before caching.
pub type Sanitizer = Box<dyn Fn(Value) -> Value>;

/// The resource store. One instance per process (or per test), injected
/// into collaborators.
///
/// The document cache is not synchronized; all cache-mutating calls must
/// come from the single thread that owns the store. Only the archive
/// handle inside carries its own reader/writer lock.
pub struct ResourceStore {
    dirs: InstallDirs,
    archive: GroupArchive,
    next_id: u64,
    docs: HashMap<DocId, CachedDoc>,
    by_path: BTreeMap<String, DocId>,
    path_of: HashMap<DocId, String>,
    discrimination: HashMap<DocId, DiscriminationTable>,
    listeners: PathListeners,
    sanitizers: Vec<Sanitizer>,
    discriminating_field: String,
    /// Book priority list, read once from the settings document.
    priorities: Option<Option<Vec<String>>>,
}

impl ResourceStore {
    /// Creates a store over the given install directories.
    pub fn new(dirs: InstallDirs) -> Self {
        Self::with_discriminating_field(dirs, DEFAULT_DISCRIMINATING_FIELD)
    }

    /// Creates a store with a non-default discriminating field name.
    pub fn with_discriminating_field(dirs: InstallDirs, field: impl Into<String>) -> Self {
        Self {
            dirs,
            archive: GroupArchive::new(),
            next_id: 0,
            docs: HashMap::new(),
            by_path: BTreeMap::new(),
            path_of: HashMap::new(),
            discrimination: HashMap::new(),
            listeners: PathListeners::default(),
            sanitizers: Vec::new(),
            discriminating_field: field.into(),
            priorities: None,
        }
    }

    /// The install directories this store operates on.
    pub fn dirs(&self) -> &InstallDirs {
        &self.dirs
    }

    /// Path of the active group archive, if one is open.
    pub fn active_archive(&self) -> Option<std::path::PathBuf> {
        self.archive.active_path()
    }

    /// Returns the resource at `path`, loading and caching it if needed.
    ///
    /// A path without any physical backing yields an empty document
    /// (tagged [`Source::Zip`]). `None` is returned only when a backing
    /// layer exists but cannot be read or parsed; the next call retries.
    pub fn get_resource(&mut self, path: &str) -> Option<DocId> {
        match self.resource_internal(path, true) {
            Ok(id) => Some(id),
            Err(err) => {
                self.log(&err);
                None
            }
        }
    }

    /// Returns a definitely new resource at a path similar to the
    /// requested one, appending `_` until a free path is found.
    pub fn get_new_resource(&mut self, path: &str) -> Option<DocId> {
        let mut candidate = path.to_string();
        loop {
            while self.by_path.contains_key(&candidate) {
                candidate.push('_');
            }
            match self.acquire(&candidate, true, true) {
                Ok((id, false)) => return Some(id),
                // The probe hit an existing resource; it stays cached and
                // the search continues with a longer suffix.
                Ok((_, true)) => {}
                Err(err) => {
                    self.log(&err);
                    return None;
                }
            }
        }
    }

    /// Borrows a cached document.
    pub fn document(&self, id: DocId) -> Option<&Value> {
        self.docs.get(&id).map(|doc| &doc.value)
    }

    /// Mutably borrows a cached document.
    pub fn document_mut(&mut self, id: DocId) -> Option<&mut Value> {
        self.docs.get_mut(&id).map(|doc| &mut doc.value)
    }

    /// The logical path of a cached document.
    pub fn path_of(&self, id: DocId) -> Option<&str> {
        self.path_of.get(&id).map(String::as_str)
    }

    /// The source tag of a cached document.
    pub fn source_of(&self, id: DocId) -> Option<Source> {
        self.docs.get(&id).map(|doc| doc.source)
    }

    /// The book attributions stripped from a document during load.
    pub fn discrimination(&self, id: DocId) -> Option<&DiscriminationTable> {
        self.discrimination.get(&id)
    }

    /// Deletes a resource from the cache and, for an archive-sourced
    /// document, from the active archive.
    ///
    /// Returns `true` only when an archive entry was actually removed.
    /// General/Mod backing files are never touched; for those only the
    /// cache entry is dropped.
    pub fn delete_resource(&mut self, id: DocId) -> bool {
        let Some(path) = self.path_of.remove(&id) else {
            return false;
        };
        self.by_path.remove(&path);
        self.discrimination.remove(&id);
        let Some(doc) = self.docs.remove(&id) else {
            return false;
        };
        if doc.source != Source::Zip {
            self.listeners.notify_path(&path);
            return false;
        }
        match self.archive.contains_entry(&path) {
            Ok(false) => {
                self.listeners.notify_path(&path);
                false
            }
            Ok(true) => match self.archive.remove_entry(&path) {
                Ok(removed) => {
                    self.listeners.notify_path(&path);
                    removed
                }
                Err(err) => {
                    self.log(&err);
                    false
                }
            },
            Err(err) => {
                self.log(&err);
                false
            }
        }
    }

    /// Re-keys a cached document to a path similar to `new_name` and
    /// immediately persists it at the new path inside the active archive,
    /// independent of the next bulk save. I/O failures are logged.
    pub fn move_resource(&mut self, id: DocId, new_name: &str) {
        let Some(old_path) = self.path_of.get(&id).cloned() else {
            return;
        };
        if old_path == new_name {
            return;
        }
        self.by_path.remove(&old_path);
        self.path_of.remove(&id);
        let was_zip = self
            .docs
            .get(&id)
            .is_some_and(|doc| doc.source == Source::Zip);
        if was_zip {
            match self.archive.contains_entry(&old_path) {
                Ok(true) => {
                    if let Err(err) = self.archive.remove_entry(&old_path) {
                        self.log(&err);
                    }
                }
                Ok(false) => {}
                Err(err) => self.log(&err),
            }
        }
        let Some(new_path) = self.free_path(&make_valid_file(new_name)) else {
            // Could not establish a new path; leave the document reachable
            // under its old one.
            self.by_path.insert(old_path.clone(), id);
            self.path_of.insert(id, old_path);
            return;
        };
        if let Some(doc) = self.docs.get_mut(&id) {
            doc.source = Source::Zip;
        }
        self.by_path.insert(new_path.clone(), id);
        self.path_of.insert(id, new_path.clone());
        self.listeners.notify_path(&new_path);
        if let Some(doc) = self.docs.get(&id) {
            match to_json_bytes(&new_path, &doc.value) {
                Ok(bytes) => {
                    if let Err(err) = self.archive.write_entry(&new_path, bytes) {
                        self.log(&err);
                    }
                }
                Err(err) => self.log(&err),
            }
        }
    }

    /// All resources under a directory prefix, in lexicographic path
    /// order. Archive entries under the prefix that are not yet cached
    /// are loaded as a side effect.
    pub fn get_all_resources(&mut self, directory: &str) -> Vec<DocId> {
        match self.archive.entry_paths() {
            Ok(paths) => {
                for logical in paths {
                    if logical.starts_with(directory) && !self.by_path.contains_key(&logical) {
                        if let Err(err) = self.acquire(&logical, true, true) {
                            self.log(&err);
                        }
                    }
                }
            }
            Err(err) => self.log(&err),
        }
        self.by_path
            .iter()
            .filter(|(path, _)| path.starts_with(directory))
            .map(|(_, &id)| id)
            .collect()
    }

    /// Writes every cached document back to the location implied by its
    /// source tag. Archive-sourced documents go into a freshly rebuilt
    /// archive; General/Mod documents are written only for the reserved
    /// settings path.
    pub fn save_resources(&mut self) {
        let mut updates: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        for (path, id) in &self.by_path {
            let Some(doc) = self.docs.get(id) else {
                continue;
            };
            match doc.source {
                Source::General | Source::Mod => {
                    if !path.starts_with(SETTINGS_PREFIX) {
                        continue;
                    }
                    let dest = if doc.source == Source::Mod {
                        self.dirs.mod_file(path)
                    } else {
                        self.dirs.general_file(path)
                    };
                    if let Err(err) = write_json_file(&dest, &doc.value) {
                        self.log(&err);
                    }
                }
                Source::Zip => match to_json_bytes(path, &doc.value) {
                    Ok(bytes) => {
                        updates.insert(path.clone(), bytes);
                    }
                    Err(err) => self.log(&err),
                },
            }
        }
        if self.archive.is_open()
            && let Err(err) = self.archive.rebuild(&updates, &HashSet::new())
        {
            self.log(&err);
        }
    }

    /// Clears the entire cache. Unsaved edits are lost and every path
    /// listener receives the full-reset signal.
    pub fn discard_changes(&mut self) {
        self.docs.clear();
        self.by_path.clear();
        self.path_of.clear();
        self.discrimination.clear();
        self.priorities = None;
        self.listeners.notify_reset();
    }

    /// Saves, then discards — the safe reload. Does nothing while no
    /// archive is active.
    pub fn discard_resources(&mut self) {
        if self.archive.is_open() {
            self.save_resources();
            self.discard_changes();
        }
    }

    /// Switches the active group archive.
    ///
    /// The entire cache is discarded, the chosen path is persisted to the
    /// group pointer file so the next startup reopens the same archive,
    /// and temp files left behind by a crashed rebuild are swept.
    pub fn set_active_archive(&mut self, path: &Path) {
        if let Err(err) = self.archive.activate(path) {
            self.log(&err);
        }
        self.discard_changes();
        let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        let pointer = self.dirs.group_pointer_file();
        if let Some(parent) = pointer.parent() {
            let _ = fs::create_dir_all(parent);
        }
        if let Err(source) = fs::write(&pointer, absolute.display().to_string()) {
            self.log(&StoreError::Io {
                operation: "write",
                path: pointer,
                source,
            });
        }
        if let Some(dir) = absolute.parent() {
            archive::clean_stray_rebuild_files(dir);
        }
    }

    /// Registers a listener for load/create/delete/move events under a
    /// path prefix. The callback argument is `true` for a full reset.
    pub fn add_path_listener(
        &mut self,
        prefix: &str,
        callback: impl Fn(bool) + 'static,
    ) -> ListenerId {
        self.listeners.add(prefix, callback)
    }

    /// Removes a previously registered path listener.
    pub fn remove_path_listener(&mut self, prefix: &str, id: ListenerId) {
        self.listeners.remove(prefix, id);
    }

    /// Registers a post-load transform applied to every freshly acquired
    /// document, in registration order, before it is cached.
    pub fn add_resource_sanitizer(&mut self, sanitizer: impl Fn(Value) -> Value + 'static) {
        self.sanitizers.push(Box::new(sanitizer));
    }

    /// Loads an external JSON file into a definitely new resource under a
    /// sanitized internal path, tagged for the active archive.
    pub fn load_external_resource(&mut self, file: &Path, internal_path: &str) -> Option<DocId> {
        let mut value = match parse_layer_file(file) {
            Ok(value) => value,
            Err(err) => {
                self.log(&err);
                return None;
            }
        };
        let disc = self.discriminator(true);
        disc.filter_unprioritized(&mut value);
        let table = disc.extract(&mut value);
        for sanitize in &self.sanitizers {
            value = sanitize(value);
        }
        let path = self.free_path(&make_valid_file(internal_path))?;
        let id = self.alloc_id();
        self.docs.insert(
            id,
            CachedDoc {
                value,
                source: Source::Zip,
            },
        );
        self.by_path.insert(path.clone(), id);
        self.path_of.insert(id, path.clone());
        if !table.is_empty() {
            self.discrimination.insert(id, table);
        }
        self.listeners.notify_path(&path);
        Some(id)
    }

    /// Writes one document as pretty JSON to an arbitrary filesystem
    /// path (export). Failures are logged.
    pub fn save_resource_to(&self, id: DocId, dest: &Path) {
        let Some(doc) = self.docs.get(&id) else {
            return;
        };
        if let Err(err) = write_json_file(dest, &doc.value) {
            self.log(&err);
        }
    }

    /// Creates a valid empty archive file at `path`. Returns whether the
    /// file was created.
    pub fn create_empty_archive(&self, path: &Path) -> bool {
        match archive::create_empty(path) {
            Ok(()) => true,
            Err(err) => {
                self.log(&err);
                false
            }
        }
    }

    /// Cached lookup with explicit discrimination control; used by the
    /// settings facade, which must not strip book fields.
    pub(crate) fn resource_internal(&mut self, path: &str, discriminate: bool) -> Result<DocId> {
        if let Some(&id) = self.by_path.get(path) {
            return Ok(id);
        }
        self.acquire(path, discriminate, true).map(|(id, _)| id)
    }

    /// Loads and caches the merged document for `path`.
    ///
    /// Returns the handle and whether any physical source was found. On
    /// error nothing is cached, so a later call retries the load.
    fn acquire(&mut self, path: &str, discriminate: bool, notify: bool) -> Result<(DocId, bool)> {
        let disc = self.discriminator(discriminate);
        // Building the discriminator may have loaded the settings
        // document; if that was the requested path, it is cached now.
        if let Some(&id) = self.by_path.get(path) {
            return Ok((id, true));
        }
        let mut merged = Map::new();
        let mut source = Source::Zip;
        let mut found = false;

        let general = self.dirs.general_file(path);
        if general.exists() {
            apply_layer(&mut merged, parse_layer_file(&general)?, &disc);
            source = Source::General;
            found = true;
        }
        let mod_file = self.dirs.mod_file(path);
        if mod_file.exists() {
            apply_layer(&mut merged, parse_layer_file(&mod_file)?, &disc);
            source = Source::Mod;
            found = true;
        }
        if let Some(bytes) = self.archive.read_entry(path)? {
            let origin = format!("archive entry {path}.json");
            apply_layer(&mut merged, parse_layer(&bytes, &origin)?, &disc);
            source = Source::Zip;
            found = true;
        }

        let mut value = Value::Object(merged);
        let table = if discriminate {
            disc.extract(&mut value)
        } else {
            DiscriminationTable::new()
        };
        for sanitize in &self.sanitizers {
            value = sanitize(value);
        }

        let id = self.alloc_id();
        self.docs.insert(id, CachedDoc { value, source });
        self.by_path.insert(path.to_string(), id);
        self.path_of.insert(id, path.to_string());
        if !table.is_empty() {
            self.discrimination.insert(id, table);
        }
        if notify {
            self.listeners.notify_path(path);
        }
        Ok((id, found))
    }

    /// Finds a free path similar to `wanted`, probing all layers. The
    /// probe document is dropped again; probed existing resources stay
    /// cached.
    fn free_path(&mut self, wanted: &str) -> Option<String> {
        let mut candidate = wanted.to_string();
        loop {
            while self.by_path.contains_key(&candidate) {
                candidate.push('_');
            }
            match self.acquire(&candidate, true, false) {
                Ok((probe, false)) => {
                    self.drop_cached(probe);
                    return Some(candidate);
                }
                Ok((_, true)) => {}
                Err(err) => {
                    self.log(&err);
                    return None;
                }
            }
        }
    }

    fn drop_cached(&mut self, id: DocId) {
        if let Some(path) = self.path_of.remove(&id) {
            self.by_path.remove(&path);
        }
        self.docs.remove(&id);
        self.discrimination.remove(&id);
    }

    fn discriminator(&mut self, discriminate: bool) -> Discriminator {
        let priorities = if discriminate { self.priorities() } else { None };
        Discriminator::new(self.discriminating_field.clone(), priorities)
    }

    /// The configured book priority list, read once per cache lifetime
    /// from the settings document (without discrimination).
    fn priorities(&mut self) -> Option<Vec<String>> {
        if self.priorities.is_none() {
            let list = self.read_priorities();
            self.priorities = Some(list);
        }
        self.priorities.clone().flatten()
    }

    fn read_priorities(&mut self) -> Option<Vec<String>> {
        let id = self.resource_internal(SETTINGS_PATH, false).ok()?;
        let doc = self.document(id)?;
        let books = doc.get("general")?.get("books")?.as_array()?;
        Some(
            books
                .iter()
                .filter_map(|book| book.as_str().map(String::from))
                .collect(),
        )
    }

    fn alloc_id(&mut self) -> DocId {
        let id = DocId(self.next_id);
        self.next_id += 1;
        id
    }

    fn log(&self, err: &StoreError) {
        errlog::log_error(&self.dirs, err);
    }
}

fn apply_layer(base: &mut Map<String, Value>, layer: Value, disc: &Discriminator) {
    let mut layer = layer;
    disc.filter_unprioritized(&mut layer);
    if let Value::Object(overlay) = layer {
        overlay_object(base, overlay, disc);
    }
}

fn parse_layer_file(path: &Path) -> Result<Value> {
    let bytes = fs::read(path).map_err(|source| StoreError::Io {
        operation: "read",
        path: path.to_path_buf(),
        source,
    })?;
    parse_layer(&bytes, &path.display().to_string())
}

fn parse_layer(bytes: &[u8], origin: &str) -> Result<Value> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|source| StoreError::MalformedJson {
            origin: origin.to_string(),
            source,
        })?;
    if !value.is_object() {
        return Err(StoreError::NotAnObject {
            origin: origin.to_string(),
        });
    }
    Ok(value)
}

fn to_json_bytes(origin: &str, value: &Value) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(value).map_err(|source| StoreError::Serialize {
        origin: origin.to_string(),
        source,
    })
}

fn write_json_file(dest: &Path, value: &Value) -> Result<()> {
    let bytes = to_json_bytes(&dest.display().to_string(), value)?;
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|source| StoreError::Io {
            operation: "create directory",
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(dest, bytes).map_err(|source| StoreError::Io {
        operation: "write",
        path: dest.to_path_buf(),
        source,
    })
}

/// Replaces characters outside `[A-Za-z0-9_-]` in the file-name part of
/// a logical path with underscores.
fn make_valid_file(name: &str) -> String {
    let (dir, file) = match name.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, name),
    };
    let cleaned: String = file
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    match dir {
        Some(dir) => format!("{dir}/{cleaned}"),
        None => cleaned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::{TempDir, tempdir};

    fn setup() -> (TempDir, ResourceStore) {
        let dir = tempdir().unwrap();
        let store = ResourceStore::new(InstallDirs::new(dir.path()));
        (dir, store)
    }

    fn write_json(dest: &Path, value: &Value) {
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        fs::write(dest, serde_json::to_vec_pretty(value).unwrap()).unwrap();
    }

    fn activate_empty_archive(store: &mut ResourceStore, dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("group.zip");
        assert!(store.create_empty_archive(&path));
        store.set_active_archive(&path);
        path
    }

    fn make_zip(path: &Path, entries: &[(&str, &str)]) {
        use std::io::Write as _;
        let file = fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, content) in entries {
            writer
                .start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_missing_resource_yields_stable_empty_document() {
        let (_dir, mut store) = setup();

        let first = store.get_resource("heroes/alrik").unwrap();
        let second = store.get_resource("heroes/alrik").unwrap();

        assert_eq!(first, second);
        assert_eq!(store.document(first), Some(&json!({})));
        assert_eq!(store.source_of(first), Some(Source::Zip));
        assert_eq!(store.path_of(first), Some("heroes/alrik"));
    }

    #[test]
    fn test_mod_layer_overlays_general() {
        let (dir, mut store) = setup();
        write_json(&store.dirs().general_file("data/x"), &json!({ "a": 0, "b": 2 }));
        write_json(&store.dirs().mod_file("data/x"), &json!({ "a": 1 }));
        activate_empty_archive(&mut store, &dir);

        let id = store.get_resource("data/x").unwrap();

        assert_eq!(store.document(id), Some(&json!({ "a": 1, "b": 2 })));
        assert_eq!(store.source_of(id), Some(Source::Mod));
    }

    #[test]
    fn test_zip_layer_overlays_and_null_deletes() {
        let (dir, mut store) = setup();
        write_json(&store.dirs().general_file("data/x"), &json!({ "a": 0, "b": 2 }));
        let archive_path = dir.path().join("group.zip");
        make_zip(&archive_path, &[("data/x.json", r#"{ "a": 5, "b": null }"#)]);
        store.set_active_archive(&archive_path);

        let id = store.get_resource("data/x").unwrap();
        assert_eq!(store.document(id), Some(&json!({ "a": 5 })));
        assert_eq!(store.source_of(id), Some(Source::Zip));
    }

    #[test]
    fn test_get_new_resource_appends_suffix() {
        let (_dir, mut store) = setup();

        let first = store.get_new_resource("a/b").unwrap();
        let second = store.get_new_resource("a/b").unwrap();

        assert_ne!(first, second);
        assert_eq!(store.path_of(first), Some("a/b"));
        assert_eq!(store.path_of(second), Some("a/b_"));
    }

    #[test]
    fn test_delete_general_sourced_keeps_backing_file() {
        let (_dir, mut store) = setup();
        let file = store.dirs().general_file("data/x");
        write_json(&file, &json!({ "a": 1 }));

        let id = store.get_resource("data/x").unwrap();
        assert!(!store.delete_resource(id));

        assert!(file.exists());
        // The cache entry is gone; a reload sees the file again.
        let reloaded = store.get_resource("data/x").unwrap();
        assert_eq!(store.document(reloaded), Some(&json!({ "a": 1 })));
    }

    #[test]
    fn test_delete_zip_sourced_removes_archive_entry() {
        let (dir, mut store) = setup();
        activate_empty_archive(&mut store, &dir);

        let id = store.get_resource("heroes/alrik").unwrap();
        *store.document_mut(id).unwrap() = json!({ "name": "Alrik" });
        store.save_resources();

        assert!(store.delete_resource(id));
        let remaining = store.get_all_resources("heroes");
        assert!(remaining.is_empty());
    }

    #[test]
    fn test_save_round_trip() {
        let (dir, mut store) = setup();
        let archive_path = activate_empty_archive(&mut store, &dir);

        let id = store.get_resource("heroes/alrik").unwrap();
        *store.document_mut(id).unwrap() = json!({ "name": "Alrik", "level": 3 });
        store.save_resources();
        store.discard_changes();
        store.set_active_archive(&archive_path);

        let reloaded = store.get_resource("heroes/alrik").unwrap();
        assert_eq!(
            store.document(reloaded),
            Some(&json!({ "name": "Alrik", "level": 3 }))
        );
    }

    #[test]
    fn test_save_twice_is_byte_identical() {
        let (dir, mut store) = setup();
        let archive_path = activate_empty_archive(&mut store, &dir);

        let id = store.get_resource("heroes/alrik").unwrap();
        *store.document_mut(id).unwrap() = json!({ "name": "Alrik" });
        store.save_resources();
        let first = fs::read(&archive_path).unwrap();
        store.save_resources();
        let second = fs::read(&archive_path).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_move_then_save_has_no_duplicate_old_entry() {
        let (dir, mut store) = setup();
        let archive_path = activate_empty_archive(&mut store, &dir);

        let id = store.get_resource("heroes/old").unwrap();
        *store.document_mut(id).unwrap() = json!({ "name": "Alrik" });
        store.save_resources();

        store.move_resource(id, "heroes/new");
        assert_eq!(store.path_of(id), Some("heroes/new"));
        store.save_resources();

        store.discard_changes();
        store.set_active_archive(&archive_path);
        let all: Vec<String> = store
            .get_all_resources("heroes")
            .into_iter()
            .map(|id| store.path_of(id).unwrap().to_string())
            .collect();
        assert_eq!(all, vec!["heroes/new".to_string()]);
    }

    #[test]
    fn test_move_sanitizes_file_name() {
        let (dir, mut store) = setup();
        activate_empty_archive(&mut store, &dir);

        let id = store.get_resource("heroes/old").unwrap();
        store.move_resource(id, "heroes/Bad Name?");

        assert_eq!(store.path_of(id), Some("heroes/Bad_Name_"));
    }

    #[test]
    fn test_path_listeners_fire_for_prefix_and_reset() {
        let (_dir, mut store) = setup();
        let events = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&events);
        store.add_path_listener("heroes", move |reset| sink.borrow_mut().push(reset));

        store.get_resource("heroes/alrik").unwrap();
        store.get_resource("books/core").unwrap();
        store.discard_changes();

        assert_eq!(*events.borrow(), vec![false, true]);
    }

    #[test]
    fn test_sanitizers_apply_in_registration_order() {
        let (_dir, mut store) = setup();
        store.add_resource_sanitizer(|mut value| {
            value["step"] = json!(1);
            value
        });
        store.add_resource_sanitizer(|mut value| {
            let step = value["step"].as_i64().unwrap_or(0);
            value["step"] = json!(step * 10);
            value
        });

        let id = store.get_resource("heroes/alrik").unwrap();
        assert_eq!(store.document(id).unwrap()["step"], json!(10));
    }

    #[test]
    fn test_malformed_layer_is_not_cached_and_retries() {
        let (_dir, mut store) = setup();
        let file = store.dirs().general_file("data/x");
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, b"{ this is not json").unwrap();

        assert!(store.get_resource("data/x").is_none());

        write_json(&file, &json!({ "a": 1 }));
        let id = store.get_resource("data/x").unwrap();
        assert_eq!(store.document(id), Some(&json!({ "a": 1 })));
    }

    #[test]
    fn test_discrimination_is_stripped_and_recorded() {
        let (_dir, mut store) = setup();
        write_json(
            &store.dirs().general_file("rules/weapons"),
            &json!({ "axe": { "books": { "core": 41 }, "damage": 5 } }),
        );

        let id = store.get_resource("rules/weapons").unwrap();

        assert_eq!(
            store.document(id),
            Some(&json!({ "axe": { "damage": 5 } }))
        );
        let table = store.discrimination(id).unwrap();
        assert_eq!(table["/axe"], json!({ "core": 41 }));
    }

    #[test]
    fn test_priority_resolves_layer_conflict() {
        let (_dir, mut store) = setup();
        write_json(
            &store.dirs().general_file(SETTINGS_PATH),
            &json!({ "general": { "books": ["core", "extra"] } }),
        );
        // Base entry from the better book; the overlay must not win.
        write_json(
            &store.dirs().general_file("rules/weapons"),
            &json!({ "axe": { "books": { "core": 41 }, "damage": 5 } }),
        );
        write_json(
            &store.dirs().mod_file("rules/weapons"),
            &json!({ "axe": { "books": { "extra": 3 }, "damage": 9 } }),
        );

        let id = store.get_resource("rules/weapons").unwrap();
        assert_eq!(store.document(id).unwrap()["axe"]["damage"], json!(5));
    }

    #[test]
    fn test_unowned_book_entries_are_dropped() {
        let (_dir, mut store) = setup();
        write_json(
            &store.dirs().general_file(SETTINGS_PATH),
            &json!({ "general": { "books": ["core"] } }),
        );
        write_json(
            &store.dirs().general_file("rules/weapons"),
            &json!({
                "axe": { "books": { "core": 41 } },
                "flail": { "books": { "homebrew": 2 } }
            }),
        );

        let id = store.get_resource("rules/weapons").unwrap();
        let doc = store.document(id).unwrap();
        assert!(doc.get("axe").is_some());
        assert!(doc.get("flail").is_none());
    }

    #[test]
    fn test_set_active_archive_persists_pointer() {
        let (dir, mut store) = setup();
        let path = activate_empty_archive(&mut store, &dir);

        let pointer = fs::read_to_string(store.dirs().group_pointer_file()).unwrap();
        assert_eq!(pointer, std::path::absolute(&path).unwrap().display().to_string());
    }

    #[test]
    fn test_load_external_resource() {
        let (dir, mut store) = setup();
        activate_empty_archive(&mut store, &dir);
        let external = dir.path().join("import.json");
        fs::write(&external, serde_json::to_vec(&json!({ "name": "Geron" })).unwrap()).unwrap();

        let id = store
            .load_external_resource(&external, "heroes/Geron!")
            .unwrap();

        assert_eq!(store.path_of(id), Some("heroes/Geron_"));
        assert_eq!(store.document(id), Some(&json!({ "name": "Geron" })));
        assert_eq!(store.source_of(id), Some(Source::Zip));
    }
}
