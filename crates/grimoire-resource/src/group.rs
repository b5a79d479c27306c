//! Group archive lifecycle.
//!
//! Owns the single notion of "which campaign archive is currently open":
//! reopening the last session's archive at startup, first-run
//! bootstrapping, and switching to a newly created or different archive.
//! File choices and the bootstrap menu are supplied by the host through
//! [`GroupDialogs`].

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use grimoire_common::errlog;

use crate::plugin::PluginRegistry;
use crate::store::ResourceStore;

/// Outcome of the first-run bootstrap menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapChoice {
    /// Create a new group archive.
    CreateNew,
    /// Open an existing group archive.
    OpenExisting,
    /// Leave the application.
    Exit,
}

/// Host-supplied dialogs for group selection.
pub trait GroupDialogs {
    /// Three-way choice shown when no current group can be opened.
    fn choose_bootstrap_action(&mut self) -> BootstrapChoice;

    /// Destination for a newly created archive; `None` when cancelled.
    fn choose_create_path(&mut self) -> Option<PathBuf>;

    /// Existing archive to open; `None` when cancelled.
    fn choose_open_path(&mut self) -> Option<PathBuf>;
}

/// Opens the group recorded by the last session, or bootstraps one.
///
/// When the pointer file is missing, stale, or unreadable, the user is
/// asked to create or open a group until one of the two succeeds.
/// Choosing exit terminates the process immediately.
pub fn open_current_group(
    store: &mut ResourceStore,
    dialogs: &mut dyn GroupDialogs,
    plugins: &mut PluginRegistry,
) {
    if let Some(path) = read_group_pointer(store) {
        store.set_active_archive(&path);
        return;
    }
    loop {
        let opened = match dialogs.choose_bootstrap_action() {
            BootstrapChoice::CreateNew => create_new_group(store, dialogs, plugins),
            BootstrapChoice::OpenExisting => open_group(store, dialogs, plugins),
            BootstrapChoice::Exit => std::process::exit(0),
        };
        if opened {
            return;
        }
    }
}

/// Creates a new, empty group archive at a user-chosen destination and
/// makes it active. Returns whether an archive was actually created.
pub fn create_new_group(
    store: &mut ResourceStore,
    dialogs: &mut dyn GroupDialogs,
    plugins: &mut PluginRegistry,
) -> bool {
    let Some(path) = dialogs.choose_create_path() else {
        return false;
    };
    store.discard_resources();
    if !store.create_empty_archive(&path) {
        return false;
    }
    store.set_active_archive(&path);
    plugins.notify_reload(store);
    true
}

/// Opens an existing archive chosen by the user. Returns whether an
/// archive was opened.
pub fn open_group(
    store: &mut ResourceStore,
    dialogs: &mut dyn GroupDialogs,
    plugins: &mut PluginRegistry,
) -> bool {
    let Some(path) = dialogs.choose_open_path() else {
        return false;
    };
    store.discard_resources();
    store.set_active_archive(&path);
    plugins.notify_reload(store);
    true
}

fn read_group_pointer(store: &ResourceStore) -> Option<PathBuf> {
    let pointer = store.dirs().group_pointer_file();
    let content = match fs::read_to_string(&pointer) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => return None,
        Err(err) => {
            errlog::log_error(store.dirs(), &err);
            return None;
        }
    };
    let line = content.lines().next()?.trim();
    if line.is_empty() {
        return None;
    }
    let path = PathBuf::from(line);
    path.exists().then_some(path)
}
