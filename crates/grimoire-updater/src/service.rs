//! Orchestration of one update run.

use std::thread::{self, JoinHandle};

use grimoire_common::{InstallDirs, errlog};

use crate::execute;
use crate::manifest;
use crate::prompt::UpdatePrompt;
use crate::search;
use crate::source::Fetch;
use crate::stage;

/// Orchestrates update runs against one install directory.
///
/// Search and staging run off the caller's thread; the resource cache is
/// never touched from here. User decisions go through [`UpdatePrompt`].
pub struct UpdateService {
    dirs: InstallDirs,
}

impl UpdateService {
    pub fn new(dirs: InstallDirs) -> Self {
        Self { dirs }
    }

    /// Runs search/offer/stage on a background worker thread, keeping
    /// blocking network I/O away from the caller.
    pub fn spawn_search<F, P>(
        &self,
        fetch: F,
        prompt: P,
        notify_on_no_update: bool,
    ) -> JoinHandle<()>
    where
        F: Fetch + Send + 'static,
        P: UpdatePrompt + 'static,
    {
        let dirs = self.dirs.clone();
        thread::spawn(move || {
            let mut prompt = prompt;
            run_search(&dirs, &fetch, &mut prompt, notify_on_no_update);
        })
    }

    /// Synchronous variant of [`UpdateService::spawn_search`].
    pub fn run_search(
        &self,
        fetch: &dyn Fetch,
        prompt: &mut dyn UpdatePrompt,
        notify_on_no_update: bool,
    ) {
        run_search(&self.dirs, fetch, prompt, notify_on_no_update);
    }
}

fn run_search(
    dirs: &InstallDirs,
    fetch: &dyn Fetch,
    prompt: &mut dyn UpdatePrompt,
    notify_on_no_update: bool,
) {
    let updates = search::search_updates(dirs, fetch);
    if updates.is_empty() {
        if notify_on_no_update {
            prompt.notify_no_updates();
        }
        return;
    }
    if !prompt.offer_updates(updates.len()) {
        return;
    }
    let entries = stage::stage_updates(dirs, fetch, &updates);
    if entries.is_empty() {
        return;
    }
    if let Err(err) = manifest::write_manifest(&dirs.update_list_file(), &entries) {
        errlog::log_error(dirs, &err);
        return;
    }
    tracing::info!("{} update(s) staged for install", entries.len());
    if prompt.offer_restart() {
        execute::execute(dirs);
    }
}
