//! Prefix-based path change notification.

use std::collections::HashMap;

/// Token identifying a registered path listener, used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback = Box<dyn Fn(bool)>;

/// Registry of path listeners keyed by path prefix.
///
/// A listener fires for every loaded, created, deleted, or moved resource
/// whose path starts with its prefix. The callback argument is `true` for
/// a full reset (cache discard, archive switch) and `false` for a
/// single-path change.
#[derive(Default)]
pub(crate) struct PathListeners {
    next_id: u64,
    by_prefix: HashMap<String, Vec<(ListenerId, Callback)>>,
}

impl PathListeners {
    pub fn add(&mut self, prefix: &str, callback: impl Fn(bool) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.by_prefix
            .entry(prefix.to_string())
            .or_default()
            .push((id, Box::new(callback)));
        id
    }

    pub fn remove(&mut self, prefix: &str, id: ListenerId) {
        if let Some(listeners) = self.by_prefix.get_mut(prefix) {
            listeners.retain(|(listener_id, _)| *listener_id != id);
        }
    }

    /// Notifies every listener registered for a prefix of `path` of a
    /// single-path change.
    pub fn notify_path(&self, path: &str) {
        for (prefix, listeners) in &self.by_prefix {
            if path.starts_with(prefix.as_str()) {
                for (_, callback) in listeners {
                    callback(false);
                }
            }
        }
    }

    /// Notifies every listener of a full reset.
    pub fn notify_reset(&self) {
        for listeners in self.by_prefix.values() {
            for (_, callback) in listeners {
                callback(true);
            }
        }
    }
}
