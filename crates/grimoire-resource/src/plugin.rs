//! The plugin loading contract.
//!
//! The core knows plugins only through this trait: a stable name, an
//! initialization hook, and an opt-in reload notification fired after
//! every group archive create/open/switch. Everything else — menus, tool
//! panels, the plugin's own data handling — belongs to the host.

use crate::store::ResourceStore;

/// Contract implemented by tool plugins.
pub trait Plugin {
    /// Stable name uniquely identifying the plugin.
    fn name(&self) -> &str;

    /// Called once at startup to register callbacks and host surfaces.
    fn initialize(&mut self, store: &mut ResourceStore);

    /// Whether the plugin wants [`Plugin::reload`] notifications.
    fn wants_reload(&self) -> bool {
        false
    }

    /// Called after all resources were discarded and should be reloaded.
    /// Only invoked when [`Plugin::wants_reload`] returns `true`.
    fn reload(&mut self, store: &mut ResourceStore);
}

/// Registry of installed plugins.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a plugin. A later plugin with the same name replaces the
    /// earlier one.
    pub fn register(&mut self, plugin: Box<dyn Plugin>) {
        if let Some(existing) = self
            .plugins
            .iter()
            .position(|registered| registered.name() == plugin.name())
        {
            tracing::warn!("replacing already registered plugin {}", plugin.name());
            self.plugins[existing] = plugin;
        } else {
            self.plugins.push(plugin);
        }
    }

    /// Initializes every registered plugin.
    pub fn initialize_all(&mut self, store: &mut ResourceStore) {
        for plugin in &mut self.plugins {
            plugin.initialize(store);
        }
    }

    /// Notifies every opted-in plugin that data should be reloaded.
    pub fn notify_reload(&mut self, store: &mut ResourceStore) {
        for plugin in &mut self.plugins {
            if plugin.wants_reload() {
                plugin.reload(store);
            }
        }
    }

    /// Names of all registered plugins.
    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|plugin| plugin.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }
}
