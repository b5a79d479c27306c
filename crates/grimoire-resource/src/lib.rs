//! Layered JSON resource store and group archive management for Grimoire.
//!
//! Campaign and rules data is organized as named JSON documents merged
//! from up to three layers: the shipped base files, a local `mod/`
//! overlay, and the currently open group archive (a zip file holding one
//! campaign). This crate provides:
//!
//! - [`ResourceStore`] — loads, merges, caches, mutates, and writes back
//!   resource documents, addressed by stable [`DocId`] handles
//! - the group archive lifecycle ([`open_current_group`] and friends),
//!   including first-run bootstrapping via host-supplied [`GroupDialogs`]
//! - [`settings`] — typed accessors over the reserved settings document
//! - the [`Plugin`] contract and [`PluginRegistry`] used to notify tool
//!   plugins after an archive switch
//!
//! # Failure contract
//!
//! Store operations never surface structured errors. Failures are written
//! to `error.log` (and `tracing`), and callers see `false`, `None`, or an
//! empty result instead.
//!
//! # Threading
//!
//! The document cache is owned by a single thread (the host's event
//! loop). Only the active-archive handle is internally locked, so archive
//! reads never interleave with a rebuild.

mod archive;
mod discriminate;
mod error;
mod group;
mod listeners;
mod merge;
mod plugin;
pub mod settings;
mod store;

pub use discriminate::DiscriminationTable;
pub use group::{BootstrapChoice, GroupDialogs, create_new_group, open_current_group, open_group};
pub use listeners::ListenerId;
pub use plugin::{Plugin, PluginRegistry};
pub use store::{DEFAULT_DISCRIMINATING_FIELD, DocId, ResourceStore, SETTINGS_PATH, Source};
