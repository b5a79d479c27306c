//! Signed auto-update protocol for Grimoire.
//!
//! Updates are discovered through a chain of release-info manifests: each
//! installed component (the application and each plugin) keeps one under
//! `update/`, pointing at a remote document that announces the latest
//! release. A run proceeds in steps:
//!
//! 1. **Search** — fetch every component's remote manifest and record the
//!    ones announcing a newer release ([`search::search_updates`])
//! 2. **Offer** — ask the user through [`UpdatePrompt`]
//! 3. **Stage** — download artifacts, following previous-release chains
//!    when releases were skipped ([`stage::stage_updates`])
//! 4. **Manifest** — persist the ordered install list
//!    (`update/updateList.txt`, [`manifest`])
//! 5. **Execute** — verify each artifact's detached Ed25519 signature,
//!    extract the embedded installer, launch it, and exit
//!    ([`execute::execute`])
//!
//! The installer process (a separate binary) applies the staged archives
//! after this process has exited and relaunches the application. The
//! install manifest is the sole durable state in between: if the process
//! dies after staging, the manifest is found and executed on next launch
//! ([`execute::has_pending_installs`]).
//!
//! Search and staging run on a background worker thread and never touch
//! the resource cache; failures are logged and abandon only the affected
//! update candidate.

mod error;
pub mod execute;
pub mod manifest;
mod prompt;
pub mod release;
pub mod search;
mod service;
pub mod signing;
pub mod source;
pub mod stage;
pub mod verify;

pub use error::{Result, UpdateError};
pub use prompt::UpdatePrompt;
pub use release::{ReleaseInfo, SignatureSpec};
pub use search::PendingUpdate;
pub use service::UpdateService;
pub use source::{Fetch, HttpFetch};

/// Entry name of the detached signature inside an update archive.
pub const SIGNATURE_ENTRY: &str = "signature.sig";

/// Entry name of the release manifest embedded in an update archive.
pub const RELEASE_INFO_ENTRY: &str = "release-info.json";

/// Entry listing files to delete, one install-root-relative path per
/// line.
pub const DELETED_LIST_ENTRY: &str = "deleted.txt";

/// Entry name — and install-root-relative destination — of the installer
/// binary carried inside update archives.
pub const INSTALLER_ENTRY: &str = "update/grimoire-installer";
