//! Host decisions during an update run.

/// Decisions the host UI supplies during an update run.
///
/// The updater calls these from its background worker thread;
/// implementations marshal to their UI thread as needed and block until
/// the user answered.
pub trait UpdatePrompt: Send {
    /// Pending updates were found; download them now?
    fn offer_updates(&mut self, count: usize) -> bool;

    /// Updates are staged; restart now to install them?
    fn offer_restart(&mut self) -> bool;

    /// An explicitly requested check found nothing. Silent background
    /// checks never trigger this.
    fn notify_no_updates(&mut self);
}
