//! The background sharing service boundary.
//!
//! The session core does not talk to the Tor network itself. It drives an
//! [`OnionService`] implementation with fire-and-forget start/stop commands
//! and listens for the outcomes on an event channel. Real implementations
//! (a Tor controller, an embedded onion stack) live outside this crate;
//! tests script a mock.

use tokio::sync::mpsc;

use crate::address::OnionAddress;
use crate::files::FileSet;
use crate::progress::ProgressSample;

/// An event emitted by the onion service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceEvent {
    /// A file is being prepared for publication
    Progress(ProgressSample),
    /// The service is live and reachable
    Ready {
        /// Address the share can be fetched from
        onion_address: OnionAddress,
    },
    /// The service failed to start
    Failed {
        /// Whether the failure was in reaching the Tor network, as opposed
        /// to publishing the service itself
        tor_failed_to_connect: bool,
        /// Best-effort diagnostic detail
        error_msg: Option<String>,
    },
    /// The peer fetched the whole share
    TransferComplete,
    /// The service has shut down
    Stopped,
}

/// The background sharing service collaborator.
///
/// Both commands return immediately; outcomes arrive as [`ServiceEvent`]s
/// on the sender handed to [`start`](OnionService::start). Events for an
/// episode the session has already left are dropped by the session, so
/// implementations are free to race shutdown against a slow startup.
pub trait OnionService: Send {
    /// Begin publishing the given files.
    fn start(&mut self, files: FileSet, events: mpsc::UnboundedSender<ServiceEvent>);

    /// Tear the service down. Completion is signalled by
    /// [`ServiceEvent::Stopped`].
    fn stop(&mut self);
}
