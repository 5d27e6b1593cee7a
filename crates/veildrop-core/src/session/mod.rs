//! Share session lifecycle.
//!
//! This module models the one-shot sharing session:
//!
//! - [`ShareState`] - the closed set of states a session passes through
//! - [`SessionStateMachine`] - transition validation, stale-event handling,
//!   and snapshot fan-out to observers
//! - [`SessionUpdates`] - a per-subscriber snapshot sequence
//!
//! The machine is synchronous and single-owner; serialization of commands
//! against service events is the job of [`Session`](driver::Session).
//!
//! ## State machine
//!
//! ```text
//! AddingFiles --add_files(ok)--> AddingFiles
//! AddingFiles --add_files(fail)--> ErrorAddingFile
//! ErrorAddingFile --add_files(ok)--> AddingFiles
//! AddingFiles --start_sharing--> Starting
//! Starting --on_service_progress--> Starting (progress updated)
//! Starting --on_service_ready--> Sharing
//! Starting --on_service_failed--> ErrorStarting
//! Sharing --on_transfer_complete--> Complete
//! Sharing|Starting|Complete --stop_sharing--> Stopping
//! Stopping --on_service_stopped--> AddingFiles
//! ErrorStarting|ErrorAddingFile --reset--> AddingFiles
//! ```
//!
//! Service events that no longer apply to the current state are stale by
//! definition (the service races cancellation) and are dropped, not
//! errors. Commands invalid for the current state are rejected without
//! mutation.

mod driver;

pub use driver::Session;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;

use crate::address::OnionAddress;
use crate::error::{Error, Result};
use crate::files::{FileRegistry, FileSet};
use crate::progress::{ProgressAggregator, ProgressSample};

/// The state of a share session.
///
/// Exactly one variant is active at a time; presentation layers map the
/// whole set with one exhaustive `match`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ShareState {
    /// No active service; the user is curating the file set
    AddingFiles,
    /// The service is initializing
    Starting {
        /// Percentage of files fully prepared, 0-100
        files_progress: u8,
        /// Percentage of overall readiness, 0-100
        total_progress: u8,
    },
    /// The service is live and reachable
    Sharing {
        /// Address the share can be fetched from
        onion_address: OnionAddress,
    },
    /// The transfer finished successfully
    Complete,
    /// The service is shutting down
    Stopping,
    /// A file could not be added to the set
    ErrorAddingFile,
    /// The service failed to start
    ErrorStarting {
        /// Whether the failure was in reaching the Tor network
        tor_failed_to_connect: bool,
        /// Best-effort diagnostic detail
        error_msg: Option<String>,
    },
}

impl ShareState {
    /// The wire name of the active variant.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::AddingFiles => "addingFiles",
            Self::Starting { .. } => "starting",
            Self::Sharing { .. } => "sharing",
            Self::Complete => "complete",
            Self::Stopping => "stopping",
            Self::ErrorAddingFile => "errorAddingFile",
            Self::ErrorStarting { .. } => "errorStarting",
        }
    }
}

/// A subscription to the session's snapshot sequence.
///
/// The first snapshot delivered is the state current at subscription time;
/// every accepted transition follows, in order, with no gaps.
#[derive(Debug)]
pub struct SessionUpdates {
    rx: mpsc::UnboundedReceiver<ShareState>,
}

impl SessionUpdates {
    /// Wait for the next snapshot. Returns `None` once the session is gone.
    pub async fn next(&mut self) -> Option<ShareState> {
        self.rx.recv().await
    }

    /// Take the next snapshot if one is already queued.
    pub fn try_next(&mut self) -> Option<ShareState> {
        self.rx.try_recv().ok()
    }

    /// Convert the subscription into a [`Stream`] of snapshots.
    pub fn into_stream(self) -> impl Stream<Item = ShareState> {
        UnboundedReceiverStream::new(self.rx)
    }
}

/// Owns the session state and validates every transition.
///
/// All mutation goes through the command and event methods below; observers
/// only ever receive immutable snapshots.
pub struct SessionStateMachine {
    state: ShareState,
    registry: Box<dyn FileRegistry>,
    aggregator: ProgressAggregator,
    subscribers: Vec<mpsc::UnboundedSender<ShareState>>,
}

impl std::fmt::Debug for SessionStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStateMachine")
            .field("state", &self.state)
            .field("subscribers", &self.subscribers.len())
            .finish_non_exhaustive()
    }
}

impl SessionStateMachine {
    /// Create a machine in the adding-files state.
    #[must_use]
    pub fn new(registry: Box<dyn FileRegistry>) -> Self {
        Self {
            state: ShareState::AddingFiles,
            registry,
            aggregator: ProgressAggregator::new(),
            subscribers: Vec::new(),
        }
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> &ShareState {
        &self.state
    }

    /// Subscribe to the snapshot sequence.
    ///
    /// The current state is queued immediately as the first snapshot.
    pub fn subscribe(&mut self) -> SessionUpdates {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(self.state.clone());
        self.subscribers.push(tx);
        SessionUpdates { rx }
    }

    /// Add a selection of paths to the share.
    ///
    /// Valid while curating (`AddingFiles`/`ErrorAddingFile`). A selection
    /// the file collaborator rejects lands the session in
    /// `ErrorAddingFile`; that is a state, not an error, and the call still
    /// returns `Ok`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] outside the curating states.
    pub fn add_files(&mut self, selection: &[PathBuf]) -> Result<()> {
        match self.state {
            ShareState::AddingFiles | ShareState::ErrorAddingFile => {}
            _ => return Err(self.rejected("addFiles")),
        }

        match self.registry.add_files(selection) {
            Ok(set) => {
                tracing::info!(files = set.len(), "file selection updated");
                self.transition(ShareState::AddingFiles);
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to add files");
                self.transition(ShareState::ErrorAddingFile);
            }
        }
        Ok(())
    }

    /// Begin sharing the curated set.
    ///
    /// Enters `Starting(0, 0)` and returns the [`FileSet`] the caller must
    /// hand to the onion service.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] outside `AddingFiles` and
    /// [`Error::EmptyShare`] when no files have been added; the state is
    /// unchanged in both cases.
    pub fn start_sharing(&mut self) -> Result<FileSet> {
        if self.state != ShareState::AddingFiles {
            return Err(self.rejected("startSharing"));
        }
        if self.registry.is_empty() {
            return Err(Error::EmptyShare);
        }

        let files = self.registry.file_set();
        self.aggregator.reset();
        self.transition(ShareState::Starting {
            files_progress: 0,
            total_progress: 0,
        });
        Ok(files)
    }

    /// Fold a service progress report into the starting state.
    ///
    /// Dropped as stale outside `Starting`.
    pub fn on_service_progress(&mut self, sample: &ProgressSample) {
        if !matches!(self.state, ShareState::Starting { .. }) {
            tracing::debug!(file_id = %sample.file_id, "dropping stale progress event");
            return;
        }

        let summary = self.aggregator.record(sample);
        self.transition(ShareState::Starting {
            files_progress: summary.files_progress,
            total_progress: summary.total_progress,
        });
    }

    /// The service is live. Dropped as stale outside `Starting`.
    pub fn on_service_ready(&mut self, onion_address: OnionAddress) {
        if !matches!(self.state, ShareState::Starting { .. }) {
            tracing::debug!(state = self.state.name(), "dropping stale ready event");
            return;
        }

        self.transition(ShareState::Sharing { onion_address });
    }

    /// The service failed to start. Dropped as stale outside `Starting`.
    pub fn on_service_failed(&mut self, tor_failed_to_connect: bool, error_msg: Option<String>) {
        if !matches!(self.state, ShareState::Starting { .. }) {
            tracing::debug!(state = self.state.name(), "dropping stale failure event");
            return;
        }

        self.transition(ShareState::ErrorStarting {
            tor_failed_to_connect,
            error_msg,
        });
    }

    /// The peer fetched everything. Dropped as stale outside `Sharing`.
    pub fn on_transfer_complete(&mut self) {
        if !matches!(self.state, ShareState::Sharing { .. }) {
            tracing::debug!(state = self.state.name(), "dropping stale completion event");
            return;
        }

        self.transition(ShareState::Complete);
    }

    /// Request teardown of the active share.
    ///
    /// Returns `Ok(true)` when the session entered `Stopping` and the
    /// caller must issue the service stop, `Ok(false)` when already
    /// stopping (the command is idempotent).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] when there is nothing to stop.
    pub fn stop_sharing(&mut self) -> Result<bool> {
        match self.state {
            ShareState::Starting { .. } | ShareState::Sharing { .. } | ShareState::Complete => {
                self.transition(ShareState::Stopping);
                Ok(true)
            }
            ShareState::Stopping => Ok(false),
            _ => Err(self.rejected("stopSharing")),
        }
    }

    /// The service confirmed teardown; the session resets for reuse.
    ///
    /// Clears the file set. Dropped as stale outside `Stopping`.
    pub fn on_service_stopped(&mut self) {
        if self.state != ShareState::Stopping {
            tracing::debug!(state = self.state.name(), "dropping stale stopped event");
            return;
        }

        self.registry.clear();
        self.transition(ShareState::AddingFiles);
    }

    /// Dismiss an error state and return to curating.
    ///
    /// The file selection is retained so the user can retry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] outside the error states.
    pub fn reset(&mut self) -> Result<()> {
        match self.state {
            ShareState::ErrorAddingFile | ShareState::ErrorStarting { .. } => {
                self.transition(ShareState::AddingFiles);
                Ok(())
            }
            _ => Err(self.rejected("reset")),
        }
    }

    /// Apply a transition and fan the new snapshot out to subscribers.
    ///
    /// A value equal to the current state is not re-broadcast; progress
    /// percentages move in whole steps, so this both bounds the update rate
    /// and guarantees observers never see two identical snapshots in a row.
    fn transition(&mut self, next: ShareState) {
        if next == self.state {
            return;
        }

        if next.name() == self.state.name() {
            tracing::trace!(state = next.name(), "session state updated");
        } else {
            tracing::info!(from = self.state.name(), to = next.name(), "session state change");
        }

        self.state = next;
        let state = &self.state;
        self.subscribers.retain(|tx| tx.send(state.clone()).is_ok());
    }

    fn rejected(&self, command: &'static str) -> Error {
        tracing::warn!(command, state = self.state.name(), "command rejected");
        Error::InvalidTransition {
            command,
            state: self.state.name(),
        }
    }
}
