//! Serialized session driver.
//!
//! Bridges user commands with the asynchronous onion service. A single
//! spawned task owns the [`SessionStateMachine`] and `select!`s over the
//! command channel and the service event channel, so transitions are atomic
//! and observers can never catch a torn state. Commands reply over oneshot
//! channels with the machine's verdict; service outcomes arrive later as
//! events on the same loop.

use std::path::PathBuf;

use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::files::FileRegistry;
use crate::service::{OnionService, ServiceEvent};

use super::{SessionStateMachine, SessionUpdates, ShareState};

/// Commands accepted by the driver loop.
enum Command {
    AddFiles {
        selection: Vec<PathBuf>,
        reply: oneshot::Sender<Result<()>>,
    },
    StartSharing {
        reply: oneshot::Sender<Result<()>>,
    },
    StopSharing {
        reply: oneshot::Sender<Result<()>>,
    },
    Reset {
        reply: oneshot::Sender<Result<()>>,
    },
    Subscribe {
        reply: oneshot::Sender<SessionUpdates>,
    },
    State {
        reply: oneshot::Sender<ShareState>,
    },
    Shutdown,
}

/// Handle to a running share session.
///
/// Cheap to clone; all clones talk to the same driver loop. The loop ends
/// when [`shutdown`](Session::shutdown) is called or every handle is
/// dropped.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    command_tx: mpsc::UnboundedSender<Command>,
}

impl Session {
    /// Spawn a session over the given collaborators.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<R, S>(registry: R, service: S) -> Self
    where
        R: FileRegistry + 'static,
        S: OnionService + 'static,
    {
        let id = Uuid::new_v4();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let machine = SessionStateMachine::new(Box::new(registry));

        tokio::spawn(run(id, machine, Box::new(service), command_rx));
        tracing::info!(session = %id, "session spawned");

        Self { id, command_tx }
    }

    /// The session id used in log output.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Add a selection of paths to the share.
    ///
    /// # Errors
    ///
    /// Returns the machine's verdict, or [`Error::SessionClosed`] if the
    /// driver is gone.
    pub async fn add_files(&self, selection: Vec<PathBuf>) -> Result<()> {
        self.request(|reply| Command::AddFiles { selection, reply })
            .await?
    }

    /// Begin sharing the curated set.
    ///
    /// Returns as soon as the transition into the starting state is
    /// recorded; the service outcome arrives through the snapshot stream.
    ///
    /// # Errors
    ///
    /// Returns the machine's verdict, or [`Error::SessionClosed`] if the
    /// driver is gone.
    pub async fn start_sharing(&self) -> Result<()> {
        self.request(|reply| Command::StartSharing { reply }).await?
    }

    /// Request teardown of the active share. Idempotent while stopping.
    ///
    /// # Errors
    ///
    /// Returns the machine's verdict, or [`Error::SessionClosed`] if the
    /// driver is gone.
    pub async fn stop_sharing(&self) -> Result<()> {
        self.request(|reply| Command::StopSharing { reply }).await?
    }

    /// Dismiss an error state and return to curating.
    ///
    /// # Errors
    ///
    /// Returns the machine's verdict, or [`Error::SessionClosed`] if the
    /// driver is gone.
    pub async fn reset(&self) -> Result<()> {
        self.request(|reply| Command::Reset { reply }).await?
    }

    /// Subscribe to the snapshot sequence.
    ///
    /// Subscription is processed by the driver loop, so the seeded snapshot
    /// cannot race a transition.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] if the driver is gone.
    pub async fn subscribe(&self) -> Result<SessionUpdates> {
        self.request(|reply| Command::Subscribe { reply }).await
    }

    /// The current state snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] if the driver is gone.
    pub async fn state(&self) -> Result<ShareState> {
        self.request(|reply| Command::State { reply }).await
    }

    /// End the driver loop. Subscribers observe end of stream.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(Command::Shutdown);
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(make(reply_tx))
            .map_err(|_| Error::SessionClosed)?;
        reply_rx.await.map_err(|_| Error::SessionClosed)
    }
}

/// The single-writer loop. Owns machine and service for the whole session.
async fn run(
    id: Uuid,
    mut machine: SessionStateMachine,
    mut service: Box<dyn OnionService>,
    mut command_rx: mpsc::UnboundedReceiver<Command>,
) {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    loop {
        tokio::select! {
            cmd = command_rx.recv() => match cmd {
                Some(Command::AddFiles { selection, reply }) => {
                    let _ = reply.send(machine.add_files(&selection));
                }
                Some(Command::StartSharing { reply }) => {
                    let verdict = machine.start_sharing().map(|files| {
                        service.start(files, event_tx.clone());
                    });
                    let _ = reply.send(verdict);
                }
                Some(Command::StopSharing { reply }) => {
                    let verdict = machine.stop_sharing().map(|issue_stop| {
                        if issue_stop {
                            service.stop();
                        }
                    });
                    let _ = reply.send(verdict);
                }
                Some(Command::Reset { reply }) => {
                    let _ = reply.send(machine.reset());
                }
                Some(Command::Subscribe { reply }) => {
                    let _ = reply.send(machine.subscribe());
                }
                Some(Command::State { reply }) => {
                    let _ = reply.send(machine.state().clone());
                }
                Some(Command::Shutdown) | None => break,
            },
            event = event_rx.recv() => match event {
                Some(ServiceEvent::Progress(sample)) => machine.on_service_progress(&sample),
                Some(ServiceEvent::Ready { onion_address }) => {
                    machine.on_service_ready(onion_address);
                }
                Some(ServiceEvent::Failed { tor_failed_to_connect, error_msg }) => {
                    machine.on_service_failed(tor_failed_to_connect, error_msg);
                }
                Some(ServiceEvent::TransferComplete) => machine.on_transfer_complete(),
                Some(ServiceEvent::Stopped) => machine.on_service_stopped(),
                None => break,
            },
        }
    }

    tracing::info!(session = %id, "session driver stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::OnionAddress;
    use crate::files::{FileMetadata, FileSet};

    struct StubRegistry {
        files: Vec<PathBuf>,
    }

    impl FileRegistry for StubRegistry {
        fn add_files(&mut self, selection: &[PathBuf]) -> Result<FileSet> {
            self.files.extend_from_slice(selection);
            Ok(self.file_set())
        }

        fn file_set(&self) -> FileSet {
            FileSet::new(
                self.files
                    .iter()
                    .map(|p| FileMetadata {
                        relative_path: p.clone(),
                        size: 10,
                        mime_type: None,
                    })
                    .collect(),
            )
        }

        fn is_empty(&self) -> bool {
            self.files.is_empty()
        }

        fn clear(&mut self) {
            self.files.clear();
        }
    }

    /// Hands its event wire and stop notifications out to the test.
    struct MockService {
        wires: mpsc::UnboundedSender<mpsc::UnboundedSender<ServiceEvent>>,
        stops: mpsc::UnboundedSender<()>,
    }

    impl OnionService for MockService {
        fn start(&mut self, _files: FileSet, events: mpsc::UnboundedSender<ServiceEvent>) {
            let _ = self.wires.send(events);
        }

        fn stop(&mut self) {
            let _ = self.stops.send(());
        }
    }

    #[allow(clippy::type_complexity)]
    fn spawn_session() -> (
        Session,
        mpsc::UnboundedReceiver<mpsc::UnboundedSender<ServiceEvent>>,
        mpsc::UnboundedReceiver<()>,
    ) {
        let (wire_tx, wire_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = mpsc::unbounded_channel();
        let session = Session::spawn(
            StubRegistry { files: Vec::new() },
            MockService {
                wires: wire_tx,
                stops: stop_tx,
            },
        );
        (session, wire_rx, stop_rx)
    }

    #[tokio::test]
    async fn test_commands_round_trip() {
        let (session, mut wires, _stops) = spawn_session();

        assert_eq!(session.state().await.unwrap(), ShareState::AddingFiles);

        session.add_files(vec![PathBuf::from("a.txt")]).await.unwrap();
        session.start_sharing().await.unwrap();

        let wire = wires.recv().await.expect("service started");
        wire.send(ServiceEvent::Ready {
            onion_address: OnionAddress::parse("abc.onion").unwrap(),
        })
        .unwrap();

        let mut updates = session.subscribe().await.unwrap();
        loop {
            let state = updates.next().await.expect("stream open");
            if state.name() == "sharing" {
                break;
            }
        }
    }

    #[tokio::test]
    async fn test_stop_issues_service_stop_once() {
        let (session, mut wires, mut stops) = spawn_session();

        session.add_files(vec![PathBuf::from("a.txt")]).await.unwrap();
        session.start_sharing().await.unwrap();
        let _wire = wires.recv().await.expect("service started");

        session.stop_sharing().await.unwrap();
        session.stop_sharing().await.unwrap();

        assert!(stops.recv().await.is_some());
        assert!(stops.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_rejection_propagates_to_caller() {
        let (session, _wires, _stops) = spawn_session();

        let err = session.start_sharing().await.unwrap_err();
        assert!(matches!(err, Error::EmptyShare));

        let err = session.stop_sharing().await.unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_shutdown_closes_handle() {
        let (session, _wires, _stops) = spawn_session();

        session.shutdown();

        // Commands are processed in order, so nothing queued after the
        // shutdown is ever answered.
        let err = session.state().await.unwrap_err();
        assert!(matches!(err, Error::SessionClosed));
    }
}
