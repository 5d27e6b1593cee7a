//! Common test utilities for Veildrop integration tests.
//!
//! This module provides shared functionality for integration tests.

use std::path::PathBuf;

use tokio::sync::mpsc;

use veildrop_core::{FileSet, OnionService, ServiceEvent, ShareState};

/// Create a temporary directory for test files.
///
/// The directory will be automatically cleaned up when the returned
/// `TempDir` is dropped.
pub fn create_temp_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// Create a test file with the given content.
pub fn create_test_file(dir: &std::path::Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create parent directories");
    }
    std::fs::write(&path, content).expect("Failed to write test file");
    path
}

/// A scripted onion service.
///
/// On `start` it hands the session's event wire out to the test, which then
/// plays the service's part; `stop` calls are reported the same way.
pub struct MockService {
    wire_tx: mpsc::UnboundedSender<mpsc::UnboundedSender<ServiceEvent>>,
    stop_tx: mpsc::UnboundedSender<()>,
}

/// The test's side of a [`MockService`].
pub struct MockServiceHandle {
    wire_rx: mpsc::UnboundedReceiver<mpsc::UnboundedSender<ServiceEvent>>,
    stop_rx: mpsc::UnboundedReceiver<()>,
}

impl MockService {
    /// Create a mock service and the handle the test drives it with.
    pub fn new() -> (Self, MockServiceHandle) {
        let (wire_tx, wire_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = mpsc::unbounded_channel();
        (
            Self { wire_tx, stop_tx },
            MockServiceHandle { wire_rx, stop_rx },
        )
    }
}

impl OnionService for MockService {
    fn start(&mut self, _files: FileSet, events: mpsc::UnboundedSender<ServiceEvent>) {
        let _ = self.wire_tx.send(events);
    }

    fn stop(&mut self) {
        let _ = self.stop_tx.send(());
    }
}

impl MockServiceHandle {
    /// Wait for the session to issue a start and return the event wire.
    pub async fn started(&mut self) -> mpsc::UnboundedSender<ServiceEvent> {
        self.wire_rx.recv().await.expect("service never started")
    }

    /// Wait for the session to issue a stop.
    pub async fn stopped(&mut self) {
        self.stop_rx.recv().await.expect("service never stopped");
    }
}

/// Await snapshots until one matches the named variant, asserting that the
/// sequence does not end first.
pub async fn wait_for_state(
    updates: &mut veildrop_core::SessionUpdates,
    name: &str,
) -> ShareState {
    loop {
        let state = updates.next().await.expect("snapshot stream ended");
        if state.name() == name {
            return state;
        }
    }
}
