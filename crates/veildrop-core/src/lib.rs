//! # Veildrop Core Library
//!
//! `veildrop-core` provides the session lifecycle core for Veildrop,
//! a one-shot anonymous file sharing tool built on onion services.
//!
//! A sharing session is a single linear narrative: the user curates a set
//! of files, a hidden service is started to publish them, the service runs
//! until the transfer completes or the user cancels, and the service is
//! torn down. This crate owns that narrative - the state machine, the
//! startup progress aggregation, and the serialized driver that reconciles
//! user commands with asynchronous service events - and nothing else.
//! Frontends render the snapshot stream; the onion network stack sits
//! behind the [`OnionService`](service::OnionService) trait.
//!
//! ## Modules
//!
//! - [`address`] - Validated onion service addresses
//! - [`error`] - Unified error type
//! - [`files`] - File selection and the file-set collaborator
//! - [`progress`] - Startup progress aggregation
//! - [`service`] - The background sharing service boundary
//! - [`session`] - The session state machine and driver
//!
//! ## Example
//!
//! ```rust,ignore
//! use veildrop_core::files::DiskFileRegistry;
//! use veildrop_core::session::Session;
//!
//! let session = Session::spawn(DiskFileRegistry::new(), tor_service);
//! session.add_files(vec!["photo.jpg".into()]).await?;
//! session.start_sharing().await?;
//!
//! let mut updates = session.subscribe().await?;
//! while let Some(state) = updates.next().await {
//!     println!("session is now {}", state.name());
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::must_use_candidate)]

pub mod address;
pub mod error;
pub mod files;
pub mod progress;
pub mod service;
pub mod session;

pub use address::OnionAddress;
pub use error::{Error, Result};
pub use files::{DiskFileRegistry, FileMetadata, FileRegistry, FileSet};
pub use progress::{ProgressAggregator, ProgressSample, ProgressSummary};
pub use service::{OnionService, ServiceEvent};
pub use session::{Session, SessionStateMachine, SessionUpdates, ShareState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
