//! # atlsync
//!
//! Library support for syncing a local Minecraft server directory to a
//! remote host: content-addressed profile snapshots (save/restore/diff) and
//! a cancellable, multi-phase SSH push that can drive the remote container's
//! lifecycle around the transfer.
//!
//! ## Profile Engine
//!
//! ```rust,ignore
//! use atlsync::profile::ProfileStore;
//! use atlsync::policy::BackupMode;
//!
//! let store = ProfileStore::new(&atlsync_dir);
//! let profile = store.save(&server, "pre-update", None, BackupMode::Normal)?;
//! ```
//!
//! ## Sync Orchestrator
//!
//! ```rust,ignore
//! use atlsync::orchestrator::SyncOrchestrator;
//!
//! let orchestrator = SyncOrchestrator::new(server, config);
//! let result = orchestrator.sync(None);
//! ```

#![deny(unsafe_code)]
#![warn(dead_code)]

pub mod archive;
pub mod change_detector;
pub mod config;
pub mod error;
pub mod hash;
pub mod logging;
pub mod orchestrator;
pub mod policy;
pub mod profile;
pub mod ssh;
pub mod types;
pub mod utils;

pub use config::Config;
pub use error::AtlSyncError;
pub use orchestrator::{CancelHandle, SyncOrchestrator};
pub use profile::ProfileStore;
pub use types::{RemoteSyncConfig, Server, SyncResult};
pub use utils::ProfileLock;
