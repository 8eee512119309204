//! Small cross-cutting helpers shared by the Profile Engine and the CLI.

pub mod lock;

pub use lock::ProfileLock;
