//! Profile Engine: content-addressed snapshots of a server directory (C4),
//! plus the data model they're persisted under (spec.md §4.4, §3).

pub mod store;
pub mod types;

pub use store::ProfileStore;
pub use types::{ProfileContents, ServerProfile, ServerProfileIndex};
