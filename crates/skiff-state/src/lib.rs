//! skiff-state — the desired-state store.
//!
//! An in-memory mapping from `(kind, name)` to the latest accepted manifest,
//! guarded by a single process-wide reader-writer lock and mirrored to a
//! per-resource JSON snapshot under the data directory. The in-memory state
//! is canonical at runtime; the snapshot exists for crash recovery.
//!
//! # Layout
//!
//! ```text
//! <data-dir>/pods/<name>.json
//! <data-dir>/deployments/<name>.json
//! <data-dir>/statefulsets/<name>.json
//! <data-dir>/services/<name>.json
//! <data-dir>/nodes/<name>.json
//! ```
//!
//! The `Store` is `Clone` + `Send` + `Sync` (backed by `Arc`) and can be
//! shared across async tasks.

pub mod error;
pub mod store;

pub use error::{StateError, StateResult};
pub use store::Store;
