//! Collaborative text synchronization engine.
//!
//! This module contains the convergence core: the document model, the
//! append-only operation log with causal buffering, and the merge engine
//! that integrates concurrent operations deterministically.

pub mod document;
pub mod element;
pub mod error;
pub mod merge;
pub mod op;
pub mod oplog;
pub mod types;

// Re-export the main public API
pub use document::Document;
pub use element::{Element, SENTINEL_HEAD_CHAR, SENTINEL_TAIL_CHAR};
pub use error::EngineError;
pub use merge::{Integration, MergeEngine};
pub use op::{Operation, OperationKind};
pub use oplog::OperationLog;
pub use types::{ElementId, LamportClock, PathEntry, Position, SENTINEL_SITE, SiteId};
