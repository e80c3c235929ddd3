//! # textsync - collaborative text synchronization engine
//!
//! A convergence core for real-time collaborative plain-text editing, plus a
//! small relay server. Concurrent edits from multiple sites merge into one
//! consistent document without a central ordering authority.
//!
//! ## Features
//!
//! - **Conflict-free**: operations integrate in any order and converge
//! - **Stable positions**: elements are placed by dense position references,
//!   never by array index, so concurrent inserts at the same spot resolve
//!   identically on every replica
//! - **Causally buffered**: operations arriving before their dependencies
//!   wait in the log without blocking anything else
//! - **Tombstone-based deletion**: deleted elements stay in the sequence for
//!   merge correctness and are excluded from rendering
//!
//! ## Example
//!
//! ```rust
//! use textsync::engine::{ElementId, MergeEngine};
//!
//! let mut alice = MergeEngine::new(1);
//! let mut bob = MergeEngine::new(2);
//!
//! let op = alice.local_insert('h', ElementId::HEAD).unwrap();
//! bob.integrate(op);
//!
//! assert_eq!(alice.render(), bob.render());
//! ```

pub mod engine;
pub mod server;
pub mod session;

// Re-export the main public API
pub use engine::{
    Document, Element, ElementId, EngineError, Integration, MergeEngine, Operation,
    OperationKind, OperationLog, Position, SiteId,
};
pub use session::{
    DocumentId, Edit, Session, SessionHandle, SessionManager, SessionStats, SessionUpdate,
    SessionUpdates, Snapshot,
};
