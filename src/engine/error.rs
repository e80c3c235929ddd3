//! Error types for the synchronization engine.

use thiserror::Error;

use crate::engine::types::{ElementId, SiteId};

/// Errors surfaced by the engine's local-edit and boundary-validation paths.
///
/// Remote integration never fails with these: duplicates are absorbed and
/// causal gaps are buffered, so only malformed input and invalid local edits
/// are reported back to the originating site.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A local insertion referenced a neighbor that is not in the document.
    #[error("reference element {0} not found in document")]
    UnknownReference(ElementId),

    /// A local deletion targeted an element that is not in the document.
    #[error("element {0} not found in document")]
    UnknownElement(ElementId),

    /// An attempt was made to delete a boundary sentinel.
    #[error("cannot delete sentinel elements")]
    SentinelDelete,

    /// An operation failed boundary validation and was rejected before
    /// reaching the merge engine.
    #[error("malformed operation: {0}")]
    MalformedOperation(String),

    /// An index-based edit pointed outside the visible document.
    #[error("index {index} out of bounds for document of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// A site tried to mix raw edits and replica operations. The hosted
    /// clock and a replica's own clock would mint colliding identities.
    #[error("site {0} cannot mix raw edits and replica operations")]
    AuthoringConflict(SiteId),
}
