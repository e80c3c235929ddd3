//! Operation definitions for the synchronization engine.
//!
//! Operations are the unit of exchange between sites: immutable descriptions
//! of a single insertion or deletion, identified by (origin site, origin
//! logical clock). An insertion and the element it creates share one id.

use serde::{Deserialize, Serialize};

use crate::engine::element::{SENTINEL_HEAD_CHAR, SENTINEL_TAIL_CHAR};
use crate::engine::error::EngineError;
use crate::engine::types::{ElementId, Position, SENTINEL_SITE};

/// The payload of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationKind {
    /// Insert a new character element.
    ///
    /// `after` is the id of the element the originating site inserted behind;
    /// it gates causal delivery. `position` is the allocated position
    /// reference that determines final placement on every replica.
    Insert {
        value: char,
        position: Position,
        after: ElementId,
    },
    /// Tombstone the element identified by `target`.
    Delete { target: ElementId },
}

/// An immutable description of one edit, created by a site and consumed
/// exactly once per recipient by the merge engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Identity of this operation: origin site id + origin logical clock.
    /// For insertions this is also the id of the created element.
    pub origin: ElementId,
    /// What the operation does
    pub kind: OperationKind,
}

impl Operation {
    /// Creates an insertion operation.
    pub fn insert(origin: ElementId, value: char, position: Position, after: ElementId) -> Self {
        Operation {
            origin,
            kind: OperationKind::Insert {
                value,
                position,
                after,
            },
        }
    }

    /// Creates a deletion operation.
    pub fn delete(origin: ElementId, target: ElementId) -> Self {
        Operation {
            origin,
            kind: OperationKind::Delete { target },
        }
    }

    /// Returns true if this is an insertion.
    pub fn is_insert(&self) -> bool {
        matches!(self.kind, OperationKind::Insert { .. })
    }

    /// Validates an operation arriving at the transport boundary.
    ///
    /// Malformed operations are rejected here and never reach the merge
    /// engine: reserved origin sites, sentinel characters as content,
    /// position paths the allocator could not have produced (boundary
    /// positions included), and deletions aimed at the sentinels themselves.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.origin.site == SENTINEL_SITE {
            return Err(EngineError::MalformedOperation(
                "origin site is reserved".to_string(),
            ));
        }

        match &self.kind {
            OperationKind::Insert {
                value, position, ..
            } => {
                if *value == SENTINEL_HEAD_CHAR || *value == SENTINEL_TAIL_CHAR {
                    return Err(EngineError::MalformedOperation(
                        "value is a sentinel character".to_string(),
                    ));
                }
                if !position.is_well_formed() {
                    return Err(EngineError::MalformedOperation(
                        "position is not a valid interior path".to_string(),
                    ));
                }
            }
            OperationKind::Delete { target } => {
                if target.is_sentinel() {
                    return Err(EngineError::MalformedOperation(
                        "deletion targets a sentinel".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }
}
