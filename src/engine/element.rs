//! Element definition and related constants.
//!
//! This module contains the Element struct which represents individual
//! characters in the document, along with the sentinel elements used to mark
//! document boundaries.

use serde::{Deserialize, Serialize};

use crate::engine::error::EngineError;
use crate::engine::types::{ElementId, Position};

/// Special sentinel characters that mark the beginning and end of the document.
/// These are fixed points of reference for all replicas.
///
/// These characters are chosen from Unicode's "Miscellaneous Technical" block
/// to avoid conflicts with normal text content.
pub const SENTINEL_HEAD_CHAR: char = '\u{2388}'; // Symbol for "begin"
pub const SENTINEL_TAIL_CHAR: char = '\u{2389}'; // Symbol for "end"

/// Represents a single character within the document.
///
/// Each element carries:
/// - A permanent identifier (origin site id + origin logical clock)
/// - The character content
/// - A deletion flag that acts as a tombstone for logical deletion
///
/// # Tombstone Deletion
///
/// Instead of physically removing elements, the document uses logical
/// deletion by setting `is_deleted` to true. Tombstoned elements stay in the
/// sequence so concurrent operations that reference them still resolve the
/// same way on every replica.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Element {
    /// Permanent identifier, assigned at origin and never changed
    pub id: ElementId,
    /// The character content of this element
    pub value: char,
    /// Whether this element has been logically deleted (tombstone)
    pub is_deleted: bool,
}

impl Element {
    /// Creates a new element with the given id and character.
    /// The element is initially not deleted.
    pub fn new(id: ElementId, value: char) -> Self {
        Element {
            id,
            value,
            is_deleted: false,
        }
    }

    /// Creates the sentinel head element at the head boundary position.
    pub fn sentinel_head() -> (Position, Self) {
        (
            Position::head(),
            Element {
                id: ElementId::HEAD,
                value: SENTINEL_HEAD_CHAR,
                is_deleted: false,
            },
        )
    }

    /// Creates the sentinel tail element at the tail boundary position.
    pub fn sentinel_tail() -> (Position, Self) {
        (
            Position::tail(),
            Element {
                id: ElementId::TAIL,
                value: SENTINEL_TAIL_CHAR,
                is_deleted: false,
            },
        )
    }

    /// Returns true if this element is a boundary sentinel.
    pub fn is_sentinel(&self) -> bool {
        self.id.is_sentinel()
    }

    /// Returns true if this element is visible (not deleted and not a sentinel).
    pub fn is_visible(&self) -> bool {
        !self.is_deleted && !self.is_sentinel()
    }

    /// Marks this element as deleted (creates a tombstone).
    /// Sentinel elements cannot be deleted. Idempotent on tombstones.
    pub fn delete(&mut self) -> Result<(), EngineError> {
        if self.is_sentinel() {
            Err(EngineError::SentinelDelete)
        } else {
            self.is_deleted = true;
            Ok(())
        }
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Element {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_creation() {
        let id = ElementId::new(1, 1);
        let element = Element::new(id, 'A');

        assert_eq!(element.id, id);
        assert_eq!(element.value, 'A');
        assert!(!element.is_deleted);
        assert!(element.is_visible());
    }

    #[test]
    fn test_element_deletion_is_idempotent() {
        let mut element = Element::new(ElementId::new(1, 1), 'A');

        assert!(element.delete().is_ok());
        assert!(element.is_deleted);
        assert!(!element.is_visible());

        // Deleting a tombstone again is a no-op
        assert!(element.delete().is_ok());
        assert!(element.is_deleted);
    }

    #[test]
    fn test_sentinel_elements() {
        let (head_pos, head) = Element::sentinel_head();
        let (tail_pos, tail) = Element::sentinel_tail();

        assert!(head.is_sentinel());
        assert!(tail.is_sentinel());
        assert!(!head.is_visible());
        assert!(head_pos < tail_pos);
    }

    #[test]
    fn test_sentinel_deletion_protection() {
        let (_, mut head) = Element::sentinel_head();
        let (_, mut tail) = Element::sentinel_tail();

        assert_eq!(head.delete(), Err(EngineError::SentinelDelete));
        assert_eq!(tail.delete(), Err(EngineError::SentinelDelete));
    }
}
