//! Document model: the authoritative character sequence of one document.
//!
//! The document stores character elements in a concurrent SkipMap keyed by
//! position reference, so sequence order is the key order and never a
//! physical index. Tombstoned elements stay in the map; `render()` projects
//! only the visible ones.

use crossbeam_skiplist::SkipMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::ops::Bound;
use std::sync::Arc;

use crate::engine::element::Element;
use crate::engine::error::EngineError;
use crate::engine::op::Operation;
use crate::engine::types::{ElementId, LamportClock, Position, SiteId};

/// One replica's view of a collaboratively edited text.
///
/// # Design
///
/// - SkipMap keyed by `Position` gives O(log n) ordered access with
///   lock-free reads, so `render()` never contends with integration
/// - A side index maps element ids to their immutable positions
/// - Tombstone-based deletion keeps concurrent references resolvable
/// - Sentinel head/tail elements are stable reference points for all sites
/// - A Lamport clock stamps locally originated operations
pub struct Document {
    /// The site this replica authors operations as by default
    site: SiteId,
    /// Logical clock for stamping local operations
    clock: LamportClock,
    /// The character sequence, ordered by position reference
    elements: Arc<SkipMap<Position, Arc<RwLock<Element>>>>,
    /// Lookup from permanent element id to allocated position
    index: RwLock<HashMap<ElementId, Position>>,
}

impl Document {
    /// Creates a new empty document replica for the given site, initialized
    /// with the boundary sentinels.
    pub fn new(site: SiteId) -> Self {
        let elements = Arc::new(SkipMap::new());
        let mut index = HashMap::new();

        for (position, element) in [Element::sentinel_head(), Element::sentinel_tail()] {
            index.insert(element.id, position.clone());
            elements.insert(position, Arc::new(RwLock::new(element)));
        }

        Document {
            site,
            clock: LamportClock::new(),
            elements,
            index: RwLock::new(index),
        }
    }

    /// The default authoring site of this replica.
    pub fn site(&self) -> SiteId {
        self.site
    }

    /// Gets the current clock value (for debugging/testing).
    pub fn current_clock(&self) -> u64 {
        self.clock.current()
    }

    /// Returns true if the element id is integrated into this document
    /// (sentinels always are).
    pub fn contains(&self, id: &ElementId) -> bool {
        self.index.read().contains_key(id)
    }

    /// Looks up the position allocated to an element id.
    pub fn position_of(&self, id: &ElementId) -> Option<Position> {
        self.index.read().get(id).cloned()
    }

    /// Returns a snapshot of the element with the given id.
    pub fn element(&self, id: &ElementId) -> Option<Element> {
        let position = self.position_of(id)?;
        self.elements
            .get(&position)
            .map(|entry| entry.value().read().clone())
    }

    /// Synthesizes and applies a local insertion authored by this replica's
    /// own site. Returns the operation for broadcast.
    pub fn insert_local(&self, value: char, after: ElementId) -> Result<Operation, EngineError> {
        self.insert_local_as(self.site, value, after)
    }

    /// Synthesizes and applies a local deletion authored by this replica's
    /// own site. Returns the operation for broadcast.
    pub fn delete_local(&self, target: ElementId) -> Result<Operation, EngineError> {
        self.delete_local_as(self.site, target)
    }

    /// Inserts `value` after the element `after` on behalf of `site`.
    ///
    /// Allocates a position strictly between `after` and its successor in
    /// the full sequence (tombstones included, so bounds are always two
    /// adjacent existing positions) and stamps the new element with a fresh
    /// (site, clock) id.
    ///
    /// Used directly by the relay when it hosts the document model for thin
    /// clients; local replicas go through [`Document::insert_local`].
    pub fn insert_local_as(
        &self,
        site: SiteId,
        value: char,
        after: ElementId,
    ) -> Result<Operation, EngineError> {
        if after == ElementId::TAIL {
            return Err(EngineError::MalformedOperation(
                "cannot insert after the tail sentinel".to_string(),
            ));
        }

        let left = self
            .position_of(&after)
            .ok_or(EngineError::UnknownReference(after))?;

        // The tail sentinel guarantees a successor exists.
        let right = self
            .elements
            .lower_bound(Bound::Excluded(&left))
            .map(|entry| entry.key().clone())
            .ok_or(EngineError::UnknownReference(after))?;

        let id = ElementId::new(site, self.clock.tick());
        let position = Position::between(&left, &right, site);

        self.index.write().insert(id, position.clone());
        self.elements
            .insert(position.clone(), Arc::new(RwLock::new(Element::new(id, value))));

        Ok(Operation::insert(id, value, position, after))
    }

    /// Tombstones the element `target` on behalf of `site`.
    ///
    /// The deletion operation gets its own (site, clock) identity, distinct
    /// from the id of the element it tombstones.
    pub fn delete_local_as(
        &self,
        site: SiteId,
        target: ElementId,
    ) -> Result<Operation, EngineError> {
        let position = self
            .position_of(&target)
            .ok_or(EngineError::UnknownElement(target))?;

        if let Some(entry) = self.elements.get(&position) {
            entry.value().write().delete()?;
        } else {
            return Err(EngineError::UnknownElement(target));
        }

        let id = ElementId::new(site, self.clock.tick());
        Ok(Operation::delete(id, target))
    }

    /// Integrates a remote insertion. Idempotent: returns false if the
    /// element id is already present (its tombstone state is preserved).
    pub fn integrate_insert(&self, id: ElementId, value: char, position: Position) -> bool {
        self.clock.observe(id.clock);

        let mut index = self.index.write();
        if index.contains_key(&id) {
            return false;
        }
        index.insert(id, position.clone());
        drop(index);

        self.elements
            .insert(position, Arc::new(RwLock::new(Element::new(id, value))));
        true
    }

    /// Integrates a remote deletion. Idempotent: tombstoning a tombstone is
    /// a no-op. Returns false if the target is unknown or a sentinel.
    pub fn integrate_delete(&self, target: &ElementId) -> bool {
        let Some(position) = self.position_of(target) else {
            return false;
        };
        match self.elements.get(&position) {
            Some(entry) => entry.value().write().delete().is_ok(),
            None => false,
        }
    }

    /// Returns the visible text: the concatenation of non-tombstoned,
    /// non-sentinel element values in position order. Pure projection.
    pub fn render(&self) -> String {
        self.elements
            .iter()
            .filter_map(|entry| {
                let element = entry.value().read();
                if element.is_visible() {
                    Some(element.value)
                } else {
                    None
                }
            })
            .collect()
    }

    /// Returns snapshots of the visible elements in position order.
    pub fn visible_elements(&self) -> Vec<Element> {
        self.elements
            .iter()
            .filter_map(|entry| {
                let element = entry.value().read();
                if element.is_visible() {
                    Some(element.clone())
                } else {
                    None
                }
            })
            .collect()
    }

    /// The id of the element a new character at visible index `index` should
    /// be inserted after (index 0 means after the head sentinel).
    pub fn visible_id_before(&self, index: usize) -> Result<ElementId, EngineError> {
        if index == 0 {
            return Ok(ElementId::HEAD);
        }
        let mut seen = 0usize;
        for entry in self.elements.iter() {
            let element = entry.value().read();
            if element.is_visible() {
                seen += 1;
                if seen == index {
                    return Ok(element.id);
                }
            }
        }
        Err(EngineError::IndexOutOfBounds { index, len: seen })
    }

    /// The id of the visible element currently at `index`.
    pub fn visible_id_at(&self, index: usize) -> Result<ElementId, EngineError> {
        let mut seen = 0usize;
        for entry in self.elements.iter() {
            let element = entry.value().read();
            if element.is_visible() {
                if seen == index {
                    return Ok(element.id);
                }
                seen += 1;
            }
        }
        Err(EngineError::IndexOutOfBounds { index, len: seen })
    }

    /// Total number of elements, tombstones and sentinels included.
    pub fn total_count(&self) -> usize {
        self.elements.len()
    }

    /// Number of visible elements.
    pub fn visible_count(&self) -> usize {
        self.elements
            .iter()
            .filter(|entry| entry.value().read().is_visible())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::op::OperationKind;

    #[test]
    fn test_document_creation() {
        let doc = Document::new(1);
        assert_eq!(doc.site(), 1);
        assert_eq!(doc.current_clock(), 0);
        assert_eq!(doc.total_count(), 2); // head and tail sentinels
        assert_eq!(doc.visible_count(), 0);
        assert_eq!(doc.render(), "");
    }

    #[test]
    fn test_basic_insertion() {
        let doc = Document::new(1);

        let op_a = doc.insert_local('A', ElementId::HEAD).unwrap();
        assert_eq!(doc.render(), "A");

        doc.insert_local('B', op_a.origin).unwrap();
        assert_eq!(doc.render(), "AB");
        assert_eq!(doc.visible_count(), 2);
    }

    #[test]
    fn test_insertion_between() {
        let doc = Document::new(1);
        let op_a = doc.insert_local('A', ElementId::HEAD).unwrap();
        doc.insert_local('C', op_a.origin).unwrap();
        doc.insert_local('B', op_a.origin).unwrap();

        assert_eq!(doc.render(), "ABC");
    }

    #[test]
    fn test_deletion_keeps_tombstone() {
        let doc = Document::new(1);
        let op_a = doc.insert_local('A', ElementId::HEAD).unwrap();
        assert_eq!(doc.render(), "A");

        doc.delete_local(op_a.origin).unwrap();
        assert_eq!(doc.render(), "");
        assert_eq!(doc.visible_count(), 0);
        assert_eq!(doc.total_count(), 3); // tombstone retained
    }

    #[test]
    fn test_unknown_reference_rejected() {
        let doc = Document::new(1);
        let missing = ElementId::new(9, 9);

        assert_eq!(
            doc.insert_local('A', missing),
            Err(EngineError::UnknownReference(missing))
        );
        assert_eq!(
            doc.delete_local(missing),
            Err(EngineError::UnknownElement(missing))
        );
    }

    #[test]
    fn test_insert_after_tail_rejected() {
        let doc = Document::new(1);
        assert!(doc.insert_local('A', ElementId::TAIL).is_err());
    }

    #[test]
    fn test_operation_identity_matches_element() {
        let doc = Document::new(4);
        let op = doc.insert_local('Z', ElementId::HEAD).unwrap();

        assert_eq!(op.origin.site, 4);
        assert!(doc.contains(&op.origin));
        match op.kind {
            OperationKind::Insert { value, .. } => assert_eq!(value, 'Z'),
            _ => panic!("expected insert"),
        }
    }

    #[test]
    fn test_integrate_insert_is_idempotent() {
        let doc_a = Document::new(1);
        let doc_b = Document::new(2);

        let op = doc_a.insert_local('A', ElementId::HEAD).unwrap();
        let OperationKind::Insert { value, position, .. } = op.kind.clone() else {
            panic!("expected insert");
        };

        assert!(doc_b.integrate_insert(op.origin, value, position.clone()));
        assert!(!doc_b.integrate_insert(op.origin, value, position));
        assert_eq!(doc_b.render(), "A");
    }

    #[test]
    fn test_integrate_delete_preserved_across_reinsert() {
        let doc_a = Document::new(1);
        let doc_b = Document::new(2);

        let op = doc_a.insert_local('A', ElementId::HEAD).unwrap();
        let OperationKind::Insert { value, position, .. } = op.kind.clone() else {
            panic!("expected insert");
        };

        doc_b.integrate_insert(op.origin, value, position.clone());
        assert!(doc_b.integrate_delete(&op.origin));

        // Redelivered insert must not resurrect the tombstone
        assert!(!doc_b.integrate_insert(op.origin, value, position));
        assert_eq!(doc_b.render(), "");
    }

    #[test]
    fn test_hosted_authoring_attributes_sites() {
        let doc = Document::new(0);
        let op_a = doc.insert_local_as(7, 'x', ElementId::HEAD).unwrap();
        let op_b = doc.insert_local_as(8, 'y', op_a.origin).unwrap();

        assert_eq!(op_a.origin.site, 7);
        assert_eq!(op_b.origin.site, 8);
        assert_ne!(op_a.origin, op_b.origin);
        assert_eq!(doc.render(), "xy");
    }

    #[test]
    fn test_visible_index_helpers() {
        let doc = Document::new(1);
        let op_a = doc.insert_local('a', ElementId::HEAD).unwrap();
        let op_b = doc.insert_local('b', op_a.origin).unwrap();

        assert_eq!(doc.visible_id_before(0).unwrap(), ElementId::HEAD);
        assert_eq!(doc.visible_id_before(1).unwrap(), op_a.origin);
        assert_eq!(doc.visible_id_at(1).unwrap(), op_b.origin);
        assert!(doc.visible_id_at(2).is_err());
        assert!(doc.visible_id_before(3).is_err());
    }
}
