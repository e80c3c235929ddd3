//! Dense, collision-free position references for the document sequence.
//!
//! A position reference is a path of (digit, site) pairs. Paths compare
//! lexicographically: pairs are compared digit first, then site id (lower
//! site id sorts first), and a path that is a strict prefix of another sorts
//! before it. Between any two distinct paths another path can always be
//! allocated, so concurrent inserts at the same logical location never
//! collide and order identically on every replica.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::engine::types::site::SiteId;

/// Exclusive upper bound of the digit space at each path level.
///
/// Allocated digits always fall in `1..DIGIT_BASE`; digit 0 is reserved for
/// the head boundary and for filler entries, `DIGIT_BASE` for the tail
/// boundary.
pub const DIGIT_BASE: u64 = 1 << 16;

/// One level of a position path.
///
/// Ordering is digit first, then site id. The site id tie-break is what makes
/// concurrent allocations between the same neighbors order deterministically
/// across replicas.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PathEntry {
    /// Digit within this level's space
    pub digit: u64,
    /// Site that allocated this entry
    pub site: SiteId,
}

impl PathEntry {
    /// Creates a new path entry.
    pub fn new(digit: u64, site: SiteId) -> Self {
        PathEntry { digit, site }
    }
}

/// A stable locator for an element's place in the sequence.
///
/// Positions are immutable once allocated; the sequence order of the document
/// is the order of its elements' positions, never a physical array index.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Position(Vec<PathEntry>);

impl Position {
    /// The position of the head sentinel, before all document content.
    pub fn head() -> Self {
        Position(vec![PathEntry::new(0, 0)])
    }

    /// The position of the tail sentinel, after all document content.
    pub fn tail() -> Self {
        Position(vec![PathEntry::new(DIGIT_BASE, 0)])
    }

    /// Returns the path entries of this position.
    pub fn entries(&self) -> &[PathEntry] {
        &self.0
    }

    /// Returns the nesting depth of this position.
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Returns true if this position lies strictly between the two boundary
    /// sentinels.
    pub fn is_interior(&self) -> bool {
        !self.0.is_empty() && *self > Position::head() && *self < Position::tail()
    }

    /// Returns true if this path could have been produced by
    /// [`Position::between`]: every digit below [`DIGIT_BASE`], with a final
    /// digit of at least 1 (zero digits only occur as interior filler).
    ///
    /// Interior paths that break these rules can only arrive over the wire,
    /// and integrating one would let a later `between` call allocate outside
    /// its bounds. A well-formed path is always interior.
    pub fn is_well_formed(&self) -> bool {
        let Some((last, rest)) = self.0.split_last() else {
            return false;
        };
        (1..DIGIT_BASE).contains(&last.digit) && rest.iter().all(|e| e.digit < DIGIT_BASE)
    }

    /// Allocates a fresh position strictly between `left` and `right` on
    /// behalf of `site`.
    ///
    /// The allocation walks both bounds level by level. At the first level
    /// with an integer gap between the bounding digits it places
    /// `left digit + 1` tagged with the allocating site; otherwise it adopts
    /// the left bound's entry and descends. Two sites allocating between the
    /// same neighbors therefore produce paths that differ only in the final
    /// entry's site id, which is exactly the tie the ordering resolves.
    ///
    /// # Panics
    ///
    /// Debug builds assert `left < right`; the bounds must be two adjacent
    /// positions of the same document.
    pub fn between(left: &Position, right: &Position, site: SiteId) -> Position {
        debug_assert!(left < right, "position bounds out of order");

        let mut path: Vec<PathEntry> = Vec::new();
        // Once the path diverges below the right bound, the right bound no
        // longer constrains deeper levels.
        let mut right_bounded = true;
        let mut depth = 0usize;

        loop {
            let left_entry = left.0.get(depth).copied();
            let left_digit = left_entry.map_or(0, |e| e.digit);
            let right_entry = if right_bounded {
                right.0.get(depth).copied()
            } else {
                None
            };
            let right_digit = right_entry.map_or(DIGIT_BASE, |e| e.digit);

            if right_digit > left_digit + 1 {
                // Room at this level.
                path.push(PathEntry::new(left_digit + 1, site));
                return Position(path);
            }

            // No room: adopt the left bound at this level and descend.
            let adopted = left_entry.unwrap_or(PathEntry::new(0, 0));
            path.push(adopted);
            if let Some(r) = right_entry {
                if adopted < r {
                    right_bounded = false;
                }
            }
            depth += 1;
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, entry) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}@{}", entry.digit, entry.site)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_ordering() {
        assert!(Position::head() < Position::tail());
        assert!(!Position::head().is_interior());
        assert!(!Position::tail().is_interior());
    }

    #[test]
    fn test_entry_ordering_prefers_digit_then_site() {
        assert!(PathEntry::new(1, 9) < PathEntry::new(2, 1));
        assert!(PathEntry::new(1, 1) < PathEntry::new(1, 2));
    }

    #[test]
    fn test_between_is_strictly_between() {
        let head = Position::head();
        let tail = Position::tail();

        let p = Position::between(&head, &tail, 1);
        assert!(head < p && p < tail);
        assert!(p.is_interior());
    }

    #[test]
    fn test_concurrent_allocation_breaks_ties_by_site() {
        let head = Position::head();
        let tail = Position::tail();

        let a = Position::between(&head, &tail, 1);
        let b = Position::between(&head, &tail, 2);

        assert_ne!(a, b);
        assert!(a < b); // lower site id sorts first
    }

    #[test]
    fn test_prefix_sorts_before_extension() {
        let head = Position::head();
        let tail = Position::tail();

        let p = Position::between(&head, &tail, 1);
        let q = Position::between(&p, &tail, 1);
        assert!(p < q);
    }

    #[test]
    fn test_repeated_front_insertion_stays_dense() {
        // Allocating over and over against the head forces descent once the
        // digit space at the top level is pinched.
        let head = Position::head();
        let mut right = Position::tail();

        let mut allocated = Vec::new();
        for _ in 0..200 {
            let p = Position::between(&head, &right, 1);
            assert!(head < p && p < right);
            allocated.push(p.clone());
            right = p;
        }

        // Later allocations sort before earlier ones.
        for pair in allocated.windows(2) {
            assert!(pair[1] < pair[0]);
        }
    }

    #[test]
    fn test_repeated_back_insertion_stays_dense() {
        let tail = Position::tail();
        let mut left = Position::head();

        for _ in 0..200 {
            let p = Position::between(&left, &tail, 2);
            assert!(left < p && p < tail);
            left = p;
        }
    }

    #[test]
    fn test_allocation_between_adjacent_digits_descends() {
        let head = Position::head();
        let tail = Position::tail();

        let a = Position::between(&head, &tail, 1);
        let b = Position::between(&a, &tail, 1);

        // No integer gap between a and b at the top level, so a new position
        // between them must descend to a deeper level.
        let mid = Position::between(&a, &b, 3);
        assert!(a < mid && mid < b);
        assert!(mid.depth() > a.depth());
    }

    #[test]
    fn test_allocated_paths_are_well_formed() {
        let head = Position::head();
        let tail = Position::tail();

        let mut right = tail.clone();
        for _ in 0..50 {
            let p = Position::between(&head, &right, 1);
            assert!(p.is_well_formed());
            right = p;
        }
        assert!(!head.is_well_formed());
        assert!(!tail.is_well_formed());
    }

    #[test]
    fn test_crafted_paths_are_rejected() {
        // Interior by ordering, but a terminal zero digit can never come out
        // of the allocator; an element placed there breaks later allocations
        // that use it as a right bound.
        let trailing_zero = Position(vec![PathEntry::new(1, 1), PathEntry::new(0, 0)]);
        assert!(trailing_zero.is_interior());
        assert!(!trailing_zero.is_well_formed());

        let oversized = Position(vec![PathEntry::new(DIGIT_BASE, 2), PathEntry::new(1, 1)]);
        assert!(!oversized.is_well_formed());

        assert!(!Position(vec![]).is_well_formed());
    }

    #[test]
    fn test_interleaved_allocations_converge_on_order() {
        // Two sites repeatedly allocate between the same bounds; the
        // resulting order must be the same regardless of who asks first.
        let head = Position::head();
        let tail = Position::tail();

        let a1 = Position::between(&head, &tail, 1);
        let b1 = Position::between(&head, &tail, 2);

        let mut sorted = vec![b1.clone(), a1.clone()];
        sorted.sort();
        assert_eq!(sorted, vec![a1, b1]);
    }
}
