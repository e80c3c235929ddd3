//! Element identifier implementation.
//!
//! This module contains the ElementId struct which serves as a globally unique
//! identifier for character elements and for the operations that create them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::engine::types::site::{SENTINEL_SITE, SiteId};

/// A globally unique identifier composed of the originating site id and that
/// site's logical clock value at creation time.
///
/// Element ids identify both Character Elements and Operations: an insertion
/// operation and the element it creates share the same id. Ids are never
/// reused and never change once assigned.
///
/// # Design Notes
///
/// Unlike the sequence order, which is determined by position references,
/// the derived ordering on ElementId is only used for deterministic iteration
/// (e.g. log replay order) and has no placement semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ElementId {
    /// The site that originated this element/operation
    pub site: SiteId,
    /// The originating site's logical clock value
    pub clock: u64,
}

impl ElementId {
    /// The id of the sentinel element that precedes all document content.
    pub const HEAD: ElementId = ElementId {
        site: SENTINEL_SITE,
        clock: 0,
    };

    /// The id of the sentinel element that follows all document content.
    pub const TAIL: ElementId = ElementId {
        site: SENTINEL_SITE,
        clock: 1,
    };

    /// Creates a new ElementId from a site and clock value.
    pub fn new(site: SiteId, clock: u64) -> Self {
        ElementId { site, clock }
    }

    /// Returns true if this id belongs to one of the boundary sentinels.
    pub fn is_sentinel(&self) -> bool {
        self.site == SENTINEL_SITE
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_sentinel() {
            if *self == ElementId::HEAD {
                write!(f, "head")
            } else {
                write!(f, "tail")
            }
        } else {
            write!(f, "{}:{}", self.site, self.clock)
        }
    }
}
