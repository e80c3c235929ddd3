//! Append-only operation log with duplicate absorption and causal buffering.
//!
//! Every operation a replica has ever seen is recorded here, partitioned by
//! origin site. The log also owns the buffer of operations whose causal
//! dependencies have not arrived yet: an insertion waiting for its reference
//! neighbor, or a deletion waiting for its target.

use std::collections::{BTreeMap, HashSet};

use crate::engine::document::Document;
use crate::engine::op::{Operation, OperationKind};
use crate::engine::types::{ElementId, SiteId};

/// Per-document operation log.
///
/// The per-site logs are append-only and replayable: a joining site that
/// integrates every recorded operation (buffering as needed) ends with a
/// document equal to `render()` of the full set.
#[derive(Default)]
pub struct OperationLog {
    /// Append-only logs, partitioned by origin site
    logs: BTreeMap<SiteId, Vec<Operation>>,
    /// Identities of every recorded operation, for duplicate absorption
    seen: HashSet<ElementId>,
    /// Operations waiting for a causal dependency
    pending: Vec<Operation>,
}

impl OperationLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an operation in its origin site's log.
    ///
    /// Idempotent: recording the same (site, clock) identity twice is a
    /// no-op and returns false, which is how at-least-once delivery is
    /// absorbed.
    pub fn record(&mut self, op: &Operation) -> bool {
        if !self.seen.insert(op.origin) {
            return false;
        }
        self.logs.entry(op.origin.site).or_default().push(op.clone());
        true
    }

    /// Returns true if an operation with this identity was already recorded.
    pub fn is_recorded(&self, id: &ElementId) -> bool {
        self.seen.contains(id)
    }

    /// Returns true if the operation's causal dependencies are integrated
    /// into `doc`: the reference neighbor for an insertion, the target
    /// element for a deletion.
    pub fn is_deliverable(op: &Operation, doc: &Document) -> bool {
        match &op.kind {
            OperationKind::Insert { after, .. } => doc.contains(after),
            OperationKind::Delete { target } => doc.contains(target),
        }
    }

    /// Buffers an operation until its causal dependency arrives.
    pub fn buffer(&mut self, op: Operation) {
        self.pending.push(op);
    }

    /// Removes and returns the buffered operations that became deliverable
    /// against the current document state.
    ///
    /// One call is a single scan; the merge engine calls this again after
    /// applying the released operations, so chains of buffered dependencies
    /// release in the order they become satisfied rather than arrival order.
    pub fn drain_deliverable(&mut self, doc: &Document) -> Vec<Operation> {
        let mut released = Vec::new();
        let mut still_pending = Vec::new();

        for op in self.pending.drain(..) {
            if Self::is_deliverable(&op, doc) {
                released.push(op);
            } else {
                still_pending.push(op);
            }
        }

        self.pending = still_pending;
        released
    }

    /// Number of operations buffered on unresolved causal dependencies.
    /// Observability signal only; buffered operations never block others.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Every recorded operation, grouped by origin site in append order.
    /// This is the replayable catch-up state handed to joining sites.
    pub fn all_ops(&self) -> Vec<Operation> {
        self.logs.values().flatten().cloned().collect()
    }

    /// Total number of recorded operations.
    pub fn len(&self) -> usize {
        self.logs.values().map(Vec::len).sum()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }
}
