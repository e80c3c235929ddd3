//! Merge engine: integrates operations into one replica's document so that
//! all replicas integrating the same operation set converge to the same
//! rendered text, regardless of arrival order.

use tracing::{debug, trace};

use crate::engine::document::Document;
use crate::engine::error::EngineError;
use crate::engine::op::{Operation, OperationKind};
use crate::engine::oplog::OperationLog;
use crate::engine::types::{ElementId, SiteId};

/// Outcome of integrating one remote operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Integration {
    /// The operation was applied; `released` further buffered operations
    /// became deliverable and were applied behind it.
    Applied { released: usize },
    /// A causal dependency is missing; the operation was buffered.
    Buffered,
    /// The operation identity was already recorded; absorbed silently.
    Duplicate,
}

/// One replica of a document together with its operation log.
///
/// All mutation of the pair goes through this type, which is what lets a
/// session serialize inbound operations per document. The merge itself is
/// synchronous and never blocks on a missing dependency; gaps are buffered
/// in the log.
pub struct MergeEngine {
    document: Document,
    log: OperationLog,
}

impl MergeEngine {
    /// Creates a replica authoring as `site`.
    pub fn new(site: SiteId) -> Self {
        MergeEngine {
            document: Document::new(site),
            log: OperationLog::new(),
        }
    }

    /// Read access to the underlying document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// The visible text of this replica.
    pub fn render(&self) -> String {
        self.document.render()
    }

    /// Number of operations buffered on unresolved causal dependencies.
    pub fn pending_ops(&self) -> usize {
        self.log.pending_len()
    }

    /// Full replayable log for catching up a joining site.
    pub fn catch_up_ops(&self) -> Vec<Operation> {
        self.log.all_ops()
    }

    /// Applies a local insertion and records it. Returns the operation for
    /// broadcast.
    pub fn local_insert(&mut self, value: char, after: ElementId) -> Result<Operation, EngineError> {
        let site = self.document.site();
        self.local_insert_as(site, value, after)
    }

    /// Applies a local deletion and records it. Returns the operation for
    /// broadcast.
    pub fn local_delete(&mut self, target: ElementId) -> Result<Operation, EngineError> {
        let site = self.document.site();
        self.local_delete_as(site, target)
    }

    /// Hosted variant of [`MergeEngine::local_insert`], authoring on behalf
    /// of a connected thin client.
    pub fn local_insert_as(
        &mut self,
        site: SiteId,
        value: char,
        after: ElementId,
    ) -> Result<Operation, EngineError> {
        let op = self.document.insert_local_as(site, value, after)?;
        self.log.record(&op);
        trace!(op = %op.origin, "local insert applied");
        Ok(op)
    }

    /// Hosted variant of [`MergeEngine::local_delete`].
    pub fn local_delete_as(
        &mut self,
        site: SiteId,
        target: ElementId,
    ) -> Result<Operation, EngineError> {
        let op = self.document.delete_local_as(site, target)?;
        self.log.record(&op);
        trace!(op = %op.origin, target = %target, "local delete applied");
        Ok(op)
    }

    /// Integrates a remote operation.
    ///
    /// Duplicates (same origin identity already recorded) are discarded
    /// silently. Operations whose causal dependency is missing are buffered
    /// and retried every time a later integration lands. Applying an
    /// operation re-checks the buffer until a fixpoint, so dependency chains
    /// release in the order they become satisfied.
    pub fn integrate(&mut self, op: Operation) -> Integration {
        if !self.log.record(&op) {
            trace!(op = %op.origin, "duplicate operation absorbed");
            return Integration::Duplicate;
        }

        if !OperationLog::is_deliverable(&op, &self.document) {
            debug!(op = %op.origin, "operation buffered on missing dependency");
            self.log.buffer(op);
            return Integration::Buffered;
        }

        self.apply(&op);

        let mut released = 0usize;
        loop {
            let ready = self.log.drain_deliverable(&self.document);
            if ready.is_empty() {
                break;
            }
            for ready_op in ready {
                self.apply(&ready_op);
                released += 1;
            }
        }

        if released > 0 {
            debug!(released, "buffered operations released");
        }
        Integration::Applied { released }
    }

    /// Applies a recorded, deliverable operation to the document.
    fn apply(&mut self, op: &Operation) {
        match &op.kind {
            OperationKind::Insert {
                value, position, ..
            } => {
                self.document
                    .integrate_insert(op.origin, *value, position.clone());
            }
            OperationKind::Delete { target } => {
                self.document.integrate_delete(target);
            }
        }
    }
}
