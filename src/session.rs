//! Session management: per-document site tracking and operation fan-out.
//!
//! A session owns exactly one document's merge engine and operation log.
//! Inbound operations for a document are serialized through the session's
//! mutex (single-writer per document); different documents run fully in
//! parallel. Fan-out uses a broadcast channel per session; each subscriber
//! drops updates that originated from its own site (the no-echo rule).

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, warn};

use crate::engine::{
    EngineError, Integration, MergeEngine, Operation, SiteId,
};

/// Identifier of a collaboratively edited document.
pub type DocumentId = String;

/// The authoring site of the relay's own replica. Never handed to a client;
/// hosted edits are authored as the submitting client's site.
const RELAY_SITE: SiteId = 0;

/// Default per-subscriber buffer of the fan-out channel.
const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// A raw edit from a thin client, expressed against the visible text.
///
/// The session translates it into a position-referenced operation on the
/// hosted document model before it reaches the merge engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    /// Insert `value` so that it lands at visible index `index`.
    Insert { value: char, index: usize },
    /// Delete the visible character at `index`.
    Delete { index: usize },
}

/// One integrated operation fanned out to a session's subscribers.
#[derive(Debug, Clone)]
pub struct SessionUpdate {
    /// The site whose submission produced this operation
    pub origin: SiteId,
    /// The integrated operation
    pub operation: Operation,
}

/// Everything a joining site needs to catch up causally.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// The rendered document at join time
    pub text: String,
    /// Full log replay; integrating all of it reproduces `text`
    pub operations: Vec<Operation>,
}

/// Observability counters for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub sites: usize,
    /// Operations buffered on unresolved causal dependencies
    pub pending_ops: usize,
    pub visible_elements: usize,
    pub total_elements: usize,
}

/// How a site authors its edits. A hosted site's operations are stamped by
/// the relay's document clock; a replica site stamps its own. The two clocks
/// advance independently, so one site must never use both: the same
/// (site, clock) identity could be minted twice and a genuinely new
/// operation would be absorbed as a duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Authoring {
    /// Raw index edits, translated and stamped by the hosted document
    Hosted,
    /// Full operations stamped by the client's own replica
    Replica,
}

struct SessionState {
    engine: MergeEngine,
    next_site: SiteId,
    sites: HashMap<SiteId, Option<Authoring>>,
}

impl SessionState {
    /// Binds `site` to one authoring mode for the rest of the session.
    fn claim_authoring(&mut self, site: SiteId, mode: Authoring) -> Result<(), EngineError> {
        match self.sites.get_mut(&site) {
            None => Err(EngineError::MalformedOperation(format!(
                "site {site} is not joined to this session"
            ))),
            Some(Some(existing)) if *existing != mode => {
                Err(EngineError::AuthoringConflict(site))
            }
            Some(slot) => {
                *slot = Some(mode);
                Ok(())
            }
        }
    }
}

/// One document's live collaboration state.
pub struct Session {
    document_id: DocumentId,
    state: Mutex<SessionState>,
    updates: broadcast::Sender<SessionUpdate>,
}

impl Session {
    fn new(document_id: DocumentId, capacity: usize) -> Self {
        let (updates, _) = broadcast::channel(capacity);
        Session {
            document_id,
            state: Mutex::new(SessionState {
                engine: MergeEngine::new(RELAY_SITE),
                next_site: 1,
                sites: HashMap::new(),
            }),
            updates,
        }
    }

    /// The document this session serves.
    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    fn join(self: &Arc<Self>) -> SessionHandle {
        let mut state = self.state.lock();
        let site = state.next_site;
        state.next_site += 1;
        state.sites.insert(site, None);

        let snapshot = Snapshot {
            text: state.engine.render(),
            operations: state.engine.catch_up_ops(),
        };
        drop(state);

        info!(document = %self.document_id, site, "site joined session");

        SessionHandle {
            site,
            snapshot,
            session: Arc::clone(self),
            updates: SessionUpdates {
                site,
                receiver: self.updates.subscribe(),
            },
        }
    }

    /// Removes a site from fan-out. Its integrated contributions persist.
    /// Returns the number of sites left.
    fn remove_site(&self, site: SiteId) -> usize {
        let mut state = self.state.lock();
        state.sites.remove(&site);
        info!(document = %self.document_id, site, "site left session");
        state.sites.len()
    }

    /// Applies a raw edit on behalf of `site` and fans out the resulting
    /// operation to every other subscriber.
    ///
    /// The first raw edit binds `site` to hosted authoring; replica
    /// operations from the same site are rejected from then on.
    pub fn submit_edit(&self, site: SiteId, edit: Edit) -> Result<Operation, EngineError> {
        let mut state = self.state.lock();
        state.claim_authoring(site, Authoring::Hosted)?;
        let operation = match edit {
            Edit::Insert { value, index } => {
                let after = state.engine.document().visible_id_before(index)?;
                state.engine.local_insert_as(site, value, after)?
            }
            Edit::Delete { index } => {
                let target = state.engine.document().visible_id_at(index)?;
                state.engine.local_delete_as(site, target)?
            }
        };
        drop(state);

        self.publish(site, operation.clone());
        Ok(operation)
    }

    /// Integrates an operation authored by a client-side replica and fans it
    /// out to every other subscriber.
    ///
    /// Malformed operations are rejected here and never reach the merge
    /// engine. An operation must carry its submitting site as origin, and a
    /// site that has submitted raw edits may not switch to replica
    /// operations (its identities are already minted by the hosted clock).
    /// Duplicates are absorbed without re-broadcast. Buffered operations are
    /// still fanned out immediately; peers run their own causal buffering.
    pub fn submit_operation(
        &self,
        site: SiteId,
        operation: Operation,
    ) -> Result<Integration, EngineError> {
        if operation.origin.site != site {
            return Err(EngineError::MalformedOperation(format!(
                "operation origin site {} does not match submitting site {site}",
                operation.origin.site
            )));
        }
        operation.validate()?;

        let outcome = {
            let mut state = self.state.lock();
            state.claim_authoring(site, Authoring::Replica)?;
            state.engine.integrate(operation.clone())
        };

        match outcome {
            Integration::Duplicate => {
                debug!(document = %self.document_id, op = %operation.origin, "duplicate absorbed");
            }
            _ => self.publish(site, operation),
        }
        Ok(outcome)
    }

    /// The current rendered text of the hosted document.
    pub fn render(&self) -> String {
        self.state.lock().engine.render()
    }

    /// Observability counters for this session.
    pub fn stats(&self) -> SessionStats {
        let state = self.state.lock();
        SessionStats {
            sites: state.sites.len(),
            pending_ops: state.engine.pending_ops(),
            visible_elements: state.engine.document().visible_count(),
            total_elements: state.engine.document().total_count(),
        }
    }

    fn publish(&self, origin: SiteId, operation: Operation) {
        // Send only fails when no subscriber is connected, which is fine:
        // the operation is already integrated and part of catch-up state.
        let _ = self.updates.send(SessionUpdate { origin, operation });
    }
}

/// A connected site's handle to its session: identity, catch-up snapshot,
/// and the update stream.
pub struct SessionHandle {
    /// The fresh, never-reused site id assigned at join
    pub site: SiteId,
    /// Catch-up state captured at join time
    pub snapshot: Snapshot,
    /// The session this handle belongs to
    pub session: Arc<Session>,
    /// Stream of other sites' integrated operations
    pub updates: SessionUpdates,
}

/// A site's subscription to its session's fan-out, with the no-echo rule
/// applied.
pub struct SessionUpdates {
    site: SiteId,
    receiver: broadcast::Receiver<SessionUpdate>,
}

impl SessionUpdates {
    /// Waits for the next update originated by another site (no-echo: this
    /// site's own submissions are skipped). Returns None when the session
    /// is gone.
    ///
    /// A slow consumer that falls behind the channel capacity loses the
    /// oldest updates; that is logged and skipped rather than treated as
    /// fatal, since redelivery is the transport's concern.
    pub async fn next(&mut self) -> Option<SessionUpdate> {
        loop {
            match self.receiver.recv().await {
                Ok(update) if update.origin == self.site => continue,
                Ok(update) => return Some(update),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(site = self.site, missed, "subscriber lagged behind fan-out");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Owns every live session, one per open document.
///
/// The first join for a document id creates its session; the last leave
/// destroys it.
pub struct SessionManager {
    sessions: RwLock<HashMap<DocumentId, Arc<Session>>>,
    broadcast_capacity: usize,
}

impl SessionManager {
    /// Creates a manager with the default fan-out capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BROADCAST_CAPACITY)
    }

    /// Creates a manager with an explicit per-subscriber fan-out capacity.
    pub fn with_capacity(broadcast_capacity: usize) -> Self {
        SessionManager {
            sessions: RwLock::new(HashMap::new()),
            broadcast_capacity,
        }
    }

    /// Joins a document's session, creating the session (and with it the
    /// empty document) if this is the first join.
    pub async fn join(&self, document_id: &str) -> SessionHandle {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(document_id.to_string())
            .or_insert_with(|| {
                info!(document = document_id, "creating session");
                Arc::new(Session::new(document_id.to_string(), self.broadcast_capacity))
            })
            .clone();

        // Register while still holding the map lock: a racing last-site
        // leave must not destroy the session between lookup and
        // registration, or the joiner would end up on an orphaned session.
        session.join()
    }

    /// Removes a site from a document's session, destroying the session when
    /// the last site leaves.
    pub async fn leave(&self, document_id: &str, site: SiteId) {
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get(document_id) else {
            return;
        };
        if session.remove_site(site) == 0 {
            info!(document = document_id, "last site left, destroying session");
            sessions.remove(document_id);
        }
    }

    /// Looks up a live session.
    pub async fn session(&self, document_id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(document_id).cloned()
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ElementId;

    #[tokio::test]
    async fn test_first_join_creates_document() {
        let manager = SessionManager::new();
        assert_eq!(manager.session_count().await, 0);

        let handle = manager.join("notes").await;
        assert_eq!(manager.session_count().await, 1);
        assert_eq!(handle.site, 1);
        assert_eq!(handle.snapshot.text, "");
        assert!(handle.snapshot.operations.is_empty());
    }

    #[tokio::test]
    async fn test_site_ids_are_never_reused() {
        let manager = SessionManager::new();
        let a = manager.join("doc").await;
        let b = manager.join("doc").await;
        manager.leave("doc", a.site).await;
        let c = manager.join("doc").await;

        assert_ne!(a.site, b.site);
        assert_ne!(c.site, a.site);
        assert_ne!(c.site, b.site);
    }

    #[tokio::test]
    async fn test_last_leave_destroys_session() {
        let manager = SessionManager::new();
        let a = manager.join("doc").await;
        let b = manager.join("doc").await;

        manager.leave("doc", a.site).await;
        assert_eq!(manager.session_count().await, 1);
        manager.leave("doc", b.site).await;
        assert_eq!(manager.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_thin_edits_fan_out_without_echo() {
        let manager = SessionManager::new();
        let alice = manager.join("doc").await;
        let mut bob = manager.join("doc").await;

        let op = alice
            .session
            .submit_edit(alice.site, Edit::Insert { value: 'x', index: 0 })
            .unwrap();
        assert_eq!(op.origin.site, alice.site);

        let update = bob.updates.next().await.unwrap();
        assert_eq!(update.origin, alice.site);
        assert_eq!(update.operation, op);
        assert_eq!(bob.session.render(), "x");
    }

    #[tokio::test]
    async fn test_originator_does_not_hear_itself() {
        let manager = SessionManager::new();
        let mut alice = manager.join("doc").await;
        let bob = manager.join("doc").await;

        alice
            .session
            .submit_edit(alice.site, Edit::Insert { value: 'a', index: 0 })
            .unwrap();
        bob.session
            .submit_edit(bob.site, Edit::Insert { value: 'b', index: 1 })
            .unwrap();

        // Alice must only see Bob's operation, not her own echoed back.
        let update = alice.updates.next().await.unwrap();
        assert_eq!(update.origin, bob.site);
    }

    #[tokio::test]
    async fn test_edit_translation_and_render() {
        let manager = SessionManager::new();
        let h = manager.join("doc").await;
        let session = &h.session;

        session
            .submit_edit(h.site, Edit::Insert { value: 'c', index: 0 })
            .unwrap();
        session
            .submit_edit(h.site, Edit::Insert { value: 't', index: 1 })
            .unwrap();
        session
            .submit_edit(h.site, Edit::Insert { value: 'a', index: 1 })
            .unwrap();
        assert_eq!(session.render(), "cat");

        session
            .submit_edit(h.site, Edit::Delete { index: 1 })
            .unwrap();
        assert_eq!(session.render(), "ct");
    }

    #[tokio::test]
    async fn test_out_of_bounds_edit_reported_to_originator_only() {
        let manager = SessionManager::new();
        let h = manager.join("doc").await;

        let err = h
            .session
            .submit_edit(h.site, Edit::Delete { index: 5 })
            .unwrap_err();
        assert!(matches!(err, EngineError::IndexOutOfBounds { .. }));
    }

    #[tokio::test]
    async fn test_malformed_operation_rejected_at_boundary() {
        let manager = SessionManager::new();
        let h = manager.join("doc").await;

        let op = Operation::delete(ElementId::new(h.site, 1), ElementId::TAIL);
        let err = h.session.submit_operation(h.site, op).unwrap_err();
        assert!(matches!(err, EngineError::MalformedOperation(_)));
        assert_eq!(h.session.stats().pending_ops, 0);
    }

    #[tokio::test]
    async fn test_duplicate_operation_not_rebroadcast() {
        let manager = SessionManager::new();
        let mut alice = manager.join("doc").await;
        let mut bob = manager.join("doc").await;

        let mut replica = MergeEngine::new(alice.site);
        let op = replica.local_insert('x', ElementId::HEAD).unwrap();
        alice.session.submit_operation(alice.site, op.clone()).unwrap();
        assert_eq!(bob.updates.next().await.unwrap().operation, op);

        // Redelivery of the same operation is absorbed silently.
        let outcome = alice.session.submit_operation(alice.site, op).unwrap();
        assert_eq!(outcome, Integration::Duplicate);

        let another = bob
            .session
            .submit_edit(bob.site, Edit::Insert { value: 'y', index: 1 })
            .unwrap();
        // The next thing Alice hears is Bob's new op, not the duplicate.
        let update = alice.updates.next().await.unwrap();
        assert_eq!(update.operation, another);
    }

    #[tokio::test]
    async fn test_snapshot_catches_up_late_joiner() {
        let manager = SessionManager::new();
        let early = manager.join("doc").await;
        early
            .session
            .submit_edit(early.site, Edit::Insert { value: 'h', index: 0 })
            .unwrap();
        early
            .session
            .submit_edit(early.site, Edit::Insert { value: 'i', index: 1 })
            .unwrap();

        let late = manager.join("doc").await;
        assert_eq!(late.snapshot.text, "hi");

        // Replaying the snapshot log on a fresh replica reproduces the text.
        let mut replica = MergeEngine::new(late.site);
        for op in late.snapshot.operations.clone() {
            replica.integrate(op);
        }
        assert_eq!(replica.render(), "hi");
    }

    #[tokio::test]
    async fn test_site_is_bound_to_one_authoring_mode() {
        let manager = SessionManager::new();
        let hosted = manager.join("doc").await;
        let thick = manager.join("doc").await;

        hosted
            .session
            .submit_edit(hosted.site, Edit::Insert { value: 'a', index: 0 })
            .unwrap();

        // The hosted clock already minted (site, 1); a replica op from the
        // same site would reuse that identity and be swallowed as a
        // duplicate. It must be rejected outright instead.
        let mut replica = MergeEngine::new(hosted.site);
        let op = replica.local_insert('b', ElementId::HEAD).unwrap();
        let err = hosted.session.submit_operation(hosted.site, op).unwrap_err();
        assert!(matches!(err, EngineError::AuthoringConflict(_)));

        // And the other way round: a replica site cannot fall back to raw
        // edits stamped by the hosted clock.
        let mut replica = MergeEngine::new(thick.site);
        let op = replica.local_insert('c', ElementId::HEAD).unwrap();
        thick.session.submit_operation(thick.site, op).unwrap();
        assert!(thick.session.render().contains('c'));

        let err = thick
            .session
            .submit_edit(thick.site, Edit::Insert { value: 'd', index: 0 })
            .unwrap_err();
        assert!(matches!(err, EngineError::AuthoringConflict(_)));
    }

    #[tokio::test]
    async fn test_operation_origin_must_match_submitting_site() {
        let manager = SessionManager::new();
        let h = manager.join("doc").await;

        let mut replica = MergeEngine::new(h.site + 1);
        let spoofed = replica.local_insert('z', ElementId::HEAD).unwrap();
        let err = h.session.submit_operation(h.site, spoofed).unwrap_err();
        assert!(matches!(err, EngineError::MalformedOperation(_)));
        assert_eq!(h.session.render(), "");
    }

    #[tokio::test]
    async fn test_joined_handle_is_the_mapped_session() {
        let manager = SessionManager::new();
        let h = manager.join("doc").await;

        let live = manager.session("doc").await.unwrap();
        assert!(Arc::ptr_eq(&live, &h.session));
    }

    #[tokio::test]
    async fn test_join_leave_churn_leaves_no_session_behind() {
        let manager = Arc::new(SessionManager::new());

        let mut tasks = Vec::new();
        for _ in 0..32 {
            let manager = Arc::clone(&manager);
            tasks.push(tokio::spawn(async move {
                let h = manager.join("doc").await;
                manager.leave("doc", h.site).await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(manager.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_stats_expose_pending_counter() {
        let manager = SessionManager::new();
        let h = manager.join("doc").await;

        let orphan = Operation::delete(ElementId::new(h.site, 1), ElementId::new(42, 7));
        let outcome = h.session.submit_operation(h.site, orphan).unwrap();
        assert_eq!(outcome, Integration::Buffered);

        let stats = h.session.stats();
        assert_eq!(stats.pending_ops, 1);
        assert_eq!(stats.sites, 1);
    }
}
