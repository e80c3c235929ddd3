//! Site identifier type and related functionality.
//!
//! This module contains the definition of SiteId, which uniquely identifies
//! each participant in a collaborative editing session.

/// A unique identifier for each site (collaborator) in a session.
///
/// Site ids are assigned by the session manager on join and are never reused
/// within a session's lifetime. They take part in position-reference tie-breaks,
/// so two sites must never share an id.
pub type SiteId = u64;

/// The reserved site id used by the document boundary sentinels.
///
/// The session manager assigns real sites starting from 1, so no participant
/// can ever collide with sentinel element ids.
pub const SENTINEL_SITE: SiteId = u64::MAX;
