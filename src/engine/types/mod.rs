//! Type definitions for the synchronization engine.
//!
//! This module contains the fundamental types used throughout the engine,
//! organized into focused submodules for better maintainability.

pub mod clock;
pub mod element_id;
pub mod position;
pub mod site;

// Re-export all public types
pub use clock::LamportClock;
pub use element_id::ElementId;
pub use position::{DIGIT_BASE, PathEntry, Position};
pub use site::{SENTINEL_SITE, SiteId};
