//! Remote anchor synchronization.
//!
//! Pulls the remote anchor set, normalizes it, and merges it into the local
//! collection with last-write-wins. Also maintains the cached user profile.

pub mod api;
pub mod merge;
pub mod normalize;
pub mod profile;
mod reconciler;

pub use api::{AnchorApi, FixtureAnchorApi, HttpAnchorApi};
pub use merge::{merge_anchors, resolve, MergeDecision};
pub use normalize::{normalize_anchor, parse_timestamp};
pub use profile::{AnchorPreview, ProfileCache, ProfileStats, UserProfile, UserSummary};
pub use reconciler::{
    SyncOutcome, SyncReconciler, DEFAULT_PROFILE_ANCHOR_LIMIT, DEFAULT_SYNC_TIMEOUT,
};
