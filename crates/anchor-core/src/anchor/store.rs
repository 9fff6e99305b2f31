//! Injectable container for the anchor collection.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use super::Anchor;
use crate::error::ValidationError;

/// Anchor store shared between the caller and the sync reconciler.
pub type SharedAnchorStore = Arc<Mutex<AnchorStore>>;

/// The canonical local anchor collection.
///
/// Only the sync reconciler replaces the collection wholesale
/// (`set_anchors`); local edits go through the targeted mutation methods,
/// each of which bumps `updated_at`.
#[derive(Debug, Clone, Default)]
pub struct AnchorStore {
    anchors: Vec<Anchor>,
    last_synced_at: Option<DateTime<Utc>>,
    error: Option<String>,
}

impl AnchorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_anchors(anchors: Vec<Anchor>) -> Self {
        Self {
            anchors,
            ..Self::default()
        }
    }

    /// Wrap into the shared handle used by the reconciler.
    pub fn shared(self) -> SharedAnchorStore {
        Arc::new(Mutex::new(self))
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    pub fn get(&self, id: &str) -> Option<&Anchor> {
        self.anchors.iter().find(|a| a.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Anchors eligible for rituals: not released, not archived.
    pub fn active_anchors(&self) -> impl Iterator<Item = &Anchor> {
        self.anchors.iter().filter(|a| a.is_active())
    }

    pub fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.last_synced_at
    }

    /// Last sync failure, if the most recent sync failed.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    // ── Sync commit API ──────────────────────────────────────────────

    /// Replace the whole collection.
    pub fn set_anchors(&mut self, anchors: Vec<Anchor>) {
        self.anchors = anchors;
    }

    pub fn mark_synced(&mut self, at: DateTime<Utc>) {
        self.last_synced_at = Some(at);
        self.error = None;
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    // ── Local mutations ──────────────────────────────────────────────

    /// Insert a new anchor or replace the one with the same id.
    pub fn upsert(&mut self, anchor: Anchor) {
        match self.anchors.iter_mut().find(|a| a.id == anchor.id) {
            Some(existing) => *existing = anchor,
            None => self.anchors.insert(0, anchor),
        }
    }

    /// Record a sealed ritual against an anchor.
    pub fn record_activation(&mut self, id: &str, now: DateTime<Utc>) -> Result<&Anchor, ValidationError> {
        let anchor = self.find_mut(id)?;
        if anchor.is_released {
            return Err(ValidationError::AnchorReleased(id.to_string()));
        }
        anchor.is_charged = true;
        anchor.activation_count = anchor.activation_count.saturating_add(1);
        anchor.last_activated_at = Some(now);
        anchor.touch(now);
        Ok(anchor)
    }

    /// Release an anchor. Terminal; releasing twice is a no-op.
    pub fn release(&mut self, id: &str, now: DateTime<Utc>) -> Result<&Anchor, ValidationError> {
        let anchor = self.find_mut(id)?;
        if !anchor.is_released {
            anchor.is_released = true;
            anchor.is_charged = false;
            anchor.touch(now);
        }
        Ok(anchor)
    }

    pub fn archive(&mut self, id: &str, now: DateTime<Utc>) -> Result<&Anchor, ValidationError> {
        let anchor = self.find_mut(id)?;
        if anchor.archived_at.is_none() {
            anchor.archived_at = Some(now);
            anchor.touch(now);
        }
        Ok(anchor)
    }

    fn find_mut(&mut self, id: &str) -> Result<&mut Anchor, ValidationError> {
        self.anchors
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| ValidationError::AnchorNotFound(id.to_string()))
    }
}
