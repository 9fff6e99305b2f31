//! The append-only session log.
//!
//! Entries are written once when a ritual is sealed and read many times by
//! the streak engine. An entry may reference an anchor that has since been
//! deleted; such entries still count toward streaks but are hidden from
//! anchor-specific views.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::anchor::AnchorStore;

/// Kind of practice that was completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    Activate,
    Stabilize,
    Reinforce,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Activate => "activate",
            SessionType::Stabilize => "stabilize",
            SessionType::Reinforce => "reinforce",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "activate" => Some(SessionType::Activate),
            "stabilize" => Some(SessionType::Stabilize),
            "reinforce" => Some(SessionType::Reinforce),
            _ => None,
        }
    }
}

/// A completed practice event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLogEntry {
    pub id: String,
    pub anchor_id: String,
    #[serde(rename = "type")]
    pub session_type: SessionType,
    /// Completion instant with the user's UTC offset at that moment.
    /// Serialized as RFC 3339, so the string starts with the local date.
    pub completed_at: DateTime<FixedOffset>,
}

impl SessionLogEntry {
    pub fn new(
        anchor_id: impl Into<String>,
        session_type: SessionType,
        completed_at: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            anchor_id: anchor_id.into(),
            session_type,
            completed_at,
        }
    }

    /// Local calendar day the session counts toward.
    pub fn local_date(&self) -> NaiveDate {
        self.completed_at.date_naive()
    }
}

/// Process-wide log of completed sessions, modelled as an explicit container.
#[derive(Debug, Clone, Default)]
pub struct SessionLog {
    entries: Vec<SessionLogEntry>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from persisted entries, ordering them by completion time.
    pub fn from_entries(mut entries: Vec<SessionLogEntry>) -> Self {
        entries.sort_by_key(|e| e.completed_at);
        Self { entries }
    }

    /// Append an entry. The log is never mutated otherwise.
    pub fn append(&mut self, entry: SessionLogEntry) {
        let pos = self
            .entries
            .partition_point(|e| e.completed_at <= entry.completed_at);
        self.entries.insert(pos, entry);
    }

    pub fn entries(&self) -> &[SessionLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries of a single practice type.
    pub fn of_type(&self, session_type: SessionType) -> impl Iterator<Item = &SessionLogEntry> {
        self.entries
            .iter()
            .filter(move |e| e.session_type == session_type)
    }

    /// Entries for one anchor, empty if the anchor no longer exists.
    pub fn for_anchor<'a>(
        &'a self,
        anchor_id: &'a str,
        anchors: &AnchorStore,
    ) -> impl Iterator<Item = &'a SessionLogEntry> {
        let known = anchors.contains(anchor_id);
        self.entries
            .iter()
            .filter(move |e| known && e.anchor_id == anchor_id)
    }
}
