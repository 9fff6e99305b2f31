//! Anchor records and the in-process anchor collection.

mod store;

pub use store::{AnchorStore, SharedAnchorStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What an intention is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnchorCategory {
    Career,
    Health,
    Wealth,
    Relationships,
    PersonalGrowth,
    #[default]
    #[serde(other)]
    Custom,
}

impl AnchorCategory {
    /// Parse a category label leniently. Unknown labels map to `Custom`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "career" => AnchorCategory::Career,
            "health" => AnchorCategory::Health,
            "wealth" => AnchorCategory::Wealth,
            "relationships" => AnchorCategory::Relationships,
            "personal_growth" | "personalgrowth" => AnchorCategory::PersonalGrowth,
            _ => AnchorCategory::Custom,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AnchorCategory::Career => "career",
            AnchorCategory::Health => "health",
            AnchorCategory::Wealth => "wealth",
            AnchorCategory::Relationships => "relationships",
            AnchorCategory::PersonalGrowth => "personal_growth",
            AnchorCategory::Custom => "custom",
        }
    }
}

/// A user's saved intention.
///
/// Timestamps are always canonical `DateTime<Utc>`; remote payloads are
/// normalized into this shape on ingestion (see [`crate::sync::normalize`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub id: String,
    pub intention_text: String,
    #[serde(default)]
    pub category: AnchorCategory,
    /// Opaque sigil rendering data. Strings pass through untouched; a
    /// structured remote sigil is stored as its JSON text.
    #[serde(default)]
    pub sigil: Option<String>,
    #[serde(default)]
    pub is_charged: bool,
    #[serde(default)]
    pub activation_count: u32,
    #[serde(default)]
    pub last_activated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_released: bool,
    #[serde(default)]
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Anchor {
    /// Create a fresh local anchor with a random id.
    pub fn new(intention_text: impl Into<String>, category: AnchorCategory, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            intention_text: intention_text.into(),
            category,
            sigil: None,
            is_charged: false,
            activation_count: 0,
            last_activated_at: None,
            is_released: false,
            archived_at: None,
            created_at: now,
            updated_at: Some(now),
        }
    }

    /// Timestamp used for last-write-wins and ordering: `updated_at`,
    /// falling back to `created_at`.
    pub fn effective_timestamp(&self) -> DateTime<Utc> {
        self.updated_at.unwrap_or(self.created_at)
    }

    /// Active anchors are neither released nor archived.
    pub fn is_active(&self) -> bool {
        !self.is_released && self.archived_at.is_none()
    }

    /// Enforce `updated_at >= created_at`. Idempotent.
    pub fn normalized(mut self) -> Self {
        if let Some(updated) = self.updated_at {
            if updated < self.created_at {
                self.updated_at = Some(self.created_at);
            }
        }
        self
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        // Never move backwards, even if the caller's clock does.
        let floor = self.effective_timestamp();
        self.updated_at = Some(if now > floor { now } else { floor });
    }
}
