//! Cached user profile with locally computed aggregates.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::normalize::{count_field, normalize_anchor, string_field, timestamp_field};
use crate::anchor::{Anchor, AnchorCategory};
use crate::error::SyncError;
use crate::streak::effective_stabilize_streak;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub display_name: String,
    pub joined_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProfileStats {
    pub total_anchors: u32,
    /// Counted from the active preview list, not trusted from the server.
    pub charged_anchors: u32,
    pub total_activations: u32,
    /// Server streak after decay.
    pub stabilize_streak: u32,
    pub last_stabilize_at: Option<DateTime<Utc>>,
}

/// Privacy-redacted view of an active anchor: no intention text, no sigil.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorPreview {
    pub id: String,
    pub category: AnchorCategory,
    pub is_charged: bool,
    pub activation_count: u32,
}

impl From<&Anchor> for AnchorPreview {
    fn from(anchor: &Anchor) -> Self {
        Self {
            id: anchor.id.clone(),
            category: anchor.category,
            is_charged: anchor.is_charged,
            activation_count: anchor.activation_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user: UserSummary,
    pub stats: ProfileStats,
    pub active_anchors: Vec<AnchorPreview>,
    pub fetched_at: DateTime<Utc>,
}

/// Last fetched profile plus the outcome of the latest attempt.
#[derive(Debug, Clone, Default)]
pub struct ProfileCache {
    profile: Option<UserProfile>,
    last_fetched_at: Option<DateTime<Utc>>,
    error: Option<String>,
}

impl ProfileCache {
    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    pub fn last_fetched_at(&self) -> Option<DateTime<Utc>> {
        self.last_fetched_at
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub(crate) fn replace(&mut self, profile: UserProfile) {
        self.last_fetched_at = Some(profile.fetched_at);
        self.profile = Some(profile);
        self.error = None;
    }

    pub(crate) fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }
}

/// Assemble a profile from the three raw responses.
///
/// Only the user payload is strict (it must carry an id). Stats fields
/// that are missing fall back to values derived from the active list.
pub fn build_profile<Tz: TimeZone>(
    user: &Value,
    stats: &Value,
    active: &[Value],
    limit: u32,
    now: &DateTime<Tz>,
) -> Result<UserProfile, SyncError> {
    let fetched_at = now.with_timezone(&Utc);

    let user_obj = user.as_object().ok_or_else(|| SyncError::Decode {
        endpoint: "/users/me".into(),
        message: "expected a user object".into(),
    })?;
    let id = string_field(user_obj, &["id", "user_id", "userId"])
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SyncError::Decode {
            endpoint: "/users/me".into(),
            message: "user has no id".into(),
        })?;
    let summary = UserSummary {
        display_name: string_field(user_obj, &["display_name", "displayName", "name"])
            .unwrap_or_default(),
        joined_at: timestamp_field(user_obj, &["joined_at", "joinedAt", "created_at", "createdAt"]),
        id,
    };

    let previews: Vec<AnchorPreview> = active
        .iter()
        .filter_map(|v| normalize_anchor(v, fetched_at))
        .filter(Anchor::is_active)
        .take(limit as usize)
        .map(|a| AnchorPreview::from(&a))
        .collect();

    let empty = serde_json::Map::new();
    let stats_obj = stats.as_object().unwrap_or(&empty);
    let stored_streak = count_field(
        stats_obj,
        &["stabilize_streak", "stabilizeStreak", "current_stabilize_streak"],
    )
    .unwrap_or(0);
    let last_stabilize_at = timestamp_field(stats_obj, &["last_stabilize_at", "lastStabilizeAt"]);

    let stats = ProfileStats {
        total_anchors: count_field(stats_obj, &["total_anchors", "totalAnchors"])
            .unwrap_or(previews.len() as u32),
        charged_anchors: previews.iter().filter(|p| p.is_charged).count() as u32,
        total_activations: count_field(stats_obj, &["total_activations", "totalActivations"])
            .unwrap_or_else(|| previews.iter().map(|p| p.activation_count).sum()),
        stabilize_streak: effective_stabilize_streak(stored_streak, last_stabilize_at, now),
        last_stabilize_at,
    };

    Ok(UserProfile {
        user: summary,
        stats,
        active_anchors: previews,
        fetched_at,
    })
}
