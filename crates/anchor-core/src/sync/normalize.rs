//! Deep normalization of remote anchor payloads.
//!
//! The server (and older app builds) send timestamps as RFC 3339 strings,
//! naive date-times, bare dates or epoch numbers, and use camelCase or
//! snake_case keys. Everything lands in an owned [`Anchor`] with canonical
//! `DateTime<Utc>` fields. Malformed values never abort a sync.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};

use crate::anchor::{Anchor, AnchorCategory};

/// Epoch values at or above this are milliseconds; below, seconds.
const EPOCH_MILLIS_THRESHOLD: u64 = 100_000_000_000;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse any timestamp shape the API is known to emit.
///
/// Naive values are taken as UTC. Returns `None` for anything unparsable.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp_str(s),
        Value::Number(n) => match n.as_i64() {
            Some(i) => from_epoch(i),
            None => n.as_f64().and_then(|f| from_epoch(f as i64)),
        },
        _ => None,
    }
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|n| n.and_utc());
    }
    s.parse::<i64>().ok().and_then(from_epoch)
}

fn from_epoch(value: i64) -> Option<DateTime<Utc>> {
    if value.unsigned_abs() >= EPOCH_MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(value)
    } else {
        DateTime::from_timestamp(value, 0)
    }
}

/// First present, non-null value among `keys`.
pub(crate) fn field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

pub(crate) fn string_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    match field(obj, keys)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn bool_field(obj: &Map<String, Value>, keys: &[&str]) -> bool {
    match field(obj, keys) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    }
}

/// Non-negative count; negatives and garbage become 0, overflow saturates.
pub(crate) fn count_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<u32> {
    let raw = match field(obj, keys)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    Some(u32::try_from(raw.max(0)).unwrap_or(u32::MAX))
}

pub(crate) fn timestamp_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<DateTime<Utc>> {
    field(obj, keys).and_then(parse_timestamp)
}

/// Normalize one remote record. `None` when the record has no usable id.
///
/// Unparsable `created_at` falls back to `now`; unparsable optional
/// timestamps become absent.
pub fn normalize_anchor(value: &Value, now: DateTime<Utc>) -> Option<Anchor> {
    let obj = value.as_object()?;
    let id = string_field(obj, &["id", "anchor_id", "anchorId"])
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())?;

    // Structured sigils are kept as their JSON text.
    let sigil = match field(obj, &["sigil", "sigil_svg", "sigilSvg"]) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
        None => None,
    };

    let anchor = Anchor {
        intention_text: string_field(obj, &["intention_text", "intentionText", "intention"])
            .unwrap_or_default(),
        category: string_field(obj, &["category"])
            .map(|c| AnchorCategory::from_label(&c))
            .unwrap_or_default(),
        sigil,
        is_charged: bool_field(obj, &["is_charged", "isCharged"]),
        activation_count: count_field(obj, &["activation_count", "activationCount"]).unwrap_or(0),
        last_activated_at: timestamp_field(obj, &["last_activated_at", "lastActivatedAt"]),
        is_released: bool_field(obj, &["is_released", "isReleased"]),
        archived_at: timestamp_field(obj, &["archived_at", "archivedAt"]),
        created_at: timestamp_field(obj, &["created_at", "createdAt"]).unwrap_or(now),
        updated_at: timestamp_field(obj, &["updated_at", "updatedAt"]),
        id,
    };
    Some(anchor.normalized())
}
