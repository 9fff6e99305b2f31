//! Narrow contracts to platform services the engine does not own.
//!
//! Haptics and telemetry are fire-and-forget: the engine calls them through
//! [`fire_and_forget`], which logs a failure at debug level and moves on. A
//! rejected platform call must never stall the ritual state machine.

use serde_json::Value;

use crate::ritual::{HapticStyle, NotificationKind};

/// Outcome of a platform call.
pub type PlatformResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Haptic feedback collaborator.
pub trait Haptics: Send + Sync {
    /// Short physical pulse.
    fn impact(&self, style: HapticStyle) -> PlatformResult;

    /// Notification-style pattern (success, warning, error).
    fn notification(&self, kind: NotificationKind) -> PlatformResult;
}

/// Telemetry collaborator. Both methods default to no-ops.
pub trait Telemetry: Send + Sync {
    /// Append a breadcrumb to the diagnostic trail.
    fn breadcrumb(&self, _message: &str, _category: &str, _data: Value) -> PlatformResult {
        Ok(())
    }

    /// Record a discrete analytics event.
    fn track(&self, _event: &str, _properties: Value) -> PlatformResult {
        Ok(())
    }
}

/// Haptics for environments without a vibration motor.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHaptics;

impl Haptics for NoopHaptics {
    fn impact(&self, _style: HapticStyle) -> PlatformResult {
        Ok(())
    }

    fn notification(&self, _kind: NotificationKind) -> PlatformResult {
        Ok(())
    }
}

/// Telemetry that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {}

/// Telemetry forwarded to `tracing`, for the CLI and for debugging.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn breadcrumb(&self, message: &str, category: &str, data: Value) -> PlatformResult {
        tracing::debug!(category, %data, "{message}");
        Ok(())
    }

    fn track(&self, event: &str, properties: Value) -> PlatformResult {
        tracing::info!(event, %properties, "telemetry event");
        Ok(())
    }
}

/// Run a platform call, logging and discarding any failure.
pub fn fire_and_forget(what: &str, result: PlatformResult) {
    if let Err(e) = result {
        tracing::debug!("{what} failed (ignored): {e}");
    }
}
