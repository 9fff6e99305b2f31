//! Pure phase lookups.
//!
//! Everything here is a function of `(config, elapsed_seconds)` with no side
//! effects, so it can be recomputed on every render without drift.

use std::ops::Range;

use super::config::{RitualConfig, RitualPhase};

/// Phase active at `elapsed_seconds`.
///
/// Each phase owns the half-open window `[start, start + duration)` of the
/// cumulative timeline. Past the last window the last phase stays active,
/// which is where the seal happens.
pub fn phase_at(config: &RitualConfig, elapsed_seconds: u64) -> Option<(usize, &RitualPhase)> {
    let last = config.phases.len().checked_sub(1)?;
    let mut end = 0u64;
    for (index, phase) in config.phases.iter().enumerate() {
        end = end.saturating_add(phase.duration_seconds);
        if elapsed_seconds < end {
            return Some((index, phase));
        }
    }
    Some((last, &config.phases[last]))
}

/// Cumulative time window of the phase at `index`.
pub fn phase_window(config: &RitualConfig, index: usize) -> Option<Range<u64>> {
    let phase = config.phases.get(index)?;
    let start: u64 = config
        .phases
        .iter()
        .take(index)
        .map(|p| p.duration_seconds)
        .sum();
    Some(start..start.saturating_add(phase.duration_seconds))
}

pub fn remaining_seconds(config: &RitualConfig, elapsed_seconds: u64) -> u64 {
    config.total_duration_seconds.saturating_sub(elapsed_seconds)
}

/// Whether the seal gesture is accepted at `elapsed_seconds`.
///
/// True once remaining time is within the active phase's seal duration. A
/// fully elapsed timer has zero remaining, so it is always in the window.
pub fn is_seal_window(config: &RitualConfig, elapsed_seconds: u64) -> bool {
    let seal_seconds = phase_at(config, elapsed_seconds)
        .map(|(_, p)| p.seal_duration_seconds)
        .unwrap_or(0);
    remaining_seconds(config, elapsed_seconds) <= seal_seconds
}

/// Instruction shown for `cursor`, wrapping around the phase's list.
pub fn instruction_at(phase: &RitualPhase, cursor: usize) -> Option<&str> {
    if phase.instructions.is_empty() {
        return None;
    }
    phase
        .instructions
        .get(cursor % phase.instructions.len())
        .map(String::as_str)
}
