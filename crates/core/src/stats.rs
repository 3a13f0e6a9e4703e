// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Process-wide statistics storage: lock-free counters updated from
//! multiple executors.
//!
//! Unlike a per-node stats tracker that batches and throttles sends over a
//! channel, this storage is a flat table of named indicators that any
//! component (interest control, buffer control, latency control, …) updates
//! directly via atomics, and that an external monitoring collaborator reads
//! at its own cadence. The throttled-update idea itself is reused in
//! `ndnrtc_producer`'s meta-publish path, where republishing is rate
//! limited the way `NodeStatsTracker` limits stats sends.

use std::sync::atomic::{AtomicU64, Ordering};

/// Named indicators tracked by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Indicator {
    /// Current interest pipeline size (`InterestControl::pipeline_`).
    PipelineSize = 0,
    /// Current interest pipeline limit (`InterestControl::limit_`).
    PipelineLimit,
    /// Latest DRD estimation for original (non-cached) answers, in ms.
    DrdOriginalEstimationMs,
    /// Latest DRD estimation for cached answers, in ms.
    DrdCachedEstimationMs,
    /// Latest inter-arrival estimator value for first-segment-of-sample events, in ms.
    InterArrivalMs,
    /// Producer-reported sample rate, as observed from the common header.
    ProducerFramerateHz,
    /// Total segments received.
    SegmentsReceived,
    /// Total interest timeouts observed.
    InterestTimeouts,
    /// Total FEC recoveries performed.
    FecRecoveries,
    /// Total slots that failed irrecoverably (FEC exhausted, or rtx exhausted).
    SlotsFailed,
    /// Total starvation events raised to the state machine.
    StarvationEvents,
    _Count,
}

/// A flat table of atomic f64 gauges/counters, one per [`Indicator`].
///
/// Values are stored as the raw bits of an `f64` behind an `AtomicU64`; this
/// keeps updates lock-free while allowing both integer counters and
/// floating-point gauges (DRD estimations, frequencies) to share one
/// representation.
pub struct StatsStorage {
    slots: [AtomicU64; Indicator::_Count as usize],
}

impl Default for StatsStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsStorage {
    pub fn new() -> Self {
        Self { slots: std::array::from_fn(|_| AtomicU64::new(0f64.to_bits())) }
    }

    /// Sets an indicator to an absolute value.
    pub fn set(&self, indicator: Indicator, value: f64) {
        self.slots[indicator as usize].store(value.to_bits(), Ordering::Relaxed);
    }

    /// Reads an indicator's current value.
    pub fn get(&self, indicator: Indicator) -> f64 {
        f64::from_bits(self.slots[indicator as usize].load(Ordering::Relaxed))
    }

    /// Adds `delta` to a counter-style indicator. Lock-free via CAS retry.
    pub fn add(&self, indicator: Indicator, delta: f64) {
        let slot = &self.slots[indicator as usize];
        let mut current = slot.load(Ordering::Relaxed);
        loop {
            let new = f64::from_bits(current) + delta;
            match slot.compare_exchange_weak(
                current,
                new.to_bits(),
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    /// Increments a counter-style indicator by one.
    pub fn increment(&self, indicator: Indicator) {
        self.add(indicator, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let storage = StatsStorage::new();
        storage.set(Indicator::DrdOriginalEstimationMs, 150.0);
        assert_eq!(storage.get(Indicator::DrdOriginalEstimationMs), 150.0);
    }

    #[test]
    fn test_increment_is_additive() {
        let storage = StatsStorage::new();
        storage.increment(Indicator::SegmentsReceived);
        storage.increment(Indicator::SegmentsReceived);
        storage.increment(Indicator::SegmentsReceived);
        assert_eq!(storage.get(Indicator::SegmentsReceived), 3.0);
    }

    #[test]
    fn test_indicators_are_independent() {
        let storage = StatsStorage::new();
        storage.set(Indicator::PipelineSize, 4.0);
        storage.set(Indicator::PipelineLimit, 8.0);
        assert_eq!(storage.get(Indicator::PipelineSize), 4.0);
        assert_eq!(storage.get(Indicator::PipelineLimit), 8.0);
    }
}
