// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Shared, schema-documented configuration structs for the segmenter, DRD
//! estimator, interest control, latency control, and buffer/playback
//! components. The CLI binary loads these through a layered config
//! (TOML file + env overrides); library consumers can also construct them
//! directly with [`Default::default`].

use serde::{Deserialize, Serialize};

use crate::codec::DEFAULT_PARITY_RATIO;

/// Segmenter and FEC tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Maximum wire-encoded length of one segment, in bytes.
    pub wire_len: usize,
    /// Fraction of data segments to add as Reed-Solomon parity.
    pub parity_ratio: f64,
    /// Whether FEC parity generation is enabled at all.
    pub fec_enabled: bool,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self { wire_len: 8000, parity_ratio: DEFAULT_PARITY_RATIO, fec_enabled: true }
    }
}

/// DRD estimator window sizing (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(default)]
pub struct DrdEstimatorConfig {
    /// Sliding-window duration, in milliseconds.
    pub window_ms: u64,
    /// Seed estimation used before real samples accumulate, in milliseconds.
    pub initial_estimation_ms: f64,
    /// Segments whose `generationDelayMs` is below this threshold are
    /// treated as cache hits rather than original answers.
    pub cached_threshold_ms: u32,
}

impl Default for DrdEstimatorConfig {
    fn default() -> Self {
        Self { window_ms: 30_000, initial_estimation_ms: 150.0, cached_threshold_ms: 2 }
    }
}

/// `StrategyDefault` interest-control parameters (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(default)]
pub struct InterestControlConfig {
    /// Floor below which `lowerLimit` never drops.
    pub min_pipeline_size: u32,
    /// Multiplier applied to `lowerLimit` to compute `upperLimit`.
    pub upper_limit_multiplier: u32,
}

impl Default for InterestControlConfig {
    fn default() -> Self {
        Self { min_pipeline_size: 3, upper_limit_multiplier: 8 }
    }
}

/// Latency-control stability and DRD-change thresholds (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(default)]
pub struct LatencyControlConfig {
    /// Sample count in each of `m1`/`m2` stability windows.
    pub stability_window_samples: usize,
    /// Max relative deviation between `m1` and `m2` to call the stream stable.
    pub stability_epsilon1: f64,
    /// Min fraction of `targetPeriod` the mean inter-arrival must match.
    pub stability_epsilon2: f64,
    /// Consecutive stable observations required before acting on stability.
    pub min_stable_occurrences: u32,
    /// Sample count in the DRD-change estimator's window.
    pub drd_change_window_samples: usize,
    /// Consecutive minor-change occurrences required before counting a change.
    pub drd_change_min_occurrences: u32,
    /// Deviation fraction that always counts as a DRD change.
    pub drd_change_major_threshold: f64,
    /// Deviation fraction below which a DRD deviation is ignored entirely.
    pub drd_change_minor_threshold: f64,
    /// How long to wait, once unstable, before emitting `Increase`, in ms.
    pub await_stability_timeout_ms: u64,
    /// How long to wait for a DRD change before emitting `Decrease`, in ms.
    pub await_change_timeout_ms: u64,
}

impl Default for LatencyControlConfig {
    fn default() -> Self {
        Self {
            stability_window_samples: 10,
            stability_epsilon1: 0.3,
            stability_epsilon2: 0.7,
            min_stable_occurrences: 4,
            drd_change_window_samples: 7,
            drd_change_min_occurrences: 3,
            drd_change_major_threshold: 0.08,
            drd_change_minor_threshold: 0.20,
            await_stability_timeout_ms: 2_000,
            await_change_timeout_ms: 2_000,
        }
    }
}

/// Buffer, playback, and retransmission tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(default)]
pub struct BufferConfig {
    /// Playback queue watermark, in milliseconds of queued media.
    pub target_size_ms: u64,
    /// Max wait for a missing queue head before it is skipped, in ms.
    pub head_skip_timeout_ms: u64,
    /// Segment-controller starvation timeout, in ms.
    pub max_idle_ms: u64,
    /// Per-interest retransmission budget before a timeout fails the slot.
    pub n_rtx: u32,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self { target_size_ms: 150, head_skip_timeout_ms: 400, max_idle_ms: 2_000, n_rtx: 2 }
    }
}

/// Freshness values applied to published content, in milliseconds (§6).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(default)]
pub struct FreshnessConfig {
    pub meta_ms: u64,
    pub delta_sample_ms: u64,
    pub key_sample_ms: u64,
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self { meta_ms: 1_000, delta_sample_ms: 100, key_sample_ms: 2_000 }
    }
}

/// Top-level engine configuration, aggregating every component's config.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, schemars::JsonSchema, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub segmenter: SegmenterConfig,
    pub drd_estimator: DrdEstimatorConfig,
    pub interest_control: InterestControlConfig,
    pub latency_control: LatencyControlConfig,
    pub buffer: BufferConfig,
    pub freshness: FreshnessConfig,
}
