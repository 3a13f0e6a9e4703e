// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Playback queue and playout (§4.10): orders completed samples by
//! `playbackNo`, watches a wall-clock-span watermark, and releases samples
//! to the decoder at their intended cadence.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// A sample ready for playout.
pub struct QueuedSample {
    pub playback_no: u32,
    /// Producer-side timestamp used to compute inter-sample `Δts`.
    pub timestamp_ms: u64,
    pub payload: Vec<u8>,
}

/// Emitted when the queue head was missing past its bounded wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipHead {
    pub skipped_playback_no: u32,
}

/// Samples ordered by `playbackNo`, with a wall-clock-span watermark.
pub struct PlaybackQueue {
    target_size_ms: u64,
    head_skip_timeout: Duration,
    samples: BTreeMap<u32, QueuedSample>,
    head_missing_since: Option<Instant>,
    next_expected: Option<u32>,
}

impl PlaybackQueue {
    pub fn new(target_size_ms: u64, head_skip_timeout_ms: u64) -> Self {
        Self {
            target_size_ms,
            head_skip_timeout: Duration::from_millis(head_skip_timeout_ms),
            samples: BTreeMap::new(),
            head_missing_since: None,
            next_expected: None,
        }
    }

    pub fn push(&mut self, sample: QueuedSample) {
        self.samples.insert(sample.playback_no, sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Wall-clock span between the earliest and latest queued samples'
    /// timestamps, the watermark compared against `target_size_ms`.
    pub fn queued_span_ms(&self) -> u64 {
        match (self.samples.values().next(), self.samples.values().next_back()) {
            (Some(first), Some(last)) => last.timestamp_ms.saturating_sub(first.timestamp_ms),
            _ => 0,
        }
    }

    pub fn is_above_watermark(&self) -> bool {
        self.queued_span_ms() >= self.target_size_ms
    }

    /// Pops the next sample in `playbackNo` order, or `None` if the queue
    /// is empty. Skips a missing expected head once its bounded wait has
    /// elapsed, emitting a [`SkipHead`] for the caller to log/count.
    pub fn pop_ready(&mut self) -> (Option<QueuedSample>, Option<SkipHead>) {
        if let Some(next) = self.next_expected {
            if let Some(sample) = self.samples.remove(&next) {
                self.next_expected = Some(next + 1);
                self.head_missing_since = None;
                return (Some(sample), None);
            }
            // Head is missing; decide whether to keep waiting or skip it.
            let since = *self.head_missing_since.get_or_insert_with(Instant::now);
            if since.elapsed() >= self.head_skip_timeout {
                if let Some((&lowest, _)) = self.samples.iter().next() {
                    if lowest > next {
                        self.next_expected = Some(next + 1);
                        self.head_missing_since = None;
                        return (None, Some(SkipHead { skipped_playback_no: next }));
                    }
                }
            }
            return (None, None);
        }
        // First pop: start tracking from whatever the lowest queued sample is.
        if let Some((&lowest, _)) = self.samples.iter().next() {
            let sample = self.samples.remove(&lowest).expect("just observed as present");
            self.next_expected = Some(lowest + 1);
            return (Some(sample), None);
        }
        (None, None)
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.head_missing_since = None;
        self.next_expected = None;
    }
}

/// Gates playback entirely on/off; used by the state machine during warmup (§4.10).
#[derive(Debug, Default)]
pub struct PlayoutControl {
    allowed: bool,
}

impl PlayoutControl {
    pub fn enable(&mut self) {
        self.allowed = true;
    }

    pub fn disable(&mut self) {
        self.allowed = false;
    }

    pub fn is_allowed(&self) -> bool {
        self.allowed
    }
}

/// Releases samples to the decoder at their intended cadence: sleeps
/// `Δts = nextTs - currentTs` (adjusted by an A/V sync delta), but never
/// waits for time that has already passed (§4.10 "forward-only").
pub struct Playout {
    last_released_ts_ms: Option<u64>,
    last_playback_no: Option<u32>,
}

impl Default for Playout {
    fn default() -> Self {
        Self::new()
    }
}

impl Playout {
    pub fn new() -> Self {
        Self { last_released_ts_ms: None, last_playback_no: None }
    }

    /// Computes how long to sleep before releasing `sample`, given the
    /// previous release's timestamp and an A/V sync adjustment in ms
    /// (positive delays, negative advances, clamped to zero).
    pub fn delay_before(&self, sample: &QueuedSample, sync_adjustment_ms: i64) -> Duration {
        let Some(last_ts) = self.last_released_ts_ms else {
            return Duration::ZERO;
        };
        let delta_ts = sample.timestamp_ms as i64 - last_ts as i64;
        let adjusted = delta_ts + sync_adjustment_ms;
        Duration::from_millis(adjusted.max(0) as u64)
    }

    /// Records a release. Panics (via debug assertion) only in test builds
    /// if playback monotonicity is violated; production callers should
    /// never construct an out-of-order release since the queue enforces
    /// ascending `playbackNo` via `pop_ready`.
    pub fn mark_released(&mut self, sample: &QueuedSample) {
        debug_assert!(self.last_playback_no.is_none_or(|prev| sample.playback_no > prev));
        self.last_released_ts_ms = Some(sample.timestamp_ms);
        self.last_playback_no = Some(sample.playback_no);
    }
}
