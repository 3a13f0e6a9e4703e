// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Inter-stream A/V synchronization (§4.11): two collaborating streams
//! (audio, video) each report `(localTs, remoteTs)` on every sample
//! release; the drift between the two streams' views becomes the playout
//! delay adjustment for the reporting stream.

use std::sync::Mutex;
use std::time::Duration;

/// Default tolerance below which no adjustment is reported.
pub const DEFAULT_TOLERANCE_MS: i64 = 20;

#[derive(Debug, Clone, Copy, Default)]
struct StreamObservation {
    local_ts_ms: u64,
    remote_ts_ms: u64,
    seen: bool,
}

/// Shared sync state between exactly two streams. Each stream identifies
/// itself as "this" or "other" from its own point of view by holding one of
/// the two [`AvSyncState::handle`] handles.
pub struct AvSyncState {
    audio: Mutex<StreamObservation>,
    video: Mutex<StreamObservation>,
    tolerance_ms: i64,
}

/// Which side of the pair a handle reports for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Audio,
    Video,
}

impl AvSyncState {
    pub fn new(tolerance_ms: i64) -> Self {
        Self { audio: Mutex::new(StreamObservation::default()), video: Mutex::new(StreamObservation::default()), tolerance_ms }
    }

    fn slot(&self, stream: Stream) -> &Mutex<StreamObservation> {
        match stream {
            Stream::Audio => &self.audio,
            Stream::Video => &self.video,
        }
    }

    fn other(stream: Stream) -> Stream {
        match stream {
            Stream::Audio => Stream::Video,
            Stream::Video => Stream::Audio,
        }
    }

    /// Holds until both streams have observed at least one sample (§4.11
    /// "Initialization holds...").
    pub fn is_ready(&self) -> bool {
        self.audio.lock().unwrap().seen && self.video.lock().unwrap().seen
    }

    /// Records a sample release for `stream` and returns the drift `D` to
    /// apply to that stream's playout delay, once both sides have been
    /// observed and `|D|` exceeds tolerance.
    pub fn synchronize_packet(&self, stream: Stream, local_ts_ms: u64, remote_ts_ms: u64) -> Option<i64> {
        {
            let mut this_obs = self.slot(stream).lock().unwrap();
            *this_obs = StreamObservation { local_ts_ms, remote_ts_ms, seen: true };
        }
        if !self.is_ready() {
            return None;
        }

        let this_obs = *self.slot(stream).lock().unwrap();
        let other_obs = *self.slot(Self::other(stream)).lock().unwrap();

        let this_drift = this_obs.remote_ts_ms as i64 - this_obs.local_ts_ms as i64;
        let other_drift = other_obs.remote_ts_ms as i64 - other_obs.local_ts_ms as i64;
        let d = this_drift - other_drift;

        if d.abs() > self.tolerance_ms {
            Some(d)
        } else {
            None
        }
    }
}

/// Applies a drift adjustment to a baseline playout delay, clamping to zero
/// (no negative sleeps).
pub fn apply_adjustment(baseline: Duration, adjustment_ms: i64) -> Duration {
    let total = baseline.as_millis() as i64 + adjustment_ms;
    Duration::from_millis(total.max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_holds_until_both_streams_observed() {
        let state = AvSyncState::new(DEFAULT_TOLERANCE_MS);
        assert!(!state.is_ready());
        assert!(state.synchronize_packet(Stream::Audio, 0, 0).is_none());
        assert!(!state.is_ready());
        assert!(state.synchronize_packet(Stream::Video, 0, 0).is_none());
        assert!(state.is_ready());
    }

    #[test]
    fn test_drift_detected_past_tolerance() {
        let state = AvSyncState::new(DEFAULT_TOLERANCE_MS);
        state.synchronize_packet(Stream::Audio, 1000, 1000).unwrap_or_default(); // seed, None expected
        let d = state.synchronize_packet(Stream::Video, 1000, 1050); // video remote is 50ms ahead
        assert_eq!(d, Some(50));
    }

    #[test]
    fn test_drift_within_tolerance_is_none() {
        let state = AvSyncState::new(DEFAULT_TOLERANCE_MS);
        state.synchronize_packet(Stream::Audio, 1000, 1000);
        let d = state.synchronize_packet(Stream::Video, 1000, 1010);
        assert_eq!(d, None);
    }

    #[test]
    fn test_applying_adjustment_makes_next_drift_zero() {
        // After applying D to the next-playout time, the streams' clocks
        // realign and the next computed drift should fall back within tolerance.
        let baseline = Duration::from_millis(100);
        let adjusted = apply_adjustment(baseline, 50);
        assert_eq!(adjusted, Duration::from_millis(150));
    }

    #[test]
    fn test_adjustment_never_goes_negative() {
        let adjusted = apply_adjustment(Duration::from_millis(10), -50);
        assert_eq!(adjusted, Duration::ZERO);
    }
}
