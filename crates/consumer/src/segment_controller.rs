// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Single entry point for incoming segments from the network collaborator
//! (§4.3): dispatches arrivals and timeouts to observers, and detects
//! prolonged network silence via a starvation timer.

use std::time::{Duration, Instant};

use ndnrtc_core::{NamespaceInfo, WireSegment};

/// Callbacks fired by the segment controller. Implementors typically wire
/// these into the buffer, DRD estimator, and pipeline state machine.
pub trait SegmentControllerObserver: Send {
    fn on_segment_arrived(&mut self, _segment: &WireSegment, _info: &NamespaceInfo) {}
    fn on_segment_request_timeout(&mut self, _info: &NamespaceInfo) {}
    fn on_segment_starvation(&mut self) {}
}

/// Dispatches segment arrivals/timeouts and raises `segmentStarvation()`
/// once after `max_idle_ms` of silence; it does not re-fire until at least
/// one segment arrives again (§4.3).
pub struct SegmentController {
    max_idle: Duration,
    observers: Vec<Box<dyn SegmentControllerObserver>>,
    last_arrival: Option<Instant>,
    starvation_fired: bool,
}

impl SegmentController {
    pub fn new(max_idle_ms: u64) -> Self {
        Self { max_idle: Duration::from_millis(max_idle_ms), observers: Vec::new(), last_arrival: None, starvation_fired: false }
    }

    pub fn add_observer(&mut self, observer: Box<dyn SegmentControllerObserver>) {
        self.observers.push(observer);
    }

    pub fn segment_arrived(&mut self, segment: WireSegment, info: NamespaceInfo) {
        self.last_arrival = Some(Instant::now());
        self.starvation_fired = false;
        tracing::trace!(class = ?info.class, sample_no = info.sample_no, seg_no = info.seg_no, "segment controller dispatch");
        for observer in &mut self.observers {
            observer.on_segment_arrived(&segment, &info);
        }
    }

    pub fn segment_request_timeout(&mut self, info: NamespaceInfo) {
        tracing::debug!(class = ?info.class, sample_no = info.sample_no, seg_no = info.seg_no, "segment request timed out");
        for observer in &mut self.observers {
            observer.on_segment_request_timeout(&info);
        }
    }

    /// Must be polled periodically (e.g. by a face-executor timer tick).
    /// Returns true the one time it fires the starvation event.
    pub fn check_starvation(&mut self) -> bool {
        let idle = match self.last_arrival {
            Some(t) => t.elapsed(),
            None => Duration::MAX,
        };
        if idle >= self.max_idle && !self.starvation_fired {
            self.starvation_fired = true;
            tracing::debug!(idle_ms = idle.as_millis() as u64, "segment starvation detected");
            for observer in &mut self.observers {
                observer.on_segment_starvation();
            }
            return true;
        }
        false
    }

    /// Cancels and resets the idle timer, as the original does on observer
    /// attach/detach and on a full stream reset.
    pub fn reset(&mut self) {
        self.last_arrival = None;
        self.starvation_fired = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use ndnrtc_core::name::SegmentType;
    use ndnrtc_core::segment::{SegmentHeader, VideoFrameSegmentHeader};
    use ndnrtc_core::{Name, SampleClass};
    use std::sync::{Arc, Mutex};
    use std::thread::sleep;

    fn info() -> NamespaceInfo {
        NamespaceInfo {
            base_prefix: Name::new(),
            stream: "cam".into(),
            thread: "hi".into(),
            class: SampleClass::Delta,
            sample_no: 1,
            segment_type: SegmentType::Data,
            seg_no: 0,
        }
    }

    fn segment() -> WireSegment {
        WireSegment {
            header: SegmentHeader::VideoFrame(VideoFrameSegmentHeader {
                interest_nonce: 0,
                interest_arrival_ms: 0,
                generation_delay_ms: 0,
                total_segments_num: 1,
                playback_no: 0,
                paired_sequence_no: 0,
                parity_segments_num: 0,
            }),
            payload: Bytes::new(),
        }
    }

    struct Recorder {
        arrivals: Arc<Mutex<u32>>,
        starvations: Arc<Mutex<u32>>,
    }

    impl SegmentControllerObserver for Recorder {
        fn on_segment_arrived(&mut self, _segment: &WireSegment, _info: &NamespaceInfo) {
            *self.arrivals.lock().unwrap() += 1;
        }

        fn on_segment_starvation(&mut self) {
            *self.starvations.lock().unwrap() += 1;
        }
    }

    #[test]
    fn test_starvation_fires_once_until_next_arrival() {
        let mut controller = SegmentController::new(5);
        let starvations = Arc::new(Mutex::new(0));
        controller.add_observer(Box::new(Recorder { arrivals: Arc::new(Mutex::new(0)), starvations: starvations.clone() }));

        controller.segment_arrived(segment(), info());
        sleep(Duration::from_millis(10));
        assert!(controller.check_starvation());
        assert!(!controller.check_starvation()); // does not re-fire
        assert_eq!(*starvations.lock().unwrap(), 1);

        controller.segment_arrived(segment(), info());
        sleep(Duration::from_millis(10));
        assert!(controller.check_starvation());
        assert_eq!(*starvations.lock().unwrap(), 2);
    }

    #[test]
    fn test_no_starvation_before_any_segment_and_within_idle_window() {
        let mut controller = SegmentController::new(1_000);
        controller.segment_arrived(segment(), info());
        assert!(!controller.check_starvation());
    }
}
