// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Per-sample slot storage, segment deduplication, and delivery to the
//! playback queue once a sample is complete (§4.9).
//!
//! A slot's state ladder is `Free -> New -> Assembling -> Ready -> Locked ->
//! Free`. Once `Ready`, further arrivals are accepted but never move the
//! slot back to `Assembling` (§4.9 "Integrity").

use std::collections::{HashMap, HashSet};

use ndnrtc_core::{NamespaceInfo, WireSegment};

/// Where a slot sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Free,
    New,
    Assembling,
    Ready,
    Locked,
}

/// One in-flight or completed sample.
pub struct Slot {
    pub sample_no: u64,
    state: SlotState,
    playback_no: Option<u32>,
    total_segments: Option<u32>,
    parity_segments: Option<u32>,
    data: HashMap<u64, WireSegment>,
    parity: HashMap<u64, WireSegment>,
    requested: HashSet<u64>,
}

impl Slot {
    fn new(sample_no: u64) -> Self {
        Self {
            sample_no,
            state: SlotState::New,
            playback_no: None,
            total_segments: None,
            parity_segments: None,
            data: HashMap::new(),
            parity: HashMap::new(),
            requested: HashSet::new(),
        }
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    pub fn playback_no(&self) -> Option<u32> {
        self.playback_no
    }

    pub fn fetched_segments(&self) -> usize {
        self.data.len() + self.parity.len()
    }

    /// Data segment indices not yet present, given the sample's known total
    /// (empty before the total is known from a first arrival).
    pub fn missing_segments(&self) -> Vec<u64> {
        match self.total_segments {
            Some(total) => (0..u64::from(total)).filter(|i| !self.data.contains_key(i)).collect(),
            None => Vec::new(),
        }
    }

    fn is_complete(&self) -> bool {
        match self.total_segments {
            Some(total) => (self.data.len() + self.parity.len()) as u32 >= total,
            None => false,
        }
    }

    fn absorb(&mut self, segment: WireSegment, info: &NamespaceInfo) {
        if let Some(header) = segment.header.as_video_frame() {
            self.total_segments.get_or_insert(header.total_segments_num);
            self.parity_segments.get_or_insert(header.parity_segments_num);
            self.playback_no.get_or_insert(header.playback_no);
        }
        use ndnrtc_core::name::SegmentType;
        match info.segment_type {
            SegmentType::Parity => {
                self.parity.insert(info.seg_no, segment);
            },
            _ => {
                self.data.insert(info.seg_no, segment);
            },
        }
    }
}

/// A single segment's arrival, plus the state the host slot settled into.
pub struct BufferReceipt {
    pub sample_no: u64,
    pub seg_no: u64,
    pub slot_state: SlotState,
    pub is_new_completion: bool,
}

/// Callbacks fired as slots are created and filled.
pub trait BufferObserver: Send {
    fn on_new_request(&mut self, _sample_no: u64, _seg_nos: &[u64]) {}
    fn on_new_data(&mut self, _receipt: &BufferReceipt) {}
}

/// Per-thread slot storage for one sample class.
#[derive(Default)]
pub struct Buffer {
    slots: HashMap<u64, Slot>,
    observers: Vec<Box<dyn BufferObserver>>,
}

impl Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_observer(&mut self, observer: Box<dyn BufferObserver>) {
        self.observers.push(observer);
    }

    fn slot_mut(&mut self, sample_no: u64) -> &mut Slot {
        self.slots.entry(sample_no).or_insert_with(|| Slot::new(sample_no))
    }

    pub fn get_state(&self, sample_no: u64) -> SlotState {
        self.slots.get(&sample_no).map_or(SlotState::Free, Slot::state)
    }

    pub fn get_fetched_segments(&self, sample_no: u64) -> usize {
        self.slots.get(&sample_no).map_or(0, Slot::fetched_segments)
    }

    pub fn get_missing_segments(&self, sample_no: u64) -> Vec<u64> {
        self.slots.get(&sample_no).map_or_else(Vec::new, Slot::missing_segments)
    }

    pub fn is_requested(&self, sample_no: u64, seg_no: u64) -> bool {
        self.slots.get(&sample_no).is_some_and(|s| s.requested.contains(&seg_no))
    }

    /// Records pending segments against a slot, creating it if needed, and
    /// notifies observers of `onNewRequest`.
    pub fn segments_requested(&mut self, sample_no: u64, seg_nos: &[u64]) {
        let slot = self.slot_mut(sample_no);
        for &seg_no in seg_nos {
            slot.requested.insert(seg_no);
        }
        for observer in &mut self.observers {
            observer.on_new_request(sample_no, seg_nos);
        }
    }

    /// Updates the slot for `info`, possibly promoting its state, and
    /// notifies observers of `onNewData`. A `Ready` slot is never demoted
    /// back to `Assembling` by further arrivals.
    pub fn received(&mut self, segment: WireSegment, info: &NamespaceInfo) -> BufferReceipt {
        let slot = self.slot_mut(info.sample_no);
        slot.requested.remove(&info.seg_no);
        slot.absorb(segment, info);

        let was_ready = matches!(slot.state, SlotState::Ready | SlotState::Locked);
        if !was_ready {
            slot.state = if slot.is_complete() { SlotState::Ready } else { SlotState::Assembling };
        }
        let is_new_completion = !was_ready && slot.state == SlotState::Ready;

        let receipt = BufferReceipt {
            sample_no: info.sample_no,
            seg_no: info.seg_no,
            slot_state: slot.state,
            is_new_completion,
        };
        for observer in &mut self.observers {
            observer.on_new_data(&receipt);
        }
        receipt
    }

    /// Marks a completed slot `Locked` (handed to playback) and frees it.
    pub fn lock_and_free(&mut self, sample_no: u64) -> Option<Slot> {
        if let Some(slot) = self.slots.get_mut(&sample_no) {
            slot.state = SlotState::Locked;
        }
        self.slots.remove(&sample_no)
    }

    /// Evicts a slot without playing it out (e.g. FEC-irrecoverable,
    /// deadline passed).
    pub fn evict(&mut self, sample_no: u64) {
        self.slots.remove(&sample_no);
    }

    pub fn reset(&mut self) {
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use ndnrtc_core::name::SegmentType;
    use ndnrtc_core::segment::{SegmentHeader, VideoFrameSegmentHeader};
    use ndnrtc_core::{Name, SampleClass};

    fn info(sample_no: u64, seg_no: u64, segment_type: SegmentType) -> NamespaceInfo {
        NamespaceInfo { base_prefix: Name::new(), stream: "cam".into(), thread: "hi".into(), class: SampleClass::Delta, sample_no, segment_type, seg_no }
    }

    fn segment(total: u32, playback_no: u32, parity: u32) -> WireSegment {
        WireSegment {
            header: SegmentHeader::VideoFrame(VideoFrameSegmentHeader {
                interest_nonce: 0,
                interest_arrival_ms: 0,
                generation_delay_ms: 0,
                total_segments_num: total,
                playback_no,
                paired_sequence_no: 0,
                parity_segments_num: parity,
            }),
            payload: Bytes::from_static(b"x"),
        }
    }

    #[test]
    fn test_slot_promotes_to_ready_once_all_data_present() {
        let mut buffer = Buffer::new();
        assert_eq!(buffer.get_state(1), SlotState::Free);

        let r1 = buffer.received(segment(2, 5, 0), &info(1, 0, SegmentType::Data));
        assert_eq!(r1.slot_state, SlotState::Assembling);
        assert!(!r1.is_new_completion);

        let r2 = buffer.received(segment(2, 5, 0), &info(1, 1, SegmentType::Data));
        assert_eq!(r2.slot_state, SlotState::Ready);
        assert!(r2.is_new_completion);
        assert_eq!(buffer.get_state(1), SlotState::Ready);
    }

    #[test]
    fn test_ready_slot_never_demotes_on_further_arrivals() {
        let mut buffer = Buffer::new();
        buffer.received(segment(1, 0, 0), &info(1, 0, SegmentType::Data));
        assert_eq!(buffer.get_state(1), SlotState::Ready);

        // A stray duplicate/parity arrival after completion must not demote.
        let r = buffer.received(segment(1, 0, 1), &info(1, 0, SegmentType::Parity));
        assert_eq!(r.slot_state, SlotState::Ready);
        assert!(!r.is_new_completion);
    }

    #[test]
    fn test_parity_segments_count_toward_completion() {
        let mut buffer = Buffer::new();
        // 3 data segments, 1 parity; only 2 data + 1 parity arrive (RS can recover).
        buffer.received(segment(3, 0, 1), &info(1, 0, SegmentType::Data));
        buffer.received(segment(3, 0, 1), &info(1, 1, SegmentType::Data));
        let r = buffer.received(segment(3, 0, 1), &info(1, 0, SegmentType::Parity));
        assert_eq!(r.slot_state, SlotState::Ready);
    }

    #[test]
    fn test_missing_segments_reports_absent_indices() {
        let mut buffer = Buffer::new();
        buffer.received(segment(3, 0, 0), &info(1, 1, SegmentType::Data));
        assert_eq!(buffer.get_missing_segments(1), vec![0, 2]);
    }

    #[test]
    fn test_segments_requested_tracks_is_requested() {
        let mut buffer = Buffer::new();
        buffer.segments_requested(1, &[0, 1, 2]);
        assert!(buffer.is_requested(1, 1));
        buffer.received(segment(3, 0, 0), &info(1, 1, SegmentType::Data));
        assert!(!buffer.is_requested(1, 1));
    }

    #[test]
    fn test_lock_and_free_removes_slot() {
        let mut buffer = Buffer::new();
        buffer.received(segment(1, 0, 0), &info(1, 0, SegmentType::Data));
        assert!(buffer.lock_and_free(1).is_some());
        assert_eq!(buffer.get_state(1), SlotState::Free);
    }
}
