// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Translates high-level demand ("get rightmost latest sample", "get sample
//! Y", "get next sample") into concrete interests against the thread's
//! namespace (§4.7). Tracks, per thread, the current `sampleNo` for both
//! the key and delta classes.

use std::collections::HashMap;
use std::time::Duration;

use ndnrtc_core::name::SegmentType;
use ndnrtc_core::{Name, NamespaceInfo, SampleClass};
use ndnrtc_net::Interest;

/// What the pipeliner is currently trying to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Need {
    None,
    Rightmost { class: SampleClass },
    ExactSample { class: SampleClass, sample_no: u64 },
}

/// Per-thread interest generator. Does not own the interest window itself
/// (that is [`crate::interest_control::InterestControl`]'s job); `express`
/// takes it as a collaborator so the window and the demand stay decoupled.
pub struct Pipeliner {
    thread_prefix: Name,
    stream: String,
    thread: String,
    next_sample_no: HashMap<SampleClass, u64>,
    need: Need,
    lifetime: Duration,
    nonce_counter: u32,
}

impl Pipeliner {
    pub fn new(base_prefix: Name, stream: String, thread: String, lifetime: Duration) -> Self {
        let thread_prefix =
            base_prefix.clone().append(stream.as_bytes().to_vec()).append(thread.as_bytes().to_vec());
        Self {
            thread_prefix,
            stream,
            thread,
            next_sample_no: HashMap::new(),
            need: Need::None,
            lifetime,
            nonce_counter: 0,
        }
    }

    pub fn thread_prefix(&self) -> &Name {
        &self.thread_prefix
    }

    pub fn set_need_rightmost(&mut self, class: SampleClass) {
        self.need = Need::Rightmost { class };
    }

    /// Starts demanding the thread's current tracked sequence number for
    /// `class` (defaulting to zero if never set).
    pub fn set_need_sample(&mut self, class: SampleClass) {
        let sample_no = *self.next_sample_no.get(&class).unwrap_or(&0);
        self.need = Need::ExactSample { class, sample_no };
    }

    pub fn set_sequence_number(&mut self, sample_no: u64, class: SampleClass) {
        self.next_sample_no.insert(class, sample_no);
    }

    pub fn sequence_number(&self, class: SampleClass) -> u64 {
        *self.next_sample_no.get(&class).unwrap_or(&0)
    }

    fn next_nonce(&mut self) -> u32 {
        self.nonce_counter = self.nonce_counter.wrapping_add(1);
        self.nonce_counter
    }

    fn namespace_info(&self, class: SampleClass, sample_no: u64) -> NamespaceInfo {
        NamespaceInfo {
            base_prefix: self.thread_prefix.prefix(self.thread_prefix.len() - 2),
            stream: self.stream.clone(),
            thread: self.thread.clone(),
            class,
            sample_no,
            segment_type: SegmentType::Data,
            seg_no: 0,
        }
    }

    /// Builds the next interest for current demand, if any. Callers are
    /// expected to have already reserved window room via
    /// `InterestControl::increment`.
    pub fn express(&mut self) -> Option<Interest> {
        let nonce = self.next_nonce();
        match self.need {
            Need::None => None,
            Need::Rightmost { class } => {
                let prefix = self
                    .thread_prefix
                    .clone()
                    .append(match class {
                        SampleClass::Key => b"k".to_vec(),
                        SampleClass::Delta => b"d".to_vec(),
                    });
                Some(Interest::rightmost(prefix, self.lifetime, nonce))
            },
            Need::ExactSample { class, sample_no } => {
                let name = self.namespace_info(class, sample_no).into_name();
                Some(Interest::exact(name, self.lifetime, nonce))
            },
        }
    }

    /// Advances demand for `class` once a segment of the currently pending
    /// sample has arrived, so the next `express()` asks for the next sample.
    pub fn segment_arrived(&mut self, class: SampleClass) {
        if let Need::ExactSample { class: pending_class, sample_no } = self.need {
            if pending_class == class {
                let next = sample_no + 1;
                self.next_sample_no.insert(class, next);
                self.need = Need::ExactSample { class, sample_no: next };
            }
        }
    }

    pub fn reset(&mut self) {
        self.need = Need::None;
        self.next_sample_no.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Name {
        Name::from_components([b"ndnrtc".to_vec(), b"alice".to_vec()])
    }

    #[test]
    fn test_scenario_1_cold_start_then_exact_follow_up() {
        let mut pipeliner = Pipeliner::new(base(), "cam".into(), "hi".into(), Duration::from_millis(500));
        pipeliner.set_need_rightmost(SampleClass::Delta);
        let interest = pipeliner.express().unwrap();
        assert!(interest.name.to_uri().ends_with("/d"));

        pipeliner.set_sequence_number(8, SampleClass::Delta);
        pipeliner.set_need_sample(SampleClass::Delta);
        let interest = pipeliner.express().unwrap();
        assert!(interest.name.to_uri().contains("/d/"));
        assert_eq!(pipeliner.sequence_number(SampleClass::Delta), 8);
    }

    #[test]
    fn test_scenario_2_video_sets_sister_class_sequence() {
        let mut pipeliner = Pipeliner::new(base(), "cam".into(), "hi".into(), Duration::from_millis(500));
        pipeliner.set_sequence_number(47, SampleClass::Delta);
        assert_eq!(pipeliner.sequence_number(SampleClass::Delta), 47);
    }

    #[test]
    fn test_segment_arrived_advances_only_matching_class() {
        let mut pipeliner = Pipeliner::new(base(), "cam".into(), "hi".into(), Duration::from_millis(500));
        pipeliner.set_sequence_number(5, SampleClass::Delta);
        pipeliner.set_need_sample(SampleClass::Delta);
        pipeliner.segment_arrived(SampleClass::Key); // unrelated class, no effect
        assert_eq!(pipeliner.sequence_number(SampleClass::Delta), 5);
        pipeliner.segment_arrived(SampleClass::Delta);
        assert_eq!(pipeliner.sequence_number(SampleClass::Delta), 6);
    }

    #[test]
    fn test_no_interest_without_demand() {
        let mut pipeliner = Pipeliner::new(base(), "cam".into(), "hi".into(), Duration::from_millis(500));
        assert!(pipeliner.express().is_none());
    }
}
