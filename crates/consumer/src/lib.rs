// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Consumer-side fetch pipeline for the ndnrtc streaming engine.
//!
//! Leaf-first dependency order (§2):
//! [`drd`] -> [`segment_controller`] -> [`buffer`] -> [`interest_control`] ->
//! [`latency_control`] -> [`pipeliner`] -> [`state_machine`] -> [`playback`].
//! [`av_sync`] sits alongside, coordinating two consumer instances.

pub mod av_sync;
pub mod buffer;
pub mod drd;
pub mod interest_control;
pub mod latency_control;
pub mod pipeliner;
pub mod playback;
pub mod segment_controller;
pub mod state_machine;

pub use buffer::{Buffer, BufferReceipt, SlotState};
pub use drd::DrdEstimator;
pub use interest_control::{InterestControl, InterestControlStrategy, StrategyDefault};
pub use latency_control::{AdjustCommand, LatencyControl};
pub use pipeliner::Pipeliner;
pub use playback::{Playout, PlayoutControl, QueuedSample};
pub use segment_controller::{SegmentController, SegmentControllerObserver};
pub use state_machine::{Action, ConsumerKind, Event, PipelineStateMachine, State};

use ndnrtc_core::config::EngineConfig;
use ndnrtc_core::NamespaceInfo;
use ndnrtc_net::Interest;

use playback::PlaybackQueue;

/// Orchestrates one thread subscription's fetch path end to end: wires a
/// segment arrival into the buffer, DRD estimator, interest/latency
/// control, the pipeline state machine, and the pipeliner, then returns the
/// interests the caller should express next. A thin, synchronous core
/// deliberately kept free of any network or timer machinery, so it can be
/// driven either by a face-executor event loop or by tests.
pub struct ConsumerPipeline {
    pub config: EngineConfig,
    pub buffer: Buffer,
    pub drd: DrdEstimator,
    pub interest_control: InterestControl,
    pub latency_control: LatencyControl,
    pub pipeliner: Pipeliner,
    pub state_machine: PipelineStateMachine,
    pub playback_queue: PlaybackQueue,
    pub playout_control: PlayoutControl,
    sample_period_ms: f64,
}

impl ConsumerPipeline {
    pub fn new(config: EngineConfig, kind: ConsumerKind, pipeliner: Pipeliner, sample_period_ms: f64) -> Self {
        Self {
            drd: DrdEstimator::new(config.drd_estimator),
            interest_control: InterestControl::new(
                Box::new(StrategyDefault::new(config.interest_control)),
                config.interest_control.min_pipeline_size,
            ),
            latency_control: LatencyControl::new(&config.latency_control, sample_period_ms),
            pipeliner,
            state_machine: PipelineStateMachine::new(kind),
            playback_queue: PlaybackQueue::new(config.buffer.target_size_ms, config.buffer.head_skip_timeout_ms),
            playout_control: PlayoutControl::default(),
            buffer: Buffer::new(),
            config,
            sample_period_ms,
        }
    }

    pub fn start(&mut self) -> Option<Interest> {
        let rightmost_class = match self.state_machine.handle_event(Event::Start, AdjustCommand::Keep) {
            Action::RequestRightmost { class } => class,
            _ => return None,
        };
        self.pipeliner.set_need_rightmost(rightmost_class);
        self.pipeliner.express()
    }

    /// Feeds one incoming segment through the whole pipeline. Returns the
    /// buffer's receipt (so the caller can move a newly-completed sample
    /// into `playback_queue`) plus the next interest(s) to express, if any.
    pub fn on_segment(
        &mut self,
        wire: ndnrtc_core::WireSegment,
        info: NamespaceInfo,
        is_first_of_sample: bool,
    ) -> (Option<BufferReceipt>, Vec<Interest>) {
        let Some(header) = wire.header.as_video_frame() else {
            return (None, Vec::new());
        };
        let latest_drd_ms = f64::from(header.generation_delay_ms);
        let is_original = self.drd.is_original(header.generation_delay_ms);
        let paired_sequence_no = u64::from(header.paired_sequence_no);
        self.drd.new_value(latest_drd_ms, is_original);

        tracing::trace!(class = ?info.class, sample_no = info.sample_no, seg_no = info.seg_no, latest_drd_ms, "segment arrived");

        let receipt = self.buffer.received(wire, &info);
        self.interest_control.decrement();
        self.pipeliner.segment_arrived(info.class);

        let latency_command = if is_first_of_sample {
            self.latency_control.on_sample_arrival(latest_drd_ms, self.drd.original_estimation())
        } else {
            AdjustCommand::Keep
        };

        let action = self.state_machine.handle_event(
            Event::Segment { class: info.class, sample_no: info.sample_no, paired_sequence_no, is_first_of_sample },
            latency_command,
        );

        self.apply_action(action);
        self.interest_control.mark_lower_limit(self.drd.original_estimation(), self.drd.original_stddev(), self.sample_period_ms);

        (Some(receipt), self.drain_pipeline_room())
    }

    pub fn on_starvation(&mut self) -> Vec<Interest> {
        let action = self.state_machine.handle_event(Event::Starvation, AdjustCommand::Keep);
        self.apply_action(action);
        self.drain_pipeline_room()
    }

    fn apply_action(&mut self, action: Action) {
        match action {
            Action::RequestRightmost { class } => self.pipeliner.set_need_rightmost(class),
            Action::RequestExact { class, sample_no } => {
                self.pipeliner.set_sequence_number(sample_no, class);
                self.pipeliner.set_need_sample(class);
            },
            Action::SetSisterSequenceNumber { class, sample_no } => self.pipeliner.set_sequence_number(sample_no, class),
            Action::EnablePlayout => self.playout_control.enable(),
            Action::FreezeLowerLimit => {
                self.interest_control.mark_lower_limit(self.drd.original_estimation(), self.drd.original_stddev(), self.sample_period_ms);
            },
            Action::FullReset => self.reset(),
            Action::None => {},
        }
    }

    fn reset(&mut self) {
        self.buffer.reset();
        self.pipeliner.reset();
        self.interest_control.reset();
        self.latency_control.reset();
        self.playback_queue.reset();
        self.playout_control.disable();
    }

    /// Expresses as many interests as the current window has room for.
    fn drain_pipeline_room(&mut self) -> Vec<Interest> {
        let mut interests = Vec::new();
        while self.interest_control.room() > 0 {
            if !self.interest_control.increment() {
                break;
            }
            match self.pipeliner.express() {
                Some(interest) => interests.push(interest),
                None => {
                    self.interest_control.decrement();
                    break;
                },
            }
        }
        interests
    }
}
