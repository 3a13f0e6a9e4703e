// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Pipeline-control state machine (§4.8): sequences the consumer from
//! cold-start into steady-state fetching and drives recovery on starvation.
//!
//! Modeled as a `(State, EventKind) -> (State, Action)` table with an
//! explicit "ignored" fallback (§9): events the current state has no entry
//! for are silently dropped rather than treated as an error.

use ndnrtc_core::SampleClass;

use crate::latency_control::AdjustCommand;

/// Public states, emitted as the `state` field of `RemoteStream::StateUpdate` (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    WaitForRightmost,
    WaitForInitial,
    Chasing,
    Adjusting,
    Fetching,
}

/// Events the state machine reacts to.
#[derive(Debug, Clone, Copy)]
pub enum Event {
    Start,
    /// A segment arrived. `is_first_of_sample` distinguishes the leading
    /// segment of a new sample (the only kind the state machine's
    /// transitions key off of).
    Segment { class: SampleClass, sample_no: u64, paired_sequence_no: u64, is_first_of_sample: bool },
    Timeout,
    Starvation,
    Reset,
}

/// Side effects the state machine requests of its collaborators. Kept as
/// data rather than invoked directly so callers can batch/trace them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    RequestRightmost { class: SampleClass },
    RequestExact { class: SampleClass, sample_no: u64 },
    SetSisterSequenceNumber { class: SampleClass, sample_no: u64 },
    EnablePlayout,
    FreezeLowerLimit,
    FullReset,
    None,
}

/// Consumers of video streams wait for a paired key before chasing; audio
/// consumers (single class) have no sister class to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerKind {
    Video,
    Audio,
}

const MAX_INITIAL_TIMEOUTS: u32 = 4;

/// One state machine per active thread subscription (§3 Lifecycle).
pub struct PipelineStateMachine {
    state: State,
    kind: ConsumerKind,
    initial_timeout_count: u32,
}

impl PipelineStateMachine {
    pub fn new(kind: ConsumerKind) -> Self {
        Self { state: State::Idle, kind, initial_timeout_count: 0 }
    }

    pub fn state(&self) -> State {
        self.state
    }

    fn rightmost_class(&self) -> SampleClass {
        match self.kind {
            ConsumerKind::Video => SampleClass::Key,
            ConsumerKind::Audio => SampleClass::Delta,
        }
    }

    /// Applies `event` under the current latency-control command (only
    /// consulted for `Segment` events in `Chasing`/`Adjusting`) and returns
    /// the actions to perform. Unlisted (state, event) combinations are
    /// dropped and return `Action::None` without panicking.
    pub fn handle_event(&mut self, event: Event, latency_command: AdjustCommand) -> Action {
        use Action as A;
        use State as S;

        let (next, action) = match (self.state, event) {
            (S::Idle, Event::Start) => (S::WaitForRightmost, A::RequestRightmost { class: self.rightmost_class() }),

            (S::WaitForRightmost, Event::Segment { class, sample_no, .. }) => {
                (S::WaitForInitial, A::RequestExact { class, sample_no: sample_no + 1 })
            },
            (S::WaitForRightmost, Event::Timeout) => {
                (S::WaitForRightmost, A::RequestRightmost { class: self.rightmost_class() })
            },
            (S::WaitForRightmost, Event::Reset) => (S::Idle, A::None),

            (S::WaitForInitial, Event::Segment { class, paired_sequence_no, is_first_of_sample, .. })
                if self.kind == ConsumerKind::Video && is_first_of_sample =>
            {
                self.initial_timeout_count = 0;
                (S::Chasing, A::SetSisterSequenceNumber { class: class.other(), sample_no: paired_sequence_no })
            },
            (S::WaitForInitial, Event::Segment { .. }) if self.kind == ConsumerKind::Audio => {
                self.initial_timeout_count = 0;
                (S::Chasing, A::None)
            },
            (S::WaitForInitial, Event::Timeout) => {
                self.initial_timeout_count += 1;
                if self.initial_timeout_count >= MAX_INITIAL_TIMEOUTS {
                    self.initial_timeout_count = 0;
                    (S::Idle, A::None)
                } else {
                    (S::WaitForInitial, A::None)
                }
            },

            (S::Chasing, Event::Segment { class, sample_no, .. }) => match latency_command {
                AdjustCommand::Increase | AdjustCommand::Keep => {
                    (S::Chasing, A::RequestExact { class, sample_no: sample_no + 1 })
                },
                AdjustCommand::Decrease => (S::Adjusting, A::EnablePlayout),
            },

            (S::Adjusting, Event::Segment { .. }) => match latency_command {
                AdjustCommand::Increase => (S::Fetching, A::FreezeLowerLimit),
                _ => (S::Adjusting, A::None),
            },

            (s, Event::Starvation) if s != S::Idle => {
                (S::WaitForRightmost, A::FullReset)
            },

            (_, Event::Reset) => (S::Idle, A::None),

            _ => {
                tracing::trace!(state = ?self.state, "event ignored in this state");
                return A::None;
            },
        };
        if next != self.state {
            tracing::debug!(from = ?self.state, to = ?next, ?action, "state transition");
        }
        self.state = next;
        action
    }
}
