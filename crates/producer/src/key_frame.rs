// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Key-frame forcing policy (§4.2 step 2): beyond the mandatory first-frame
//! rule, an optional policy can additionally force a key frame every Nth
//! frame ("Gop") or whenever wall-clock has overrun a deadline ("Timed").
//! A GOP boundary intrinsic to the encoder's own rate control is reported
//! back via the encoded frame's type, not driven by this decider.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyFramePolicy {
    /// Only the mandatory first-frame rule applies.
    None,
    /// Forces every `period`-th frame (after the first) to be key.
    Gop { period: u32 },
    /// Forces a key frame once `max_age` has elapsed since the last one.
    Timed { max_age: Duration },
}

/// Per-thread key-frame forcing state.
pub struct KeyFrameDecider {
    policy: KeyFramePolicy,
    frames_since_key: u32,
    last_key_at: Option<Instant>,
    has_published: bool,
}

impl KeyFrameDecider {
    pub fn new(policy: KeyFramePolicy) -> Self {
        Self { policy, frames_since_key: 0, last_key_at: None, has_published: false }
    }

    /// Whether the encoder must be told to force a key frame for the frame
    /// about to be encoded.
    pub fn should_force_key(&self, now: Instant) -> bool {
        if !self.has_published {
            return true;
        }
        match self.policy {
            KeyFramePolicy::None => false,
            KeyFramePolicy::Gop { period } => period == 0 || self.frames_since_key >= period,
            KeyFramePolicy::Timed { max_age } => self.last_key_at.is_none_or(|at| now.duration_since(at) >= max_age),
        }
    }

    /// Records the encoder's actual decision so future calls account for it
    /// (the encoder may insert a key frame on its own GOP boundary even
    /// when `should_force_key` returned `false`).
    pub fn record(&mut self, is_key: bool, now: Instant) {
        self.has_published = true;
        if is_key {
            self.frames_since_key = 0;
            self.last_key_at = Some(now);
        } else {
            self.frames_since_key += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_frame_is_always_forced_key() {
        let decider = KeyFrameDecider::new(KeyFramePolicy::None);
        assert!(decider.should_force_key(Instant::now()));
    }

    #[test]
    fn test_gop_policy_forces_every_nth_frame() {
        let mut decider = KeyFrameDecider::new(KeyFramePolicy::Gop { period: 3 });
        let now = Instant::now();
        decider.record(true, now); // first frame, forced key
        assert!(!decider.should_force_key(now));
        decider.record(false, now);
        assert!(!decider.should_force_key(now));
        decider.record(false, now);
        assert!(decider.should_force_key(now)); // 3rd frame since key
    }

    #[test]
    fn test_timed_policy_forces_after_max_age() {
        let mut decider = KeyFrameDecider::new(KeyFramePolicy::Timed { max_age: Duration::from_millis(5) });
        let t0 = Instant::now();
        decider.record(true, t0);
        assert!(!decider.should_force_key(t0));
        let later = t0 + Duration::from_millis(10);
        assert!(decider.should_force_key(later));
    }

    #[test]
    fn test_none_policy_never_forces_after_first_frame() {
        let mut decider = KeyFrameDecider::new(KeyFramePolicy::None);
        let now = Instant::now();
        decider.record(false, now);
        assert!(!decider.should_force_key(now));
    }
}
