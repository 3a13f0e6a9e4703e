// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Observes the stream and emits one of `Keep`/`Increase`/`Decrease` for the
//! pipeline-control state machine to act on (§4.6), built from a stability
//! estimator and a DRD-change estimator.

use std::time::{Duration, Instant};

use ndnrtc_core::config::LatencyControlConfig;
use ndnrtc_core::estimators::{Average, EstimatorWindow, SampleWindow};

/// Command the state machine should apply to the interest window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustCommand {
    Keep,
    Increase,
    Decrease,
}

/// Measures inter-arrival intervals of first-segment-of-sample events via
/// two chained sliding means: `m1` over the last N intervals, `m2` over the
/// N-old values (a lagged snapshot of `m1` taken every N samples).
pub struct StabilityEstimator {
    m1: Average,
    rotation: SampleWindow,
    m2_value: f64,
    target_period_ms: f64,
    epsilon1: f64,
    epsilon2: f64,
    min_occurrences: u32,
    stable_count: u32,
    last_arrival: Option<Instant>,
}

impl StabilityEstimator {
    pub fn new(config: &LatencyControlConfig, target_period_ms: f64) -> Self {
        Self {
            m1: Average::new(config.stability_window_samples),
            rotation: SampleWindow::new(config.stability_window_samples),
            m2_value: target_period_ms,
            target_period_ms,
            epsilon1: config.stability_epsilon1,
            epsilon2: config.stability_epsilon2,
            min_occurrences: config.min_stable_occurrences,
            stable_count: 0,
            last_arrival: None,
        }
    }

    /// Records a first-segment-of-sample arrival and returns whether the
    /// stream is currently stable (>= `min_occurrences` consecutive stable
    /// observations).
    pub fn on_first_segment_arrival(&mut self) -> bool {
        let now = Instant::now();
        let Some(last) = self.last_arrival.replace(now) else {
            return false;
        };
        let interval_ms = now.duration_since(last).as_secs_f64() * 1000.0;
        if self.rotation.is_limit_reached() {
            self.m2_value = self.m1.value();
        }
        self.m1.new_value(interval_ms);

        let m1 = self.m1.value();
        let m2 = if self.m2_value > 0.0 { self.m2_value } else { m1 };
        let ratio_ok = (m1 / m2 - 1.0).abs() <= self.epsilon1;
        let period_ok = 1.0 - (m1 - self.target_period_ms).abs() / self.target_period_ms >= self.epsilon2;

        if ratio_ok && period_ok {
            self.stable_count += 1;
        } else {
            self.stable_count = 0;
        }
        self.stable_count >= self.min_occurrences
    }
}

/// Latches onto DRD deviations from the running mean: a deviation
/// `>= major_threshold` that exceeds `minor_threshold` counts as a change
/// immediately; one between the two thresholds needs `min_occurrences`
/// consecutive observations. Flags at most one change per consecutive run.
pub struct DrdChangeEstimator {
    minor_run: u32,
    min_occurrences: u32,
    major_threshold: f64,
    minor_threshold: f64,
    latched: bool,
}

impl DrdChangeEstimator {
    pub fn new(config: &LatencyControlConfig) -> Self {
        Self {
            minor_run: 0,
            min_occurrences: config.drd_change_min_occurrences,
            major_threshold: config.drd_change_major_threshold,
            minor_threshold: config.drd_change_minor_threshold,
            latched: false,
        }
    }

    pub fn on_drd_update(&mut self, latest_ms: f64, mean_ms: f64) -> bool {
        if mean_ms <= 0.0 {
            return false;
        }
        let deviation = (latest_ms - mean_ms).abs() / mean_ms;

        if deviation < self.major_threshold {
            self.minor_run = 0;
            self.latched = false;
            return false;
        }

        if deviation > self.minor_threshold {
            self.minor_run = 0;
            if self.latched {
                return false;
            }
            self.latched = true;
            tracing::debug!(latest_ms, mean_ms, deviation, "drd change latched (major)");
            return true;
        }

        self.minor_run += 1;
        if self.minor_run >= self.min_occurrences && !self.latched {
            self.latched = true;
            tracing::debug!(latest_ms, mean_ms, deviation, "drd change latched (minor, consecutive)");
            return true;
        }
        false
    }
}

/// What the decision loop is currently waiting to observe before it is
/// allowed to emit its next (non-`Keep`) command. Occupied only once a
/// `Decrease`/`Increase` has actually been emitted — never by merely being
/// unstable, which is tracked separately by `window_since` below.
enum Awaiting {
    None,
    Change(Instant),
    Stability(Instant),
}

/// Decision loop invoked on every sample-arrival event (§4.6).
pub struct LatencyControl {
    stability: StabilityEstimator,
    drd_change: DrdChangeEstimator,
    awaiting: Awaiting,
    /// Start of the current unstable run; the "window-timer" §4.6 refers to
    /// for the unstable branch. Independent of `awaiting`, which only ever
    /// tracks what happens after a command has already been emitted.
    window_since: Option<Instant>,
    await_change_timeout: Duration,
    await_stability_timeout: Duration,
}

impl LatencyControl {
    pub fn new(config: &LatencyControlConfig, target_period_ms: f64) -> Self {
        Self {
            stability: StabilityEstimator::new(config, target_period_ms),
            drd_change: DrdChangeEstimator::new(config),
            awaiting: Awaiting::None,
            window_since: None,
            await_change_timeout: Duration::from_millis(config.await_change_timeout_ms),
            await_stability_timeout: Duration::from_millis(config.await_stability_timeout_ms),
        }
    }

    /// Feeds one first-segment-of-sample arrival and the latest DRD sample,
    /// returning the command for this tick.
    pub fn on_sample_arrival(&mut self, latest_drd_ms: f64, drd_mean_ms: f64) -> AdjustCommand {
        let is_stable = self.stability.on_first_segment_arrival();
        let changed = self.drd_change.on_drd_update(latest_drd_ms, drd_mean_ms);
        let now = Instant::now();

        let command = if is_stable {
            self.window_since = None;
            match self.awaiting {
                Awaiting::Change(since) => {
                    if changed {
                        self.awaiting = Awaiting::Stability(now);
                        AdjustCommand::Keep
                    } else if now.duration_since(since) >= self.await_change_timeout {
                        self.awaiting = Awaiting::Change(now);
                        AdjustCommand::Decrease
                    } else {
                        AdjustCommand::Keep
                    }
                },
                Awaiting::None | Awaiting::Stability(_) => {
                    self.awaiting = Awaiting::Change(now);
                    AdjustCommand::Decrease
                },
            }
        } else {
            let since = *self.window_since.get_or_insert(now);
            if now.duration_since(since) >= self.await_stability_timeout {
                self.window_since = Some(now);
                self.awaiting = Awaiting::Stability(now);
                AdjustCommand::Increase
            } else {
                AdjustCommand::Keep
            }
        };

        if command != AdjustCommand::Keep {
            tracing::debug!(?command, is_stable, changed, "latency control decision");
        }
        command
    }

    pub fn reset(&mut self) {
        self.awaiting = Awaiting::None;
        self.window_since = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_scenario_4_stability_emits_decrease_exactly_once() {
        let config = LatencyControlConfig::default();
        let mut control = LatencyControl::new(&config, 33.3);

        let mut decreases = 0;
        for _ in 0..12 {
            sleep(Duration::from_millis(33));
            if control.on_sample_arrival(250.0, 250.0) == AdjustCommand::Decrease {
                decreases += 1;
            }
        }
        assert_eq!(decreases, 1);
    }

    #[test]
    fn test_drd_change_major_deviation_counts_immediately() {
        let config = LatencyControlConfig::default();
        let mut estimator = DrdChangeEstimator::new(&config);
        assert!(estimator.on_drd_update(400.0, 100.0)); // 300% deviation, way past minor threshold
    }

    #[test]
    fn test_drd_change_minor_deviation_needs_consecutive_occurrences() {
        let config = LatencyControlConfig::default();
        let mut estimator = DrdChangeEstimator::new(&config);
        // 10% deviation: between 8% major floor and 20% minor ceiling.
        assert!(!estimator.on_drd_update(110.0, 100.0));
        assert!(!estimator.on_drd_update(110.0, 100.0));
        assert!(estimator.on_drd_update(110.0, 100.0)); // 3rd consecutive (default min_occurrences)
    }

    #[test]
    fn test_drd_change_resets_below_major_threshold() {
        let config = LatencyControlConfig::default();
        let mut estimator = DrdChangeEstimator::new(&config);
        estimator.on_drd_update(110.0, 100.0);
        assert!(!estimator.on_drd_update(101.0, 100.0)); // back under 8%, resets the run
    }
}
