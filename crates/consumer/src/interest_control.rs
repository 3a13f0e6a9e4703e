// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Pipeline window arithmetic (§4.5): enforces a window on outstanding
//! interests per thread so that `limit * samplePeriodMs ~= DRD`, with a
//! pluggable strategy for how the window grows, shrinks, and re-centers.

use ndnrtc_core::config::InterestControlConfig;

/// Capability set a window-sizing strategy must provide (§9 "pluggable
/// strategies": a small trait, not an inheritance chain).
pub trait InterestControlStrategy: Send {
    /// Computes `(lowerLimit, upperLimit)` from the current DRD estimate
    /// and the stream's sample period.
    fn get_limits(&self, drd_mean_ms: f64, drd_stddev_ms: f64, sample_period_ms: f64) -> (u32, u32);
    /// Signed delta applied to the limit on a growth event.
    fn burst(&self, current_limit: u32) -> i64;
    /// Signed delta applied to the limit on a shrink event.
    fn withhold(&self, current_limit: u32, lower_limit: u32) -> i64;
}

/// The reference strategy from §4.5: `lower = max(3, ceil((mean + 4*stddev)
/// / period))`, `upper = 8 * lower`, `burst = ceil(limit/2)`,
/// `withhold = -floor((limit - lower)/2)`.
pub struct StrategyDefault {
    config: InterestControlConfig,
}

impl StrategyDefault {
    pub fn new(config: InterestControlConfig) -> Self {
        Self { config }
    }
}

impl InterestControlStrategy for StrategyDefault {
    fn get_limits(&self, drd_mean_ms: f64, drd_stddev_ms: f64, sample_period_ms: f64) -> (u32, u32) {
        let raw = ((drd_mean_ms + 4.0 * drd_stddev_ms) / sample_period_ms).ceil();
        let lower = (raw.max(0.0) as u32).max(self.config.min_pipeline_size);
        let upper = lower * self.config.upper_limit_multiplier;
        (lower, upper)
    }

    fn burst(&self, current_limit: u32) -> i64 {
        ((current_limit as f64) / 2.0).ceil() as i64
    }

    fn withhold(&self, current_limit: u32, lower_limit: u32) -> i64 {
        let span = current_limit.saturating_sub(lower_limit) as f64;
        -((span / 2.0).floor() as i64)
    }
}

/// Per-thread outstanding-interest window.
pub struct InterestControl {
    strategy: Box<dyn InterestControlStrategy>,
    pipeline: u32,
    limit: u32,
    lower_limit: u32,
    upper_limit: u32,
}

impl InterestControl {
    pub fn new(strategy: Box<dyn InterestControlStrategy>, initial_limit: u32) -> Self {
        Self { strategy, pipeline: 0, limit: initial_limit, lower_limit: initial_limit, upper_limit: initial_limit }
    }

    pub fn pipeline(&self) -> u32 {
        self.pipeline
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn lower_limit(&self) -> u32 {
        self.lower_limit
    }

    pub fn upper_limit(&self) -> u32 {
        self.upper_limit
    }

    /// Outstanding room before the limit is hit.
    pub fn room(&self) -> u32 {
        self.limit.saturating_sub(self.pipeline)
    }

    /// Fails (returns false, pipeline unchanged) once `pipeline >= limit`.
    pub fn increment(&mut self) -> bool {
        if self.pipeline >= self.limit {
            return false;
        }
        self.pipeline += 1;
        true
    }

    /// Never drops the pipeline below zero.
    pub fn decrement(&mut self) {
        self.pipeline = self.pipeline.saturating_sub(1);
    }

    pub fn burst(&mut self) {
        let delta = self.strategy.burst(self.limit);
        self.apply_delta(delta);
        tracing::debug!(limit = self.limit, "interest window burst");
    }

    pub fn withhold(&mut self) {
        let delta = self.strategy.withhold(self.limit, self.lower_limit);
        self.apply_delta(delta);
        tracing::debug!(limit = self.limit, "interest window withheld");
    }

    /// Recomputes `lowerLimit`/`upperLimit` from the latest DRD estimate and
    /// clamps the current limit back into range.
    pub fn mark_lower_limit(&mut self, drd_mean_ms: f64, drd_stddev_ms: f64, sample_period_ms: f64) {
        let (lower, upper) = self.strategy.get_limits(drd_mean_ms, drd_stddev_ms, sample_period_ms);
        if lower != self.lower_limit || upper != self.upper_limit {
            tracing::debug!(lower, upper, drd_mean_ms, "interest window limits recomputed");
        }
        self.lower_limit = lower;
        self.upper_limit = upper;
        self.limit = self.limit.clamp(lower, upper);
    }

    fn apply_delta(&mut self, delta: i64) {
        let new_limit = (i64::from(self.limit) + delta).clamp(i64::from(self.lower_limit), i64::from(self.upper_limit));
        self.limit = new_limit as u32;
    }

    pub fn reset(&mut self) {
        self.pipeline = 0;
        self.limit = self.lower_limit;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_3_pipeline_growth_limits() {
        let strategy = StrategyDefault::new(InterestControlConfig::default());
        let (lower, upper) = strategy.get_limits(250.0, 0.0, 1000.0 / 30.0);
        assert_eq!(lower, 8);
        assert_eq!(upper, 64);
    }

    #[test]
    fn test_increment_fails_at_limit() {
        let strategy = StrategyDefault::new(InterestControlConfig::default());
        let mut control = InterestControl::new(Box::new(strategy), 2);
        assert!(control.increment());
        assert!(control.increment());
        assert!(!control.increment());
        assert_eq!(control.room(), 0);
    }

    #[test]
    fn test_decrement_never_goes_below_zero() {
        let strategy = StrategyDefault::new(InterestControlConfig::default());
        let mut control = InterestControl::new(Box::new(strategy), 4);
        control.decrement();
        control.decrement();
        assert_eq!(control.pipeline(), 0);
    }

    #[test]
    fn test_mark_lower_limit_clamps_existing_limit() {
        let strategy = StrategyDefault::new(InterestControlConfig::default());
        let mut control = InterestControl::new(Box::new(strategy), 3);
        control.mark_lower_limit(250.0, 0.0, 1000.0 / 30.0);
        assert_eq!(control.lower_limit(), 8);
        assert_eq!(control.limit(), 8); // clamped up from 3
    }

    #[test]
    fn test_burst_and_withhold_move_limit_within_bounds() {
        let strategy = StrategyDefault::new(InterestControlConfig::default());
        let mut control = InterestControl::new(Box::new(strategy), 8);
        control.mark_lower_limit(250.0, 0.0, 1000.0 / 30.0); // lower=8, upper=64
        control.burst();
        assert_eq!(control.limit(), 12); // 8 + ceil(8/2)
        control.withhold();
        control.withhold();
        assert!(control.limit() >= control.lower_limit());
    }
}
