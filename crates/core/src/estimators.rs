// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Sliding-window statistics (§2 leaf-dependency item 2): average, deviation,
//! and frequency estimators shared by the DRD estimator, the stability
//! estimator, and the DRD-change estimator.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Defines the interval over which an estimator slides, either in number of
/// samples or in wall-clock time. Both satisfy the same `is_limit_reached`
/// contract (§4.4 "Window: time-based or sample-based").
pub trait EstimatorWindow {
    /// Must be called every time the estimator receives a new value.
    /// Returns true once the window's limit has been reached.
    fn is_limit_reached(&mut self) -> bool;
}

/// A window bounded by a fixed number of samples.
pub struct SampleWindow {
    n_samples: usize,
    remaining: usize,
}

impl SampleWindow {
    pub fn new(n_samples: usize) -> Self {
        assert!(n_samples > 0, "SampleWindow requires n_samples > 0");
        Self { n_samples, remaining: n_samples }
    }
}

impl EstimatorWindow for SampleWindow {
    fn is_limit_reached(&mut self) -> bool {
        if self.remaining > 0 {
            self.remaining -= 1;
        }
        if self.remaining == 0 {
            self.remaining = self.n_samples;
            true
        } else {
            false
        }
    }
}

/// A window bounded by wall-clock duration.
pub struct TimeWindow {
    period: Duration,
    last_reach: Option<Instant>,
}

impl TimeWindow {
    pub fn new(period: Duration) -> Self {
        Self { period, last_reach: None }
    }
}

impl EstimatorWindow for TimeWindow {
    fn is_limit_reached(&mut self) -> bool {
        let now = Instant::now();
        match self.last_reach {
            None => {
                self.last_reach = Some(now);
                false
            },
            Some(last) if now.duration_since(last) >= self.period => {
                self.last_reach = Some(now);
                true
            },
            Some(_) => false,
        }
    }
}

/// Sliding-window average and deviation estimator, bounded to the most
/// recent `capacity` samples (§4.4 "average, deviation, frequency").
pub struct Average {
    capacity: usize,
    samples: VecDeque<f64>,
    sum: f64,
}

impl Average {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Average requires capacity > 0");
        Self { capacity, samples: VecDeque::with_capacity(capacity), sum: 0.0 }
    }

    /// Seeds the estimator with an initial value so callers have a sane
    /// estimate before real samples accumulate (§4.4 "initial seed value").
    pub fn with_seed(capacity: usize, seed: f64) -> Self {
        let mut avg = Self::new(capacity);
        avg.new_value(seed);
        avg
    }

    pub fn new_value(&mut self, value: f64) {
        if self.samples.len() == self.capacity {
            if let Some(oldest) = self.samples.pop_front() {
                self.sum -= oldest;
            }
        }
        self.samples.push_back(value);
        self.sum += value;
    }

    pub fn count(&self) -> usize {
        self.samples.len()
    }

    pub fn value(&self) -> f64 {
        if self.samples.is_empty() {
            0.0
        } else {
            self.sum / self.samples.len() as f64
        }
    }

    pub fn variance(&self) -> f64 {
        if self.samples.len() < 2 {
            return 0.0;
        }
        let mean = self.value();
        let sq_sum: f64 = self.samples.iter().map(|v| (v - mean).powi(2)).sum();
        sq_sum / self.samples.len() as f64
    }

    pub fn deviation(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn oldest_value(&self) -> f64 {
        self.samples.front().copied().unwrap_or(0.0)
    }

    pub fn latest_value(&self) -> f64 {
        self.samples.back().copied().unwrap_or(0.0)
    }
}

/// Measures the average frequency (per second) of new-value occurrences,
/// updated every time the window elapses.
pub struct FreqMeter {
    window: TimeWindow,
    n_calls: u64,
    value: f64,
    period_start: Instant,
}

impl FreqMeter {
    pub fn new(period: Duration) -> Self {
        Self { window: TimeWindow::new(period), n_calls: 0, value: 0.0, period_start: Instant::now() }
    }

    /// Records an occurrence; the passed value is otherwise unused, matching
    /// the original's "value is ignored, only the call rate matters".
    pub fn tick(&mut self) {
        self.n_calls += 1;
        if self.window.is_limit_reached() {
            let elapsed = self.period_start.elapsed().as_secs_f64().max(f64::EPSILON);
            self.value = self.n_calls as f64 / elapsed;
            self.n_calls = 0;
            self.period_start = Instant::now();
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

/// Exponential moving-average low-pass filter.
pub struct Filter {
    smoothing: f64,
    value: f64,
    initialized: bool,
}

impl Filter {
    pub fn new(smoothing: f64) -> Self {
        Self { smoothing, value: 0.0, initialized: false }
    }

    pub fn new_value(&mut self, value: f64) {
        if !self.initialized {
            self.value = value;
            self.initialized = true;
        } else {
            self.value = self.smoothing * value + (1.0 - self.smoothing) * self.value;
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

impl Default for Filter {
    fn default() -> Self {
        Self::new(1.0 / 8.0)
    }
}
