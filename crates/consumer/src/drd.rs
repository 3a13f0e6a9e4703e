// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Data Retrieval Delay estimation: separate sliding-window averages for
//! original (first-time) and cached answers.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use ndnrtc_core::config::DrdEstimatorConfig;

/// A time-windowed mean: retains samples no older than `window`, seeded
/// with an initial value until real samples accumulate.
struct TimeWindowedAverage {
    window: Duration,
    seed: f64,
    samples: VecDeque<(Instant, f64)>,
}

impl TimeWindowedAverage {
    fn new(window: Duration, seed: f64) -> Self {
        Self { window, seed, samples: VecDeque::new() }
    }

    fn push(&mut self, value: f64) {
        let now = Instant::now();
        self.samples.push_back((now, value));
        while let Some(&(ts, _)) = self.samples.front() {
            if now.duration_since(ts) > self.window {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return self.seed;
        }
        self.samples.iter().map(|(_, v)| v).sum::<f64>() / self.samples.len() as f64
    }

    fn stddev(&self) -> f64 {
        if self.samples.len() < 2 {
            return 0.0;
        }
        let mean = self.mean();
        let var = self.samples.iter().map(|(_, v)| (v - mean).powi(2)).sum::<f64>() / self.samples.len() as f64;
        var.sqrt()
    }
}

/// Observer callbacks fired as new DRD samples arrive.
pub trait DrdObserver: Send {
    fn on_drd_update(&mut self, _original_ms: f64, _cached_ms: f64) {}
    fn on_original_drd_update(&mut self, _value_ms: f64) {}
    fn on_cached_drd_update(&mut self, _value_ms: f64) {}
}

/// Process-wide DRD estimator: maintains the original and cached sliding
/// averages and notifies observers on every update.
pub struct DrdEstimator {
    config: DrdEstimatorConfig,
    original: TimeWindowedAverage,
    cached: TimeWindowedAverage,
    observers: Vec<Box<dyn DrdObserver>>,
}

impl DrdEstimator {
    pub fn new(config: DrdEstimatorConfig) -> Self {
        let window = Duration::from_millis(config.window_ms);
        Self {
            original: TimeWindowedAverage::new(window, config.initial_estimation_ms),
            cached: TimeWindowedAverage::new(window, config.initial_estimation_ms),
            config,
            observers: Vec::new(),
        }
    }

    pub fn add_observer(&mut self, observer: Box<dyn DrdObserver>) {
        self.observers.push(observer);
    }

    /// An answer is original iff its `generation_delay_ms` is not small
    /// relative to round-trip, i.e. at or above the cached threshold.
    pub fn is_original(&self, generation_delay_ms: u32) -> bool {
        generation_delay_ms >= self.config.cached_threshold_ms
    }

    pub fn new_value(&mut self, drd_ms: f64, is_original: bool) {
        if is_original {
            self.original.push(drd_ms);
            for observer in &mut self.observers {
                observer.on_original_drd_update(drd_ms);
            }
        } else {
            self.cached.push(drd_ms);
            for observer in &mut self.observers {
                observer.on_cached_drd_update(drd_ms);
            }
        }
        let (original_mean, cached_mean) = (self.original.mean(), self.cached.mean());
        for observer in &mut self.observers {
            observer.on_drd_update(original_mean, cached_mean);
        }
    }

    pub fn original_estimation(&self) -> f64 {
        self.original.mean()
    }

    pub fn cached_estimation(&self) -> f64 {
        self.cached.mean()
    }

    pub fn original_stddev(&self) -> f64 {
        self.original.stddev()
    }
}
