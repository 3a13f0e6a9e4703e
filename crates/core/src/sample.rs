// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The media-unit data model: one video frame or one audio bundle.

use serde::{Deserialize, Serialize};

/// A sample's class: key (full GOP reference) or delta (predicted from a
/// preceding key).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleClass {
    Key,
    Delta,
}

impl SampleClass {
    pub fn other(self) -> SampleClass {
        match self {
            SampleClass::Key => SampleClass::Delta,
            SampleClass::Delta => SampleClass::Key,
        }
    }
}

/// A decoding unit: one video frame or one audio bundle, before it is
/// sliced into wire segments.
#[derive(Debug, Clone)]
pub struct Sample {
    pub class: SampleClass,
    pub sequence_no: u64,
    /// Producer-side capture/generation timestamp, monotonic clock, ms.
    pub producer_timestamp_ms: u64,
    /// Wall-clock publish timestamp, ms since epoch.
    pub publish_unix_timestamp_ms: u64,
    /// Monotonic publish timestamp, ms.
    pub publish_timestamp_ms: u64,
    /// Sample rate (fps for video, Hz-equivalent bundle rate for audio) at
    /// time of production.
    pub sample_rate: f64,
    /// For a delta, the key sample that precedes it in the same GOP; for a
    /// key, the first delta of its GOP. `None` for audio.
    pub paired_sequence_no: Option<u64>,
    /// The sample's payload, already encoded but not yet segmented.
    pub payload: Vec<u8>,
}

impl Sample {
    pub fn is_key(&self) -> bool {
        matches!(self.class, SampleClass::Key)
    }
}
