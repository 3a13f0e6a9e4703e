// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Stream and thread meta (§4.2 step 6): published under `<stream>/_meta`
//! and `<stream>/<thread>/_meta` respectively, versioned monotonically, and
//! republished only when their content actually changes.
//!
//! Two-phased so a publish failure is retried on the next invocation rather
//! than silently accepted (§4.2 "Meta failures are retried on the next
//! invocation"): [`MetaPublisher::prepare_if_changed`] borrows and does not
//! commit; [`MetaPublisher::commit`] is only called once the caller's
//! `Face::put_data` has actually succeeded.

use ndnrtc_core::segment::{CommonHeader, SegmentHeader, WireSegment};
use ndnrtc_core::{Name, Result};
use serde::Serialize;

use crate::now_unix_ms;

/// Per-thread codec parameters, published once per change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadMeta {
    pub codec: String,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

/// Per-stream thread roster, published once per change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamMeta {
    pub threads: Vec<String>,
}

/// A prepared, not-yet-committed meta publish.
pub struct PreparedMeta<T> {
    pub name: Name,
    pub wire: Vec<u8>,
    value: T,
}

/// Tracks one meta value's last-published content and version number.
pub struct MetaPublisher<T> {
    prefix: Name,
    last_published: Option<T>,
    version: u64,
}

impl<T: Serialize + Clone + PartialEq> MetaPublisher<T> {
    pub fn new(prefix: Name) -> Self {
        Self { prefix, last_published: None, version: 0 }
    }

    /// Encodes `value` as a meta wire segment addressed by the current
    /// version, if it differs from the last committed value. Does not
    /// mutate this publisher's state; call [`Self::commit`] once the
    /// caller's publish actually succeeds.
    pub fn prepare_if_changed(&self, value: T, sample_rate: f64) -> Result<Option<PreparedMeta<T>>> {
        if self.last_published.as_ref() == Some(&value) {
            return Ok(None);
        }
        let body = serde_json::to_vec(&value).map_err(|e| ndnrtc_core::NdnRtcError::Runtime(e.to_string()))?;
        let header = SegmentHeader::Common(CommonHeader {
            sample_rate,
            publish_timestamp_ms: self.version,
            publish_unix_timestamp_ms: now_unix_ms(),
        });
        let segment = WireSegment { header, payload: bytes::Bytes::from(body) };
        let name = self.prefix.clone().append(b"_meta".to_vec()).append_number(self.version);
        Ok(Some(PreparedMeta { name, wire: segment.encode(), value }))
    }

    /// Advances this publisher's state to reflect a successfully published
    /// [`PreparedMeta`]. Calling this out of order with a stale `prepared`
    /// is a caller bug, not something this module guards against.
    pub fn commit(&mut self, prepared: PreparedMeta<T>) {
        self.version += 1;
        self.last_published = Some(prepared.value);
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}
