// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Structured error types for the ndnrtc streaming engine.
//!
//! This module provides a hierarchy of error types for better error handling
//! and programmatic error inspection. Transient conditions (interest
//! timeout, nack, starvation) are never represented as `Result::Err` here —
//! they are absorbed locally and surfaced only through observer events.
//! Only conditions a caller must explicitly handle get a variant.

use thiserror::Error;

/// Main error type for ndnrtc operations.
#[derive(Debug, Error)]
pub enum NdnRtcError {
    /// Configuration or parameter validation error.
    ///
    /// Examples:
    /// - Invalid wire length (too small to fit a segment header)
    /// - Invalid parity ratio
    /// - Duplicate thread name
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A name or segment header violated the wire format. Always non-fatal:
    /// the caller drops the packet and increments a counter.
    #[error("Malformed packet: {0}")]
    Malformed(String),

    /// Signature or digest verification failed.
    #[error("Verification failed: {0}")]
    Verification(String),

    /// FEC reassembly failed: neither all data segments nor a sufficient
    /// data+parity combination were available.
    #[error("FEC recovery failed: have {available} of {required} needed shards")]
    FecUnrecoverable { available: usize, required: usize },

    /// A collaborator (signer, codec, face) reported a runtime failure.
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// I/O error from an external collaborator.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource exhaustion or limit exceeded.
    #[error("Resource exhaustion: {0}")]
    ResourceExhausted(String),
}

/// Convenience type alias for Results using `NdnRtcError`.
pub type Result<T> = std::result::Result<T, NdnRtcError>;

impl From<NdnRtcError> for String {
    fn from(err: NdnRtcError) -> Self {
        err.to_string()
    }
}

impl From<String> for NdnRtcError {
    fn from(s: String) -> Self {
        Self::Runtime(s)
    }
}

impl From<&str> for NdnRtcError {
    fn from(s: &str) -> Self {
        Self::Runtime(s.to_string())
    }
}
