// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Encoder and signer collaborator traits (§6): the producer core never
//! assumes a concrete codec or keychain, only these narrow interfaces.

use async_trait::async_trait;
use bytes::Bytes;

use ndnrtc_core::Result;

/// One unencoded capture unit handed to [`Encoder::encode`].
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Capture-side monotonic timestamp, ms.
    pub timestamp_ms: u64,
    pub data: Bytes,
}

/// Frame type as reported by the encoder, driving GOP/pairing bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Key,
    Delta,
}

/// One encoded frame, ready to be wrapped into a [`ndnrtc_core::Sample`].
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub frame_type: FrameType,
    pub width: u32,
    pub height: u32,
    /// Presentation timestamp, ms, as assigned by the encoder.
    pub presentation_timestamp_ms: u64,
    pub payload: Bytes,
}

/// The codec collaborator (§6 "Codec collaborator"). Implementations own
/// their own state (rate control, reference frames); `encode` may return
/// `None` to signal a dropped frame (e.g. to meet a bitrate target).
/// Converting a raw capture frame to the codec's native pixel format is the
/// implementation's responsibility.
pub trait Encoder: Send {
    fn encode(&mut self, frame: &RawFrame, force_key: bool) -> Option<EncodedFrame>;
}

/// The signer collaborator (§6 "Signer collaborator"). Async because
/// signing is a named suspension point for the producer (§5).
#[async_trait]
pub trait Signer: Send + Sync {
    async fn sign(&self, data: &[u8]) -> Result<Vec<u8>>;
    async fn verify(&self, data: &[u8], signature: &[u8]) -> Result<()>;
}
