// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Producer-side encode/sign/publish pipeline for the ndnrtc streaming engine.
//!
//! A [`stream::ProducerStream`] owns one or more [`thread::ProducerThread`]s
//! (independent encoding ladders of the same source); each raw frame fed in
//! through [`stream::ProducerStream::on_raw_frame`] runs the full per-frame
//! algorithm (§4.2): encode, force-key decision, slice, FEC parity,
//! manifest, sign, meta, publish.

pub mod collaborator;
pub mod key_frame;
pub mod meta;
pub mod stream;
pub mod thread;

pub use collaborator::{EncodedFrame, Encoder, FrameType, RawFrame, Signer};
pub use key_frame::{KeyFrameDecider, KeyFramePolicy};
pub use meta::{MetaPublisher, StreamMeta, ThreadMeta};
pub use stream::ProducerStream;
pub use thread::{ProducerThread, PublishOutcome, ThreadParams};

use std::time::{SystemTime, UNIX_EPOCH};

pub(crate) fn now_unix_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}
