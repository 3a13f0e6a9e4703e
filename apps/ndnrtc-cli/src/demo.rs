// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Wires a producer stream and a consumer pipeline together over
//! [`ndnrtc_net::sim::SimNetwork`], so the whole workspace can be exercised
//! end to end without a real NDN transport: publish a run of synthetic
//! frames, then fetch them back through the consumer's state machine.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use ndnrtc_consumer::{ConsumerKind, ConsumerPipeline, Pipeliner};
use ndnrtc_core::config::EngineConfig;
use ndnrtc_core::{parse_name, Name, Result, WireSegment};
use ndnrtc_net::{Face, SimNetwork};
use ndnrtc_producer::{
    EncodedFrame, Encoder, FrameType, KeyFramePolicy, ProducerStream, PublishOutcome, RawFrame, Signer, ThreadParams,
};

use crate::config::DemoConfig;

/// Stands in for a real capture+codec pipeline (§6 "Codec collaborator"):
/// echoes back the frame type the producer's key-frame decider asked for,
/// with a fixed-size payload so every sample fits in one segment.
struct SyntheticEncoder;

impl Encoder for SyntheticEncoder {
    fn encode(&mut self, frame: &RawFrame, force_key: bool) -> Option<EncodedFrame> {
        Some(EncodedFrame {
            frame_type: if force_key { FrameType::Key } else { FrameType::Delta },
            width: 640,
            height: 480,
            presentation_timestamp_ms: frame.timestamp_ms,
            payload: frame.data.clone(),
        })
    }
}

/// Stands in for a real KeyChain (§6 "Signer collaborator"): a real
/// deployment signs the manifest with an identity key, never a constant.
struct DemoSigner;

#[async_trait]
impl Signer for DemoSigner {
    async fn sign(&self, _data: &[u8]) -> Result<Vec<u8>> {
        Ok(vec![0xAB; 32])
    }

    async fn verify(&self, _data: &[u8], _signature: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// Outcome of one `run_demo` call.
#[derive(Debug, Clone, Default)]
pub struct DemoSummary {
    pub frames_published: u32,
    pub frames_dropped: u32,
    pub samples_delivered: u32,
    pub final_state: String,
}

impl std::fmt::Display for DemoSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "published={} dropped={} delivered={} final_state={}",
            self.frames_published, self.frames_dropped, self.samples_delivered, self.final_state
        )
    }
}

/// Publishes `demo.frame_count` synthetic frames through a producer stream,
/// then drives a consumer pipeline (audio-kind, single delta class) from
/// cold start until it has delivered roughly as many samples back, or its
/// iteration bound is hit.
pub async fn run_demo(engine: &EngineConfig, demo: &DemoConfig) -> Result<DemoSummary> {
    let base = Name::from_components([b"ndnrtc".to_vec(), b"demo".to_vec()]);
    let net = SimNetwork::new();
    let face = net.face();

    let mut producer = ProducerStream::new(base.clone(), demo.stream.clone());
    let thread_params = ThreadParams {
        name: demo.thread.clone(),
        codec_name: "vp8".into(),
        sample_rate: demo.fps,
        key_frame_policy: KeyFramePolicy::None,
        segmenter: engine.segmenter,
        freshness: engine.freshness,
    };
    producer.add_thread(thread_params, Box::new(SyntheticEncoder), Arc::new(DemoSigner))?;

    let period_ms = if demo.fps > 0.0 { 1000.0 / demo.fps } else { 33.3 };
    let mut published = 0u32;
    let mut dropped = 0u32;
    for frame_no in 0..demo.frame_count {
        let frame = RawFrame {
            timestamp_ms: (f64::from(frame_no) * period_ms) as u64,
            data: Bytes::from(vec![0x42_u8; demo.payload_bytes]),
        };
        let outcomes = producer.on_raw_frame(frame, &face).await?;
        for (_thread, outcome) in outcomes {
            match outcome {
                PublishOutcome::Published { .. } => published += 1,
                PublishOutcome::Dropped | PublishOutcome::SignatureFailed => dropped += 1,
            }
        }
    }
    tracing::info!(published, dropped, "producer finished publishing demo frames");

    let pipeliner = Pipeliner::new(base, demo.stream.clone(), demo.thread.clone(), Duration::from_millis(500));
    let mut pipeline = ConsumerPipeline::new(*engine, ConsumerKind::Audio, pipeliner, period_ms);

    let mut pending = VecDeque::new();
    if let Some(interest) = pipeline.start() {
        pending.push_back(interest);
    }

    let mut delivered = 0u32;
    let max_iterations = demo.frame_count.saturating_mul(4).max(8);
    let mut iterations = 0u32;
    while let Some(interest) = pending.pop_front() {
        iterations += 1;
        if iterations > max_iterations {
            tracing::warn!("demo consumer loop hit its iteration bound, stopping early");
            break;
        }

        match face.express_interest(interest).await {
            Ok(data) => {
                let Ok(info) = parse_name(&data.name) else {
                    continue;
                };
                let Ok(wire) = WireSegment::decode(&data.content) else {
                    continue;
                };
                let is_first_of_sample = info.seg_no == 0;
                if is_first_of_sample {
                    delivered += 1;
                }
                let (_receipt, next_interests) = pipeline.on_segment(wire, info, is_first_of_sample);
                pending.extend(next_interests);
            },
            Err(err) => {
                tracing::debug!(%err, "demo interest did not resolve, treating as starvation");
                let next_interests = pipeline.on_starvation();
                pending.extend(next_interests);
                break;
            },
        }

        if delivered + 1 >= demo.frame_count {
            break;
        }
    }

    Ok(DemoSummary {
        frames_published: published,
        frames_dropped: dropped,
        samples_delivered: delivered,
        final_state: format!("{:?}", pipeline.state_machine.state()),
    })
}
