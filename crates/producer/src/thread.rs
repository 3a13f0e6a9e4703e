// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! One encoding ladder's worth of producer state (§4.2): owns the encoder,
//! the key-frame policy, per-class sequence numbers, and the thread meta
//! publisher, and runs the full per-frame publish algorithm.

use std::time::Instant;

use ndnrtc_core::config::{FreshnessConfig, SegmenterConfig};
use ndnrtc_core::manifest::Manifest;
use ndnrtc_core::name::SegmentType;
use ndnrtc_core::segment::{self, VideoFrameSegmentHeader};
use ndnrtc_core::{Name, NamespaceInfo, Result, Sample, SampleClass};
use ndnrtc_net::Face;

use crate::collaborator::{Encoder, FrameType, RawFrame, Signer};
use crate::key_frame::{KeyFrameDecider, KeyFramePolicy};
use crate::meta::{MetaPublisher, ThreadMeta};

/// What happened to one raw frame fed through [`ProducerThread::publish_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The encoder dropped the frame (e.g. to hold a bitrate target).
    Dropped,
    /// The encoder produced a frame but the signer failed; nothing was
    /// published. Fatal only for this frame (§4.2 "Failure semantics").
    SignatureFailed,
    Published { playback_no: u32, sample_no: u64, class: SampleClass },
}

/// Parameters for [`crate::stream::ProducerStream::add_thread`].
pub struct ThreadParams {
    pub name: String,
    pub codec_name: String,
    pub sample_rate: f64,
    pub key_frame_policy: KeyFramePolicy,
    pub segmenter: SegmenterConfig,
    pub freshness: FreshnessConfig,
}

pub struct ProducerThread {
    name: String,
    stream: String,
    base_prefix: Name,
    codec_name: String,
    sample_rate: f64,
    segmenter: SegmenterConfig,
    freshness: FreshnessConfig,

    encoder: Box<dyn Encoder>,
    signer: std::sync::Arc<dyn Signer>,
    key_frame: KeyFrameDecider,
    thread_meta: MetaPublisher<ThreadMeta>,

    next_key_seq: u64,
    next_delta_seq: u64,
    last_key_seq: Option<u64>,
    next_playback_no: u32,
    dropped_frames: u64,

    started_at: Instant,
}

impl ProducerThread {
    pub fn new(
        base_prefix: Name,
        stream: String,
        params: ThreadParams,
        encoder: Box<dyn Encoder>,
        signer: std::sync::Arc<dyn Signer>,
    ) -> Self {
        let thread_prefix = base_prefix.clone().append(stream.as_bytes().to_vec()).append(params.name.as_bytes().to_vec());
        Self {
            name: params.name,
            stream,
            base_prefix,
            codec_name: params.codec_name,
            sample_rate: params.sample_rate,
            segmenter: params.segmenter,
            freshness: params.freshness,
            encoder,
            signer,
            key_frame: KeyFrameDecider::new(params.key_frame_policy),
            thread_meta: MetaPublisher::new(thread_prefix),
            next_key_seq: 0,
            next_delta_seq: 0,
            last_key_seq: None,
            next_playback_no: 0,
            dropped_frames: 0,
            started_at: Instant::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    fn thread_prefix(&self) -> Name {
        self.base_prefix.clone().append(self.stream.as_bytes().to_vec()).append(self.name.as_bytes().to_vec())
    }

    fn monotonic_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    fn freshness_for(&self, class: SampleClass) -> u64 {
        match class {
            SampleClass::Key => self.freshness.key_sample_ms,
            SampleClass::Delta => self.freshness.delta_sample_ms,
        }
    }

    /// Runs the full per-frame algorithm (§4.2 "Algorithm per frame") and
    /// publishes the result through `face`. Image format conversion to the
    /// codec's native pixel format is the encoder's own responsibility.
    pub async fn publish_frame(&mut self, frame: RawFrame, face: &dyn Face) -> Result<PublishOutcome> {
        let now = Instant::now();
        let force_key = self.key_frame.should_force_key(now);

        let Some(encoded) = self.encoder.encode(&frame, force_key) else {
            self.dropped_frames += 1;
            return Ok(PublishOutcome::Dropped);
        };
        let is_key = matches!(encoded.frame_type, FrameType::Key);
        self.key_frame.record(is_key, now);

        let class = if is_key { SampleClass::Key } else { SampleClass::Delta };
        let sample_no = if is_key { self.next_key_seq } else { self.next_delta_seq };
        let paired_sequence_no = if is_key { self.next_delta_seq } else { self.last_key_seq.unwrap_or(0) };
        let playback_no = self.next_playback_no;

        let sample = Sample {
            class,
            sequence_no: sample_no,
            producer_timestamp_ms: frame.timestamp_ms,
            publish_timestamp_ms: self.monotonic_ms(),
            publish_unix_timestamp_ms: crate::now_unix_ms(),
            sample_rate: self.sample_rate,
            paired_sequence_no: Some(paired_sequence_no),
            payload: encoded.payload.to_vec(),
        };

        let header_template = VideoFrameSegmentHeader {
            interest_nonce: 0,
            interest_arrival_ms: 0,
            generation_delay_ms: 0,
            total_segments_num: 0,
            playback_no,
            paired_sequence_no: u32::try_from(paired_sequence_no).unwrap_or(u32::MAX),
            parity_segments_num: 0,
        };
        let data_segments = segment::slice(&sample.payload, self.segmenter.wire_len, header_template)?;
        let parity_segments = if self.segmenter.fec_enabled {
            segment::make_parity(&data_segments, self.segmenter.parity_ratio)?
        } else {
            Vec::new()
        };

        let mut manifest = Manifest::build(sample_no, &data_segments, &parity_segments);
        match self.signer.sign(&manifest.signable_bytes()).await {
            Ok(signature) => manifest.signature = Some(signature),
            Err(err) => {
                tracing::warn!(thread = %self.name, sample_no, "signing failed, dropping sample: {err}");
                return Ok(PublishOutcome::SignatureFailed);
            },
        }

        let thread_prefix = self.thread_prefix();
        let freshness_ms = self.freshness_for(class);
        for (seg_no, seg) in data_segments.iter().enumerate() {
            let name = self.segment_name(&thread_prefix, class, sample_no, SegmentType::Data, seg_no as u64);
            face.put_data(name, bytes::Bytes::from(seg.encode()), freshness_ms)
                .await
                .map_err(|e| ndnrtc_core::NdnRtcError::Runtime(e.to_string()))?;
        }
        for (seg_no, seg) in parity_segments.iter().enumerate() {
            let name = self.segment_name(&thread_prefix, class, sample_no, SegmentType::Parity, seg_no as u64);
            face.put_data(name, bytes::Bytes::from(seg.encode()), freshness_ms)
                .await
                .map_err(|e| ndnrtc_core::NdnRtcError::Runtime(e.to_string()))?;
        }
        let manifest_name = self.segment_name(&thread_prefix, class, sample_no, SegmentType::Manifest, 0);
        face.put_data(manifest_name, bytes::Bytes::from(manifest.encode()), freshness_ms)
            .await
            .map_err(|e| ndnrtc_core::NdnRtcError::Runtime(e.to_string()))?;

        self.publish_thread_meta_if_changed(face).await?;

        if is_key {
            self.last_key_seq = Some(sample_no);
            self.next_key_seq += 1;
        } else {
            self.next_delta_seq += 1;
        }
        self.next_playback_no += 1;

        tracing::debug!(thread = %self.name, ?class, sample_no, playback_no, "published sample");
        Ok(PublishOutcome::Published { playback_no, sample_no, class })
    }

    fn segment_name(
        &self,
        thread_prefix: &Name,
        class: SampleClass,
        sample_no: u64,
        segment_type: SegmentType,
        seg_no: u64,
    ) -> Name {
        NamespaceInfo {
            base_prefix: thread_prefix.prefix(thread_prefix.len() - 2),
            stream: self.stream.clone(),
            thread: self.name.clone(),
            class,
            sample_no,
            segment_type,
            seg_no,
        }
        .into_name()
    }

    async fn publish_thread_meta_if_changed(&mut self, face: &dyn Face) -> Result<()> {
        let meta = ThreadMeta { codec: self.codec_name.clone(), width: 0, height: 0, fps: self.sample_rate };
        let Some(prepared) = self.thread_meta.prepare_if_changed(meta, self.sample_rate)? else {
            return Ok(());
        };
        match face.put_data(prepared.name.clone(), bytes::Bytes::from(prepared.wire.clone()), self.freshness.meta_ms).await
        {
            Ok(()) => {
                self.thread_meta.commit(prepared);
                Ok(())
            },
            Err(err) => {
                // Left uncommitted: next publish_frame call retries.
                tracing::warn!(thread = %self.name, "thread meta publish failed, will retry: {err}");
                Ok(())
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::EncodedFrame;
    use async_trait::async_trait;
    use ndnrtc_net::sim::SimNetwork;

    struct AlwaysEncode {
        force_counted: u32,
    }

    impl Encoder for AlwaysEncode {
        fn encode(&mut self, frame: &RawFrame, force_key: bool) -> Option<EncodedFrame> {
            if force_key {
                self.force_counted += 1;
            }
            Some(EncodedFrame {
                frame_type: if force_key { FrameType::Key } else { FrameType::Delta },
                width: 640,
                height: 480,
                presentation_timestamp_ms: frame.timestamp_ms,
                payload: frame.data.clone(),
            })
        }
    }

    struct DroppingEncoder;
    impl Encoder for DroppingEncoder {
        fn encode(&mut self, _frame: &RawFrame, _force_key: bool) -> Option<EncodedFrame> {
            None
        }
    }

    struct NullSigner;
    #[async_trait]
    impl Signer for NullSigner {
        async fn sign(&self, _data: &[u8]) -> Result<Vec<u8>> {
            Ok(vec![0xAB; 4])
        }
        async fn verify(&self, _data: &[u8], _signature: &[u8]) -> Result<()> {
            Ok(())
        }
    }

    struct AlwaysFailSigner;
    #[async_trait]
    impl Signer for AlwaysFailSigner {
        async fn sign(&self, _data: &[u8]) -> Result<Vec<u8>> {
            Err(ndnrtc_core::NdnRtcError::Runtime("key unavailable".into()))
        }
        async fn verify(&self, _data: &[u8], _signature: &[u8]) -> Result<()> {
            Ok(())
        }
    }

    fn base() -> Name {
        Name::from_components([b"ndnrtc".to_vec(), b"alice".to_vec()])
    }

    fn params(policy: KeyFramePolicy) -> ThreadParams {
        ThreadParams {
            name: "hi".into(),
            codec_name: "vp8".into(),
            sample_rate: 30.0,
            key_frame_policy: policy,
            segmenter: SegmenterConfig::default(),
            freshness: FreshnessConfig::default(),
        }
    }

    fn raw(timestamp_ms: u64) -> RawFrame {
        RawFrame { timestamp_ms, data: bytes::Bytes::from_static(b"some-encoded-frame-bytes") }
    }

    #[tokio::test]
    async fn test_first_frame_is_published_as_key() {
        let net = SimNetwork::new();
        let face = net.face();
        let mut thread = ProducerThread::new(
            base(),
            "cam".into(),
            params(KeyFramePolicy::None),
            Box::new(AlwaysEncode { force_counted: 0 }),
            std::sync::Arc::new(NullSigner),
        );
        let outcome = thread.publish_frame(raw(0), &face).await.unwrap();
        assert_eq!(outcome, PublishOutcome::Published { playback_no: 0, sample_no: 0, class: SampleClass::Key });
    }

    #[tokio::test]
    async fn test_dropped_frame_increments_counter_and_does_not_publish() {
        let net = SimNetwork::new();
        let face = net.face();
        let mut thread =
            ProducerThread::new(base(), "cam".into(), params(KeyFramePolicy::None), Box::new(DroppingEncoder), std::sync::Arc::new(NullSigner));
        let outcome = thread.publish_frame(raw(0), &face).await.unwrap();
        assert_eq!(outcome, PublishOutcome::Dropped);
        assert_eq!(thread.dropped_frames(), 1);
    }

    #[tokio::test]
    async fn test_signature_failure_drops_only_that_frame() {
        let net = SimNetwork::new();
        let face = net.face();
        let mut thread = ProducerThread::new(
            base(),
            "cam".into(),
            params(KeyFramePolicy::None),
            Box::new(AlwaysEncode { force_counted: 0 }),
            std::sync::Arc::new(AlwaysFailSigner),
        );
        let outcome = thread.publish_frame(raw(0), &face).await.unwrap();
        assert_eq!(outcome, PublishOutcome::SignatureFailed);
    }

    #[tokio::test]
    async fn test_delta_paired_sequence_no_points_at_last_key() {
        let net = SimNetwork::new();
        let face = net.face();
        let mut thread = ProducerThread::new(
            base(),
            "cam".into(),
            params(KeyFramePolicy::Gop { period: 2 }),
            Box::new(AlwaysEncode { force_counted: 0 }),
            std::sync::Arc::new(NullSigner),
        );
        let first = thread.publish_frame(raw(0), &face).await.unwrap();
        assert_eq!(first, PublishOutcome::Published { playback_no: 0, sample_no: 0, class: SampleClass::Key });
        let second = thread.publish_frame(raw(33), &face).await.unwrap();
        assert_eq!(second, PublishOutcome::Published { playback_no: 1, sample_no: 0, class: SampleClass::Delta });
        assert_eq!(thread.last_key_seq, Some(0));
    }

    #[tokio::test]
    async fn test_segments_and_manifest_land_in_content_store() {
        let net = SimNetwork::new();
        let face = net.face();
        let mut thread = ProducerThread::new(
            base(),
            "cam".into(),
            params(KeyFramePolicy::None),
            Box::new(AlwaysEncode { force_counted: 0 }),
            std::sync::Arc::new(NullSigner),
        );
        thread.publish_frame(raw(0), &face).await.unwrap();

        let manifest_name = NamespaceInfo {
            base_prefix: base(),
            stream: "cam".into(),
            thread: "hi".into(),
            class: SampleClass::Key,
            sample_no: 0,
            segment_type: SegmentType::Manifest,
            seg_no: 0,
        }
        .into_name();
        let fetched = face
            .express_interest(ndnrtc_net::Interest::exact(manifest_name, std::time::Duration::from_millis(10), 1))
            .await
            .unwrap();
        let manifest = Manifest::decode(&fetched.content).unwrap();
        assert!(manifest.signature.is_some());
    }
}
