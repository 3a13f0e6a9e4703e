// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! A live source's set of encoding ladders (§4.2): `addThread`/`removeThread`
//! manage the roster, `on_raw_frame` fans one captured frame out to every
//! thread and publishes each ladder's result independently.

use std::collections::BTreeMap;
use std::sync::Arc;

use ndnrtc_core::{NdnRtcError, Name, Result};
use ndnrtc_net::Face;

use crate::collaborator::{Encoder, RawFrame, Signer};
use crate::meta::{MetaPublisher, StreamMeta};
use crate::thread::{ProducerThread, PublishOutcome, ThreadParams};

/// A live source, publishing under `<base>/<stream>/...`.
pub struct ProducerStream {
    base_prefix: Name,
    name: String,
    threads: BTreeMap<String, ProducerThread>,
    stream_meta: MetaPublisher<StreamMeta>,
}

impl ProducerStream {
    pub fn new(base_prefix: Name, name: String) -> Self {
        let stream_prefix = base_prefix.clone().append(name.as_bytes().to_vec());
        Self { base_prefix, name, threads: BTreeMap::new(), stream_meta: MetaPublisher::new(stream_prefix) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn thread_names(&self) -> Vec<&str> {
        self.threads.keys().map(String::as_str).collect()
    }

    /// Adds an independent encoding ladder. Thread names are unique within
    /// a stream (§4.2 "Thread names are unique within a stream").
    pub fn add_thread(
        &mut self,
        params: ThreadParams,
        encoder: Box<dyn Encoder>,
        signer: Arc<dyn Signer>,
    ) -> Result<()> {
        let name = params.name.clone();
        if self.threads.contains_key(&name) {
            return Err(NdnRtcError::Configuration(format!("thread {name} already exists on stream {}", self.name)));
        }
        let thread = ProducerThread::new(self.base_prefix.clone(), self.name.clone(), params, encoder, signer);
        self.threads.insert(name, thread);
        Ok(())
    }

    pub fn remove_thread(&mut self, name: &str) -> Result<()> {
        self.threads
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| NdnRtcError::Configuration(format!("no such thread {name} on stream {}", self.name)))
    }

    /// Feeds one captured frame to every thread's encoder and publishes
    /// whatever each one produces. Returns each thread's outcome, in thread
    /// name order, so a single-ladder stream's caller can read `[0].1` as
    /// the assigned playback number, or whether the frame was dropped.
    pub async fn on_raw_frame(&mut self, frame: RawFrame, face: &dyn Face) -> Result<Vec<(String, PublishOutcome)>> {
        self.publish_stream_meta_if_changed(face).await?;

        let mut outcomes = Vec::with_capacity(self.threads.len());
        for (name, thread) in &mut self.threads {
            let outcome = thread.publish_frame(frame.clone(), face).await?;
            outcomes.push((name.clone(), outcome));
        }
        Ok(outcomes)
    }

    async fn publish_stream_meta_if_changed(&mut self, face: &dyn Face) -> Result<()> {
        let meta = StreamMeta { threads: self.threads.keys().cloned().collect() };
        let Some(prepared) = self.stream_meta.prepare_if_changed(meta, 0.0)? else {
            return Ok(());
        };
        match face.put_data(prepared.name.clone(), bytes::Bytes::from(prepared.wire.clone()), 1_000).await {
            Ok(()) => {
                self.stream_meta.commit(prepared);
                Ok(())
            },
            Err(err) => {
                tracing::warn!(stream = %self.name, "stream meta publish failed, will retry: {err}");
                Ok(())
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::{EncodedFrame, FrameType};
    use crate::key_frame::KeyFramePolicy;
    use async_trait::async_trait;
    use ndnrtc_core::config::{FreshnessConfig, SegmenterConfig};
    use ndnrtc_net::sim::SimNetwork;

    struct AlwaysKeyEncoder;
    impl Encoder for AlwaysKeyEncoder {
        fn encode(&mut self, frame: &RawFrame, _force_key: bool) -> Option<EncodedFrame> {
            Some(EncodedFrame {
                frame_type: FrameType::Key,
                width: 320,
                height: 240,
                presentation_timestamp_ms: frame.timestamp_ms,
                payload: frame.data.clone(),
            })
        }
    }

    struct NullSigner;
    #[async_trait]
    impl Signer for NullSigner {
        async fn sign(&self, _data: &[u8]) -> Result<Vec<u8>> {
            Ok(vec![1])
        }
        async fn verify(&self, _data: &[u8], _signature: &[u8]) -> Result<()> {
            Ok(())
        }
    }

    fn base() -> Name {
        Name::from_components([b"ndnrtc".to_vec(), b"alice".to_vec()])
    }

    fn thread_params(name: &str) -> ThreadParams {
        ThreadParams {
            name: name.into(),
            codec_name: "vp8".into(),
            sample_rate: 30.0,
            key_frame_policy: KeyFramePolicy::None,
            segmenter: SegmenterConfig::default(),
            freshness: FreshnessConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_add_thread_rejects_duplicate_name() {
        let mut stream = ProducerStream::new(base(), "cam".into());
        stream.add_thread(thread_params("hi"), Box::new(AlwaysKeyEncoder), Arc::new(NullSigner)).unwrap();
        let err = stream.add_thread(thread_params("hi"), Box::new(AlwaysKeyEncoder), Arc::new(NullSigner)).unwrap_err();
        assert!(matches!(err, NdnRtcError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_remove_thread_removes_from_roster() {
        let mut stream = ProducerStream::new(base(), "cam".into());
        stream.add_thread(thread_params("hi"), Box::new(AlwaysKeyEncoder), Arc::new(NullSigner)).unwrap();
        stream.remove_thread("hi").unwrap();
        assert!(stream.thread_names().is_empty());
    }

    #[tokio::test]
    async fn test_on_raw_frame_fans_out_to_every_thread() {
        let net = SimNetwork::new();
        let face = net.face();
        let mut stream = ProducerStream::new(base(), "cam".into());
        stream.add_thread(thread_params("hi"), Box::new(AlwaysKeyEncoder), Arc::new(NullSigner)).unwrap();
        stream.add_thread(thread_params("lo"), Box::new(AlwaysKeyEncoder), Arc::new(NullSigner)).unwrap();

        let outcomes = stream
            .on_raw_frame(RawFrame { timestamp_ms: 0, data: bytes::Bytes::from_static(b"frame") }, &face)
            .await
            .unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|(_, o)| matches!(o, PublishOutcome::Published { .. })));
    }
}
