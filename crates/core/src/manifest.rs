// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Per-sample manifest: a digest list binding every segment of a sample
//! under one signature (manifest-covers-segments discipline — individual
//! segments are not separately signed).

use sha2::{Digest, Sha256};

use crate::error::{NdnRtcError, Result};
use crate::segment::WireSegment;

/// A segment digest, as stored in a manifest.
pub type SegmentDigest = [u8; 32];

pub fn digest_segment(segment: &WireSegment) -> SegmentDigest {
    let mut hasher = Sha256::new();
    hasher.update(segment.encode());
    hasher.finalize().into()
}

/// The envelope published alongside a sample's data and parity segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub sample_no: u64,
    pub data_digests: Vec<SegmentDigest>,
    pub parity_digests: Vec<SegmentDigest>,
    /// Signature over the manifest's own encoding, produced by the signer
    /// collaborator; `None` before `sign` is called.
    pub signature: Option<Vec<u8>>,
}

impl Manifest {
    pub fn build(sample_no: u64, data: &[WireSegment], parity: &[WireSegment]) -> Self {
        Self {
            sample_no,
            data_digests: data.iter().map(digest_segment).collect(),
            parity_digests: parity.iter().map(digest_segment).collect(),
            signature: None,
        }
    }

    /// The bytes a signer collaborator signs: sample number followed by
    /// each digest in order, data then parity.
    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8 + (self.data_digests.len() + self.parity_digests.len()) * 32);
        buf.extend_from_slice(&self.sample_no.to_le_bytes());
        for d in self.data_digests.iter().chain(self.parity_digests.iter()) {
            buf.extend_from_slice(d);
        }
        buf
    }

    /// Serializes this manifest to its wire form: `sampleNo | nData | data
    /// digests | nParity | parity digests | sigLen | signature`.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            8 + 4 + self.data_digests.len() * 32 + 4 + self.parity_digests.len() * 32 + 2
                + self.signature.as_ref().map_or(0, Vec::len),
        );
        buf.extend_from_slice(&self.sample_no.to_le_bytes());
        buf.extend_from_slice(&(self.data_digests.len() as u32).to_le_bytes());
        for d in &self.data_digests {
            buf.extend_from_slice(d);
        }
        buf.extend_from_slice(&(self.parity_digests.len() as u32).to_le_bytes());
        for d in &self.parity_digests {
            buf.extend_from_slice(d);
        }
        let signature = self.signature.as_deref().unwrap_or(&[]);
        buf.extend_from_slice(&(signature.len() as u16).to_le_bytes());
        buf.extend_from_slice(signature);
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut off = 0usize;
        let take = |off: &mut usize, n: usize, bytes: &[u8]| -> Result<Vec<u8>> {
            if bytes.len() < *off + n {
                return Err(NdnRtcError::Malformed("manifest truncated".into()));
            }
            let slice = bytes[*off..*off + n].to_vec();
            *off += n;
            Ok(slice)
        };
        let sample_no = u64::from_le_bytes(take(&mut off, 8, bytes)?.try_into().unwrap());
        let n_data = u32::from_le_bytes(take(&mut off, 4, bytes)?.try_into().unwrap()) as usize;
        let mut data_digests = Vec::with_capacity(n_data);
        for _ in 0..n_data {
            data_digests.push(
                SegmentDigest::try_from(take(&mut off, 32, bytes)?)
                    .map_err(|_| NdnRtcError::Malformed("manifest digest has wrong length".into()))?,
            );
        }
        let n_parity = u32::from_le_bytes(take(&mut off, 4, bytes)?.try_into().unwrap()) as usize;
        let mut parity_digests = Vec::with_capacity(n_parity);
        for _ in 0..n_parity {
            parity_digests.push(
                SegmentDigest::try_from(take(&mut off, 32, bytes)?)
                    .map_err(|_| NdnRtcError::Malformed("manifest digest has wrong length".into()))?,
            );
        }
        let sig_len = u16::from_le_bytes(take(&mut off, 2, bytes)?.try_into().unwrap()) as usize;
        let signature = take(&mut off, sig_len, bytes)?;
        Ok(Self {
            sample_no,
            data_digests,
            parity_digests,
            signature: if signature.is_empty() { None } else { Some(signature) },
        })
    }

    /// Verifies that every supplied segment's digest appears in this
    /// manifest at the expected slot. Does not check the signature itself;
    /// that is the signer collaborator's job.
    pub fn covers(&self, data: &[WireSegment], parity: &[WireSegment]) -> Result<()> {
        if data.len() != self.data_digests.len() || parity.len() != self.parity_digests.len() {
            tracing::debug!(sample_no = self.sample_no, "manifest verification failed: segment count mismatch");
            return Err(NdnRtcError::Verification("segment count does not match manifest".into()));
        }
        for (segment, expected) in data.iter().zip(&self.data_digests) {
            if &digest_segment(segment) != expected {
                tracing::debug!(sample_no = self.sample_no, "manifest verification failed: data digest mismatch");
                return Err(NdnRtcError::Verification("data segment digest mismatch".into()));
            }
        }
        for (segment, expected) in parity.iter().zip(&self.parity_digests) {
            if &digest_segment(segment) != expected {
                tracing::debug!(sample_no = self.sample_no, "manifest verification failed: parity digest mismatch");
                return Err(NdnRtcError::Verification("parity segment digest mismatch".into()));
            }
        }
        Ok(())
    }
}
