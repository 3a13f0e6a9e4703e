// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Hierarchical NDN names and the `NamespaceInfo` they decompose into.
//!
//! A stream is addressed by `<base>/<stream>/<thread>/<class>/<sampleNo>/
//! <segmentType>/<segNo>`; `parseName` is the inverse of `NamespaceInfo::into_name`.

use crate::error::{NdnRtcError, Result};
use crate::sample::SampleClass;

/// One NDN name component: an opaque byte string.
pub type Component = Vec<u8>;

/// A full hierarchical name, as an ordered list of components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Name {
    components: Vec<Component>,
}

/// NDN canonical component ordering: shorter components sort before longer
/// ones, and equal-length components compare byte-wise. This is what makes
/// `append_number`'s canonical-shortest encoding order correctly by value
/// (a naive per-byte `Vec<u8>` comparison would not: a single-byte 255
/// would sort above the two-byte encoding of 256).
impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        for (a, b) in self.components.iter().zip(other.components.iter()) {
            match a.len().cmp(&b.len()).then_with(|| a.cmp(b)) {
                std::cmp::Ordering::Equal => continue,
                ord => return ord,
            }
        }
        self.components.len().cmp(&other.components.len())
    }
}

impl Name {
    pub fn new() -> Self {
        Self { components: Vec::new() }
    }

    pub fn from_components<I, C>(components: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Component>,
    {
        Self { components: components.into_iter().map(Into::into).collect() }
    }

    pub fn append<C: Into<Component>>(mut self, component: C) -> Self {
        self.components.push(component.into());
        self
    }

    /// Appends a sequence number using its canonical shortest big-endian
    /// byte representation (no leading zero byte unless the value is 0).
    pub fn append_number(self, n: u64) -> Self {
        self.append(encode_number(n))
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Returns the name truncated to its first `depth` components, the
    /// "prefix at every level" required by the segment codec's name parser.
    pub fn prefix(&self, depth: usize) -> Name {
        Name { components: self.components.iter().take(depth).cloned().collect() }
    }

    /// Whether `self` is `prefix` or one of its descendants.
    pub fn starts_with(&self, prefix: &Name) -> bool {
        prefix.components.len() <= self.components.len()
            && self.components[..prefix.components.len()] == prefix.components[..]
    }

    /// Renders components as a human-readable URI, percent-encoding any
    /// byte outside the unreserved set so the result is injective: distinct
    /// components (including arbitrary binary sequence-number encodings)
    /// never render to the same string.
    pub fn to_uri(&self) -> String {
        let mut uri = String::new();
        for c in &self.components {
            uri.push('/');
            for &b in c {
                if b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-' | b'~') {
                    uri.push(b as char);
                } else {
                    uri.push_str(&format!("%{b:02X}"));
                }
            }
        }
        uri
    }
}

fn encode_number(n: u64) -> Vec<u8> {
    if n == 0 {
        return vec![0];
    }
    let bytes = n.to_be_bytes();
    let first_nonzero = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len() - 1);
    bytes[first_nonzero..].to_vec()
}

fn decode_number(bytes: &[u8]) -> Result<u64> {
    if bytes.is_empty() || bytes.len() > 8 {
        return Err(NdnRtcError::Malformed(format!(
            "sequence number component has invalid length {}",
            bytes.len()
        )));
    }
    let mut buf = [0u8; 8];
    buf[8 - bytes.len()..].copy_from_slice(bytes);
    Ok(u64::from_be_bytes(buf))
}

/// Segment-type literal, per the name format's §3 token set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentType {
    Data,
    Parity,
    Manifest,
    Meta,
}

impl SegmentType {
    fn as_token(self) -> &'static [u8] {
        match self {
            SegmentType::Data => b"data",
            SegmentType::Parity => b"parity",
            SegmentType::Manifest => b"_manifest",
            SegmentType::Meta => b"_meta",
        }
    }

    fn from_token(token: &[u8]) -> Result<Self> {
        match token {
            b"data" => Ok(SegmentType::Data),
            b"parity" => Ok(SegmentType::Parity),
            b"_manifest" => Ok(SegmentType::Manifest),
            b"_meta" => Ok(SegmentType::Meta),
            other => Err(NdnRtcError::Malformed(format!(
                "unknown segment type token {:?}",
                String::from_utf8_lossy(other)
            ))),
        }
    }
}

/// The decomposed form of a stream name: base/stream/thread plus the
/// sample- and segment-addressing suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceInfo {
    pub base_prefix: Name,
    pub stream: String,
    pub thread: String,
    pub class: SampleClass,
    pub sample_no: u64,
    pub segment_type: SegmentType,
    pub seg_no: u64,
}

impl NamespaceInfo {
    /// Prefix identifying the thread, i.e. `<base>/<stream>/<thread>`.
    pub fn thread_prefix(&self) -> Name {
        self.base_prefix.clone().append(self.stream.as_bytes().to_vec()).append(self.thread.as_bytes().to_vec())
    }

    pub fn into_name(self) -> Name {
        let class_token: &[u8] = match self.class {
            SampleClass::Key => b"k",
            SampleClass::Delta => b"d",
        };
        self.thread_prefix()
            .append(class_token.to_vec())
            .append_number(self.sample_no)
            .append(self.segment_type.as_token().to_vec())
            .append_number(self.seg_no)
    }
}

/// Parses a name produced by [`NamespaceInfo::into_name`]. The last five
/// components must be `<class>/<sampleNo>/<segmentType>/<segNo>`; everything
/// before is `<base>/.../<stream>/<thread>`.
pub fn parse_name(name: &Name) -> Result<NamespaceInfo> {
    let comps = name.components();
    if comps.len() < 6 {
        tracing::debug!(uri = %name.to_uri(), "malformed name: too few components");
        return Err(NdnRtcError::Malformed(format!(
            "name has {} components, expected at least 6",
            comps.len()
        )));
    }
    let n = comps.len();
    let seg_no = decode_number(&comps[n - 1])?;
    let segment_type = SegmentType::from_token(&comps[n - 2])?;
    let sample_no = decode_number(&comps[n - 3])?;
    let class = match comps[n - 4].as_slice() {
        b"k" => SampleClass::Key,
        b"d" => SampleClass::Delta,
        other => {
            return Err(NdnRtcError::Malformed(format!(
                "unknown class token {:?}",
                String::from_utf8_lossy(other)
            )))
        },
    };
    let thread = String::from_utf8(comps[n - 5].clone())
        .map_err(|_| NdnRtcError::Malformed("thread component is not valid utf-8".into()))?;
    let stream = String::from_utf8(comps[n - 6].clone())
        .map_err(|_| NdnRtcError::Malformed("stream component is not valid utf-8".into()))?;
    let base_prefix = Name { components: comps[..n - 6].to_vec() };
    Ok(NamespaceInfo { base_prefix, stream, thread, class, sample_no, segment_type, seg_no })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Name {
        Name::from_components([b"ndnrtc".to_vec(), b"alice".to_vec()])
    }

    #[test]
    fn test_roundtrip_namespace_info() {
        let info = NamespaceInfo {
            base_prefix: base(),
            stream: "cam".to_string(),
            thread: "hi".to_string(),
            class: SampleClass::Delta,
            sample_no: 42,
            segment_type: SegmentType::Data,
            seg_no: 3,
        };
        let name = info.clone().into_name();
        let parsed = parse_name(&name).unwrap();
        assert_eq!(parsed, info);
    }

    #[test]
    fn test_number_encoding_is_shortest_form() {
        assert_eq!(encode_number(0), vec![0]);
        assert_eq!(encode_number(255), vec![255]);
        assert_eq!(encode_number(256), vec![1, 0]);
        assert_eq!(decode_number(&encode_number(70000)).unwrap(), 70000);
    }

    #[test]
    fn test_canonical_ordering_across_byte_length_boundary() {
        // A naive byte-wise compare of the raw Vec<u8> components would put
        // 255 (one byte, 0xFF) above 256 (two bytes, 0x01 0x00); canonical
        // ordering must compare by length first and put 256 on top.
        let lower = Name::new().append_number(255);
        let upper = Name::new().append_number(256);
        assert!(lower < upper);
    }

    #[test]
    fn test_to_uri_is_injective_for_binary_components() {
        let a = Name::new().append_number(200);
        let b = Name::new().append_number(255);
        assert_ne!(a.to_uri(), b.to_uri());
    }

    #[test]
    fn test_parse_name_rejects_short_name() {
        let name = Name::from_components([b"too".to_vec(), b"short".to_vec()]);
        assert!(parse_name(&name).is_err());
    }

    #[test]
    fn test_parse_name_rejects_bad_class_token() {
        let name = base()
            .append(b"cam".to_vec())
            .append(b"hi".to_vec())
            .append(b"x".to_vec())
            .append_number(1)
            .append(b"data".to_vec())
            .append_number(0);
        assert!(parse_name(&name).is_err());
    }

    #[test]
    fn test_thread_prefix() {
        let info = NamespaceInfo {
            base_prefix: base(),
            stream: "cam".to_string(),
            thread: "hi".to_string(),
            class: SampleClass::Key,
            sample_no: 1,
            segment_type: SegmentType::Data,
            seg_no: 0,
        };
        assert_eq!(info.thread_prefix().to_uri(), "/ndnrtc/alice/cam/hi");
    }
}
