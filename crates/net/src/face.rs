// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The NDN face collaborator: the narrow interface the core assumes of the
//! network transport. The core never assumes a concrete wire protocol, only
//! Interest/Data pairing, at-most-one Data per Interest, digest-based
//! content identity, and `MustBeFresh`/`ChildSelector` selection hints.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use ndnrtc_core::Name;
use thiserror::Error;
use tokio::sync::mpsc;

/// Selects which child of a prefix an interest without an exact segment
/// number should match against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChildSelector {
    #[default]
    None,
    /// Ask the network for the most recent matching data under the prefix.
    Rightmost,
}

/// Selector bundle accompanying an interest.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterestSelectors {
    /// Only match data marked fresh at the moment of arrival.
    pub must_be_fresh: bool,
    pub child_selector: ChildSelector,
}

/// An outgoing interest.
#[derive(Debug, Clone)]
pub struct Interest {
    pub name: Name,
    pub selectors: InterestSelectors,
    pub lifetime: Duration,
    /// Echoed back in the segment header of the matching data, if any.
    pub nonce: u32,
}

impl Interest {
    pub fn exact(name: Name, lifetime: Duration, nonce: u32) -> Self {
        Self { name, selectors: InterestSelectors::default(), lifetime, nonce }
    }

    pub fn rightmost(name: Name, lifetime: Duration, nonce: u32) -> Self {
        Self {
            name,
            selectors: InterestSelectors { must_be_fresh: true, child_selector: ChildSelector::Rightmost },
            lifetime,
            nonce,
        }
    }
}

/// Data returned by a successful interest expression, alongside the full
/// name actually matched (which may differ from the interest's name when a
/// `ChildSelector` was used).
#[derive(Debug, Clone)]
pub struct FetchedData {
    pub name: Name,
    pub content: Bytes,
}

/// Why `express_interest` did not yield data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FaceError {
    #[error("interest timed out before its lifetime elapsed")]
    Timeout,
    #[error("interest was nacked: {0}")]
    Nack(String),
    #[error("face is shutting down")]
    Closed,
}

/// A registered prefix's inbound interest stream, for the producer side.
pub struct InterestStream {
    pub receiver: mpsc::Receiver<Interest>,
}

/// The network collaborator the core runs its fetch and publish paths
/// against. Implementations own whatever transport/content-store plumbing
/// is needed; the core only ever sees this trait.
#[async_trait]
pub trait Face: Send + Sync {
    /// Expresses one interest and waits (up to its lifetime) for data, a
    /// nack, or a timeout.
    async fn express_interest(&self, interest: Interest) -> Result<FetchedData, FaceError>;

    /// Registers a prefix for incoming interests, returning a stream the
    /// producer polls to learn what is being asked for.
    async fn register_prefix(&self, prefix: Name) -> Result<InterestStream, FaceError>;

    /// Publishes data under `name` with the given freshness window.
    async fn put_data(&self, name: Name, content: Bytes, freshness_ms: u64) -> Result<(), FaceError>;
}
