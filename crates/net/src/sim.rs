// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! An in-process simulated face: a shared content store plus polling-based
//! interest resolution, standing in for a real NDN transport in tests and
//! the demo CLI. Producer and consumer sides hand out clones of the same
//! [`SimNetwork`] and talk to each other only through it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use ndnrtc_core::Name;
use tokio::sync::{mpsc, Mutex};
use tokio::time::interval;

use crate::face::{ChildSelector, Face, FaceError, FetchedData, Interest, InterestStream};

struct ContentEntry {
    content: Bytes,
    inserted_at: Instant,
    freshness_ms: u64,
}

impl ContentEntry {
    fn is_fresh(&self) -> bool {
        self.inserted_at.elapsed() < Duration::from_millis(self.freshness_ms)
    }
}

#[derive(Default)]
struct SimNetworkInner {
    store: HashMap<Name, ContentEntry>,
    registered_prefixes: HashMap<Name, mpsc::Sender<Interest>>,
}

/// Shared state behind every [`SimFace`] handle cloned from it.
#[derive(Clone, Default)]
pub struct SimNetwork {
    inner: Arc<Mutex<SimNetworkInner>>,
}

/// How often an unsatisfied interest re-checks the store while its
/// lifetime has not yet elapsed.
const POLL_INTERVAL: Duration = Duration::from_millis(2);

impl SimNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn face(&self) -> SimFace {
        SimFace { network: self.clone() }
    }
}

/// A handle into a [`SimNetwork`], implementing [`Face`].
#[derive(Clone)]
pub struct SimFace {
    network: SimNetwork,
}

impl SimFace {
    /// Forwards a clone of `interest` to every registered prefix it falls
    /// under, the way a real face's `onInterest` callback fires when a
    /// matching interest lands at the network, before any data exists for
    /// it. Best-effort: a full or dropped receiver is not an error here.
    async fn notify_registered_prefixes(&self, interest: &Interest) {
        let inner = self.network.inner.lock().await;
        for (prefix, sender) in &inner.registered_prefixes {
            if interest.name.starts_with(prefix) {
                if sender.try_send(interest.clone()).is_err() {
                    tracing::trace!(prefix = %prefix.to_uri(), "registered-prefix interest channel full or closed");
                }
            }
        }
    }

    async fn lookup(&self, interest: &Interest) -> Option<FetchedData> {
        let inner = self.network.inner.lock().await;
        match interest.selectors.child_selector {
            ChildSelector::None => inner.store.get(&interest.name).and_then(|entry| {
                if !interest.selectors.must_be_fresh || entry.is_fresh() {
                    Some(FetchedData { name: interest.name.clone(), content: entry.content.clone() })
                } else {
                    None
                }
            }),
            // Canonical `Name` ordering (length-first per component) so the
            // sample with the numerically largest sequence number wins even
            // across a byte-length boundary (e.g. 255 -> 256).
            ChildSelector::Rightmost => inner
                .store
                .iter()
                .filter(|(name, entry)| {
                    name.starts_with(&interest.name) && (!interest.selectors.must_be_fresh || entry.is_fresh())
                })
                .max_by(|(a, _), (b, _)| a.cmp(b))
                .map(|(name, entry)| FetchedData { name: name.clone(), content: entry.content.clone() }),
        }
    }
}

#[async_trait]
impl Face for SimFace {
    async fn express_interest(&self, interest: Interest) -> Result<FetchedData, FaceError> {
        tracing::trace!(name = %interest.name.to_uri(), "interest expressed");
        self.notify_registered_prefixes(&interest).await;

        if let Some(data) = self.lookup(&interest).await {
            return Ok(data);
        }

        let deadline = Instant::now() + interest.lifetime;
        let mut ticker = interval(POLL_INTERVAL);
        loop {
            ticker.tick().await;
            if let Some(data) = self.lookup(&interest).await {
                return Ok(data);
            }
            if Instant::now() >= deadline {
                tracing::debug!(name = %interest.name.to_uri(), "interest timed out");
                return Err(FaceError::Timeout);
            }
        }
    }

    async fn register_prefix(&self, prefix: Name) -> Result<InterestStream, FaceError> {
        tracing::debug!(prefix = %prefix.to_uri(), "prefix registered");
        let (tx, rx) = mpsc::channel(64);
        let mut inner = self.network.inner.lock().await;
        inner.registered_prefixes.insert(prefix, tx);
        Ok(InterestStream { receiver: rx })
    }

    async fn put_data(&self, name: Name, content: Bytes, freshness_ms: u64) -> Result<(), FaceError> {
        tracing::trace!(name = %name.to_uri(), len = content.len(), "data published");
        let mut inner = self.network.inner.lock().await;
        inner.store.insert(name, ContentEntry { content, inserted_at: Instant::now(), freshness_ms });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(uri: &str) -> Name {
        Name::from_components(uri.trim_start_matches('/').split('/').map(|c| c.as_bytes().to_vec()))
    }

    #[tokio::test]
    async fn test_exact_interest_resolves_after_put() {
        let net = SimNetwork::new();
        let face = net.face();
        face.put_data(name("/a/b/1"), Bytes::from_static(b"hi"), 1000).await.unwrap();

        let interest = Interest::exact(name("/a/b/1"), Duration::from_millis(50), 1);
        let data = face.express_interest(interest).await.unwrap();
        assert_eq!(data.content, Bytes::from_static(b"hi"));
    }

    #[tokio::test]
    async fn test_interest_times_out_when_nothing_published() {
        let net = SimNetwork::new();
        let face = net.face();
        let interest = Interest::exact(name("/a/b/1"), Duration::from_millis(10), 1);
        let err = face.express_interest(interest).await.unwrap_err();
        assert_eq!(err, FaceError::Timeout);
    }

    #[tokio::test]
    async fn test_rightmost_selector_returns_latest_child() {
        let net = SimNetwork::new();
        let face = net.face();
        face.put_data(name("/a/b/1"), Bytes::from_static(b"one"), 1000).await.unwrap();
        face.put_data(name("/a/b/2"), Bytes::from_static(b"two"), 1000).await.unwrap();

        let interest = Interest::rightmost(name("/a/b"), Duration::from_millis(50), 1);
        let data = face.express_interest(interest).await.unwrap();
        assert_eq!(data.content, Bytes::from_static(b"two"));
    }

    #[tokio::test]
    async fn test_interest_resolves_once_data_arrives_after_it_was_expressed() {
        let net = SimNetwork::new();
        let face = net.face();
        let waiter = face.clone();
        let wait_name = name("/late/1");
        let handle = tokio::spawn(async move {
            let interest = Interest::exact(wait_name, Duration::from_millis(200), 1);
            waiter.express_interest(interest).await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        face.put_data(name("/late/1"), Bytes::from_static(b"arrived"), 1000).await.unwrap();

        let data = handle.await.unwrap().unwrap();
        assert_eq!(data.content, Bytes::from_static(b"arrived"));
    }
}
