//! Fetch is a hashvend module for resolving hash-addressed content from
//! peers, and for vending content to them.
//!
//! An exchange is held between a requester and a responder over a
//! [PeerChannel](hashvend_api::PeerChannel). It consists of turns: the
//! requester sends a batch of hashes and suspends, the responder looks the
//! hashes up and replies, the requester verifies every delivered item
//! against the hash it asked for. This repeats until the requester ends the
//! exchange.
//!
//! ### Requester
//!
//! - Hashes held by the local content store are never requested.
//! - Outstanding hashes are requested in batches of at most
//!   `maxBatchSize`, each tagged with a fresh request id.
//! - A reply is awaited for at most `responseTimeoutMs`. Replies carrying
//!   the id of an earlier request are stale and discarded.
//! - Channel failures (including reply timeouts) are retried by resending
//!   the identical request, up to `maxRetries` times with exponentially
//!   growing pauses.
//! - Every delivered item must digest to the hash it was requested under,
//!   otherwise the exchange fails with an integrity mismatch.
//! - Items withheld by the responder, or missing from a short response,
//!   fail the exchange with hash not found.
//! - When the requester fails the exchange itself, it sends an end request
//!   so the responder does not linger until its timeout.
//!
//! ### Responder
//!
//! - Optionally sends an opening payload before the first request.
//! - Waits at most `requestTimeoutMs` for each request.
//! - Empty and oversized batches are protocol violations, rejected before
//!   anything is looked up.
//! - Hashes the access policy withholds are answered with a denial marker,
//!   so the response stays aligned with the request.
//! - An allowed hash that is not held fails the exchange.
//! - A failed exchange is reported to the requester with a rejection.
//!
//! ### Back off
//!
//! Peers whose exchanges failed on the channel after all retries are backed
//! off. Fetches from a backed off peer fail fast until the interval
//! expires. Each failure in a row backs the peer off for longer, a
//! successful exchange clears it.

use hashvend_api::{
    builder,
    config::ModConfig,
    fetch::{DynFetch, DynFetchFactory, Fetch, FetchFactory},
    *,
};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

mod message_handler;
mod requester;
mod responder;
mod retry;

pub use requester::{Requester, RequesterState};
pub use responder::{Opening, Responder, ResponderState};

use retry::{PeerBackOff, RetryPolicy};

/// Cancels a result that is still pending when the guard is dropped, such
/// as when the future awaiting it is dropped mid-turn.
struct CancelOnDrop<T: future::ResultValue>(AsyncResult<T>);

impl<T: future::ResultValue> Drop for CancelOnDrop<T> {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// CoreFetch configuration types.
pub mod config {
    /// Configuration parameters for [CoreFetchFactory](super::CoreFetchFactory).
    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    pub struct CoreFetchConfig {
        /// Maximum number of hashes per request. Default: 100.
        pub max_batch_size: u32,
        /// How long a requester waits for each reply. Default: 30 s.
        pub response_timeout_ms: u32,
        /// How long a responder waits for the next request. Default: 60 s.
        pub request_timeout_ms: u32,
        /// How often a request is resent after a channel failure.
        /// Default: 3.
        pub max_retries: u32,
        /// Pause before the first resend. Default: 500 ms.
        pub first_retry_interval_ms: u32,
        /// Upper bound of the pause between resends. Default: 10 s.
        pub last_retry_interval_ms: u32,
        /// Duration of first interval to back off an unresponsive peer.
        /// Default: 20 s.
        pub first_back_off_interval_ms: u32,
        /// Duration of last interval to back off an unresponsive peer.
        /// Default: 10 min.
        pub last_back_off_interval_ms: u32,
        /// Number of back off intervals. Default: 4.
        pub num_back_off_intervals: u32,
    }

    impl Default for CoreFetchConfig {
        // Back off intervals are 20 s, 40 s, 80 s and 160 s.
        fn default() -> Self {
            Self {
                max_batch_size: 100,
                response_timeout_ms: 30_000,
                request_timeout_ms: 60_000,
                max_retries: 3,
                first_retry_interval_ms: 500,
                last_retry_interval_ms: 10_000,
                first_back_off_interval_ms: 1000 * 20,
                last_back_off_interval_ms: 1000 * 60 * 10,
                num_back_off_intervals: 4,
            }
        }
    }

    /// Module-level configuration for CoreFetch.
    #[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CoreFetchModConfig {
        /// CoreFetch configuration.
        #[serde(default)]
        pub core_fetch: CoreFetchConfig,
    }
}

use config::*;

impl ModConfig for CoreFetchModConfig {}

/// A production-ready fetch module.
#[derive(Debug)]
pub struct CoreFetchFactory {}

impl CoreFetchFactory {
    /// Construct a new CoreFetchFactory.
    pub fn create() -> DynFetchFactory {
        Arc::new(Self {})
    }
}

impl FetchFactory for CoreFetchFactory {
    fn default_config(&self, config: &hashvend_api::config::Config) -> VendResult<()> {
        config.add_default_module_config::<CoreFetchModConfig>()
    }

    fn create(
        &self,
        builder: Arc<builder::Builder>,
        store: DynContentStore,
        channel: DynPeerChannel,
    ) -> VendResult<DynFetch> {
        let config: CoreFetchModConfig = builder.config.get_module_config()?;
        let out: DynFetch =
            Arc::new(CoreFetch::new(config.core_fetch, store, channel));
        Ok(out)
    }
}

/// The fetch module.
///
/// Besides the [Fetch] operations, which hold one exchange per call, this
/// hands out [Requester]s and [Responder]s for exchanges spanning several
/// turns.
#[derive(Debug)]
pub struct CoreFetch {
    config: Arc<CoreFetchConfig>,
    store: DynContentStore,
    channel: DynPeerChannel,
    back_off: Arc<Mutex<PeerBackOff>>,
}

impl CoreFetch {
    /// Construct a fetch module from its parts.
    pub fn new(
        config: CoreFetchConfig,
        store: DynContentStore,
        channel: DynPeerChannel,
    ) -> Self {
        let back_off = PeerBackOff::from_config(&config);
        Self {
            config: Arc::new(config),
            store,
            channel,
            back_off: Arc::new(Mutex::new(back_off)),
        }
    }

    /// Start an exchange with `peer` as requester.
    ///
    /// The exchange lasts until [Requester::end] is called, the responder
    /// rejects a request, or a request fails.
    pub fn requester(&self, peer: PeerId) -> Requester {
        Requester::new(
            peer,
            self.config.clone(),
            RetryPolicy::from_config(&self.config),
            self.store.clone(),
            self.channel.clone(),
        )
    }

    /// Serve an exchange with `peer` as responder.
    pub fn responder(
        &self,
        peer: PeerId,
        opening: Opening,
        access: AccessPolicy,
    ) -> Responder {
        Responder::new(
            peer,
            opening,
            access,
            self.config.clone(),
            self.store.clone(),
            self.channel.clone(),
        )
    }

    /// True if fetches from `peer` currently fail fast.
    pub fn is_peer_on_back_off(&self, peer: &PeerId) -> bool {
        self.back_off.lock().unwrap().remaining(peer).is_some()
    }

    fn fetch<C: Content>(&self, peer: PeerId, hashes: Vec<Hash>) -> AsyncResult<Vec<C>> {
        let remaining = self.back_off.lock().unwrap().remaining(&peer);
        if let Some(remaining) = remaining {
            return AsyncResult::failed(VendError::channel_failure(
                peer,
                format!("peer is backed off for another {remaining:?}"),
            ));
        }

        let mut requester = self.requester(peer.clone());
        let back_off = self.back_off.clone();

        AsyncResult::spawn(async move {
            let result = requester.fetch::<C>(hashes).await;

            match &result {
                Ok(_) => {
                    back_off.lock().unwrap().record_success(&peer);
                    if let Err(err) = requester.end().await {
                        tracing::warn!(?err, %peer, "could not end exchange");
                    }
                }
                Err(err) if err.is_retryable() => {
                    let interval =
                        back_off.lock().unwrap().record_failure(&peer);
                    tracing::warn!(?err, %peer, ?interval, "backing off peer");
                }
                Err(_) => (),
            }

            result
        })
    }
}

impl Fetch for CoreFetch {
    fn fetch_transactions(
        &self,
        peer: PeerId,
        hashes: Vec<Hash>,
    ) -> AsyncResult<Vec<Transaction>> {
        self.fetch(peer, hashes)
    }

    fn fetch_attachments(
        &self,
        peer: PeerId,
        hashes: Vec<Hash>,
    ) -> AsyncResult<Vec<Attachment>> {
        self.fetch(peer, hashes)
    }

    fn serve(
        &self,
        peer: PeerId,
        opening: Option<bytes::Bytes>,
        access: AccessPolicy,
    ) -> AsyncResult<()> {
        let opening = match opening {
            Some(payload) => Opening::Send(payload),
            None => Opening::Receive,
        };
        let mut responder = self.responder(peer, opening, access);
        AsyncResult::spawn(async move { responder.run().await })
    }

    fn serve_then_receive(
        &self,
        peer: PeerId,
        opening: Option<bytes::Bytes>,
        access: AccessPolicy,
    ) -> AsyncResult<bytes::Bytes> {
        let served = self.serve(peer.clone(), opening, access);
        let channel = self.channel.clone();
        let timeout = Duration::from_millis(self.config.request_timeout_ms as u64);
        let out = served.flat_map(move |()| {
            let receive_from = peer.clone();
            channel.receive(peer.clone()).with_timeout(timeout, move || {
                VendError::channel_failure(
                    receive_from,
                    "timed out waiting for message after exchange",
                )
            })
        });
        out.propagate_cancel_to(&served);
        out
    }
}

#[cfg(test)]
mod test;
