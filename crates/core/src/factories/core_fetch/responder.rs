use super::{message_handler::decode_request, CancelOnDrop, CoreFetchConfig};
use bytes::Bytes;
use hashvend_api::{fetch::*, *};
use std::{sync::Arc, time::Duration};

/// How a [Responder] starts its exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opening {
    /// Wait for the first request.
    Receive,

    /// Send the payload, then wait for the first request.
    Send(Bytes),
}

/// Where a [Responder] is in its exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponderState {
    /// Suspended until the next request arrives.
    AwaitingRequest,

    /// Looking up and replying to a request.
    Serving,

    /// The exchange is over, cleanly or not.
    Terminated,
}

/// The responding side of an exchange with one peer.
#[derive(Debug)]
pub struct Responder {
    peer: PeerId,
    access: AccessPolicy,
    config: Arc<CoreFetchConfig>,
    store: DynContentStore,
    channel: DynPeerChannel,
    state: ResponderState,
    opening: Option<Bytes>,
}

impl Responder {
    pub(crate) fn new(
        peer: PeerId,
        opening: Opening,
        access: AccessPolicy,
        config: Arc<CoreFetchConfig>,
        store: DynContentStore,
        channel: DynPeerChannel,
    ) -> Self {
        let opening = match opening {
            Opening::Receive => None,
            Opening::Send(payload) => Some(payload),
        };
        Self {
            peer,
            access,
            config,
            store,
            channel,
            state: ResponderState::AwaitingRequest,
            opening,
        }
    }

    /// The current state of the exchange.
    pub fn state(&self) -> ResponderState {
        self.state
    }

    /// Serve requests until the requester ends the exchange.
    ///
    /// Resolves to an error if the exchange failed. Unless the channel
    /// itself failed, the requester has been sent a rejection by then.
    pub async fn run(&mut self) -> VendResult<()> {
        if self.state == ResponderState::Terminated {
            return Err(VendError::other("the exchange is over"));
        }

        loop {
            self.state = ResponderState::AwaitingRequest;
            let (request_id, request) = match self.next_request().await {
                Ok(next) => next,
                Err(err) => return self.terminate(0, err),
            };

            self.state = ResponderState::Serving;
            let items = match request {
                FetchRequest::End => {
                    self.state = ResponderState::Terminated;
                    tracing::info!(peer = %self.peer, request_id, "exchange ended");
                    return Ok(());
                }
                FetchRequest::Transactions(hashes) => {
                    self.serve_batch::<Transaction>(hashes).await
                }
                FetchRequest::Attachments(hashes) => {
                    self.serve_batch::<Attachment>(hashes).await
                }
            };
            let items = match items {
                Ok(items) => items,
                Err(err) => return self.terminate(request_id, err),
            };

            let response = FetchMessage::Response {
                request_id,
                response: FetchResponse { items },
            };
            if let Err(err) =
                self.channel.send(self.peer.clone(), response.encode()).await
            {
                return self.terminate(request_id, err);
            }
            tracing::debug!(peer = %self.peer, request_id, "sent response");
        }
    }

    async fn next_request(&mut self) -> VendResult<(u64, FetchRequest)> {
        let peer = self.peer.clone();
        let incoming = match self.opening.take() {
            Some(payload) => {
                tracing::debug!(%peer, "sending opening payload");
                self.channel.send_and_receive(
                    peer.clone(),
                    FetchMessage::Payload(payload).encode(),
                )
            }
            None => self.channel.receive(peer.clone()),
        };

        let timeout =
            Duration::from_millis(self.config.request_timeout_ms as u64);
        let incoming = incoming.with_timeout(timeout, move || {
            VendError::channel_failure(peer, "timed out waiting for request")
        });
        let _guard = CancelOnDrop(incoming.clone());

        decode_request(incoming.await?)
    }

    async fn serve_batch<C: Content>(
        &self,
        hashes: Vec<Hash>,
    ) -> VendResult<Vec<FetchItem>> {
        if hashes.is_empty() {
            return Err(VendError::protocol_violation("empty batch"));
        }
        let max_batch_size = (self.config.max_batch_size as usize).max(1);
        if hashes.len() > max_batch_size {
            return Err(VendError::protocol_violation(format!(
                "batch of {} exceeds the maximum of {max_batch_size}",
                hashes.len()
            )));
        }
        tracing::debug!(
            peer = %self.peer,
            kind = %C::KIND,
            count = hashes.len(),
            "serving request"
        );

        let lookups = hashes
            .into_iter()
            .map(|hash| {
                if !self.access.is_allowed(C::KIND, &hash) {
                    tracing::info!(peer = %self.peer, %hash, "withholding denied item");
                    return AsyncResult::immediate(FetchItem::Denied);
                }
                C::lookup(&*self.store, hash.clone()).try_map(move |item| match item {
                    Some(item) => Ok(FetchItem::Content(item.encode())),
                    None => Err(VendError::hash_not_found(hash)),
                })
            })
            .collect();

        future::join(lookups).await
    }

    fn terminate(&mut self, request_id: u64, err: VendError) -> VendResult<()> {
        self.state = ResponderState::Terminated;

        if err.is_retryable() || err.is_cancelled() {
            tracing::info!(?err, peer = %self.peer, "exchange terminated");
            return Err(err);
        }

        let rejection = Rejection::from_error(&err);
        tracing::info!(?rejection, peer = %self.peer, request_id, "rejecting request");
        self.channel
            .send(
                self.peer.clone(),
                FetchMessage::Rejection {
                    request_id,
                    rejection,
                }
                .encode(),
            )
            .and_forget();
        Err(err)
    }
}
