use super::{
    message_handler::{decode_reply, Turn},
    retry::{with_retry, Attempt, RetryPolicy},
    CancelOnDrop, CoreFetchConfig,
};
use bytes::Bytes;
use hashvend_api::{fetch::*, *};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

/// Where a [Requester] is in its exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequesterState {
    /// Ready to build the next request.
    BuildingRequest,

    /// Suspended until the responder replies.
    AwaitingResponse,

    /// Checking the delivered items against the requested hashes.
    Verifying,

    /// The exchange was ended.
    Done,

    /// The exchange failed.
    Failed,
}

/// The requesting side of an exchange with one peer.
///
/// Each call to [Requester::fetch] takes one or more turns. The exchange
/// stays open in between, until [Requester::end] is called or a turn fails.
#[derive(Debug)]
pub struct Requester {
    peer: PeerId,
    config: Arc<CoreFetchConfig>,
    retry: RetryPolicy,
    store: DynContentStore,
    channel: DynPeerChannel,
    state: RequesterState,
    next_request_id: u64,
    rejected: bool,
}

impl Requester {
    pub(crate) fn new(
        peer: PeerId,
        config: Arc<CoreFetchConfig>,
        retry: RetryPolicy,
        store: DynContentStore,
        channel: DynPeerChannel,
    ) -> Self {
        Self {
            peer,
            config,
            retry,
            store,
            channel,
            state: RequesterState::BuildingRequest,
            next_request_id: 1,
            rejected: false,
        }
    }

    /// The current state of the exchange.
    pub fn state(&self) -> RequesterState {
        self.state
    }

    /// The peer on the other side of the exchange.
    pub fn peer(&self) -> &PeerId {
        &self.peer
    }

    /// Resolve `hashes`, from the local store where possible and from the
    /// peer otherwise. Values are returned in the order of `hashes`.
    ///
    /// Any failure fails the exchange.
    pub async fn fetch<C: Content>(
        &mut self,
        hashes: Vec<Hash>,
    ) -> VendResult<Vec<C>> {
        if matches!(self.state, RequesterState::Done | RequesterState::Failed)
        {
            return Err(VendError::other("the exchange is over"));
        }

        match self.resolve::<C>(&hashes).await {
            Ok(found) => {
                self.state = RequesterState::BuildingRequest;
                hashes
                    .iter()
                    .map(|hash| {
                        found
                            .get(hash)
                            .cloned()
                            .ok_or_else(|| VendError::hash_not_found(hash.clone()))
                    })
                    .collect()
            }
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Receive the opening payload of a responder that sends one before
    /// the first request.
    pub async fn receive_opening(&mut self) -> VendResult<Bytes> {
        let peer = self.peer.clone();
        let opening = self.channel.receive(peer.clone()).with_timeout(
            self.response_timeout(),
            move || VendError::channel_failure(peer, "timed out waiting for opening"),
        );
        let _guard = CancelOnDrop(opening.clone());

        match FetchMessage::decode(opening.await?)? {
            FetchMessage::Payload(payload) => Ok(payload),
            FetchMessage::Rejection { rejection, .. } => {
                self.rejected = true;
                self.state = RequesterState::Failed;
                Err(rejection.into())
            }
            _ => Err(VendError::protocol_violation(
                "expected an opening payload"
            )),
        }
    }

    /// End the exchange. Calling this again, or after the responder
    /// rejected a request, does nothing.
    pub async fn end(&mut self) -> VendResult<()> {
        if self.state == RequesterState::Done || self.rejected {
            return Ok(());
        }
        let failed = self.state == RequesterState::Failed;
        self.state = RequesterState::Done;
        if failed {
            // the end request went out when the exchange failed
            return Ok(());
        }

        let request_id = self.take_request_id();
        self.channel
            .send(self.peer.clone(), end_request(request_id))
            .await?;
        tracing::debug!(peer = %self.peer, request_id, "ended exchange");
        Ok(())
    }

    async fn resolve<C: Content>(
        &mut self,
        hashes: &[Hash],
    ) -> VendResult<HashMap<Hash, C>> {
        self.state = RequesterState::BuildingRequest;

        let local = future::join(
            hashes
                .iter()
                .map(|hash| C::lookup(&*self.store, hash.clone()))
                .collect(),
        )
        .await?;

        let mut found = HashMap::new();
        let mut seen = HashSet::new();
        let mut outstanding = Vec::new();
        for (hash, item) in hashes.iter().zip(local) {
            match item {
                Some(item) => {
                    found.insert(hash.clone(), item);
                }
                None => {
                    if seen.insert(hash.clone()) {
                        outstanding.push(hash.clone());
                    }
                }
            }
        }
        // a hash can be listed twice, once found and once not
        outstanding.retain(|hash| !found.contains_key(hash));

        let max_batch_size = (self.config.max_batch_size as usize).max(1);
        for batch in outstanding.chunks(max_batch_size) {
            let response = self
                .turn(FetchRequest::for_kind(C::KIND, batch.to_vec()))
                .await?;

            self.state = RequesterState::Verifying;
            found.extend(verify::<C>(batch, response)?);
            self.state = RequesterState::BuildingRequest;
        }

        Ok(found)
    }

    async fn turn(&mut self, request: FetchRequest) -> VendResult<FetchResponse> {
        let request_id = self.take_request_id();
        let requested = request.hashes().to_vec();
        tracing::debug!(
            peer = %self.peer,
            request_id,
            kind = ?request.kind(),
            count = requested.len(),
            "sending request"
        );

        let data = FetchMessage::Request {
            request_id,
            request,
        }
        .encode();

        self.state = RequesterState::AwaitingResponse;
        let reply = with_retry(&self.retry, self.attempt(request_id, data));
        let _guard = CancelOnDrop(reply.clone());

        match reply.await? {
            Turn::Response(response) => {
                tracing::debug!(
                    peer = %self.peer,
                    request_id,
                    count = response.items.len(),
                    "received response"
                );
                Ok(response)
            }
            Turn::Rejected(rejection) => {
                self.rejected = true;
                if let Rejection::HashNotFound(hash) = &rejection {
                    if !requested.contains(hash) {
                        return Err(VendError::protocol_violation(format!(
                            "rejection names unrequested hash {hash}"
                        )));
                    }
                }
                tracing::debug!(peer = %self.peer, request_id, ?rejection, "request rejected");
                Err(rejection.into())
            }
        }
    }

    /// Send the request and await the reply. Every call resends the
    /// identical request.
    fn attempt(&self, request_id: u64, data: Bytes) -> Attempt<Turn> {
        let peer = self.peer.clone();
        let channel = self.channel.clone();
        let timeout = self.response_timeout();
        Arc::new(move || {
            let reply = channel.send_and_receive(peer.clone(), data.clone());
            await_reply(channel.clone(), peer.clone(), request_id, timeout, reply)
        })
    }

    fn fail(&mut self, err: &VendError) {
        self.state = RequesterState::Failed;
        if self.rejected || err.is_cancelled() {
            return;
        }

        let request_id = self.take_request_id();
        let peer = self.peer.clone();
        self.channel
            .send(self.peer.clone(), end_request(request_id))
            .and_forget_with(move |err| {
                tracing::debug!(?err, %peer, "could not end failed exchange");
            });
    }

    fn take_request_id(&mut self) -> u64 {
        let request_id = self.next_request_id;
        self.next_request_id += 1;
        request_id
    }

    fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.config.response_timeout_ms as u64)
    }
}

fn end_request(request_id: u64) -> Bytes {
    FetchMessage::Request {
        request_id,
        request: FetchRequest::End,
    }
    .encode()
}

/// Resolve to the reply to `request_id`, receiving again past stale
/// replies. Each receive is given `timeout`.
fn await_reply(
    channel: DynPeerChannel,
    peer: PeerId,
    request_id: u64,
    timeout: Duration,
    reply: AsyncResult<Bytes>,
) -> AsyncResult<Turn> {
    let timed = {
        let peer = peer.clone();
        reply.with_timeout(timeout, move || {
            VendError::channel_failure(peer, "timed out waiting for response")
        })
    };

    let out = timed.flat_map(move |data| match decode_reply(request_id, data) {
        Ok(Some(turn)) => AsyncResult::immediate(turn),
        Ok(None) => {
            tracing::warn!(%peer, request_id, "discarding stale reply");
            let next = channel.receive(peer.clone());
            await_reply(channel, peer, request_id, timeout, next)
        }
        Err(err) => AsyncResult::failed(err),
    });
    out.propagate_cancel_to(&timed);
    out
}

/// Check the response against the batch it answers, in request order.
fn verify<C: Content>(
    batch: &[Hash],
    response: FetchResponse,
) -> VendResult<Vec<(Hash, C)>> {
    if response.items.len() > batch.len() {
        return Err(VendError::protocol_violation(format!(
            "{} items in response to {} hashes",
            response.items.len(),
            batch.len()
        )));
    }

    let mut items = response.items.into_iter();
    batch
        .iter()
        .map(|hash| match items.next() {
            None | Some(FetchItem::Denied) => {
                Err(VendError::hash_not_found(hash.clone()))
            }
            Some(FetchItem::Content(data)) => {
                // bytes that do not even parse cannot be what was asked for
                let (item, delivered) = match C::decode(data.clone()) {
                    Ok(item) => {
                        let delivered = item.content_hash();
                        (Some(item), delivered)
                    }
                    Err(_) => (None, Hash::digest(&data)),
                };
                match item {
                    Some(item) if delivered == *hash => Ok((hash.clone(), item)),
                    _ => Err(VendError::IntegrityMismatch {
                        requested: hash.clone(),
                        delivered,
                    }),
                }
            }
        })
        .collect()
}
