//! The in-process peer channel implementation provided by hashvend.
//!
//! A [MemNetwork] connects any number of [MemChannel]s within the same
//! process. Messages from one peer to another are delivered in order, and
//! faults can be injected per direction to exercise retries.

use bytes::Bytes;
use hashvend_api::*;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

/// A fault to inject into the next message sent in one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The send fails with a channel failure.
    Disconnect,

    /// The send reports success but the message is lost.
    Drop,
}

/// Messages flowing from one peer to another.
#[derive(Debug, Default)]
struct Conversation {
    queued: VecDeque<Bytes>,
    waiting: VecDeque<Completer<Bytes>>,
}

type Direction = (PeerId, PeerId);

#[derive(Debug, Default)]
struct State {
    peers: HashSet<PeerId>,
    conversations: HashMap<Direction, Conversation>,
    faults: HashMap<Direction, VecDeque<Fault>>,
}

/// An in-process network of [MemChannel]s.
/// This is NOT a production module. It is for testing only.
#[derive(Debug, Default)]
pub struct MemNetwork(Mutex<State>);

impl MemNetwork {
    /// Construct a new, empty network.
    pub fn create() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Join the network as `peer`. The peer leaves the network when the
    /// returned channel is dropped.
    pub fn join(self: &Arc<Self>, peer: PeerId) -> Arc<MemChannel> {
        self.0.lock().unwrap().peers.insert(peer.clone());
        Arc::new(MemChannel {
            peer,
            network: self.clone(),
        })
    }

    /// Inject a fault into the next message sent from `from` to `to`.
    /// Faults queue up and are consumed one per message.
    pub fn inject_fault(&self, from: &PeerId, to: &PeerId, fault: Fault) {
        self.0
            .lock()
            .unwrap()
            .faults
            .entry((from.clone(), to.clone()))
            .or_default()
            .push_back(fault);
    }

    fn deliver(&self, from: &PeerId, to: &PeerId, data: Bytes) -> VendResult<()> {
        let direction = (from.clone(), to.clone());
        let mut retried = false;

        loop {
            let waiter = {
                let mut lock = self.0.lock().unwrap();
                let state = &mut *lock;

                if !state.peers.contains(to) {
                    return Err(VendError::channel_failure(
                        to.clone(),
                        "peer is not on the network",
                    ));
                }

                if !retried {
                    match state.faults.get_mut(&direction).and_then(VecDeque::pop_front) {
                        Some(Fault::Disconnect) => {
                            tracing::debug!(%from, %to, "injected disconnect");
                            return Err(VendError::channel_failure(
                                to.clone(),
                                "disconnected",
                            ));
                        }
                        Some(Fault::Drop) => {
                            tracing::debug!(%from, %to, "injected message loss");
                            return Ok(());
                        }
                        None => (),
                    }
                }

                let conversation =
                    state.conversations.entry(direction.clone()).or_default();
                let mut waiter = None;
                while let Some(completer) = conversation.waiting.pop_front() {
                    // cancelled receivers must not swallow messages
                    if completer.is_pending() {
                        waiter = Some(completer);
                        break;
                    }
                }

                match waiter {
                    Some(waiter) => waiter,
                    None => {
                        if retried {
                            conversation.queued.push_front(data);
                        } else {
                            conversation.queued.push_back(data);
                        }
                        return Ok(());
                    }
                }
            };

            // complete outside the lock, listeners may call back in
            if waiter.set(data.clone()) {
                return Ok(());
            }

            // the receiver was cancelled after we picked it
            retried = true;
        }
    }

    fn receive(&self, me: &PeerId, from: &PeerId) -> AsyncResult<Bytes> {
        let mut lock = self.0.lock().unwrap();
        let state = &mut *lock;

        let conversation = state
            .conversations
            .entry((from.clone(), me.clone()))
            .or_default();

        if let Some(data) = conversation.queued.pop_front() {
            return AsyncResult::immediate(data);
        }

        if !state.peers.contains(from) {
            return AsyncResult::failed(VendError::channel_failure(
                from.clone(),
                "peer is not on the network",
            ));
        }

        conversation.waiting.retain(|completer| completer.is_pending());
        let (completer, out) = AsyncResult::create();
        conversation.waiting.push_back(completer);
        out
    }

    fn leave(&self, peer: &PeerId) {
        let abandoned = {
            let mut lock = self.0.lock().unwrap();
            lock.peers.remove(peer);
            lock.faults.retain(|(from, to), _| from != peer && to != peer);

            let mut abandoned = Vec::new();
            lock.conversations.retain(|(from, to), conversation| {
                if from != peer && to != peer {
                    return true;
                }
                abandoned.extend(
                    conversation.waiting.drain(..).map(|c| (from.clone(), c)),
                );
                false
            });
            abandoned
        };

        for (from, completer) in abandoned {
            completer.set_failure(VendError::channel_failure(
                from,
                "peer left the network",
            ));
        }
    }
}

/// A [PeerChannel] connected to a [MemNetwork].
#[derive(Debug)]
pub struct MemChannel {
    peer: PeerId,
    network: Arc<MemNetwork>,
}

impl Drop for MemChannel {
    fn drop(&mut self) {
        self.network.leave(&self.peer);
    }
}

impl MemChannel {
    /// The peer id this channel sends from.
    pub fn peer(&self) -> &PeerId {
        &self.peer
    }
}

impl PeerChannel for MemChannel {
    fn send(&self, peer: PeerId, data: Bytes) -> AsyncResult<()> {
        AsyncResult::from_result(self.network.deliver(&self.peer, &peer, data))
    }

    fn receive(&self, peer: PeerId) -> AsyncResult<Bytes> {
        self.network.receive(&self.peer, &peer)
    }

    fn send_and_receive(&self, peer: PeerId, data: Bytes) -> AsyncResult<Bytes> {
        match self.network.deliver(&self.peer, &peer, data) {
            Ok(()) => self.network.receive(&self.peer, &peer),
            Err(err) => AsyncResult::failed(err),
        }
    }
}
