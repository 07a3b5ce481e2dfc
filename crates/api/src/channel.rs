//! The message channel to a named peer.

use crate::*;
use bytes::Bytes;
use std::sync::Arc;

/// A reliable, ordered channel to named peers.
///
/// Messages between two peers arrive in the order they were sent. A
/// disconnect surfaces as [VendError::ChannelFailure] from whichever
/// operation observes it. Cancelling a pending receive releases it without
/// consuming a message.
#[cfg_attr(any(test, feature = "mockall"), mockall::automock)]
pub trait PeerChannel: 'static + Send + Sync + std::fmt::Debug {
    /// Send a message to a peer.
    fn send(&self, peer: PeerId, data: Bytes) -> AsyncResult<()>;

    /// Receive the next message from a peer.
    fn receive(&self, peer: PeerId) -> AsyncResult<Bytes>;

    /// Send a message to a peer, then receive its next message.
    fn send_and_receive(&self, peer: PeerId, data: Bytes) -> AsyncResult<Bytes>;
}

/// Trait-object [PeerChannel].
pub type DynPeerChannel = Arc<dyn PeerChannel>;
