//! Test utilities associated with ids.

use bytes::Bytes;
use hashvend_api::{id::Id, Hash, PeerId};

use crate::random_bytes;

/// Create a random id.
pub fn random_id() -> Id {
    Id(Bytes::from(random_bytes(32)))
}

/// Create a random peer id.
pub fn random_peer_id() -> PeerId {
    PeerId(random_id())
}

/// Create a random hash. Nothing will digest to it.
pub fn random_hash() -> Hash {
    Hash::digest(&random_bytes(32))
}

/// Create a list of random hashes.
pub fn create_hash_list(num_hashes: usize) -> Vec<Hash> {
    (0..num_hashes).map(|_| random_hash()).collect()
}
