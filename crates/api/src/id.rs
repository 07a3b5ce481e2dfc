//! Types dealing with data identity or hashing.

use crate::{VendError, VendResult};

macro_rules! imp_deref {
    ($i:ty, $t:ty) => {
        impl std::ops::Deref for $i {
            type Target = $t;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }
    };
}

macro_rules! imp_from {
    ($a:ty, $b:ty, $i:ident => $e:expr) => {
        impl From<$b> for $a {
            fn from($i: $b) -> Self {
                $e
            }
        }
    };
}

/// Base data identity type meant for newtyping.
/// You probably want [Hash] or [PeerId].
#[derive(
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct Id(#[serde(with = "crate::serde_bytes_base64")] pub bytes::Bytes);

imp_deref!(Id, bytes::Bytes);
imp_from!(Id, bytes::Bytes, b => Id(b));

/// The function signature for Id display overrides.
pub type DisplayCb =
    fn(&bytes::Bytes, &mut std::fmt::Formatter<'_>) -> std::fmt::Result;

/// The default display function encodes the Id as base64.
fn default_display(
    b: &bytes::Bytes,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    use base64::prelude::*;
    f.write_str(&BASE64_URL_SAFE_NO_PAD.encode(b))
}

#[inline(always)]
fn display(
    b: &bytes::Bytes,
    f: &mut std::fmt::Formatter<'_>,
    l: &std::sync::OnceLock<DisplayCb>,
) -> std::fmt::Result {
    l.get_or_init(|| default_display)(b, f)
}

static HASH_DISP: std::sync::OnceLock<DisplayCb> = std::sync::OnceLock::new();

/// A SHA-256 content digest identifying a transaction or an attachment.
///
/// A hash is both the lookup key of an item and its integrity check: an item
/// delivered by a peer is only accepted if digesting it reproduces the hash
/// it was requested under.
#[derive(
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct Hash(Id);

imp_deref!(Hash, Id);

impl std::fmt::Display for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        display(&self.0 .0, f, &HASH_DISP)
    }
}

impl std::fmt::Debug for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        display(&self.0 .0, f, &HASH_DISP)
    }
}

impl TryFrom<bytes::Bytes> for Hash {
    type Error = VendError;

    fn try_from(value: bytes::Bytes) -> VendResult<Self> {
        if value.len() != Self::LEN {
            return Err(VendError::protocol_violation(format!(
                "hash must be {} bytes, got {}",
                Self::LEN,
                value.len()
            )));
        }
        Ok(Self(Id(value)))
    }
}

impl From<Hash> for bytes::Bytes {
    fn from(value: Hash) -> Self {
        value.0 .0
    }
}

impl Hash {
    /// Length of a hash in bytes.
    pub const LEN: usize = 32;

    /// The all-zero hash, used to pad merkle trees.
    pub fn zero() -> Self {
        static ZERO: [u8; Hash::LEN] = [0; Hash::LEN];
        Self(Id(bytes::Bytes::from_static(&ZERO)))
    }

    /// Digest arbitrary content.
    pub fn digest(data: &[u8]) -> Self {
        use sha2::{Digest, Sha256};
        let digest = Sha256::digest(data);
        Self(Id(bytes::Bytes::copy_from_slice(&digest)))
    }

    /// Digest the concatenation of this hash and another one.
    pub fn concat(&self, other: &Hash) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(&self.0 .0);
        hasher.update(&other.0 .0);
        Self(Id(bytes::Bytes::copy_from_slice(&hasher.finalize())))
    }

    /// Set the display/debug implementation for Hash for the duration
    /// of this process. Note, if anything was printed earlier, the
    /// default impl will have been set and cannot be changed.
    /// Returns false if the default was unable to be set.
    pub fn set_global_display_callback(cb: DisplayCb) -> bool {
        HASH_DISP.set(cb).is_ok()
    }
}

static PEER_DISP: std::sync::OnceLock<DisplayCb> = std::sync::OnceLock::new();

/// Names a counterparty that exchanges can be held with.
#[derive(
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct PeerId(pub Id);

imp_deref!(PeerId, Id);
imp_from!(PeerId, bytes::Bytes, b => PeerId(Id(b)));
imp_from!(PeerId, Id, b => PeerId(b));

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        display(&self.0 .0, f, &PEER_DISP)
    }
}

impl std::fmt::Debug for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        display(&self.0 .0, f, &PEER_DISP)
    }
}

impl PeerId {
    /// Set the display/debug implementation for PeerId for the duration
    /// of this process. Note, if anything was printed earlier, the
    /// default impl will have been set and cannot be changed.
    /// Returns false if the default was unable to be set.
    pub fn set_global_display_callback(cb: DisplayCb) -> bool {
        PEER_DISP.set(cb).is_ok()
    }
}
