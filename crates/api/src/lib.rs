#![deny(missing_docs)]
//! Hashvend API contains the asynchronous result primitive, the wire types
//! of the hash-addressed fetch protocol and the traits of the collaborators
//! the protocol is built on (content lookup and peer channels).
//!
//! If you want the protocol implementation itself, please see the
//! hashvend_core crate.

pub(crate) mod serde_bytes_base64 {
    pub fn serialize<S>(
        b: &bytes::Bytes,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use base64::prelude::*;
        serializer.serialize_str(&BASE64_URL_SAFE_NO_PAD.encode(b))
    }

    pub fn deserialize<'de, D, T: From<bytes::Bytes>>(
        deserializer: D,
    ) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use base64::prelude::*;
        let s: &'de str = serde::Deserialize::deserialize(deserializer)?;
        BASE64_URL_SAFE_NO_PAD
            .decode(s)
            .map(|v| bytes::Bytes::copy_from_slice(&v).into())
            .map_err(serde::de::Error::custom)
    }
}

pub mod access;
pub use access::*;

pub mod builder;
pub mod channel;
pub use channel::*;

pub mod config;

pub mod content;
pub use content::*;

pub mod content_store;
pub use content_store::*;

mod error;
pub use error::*;

pub mod fetch;

pub mod future;
pub use future::{AsyncResult, Completer};

pub mod id;
pub use id::{Hash, PeerId};

pub mod outcome;
pub use outcome::OutcomeExt;
