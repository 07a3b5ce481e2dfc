#![deny(missing_docs)]
//! Hashvend hash-addressed data vending.
//!
//! This crate provides the [factories::CoreFetchFactory] fetch module along
//! with in-memory content store and channel implementations for testing.

use hashvend_api::{builder::Builder, config::Config};

/// Construct a production-ready default builder.
///
/// - `fetch` - The default fetch module is [factories::CoreFetchFactory].
pub fn default_builder() -> Builder {
    Builder {
        config: Config::default(),
        fetch: factories::CoreFetchFactory::create(),
    }
}

pub mod factories;
