//! Builder-related types.

use crate::*;
use std::sync::Arc;

/// The general hashvend builder.
/// This contains both configuration and factory instances,
/// allowing construction of runtime module instances.
#[derive(Debug)]
pub struct Builder {
    /// The module configuration to be used when building modules.
    /// This can be loaded from disk or modified before freezing the builder.
    pub config: config::Config,

    /// The [fetch::FetchFactory] to be used for creating
    /// [fetch::Fetch] instances.
    pub fetch: fetch::DynFetchFactory,
}

impl Builder {
    /// Construct a default config given the configured module factories.
    pub fn with_default_config(self) -> VendResult<Self> {
        self.fetch.default_config(&self.config)?;
        Ok(self)
    }

    /// Freeze the builder so modules can be created from it.
    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }
}
