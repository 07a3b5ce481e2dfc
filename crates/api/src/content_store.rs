//! Lookup of locally held content by hash.

use crate::*;
use std::sync::Arc;

/// Local storage of transactions and attachments, keyed by hash.
///
/// Persistence is up to the implementor. A lookup resolves to `None` when
/// the hash is not held, and to a failure only when the store itself failed.
#[cfg_attr(any(test, feature = "mockall"), mockall::automock)]
pub trait ContentStore: 'static + Send + Sync + std::fmt::Debug {
    /// Look up a transaction by its id.
    fn lookup_transaction(&self, hash: Hash) -> AsyncResult<Option<Transaction>>;

    /// Look up an attachment by the digest of its bytes.
    fn lookup_attachment(&self, hash: Hash) -> AsyncResult<Option<Attachment>>;
}

/// Trait-object [ContentStore].
pub type DynContentStore = Arc<dyn ContentStore>;
