//! Access control applied by a responder to the hashes it is asked for.

use crate::{ContentKind, Hash};
use std::sync::Arc;

/// Decides per hash whether a responder may serve it.
///
/// This is a purely local policy gate and never travels over the wire.
pub type AccessPredicate = Arc<dyn Fn(&Hash) -> bool + 'static + Send + Sync>;

/// The access policy of a responder, one predicate per content kind.
#[derive(Clone)]
pub struct AccessPolicy {
    /// Gate for transaction requests.
    pub transactions: AccessPredicate,

    /// Gate for attachment requests.
    pub attachments: AccessPredicate,
}

impl std::fmt::Debug for AccessPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessPolicy").finish_non_exhaustive()
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::allow_all()
    }
}

impl AccessPolicy {
    /// A policy that serves every hash.
    pub fn allow_all() -> Self {
        Self {
            transactions: Arc::new(|_| true),
            attachments: Arc::new(|_| true),
        }
    }

    /// Replace the transaction predicate.
    pub fn with_transactions(
        mut self,
        predicate: impl Fn(&Hash) -> bool + 'static + Send + Sync,
    ) -> Self {
        self.transactions = Arc::new(predicate);
        self
    }

    /// Replace the attachment predicate.
    pub fn with_attachments(
        mut self,
        predicate: impl Fn(&Hash) -> bool + 'static + Send + Sync,
    ) -> Self {
        self.attachments = Arc::new(predicate);
        self
    }

    /// Whether `hash` of the given kind may be served.
    pub fn is_allowed(&self, kind: ContentKind, hash: &Hash) -> bool {
        match kind {
            ContentKind::Transaction => (self.transactions)(hash),
            ContentKind::Attachment => (self.attachments)(hash),
        }
    }
}
