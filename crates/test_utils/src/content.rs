//! Test utilities associated with vended content.

use bytes::Bytes;
use hashvend_api::{Attachment, Transaction};

use crate::random_bytes;

/// Create an attachment of random bytes.
pub fn random_attachment() -> Attachment {
    Attachment(Bytes::from(random_bytes(64)))
}

/// Create a transaction of `num_components` random components.
///
/// Panics if `num_components` is zero.
pub fn random_transaction(num_components: usize) -> Transaction {
    Transaction::new(
        (0..num_components)
            .map(|_| Bytes::from(random_bytes(48)))
            .collect(),
    )
    .expect("a transaction needs at least one component")
}

/// Create a list of random attachments.
pub fn create_attachment_list(num_attachments: usize) -> Vec<Attachment> {
    (0..num_attachments).map(|_| random_attachment()).collect()
}
