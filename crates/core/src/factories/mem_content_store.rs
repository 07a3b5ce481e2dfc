//! The mem content store implementation provided by hashvend.

use hashvend_api::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Inner {
    transactions: HashMap<Hash, Transaction>,
    attachments: HashMap<Hash, Attachment>,
}

/// An in-memory [ContentStore].
/// This is NOT a production module. It is for testing only.
#[derive(Debug, Default)]
pub struct MemContentStore(Mutex<Inner>);

impl MemContentStore {
    /// Construct a new, empty MemContentStore.
    pub fn create() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Store a transaction under its id, returning the id.
    pub fn insert_transaction(&self, transaction: Transaction) -> Hash {
        let hash = transaction.id().clone();
        self.0
            .lock()
            .unwrap()
            .transactions
            .insert(hash.clone(), transaction);
        hash
    }

    /// Store an attachment under its digest, returning the digest.
    pub fn insert_attachment(&self, attachment: Attachment) -> Hash {
        let hash = attachment.content_hash();
        self.insert_attachment_unchecked(hash.clone(), attachment);
        hash
    }

    /// Store an attachment under an arbitrary hash, simulating a corrupted
    /// or malicious store.
    pub fn insert_attachment_unchecked(&self, hash: Hash, attachment: Attachment) {
        self.0.lock().unwrap().attachments.insert(hash, attachment);
    }
}

impl ContentStore for MemContentStore {
    fn lookup_transaction(&self, hash: Hash) -> AsyncResult<Option<Transaction>> {
        AsyncResult::immediate(self.0.lock().unwrap().transactions.get(&hash).cloned())
    }

    fn lookup_attachment(&self, hash: Hash) -> AsyncResult<Option<Attachment>> {
        AsyncResult::immediate(self.0.lock().unwrap().attachments.get(&hash).cloned())
    }
}
