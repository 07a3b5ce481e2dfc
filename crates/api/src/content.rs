//! The two kinds of hash-addressed content a peer can vend.

use crate::*;
use bytes::Bytes;
use prost::Message;

/// The kind of content an exchange is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    /// Transactions, addressed by the merkle root of their components.
    Transaction,

    /// Attachments, addressed by the digest of their bytes.
    Attachment,
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transaction => f.write_str("transaction"),
            Self::Attachment => f.write_str("attachment"),
        }
    }
}

/// Content that can be vended by hash.
///
/// The hash of a content item is derived from the item itself, so a
/// requester can check every delivered item against the hash it asked for.
pub trait Content: Clone + Send + Sync + std::fmt::Debug + 'static {
    /// Which kind of content this is.
    const KIND: ContentKind;

    /// Digest the content.
    fn content_hash(&self) -> Hash;

    /// Encode the content for the wire.
    fn encode(&self) -> Bytes;

    /// Decode content received from the wire.
    fn decode(data: Bytes) -> VendResult<Self>;

    /// Look the content up in a store.
    fn lookup(store: &dyn ContentStore, hash: Hash) -> AsyncResult<Option<Self>>;
}

/// An opaque blob addressed by the digest of its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment(pub Bytes);

impl Content for Attachment {
    const KIND: ContentKind = ContentKind::Attachment;

    fn content_hash(&self) -> Hash {
        Hash::digest(&self.0)
    }

    fn encode(&self) -> Bytes {
        self.0.clone()
    }

    fn decode(data: Bytes) -> VendResult<Self> {
        Ok(Self(data))
    }

    fn lookup(store: &dyn ContentStore, hash: Hash) -> AsyncResult<Option<Self>> {
        store.lookup_attachment(hash)
    }
}

/// A transaction, made of one or more serialized components.
///
/// Its id is the merkle root over the digests of its components, so that
/// tampering with any component changes the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    components: Vec<Bytes>,
    id: Hash,
}

impl Transaction {
    /// Construct a transaction. At least one component is required.
    pub fn new(components: Vec<Bytes>) -> VendResult<Self> {
        if components.is_empty() {
            return Err(VendError::other("transaction has no components"));
        }
        let id = merkle_root(components.iter().map(|c| Hash::digest(c)).collect());
        Ok(Self { components, id })
    }

    /// The transaction id.
    pub fn id(&self) -> &Hash {
        &self.id
    }

    /// The serialized components.
    pub fn components(&self) -> &[Bytes] {
        &self.components
    }
}

impl Content for Transaction {
    const KIND: ContentKind = ContentKind::Transaction;

    fn content_hash(&self) -> Hash {
        self.id.clone()
    }

    fn encode(&self) -> Bytes {
        crate::fetch::VendTransaction {
            components: self.components.clone(),
        }
        .encode_to_vec()
        .into()
    }

    fn decode(data: Bytes) -> VendResult<Self> {
        let tx = crate::fetch::VendTransaction::decode(data).map_err(|err| {
            VendError::protocol_violation(format!("undecodable transaction: {err}"))
        })?;
        Self::new(tx.components)
            .map_err(|err| VendError::protocol_violation(err.to_string()))
    }

    fn lookup(store: &dyn ContentStore, hash: Hash) -> AsyncResult<Option<Self>> {
        store.lookup_transaction(hash)
    }
}

/// Merkle root of a non-empty list of leaves. The leaves are padded with
/// zero hashes up to the next power of two.
fn merkle_root(mut level: Vec<Hash>) -> Hash {
    let width = level.len().next_power_of_two();
    level.resize(width, Hash::zero());
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| pair[0].concat(&pair[1]))
            .collect();
    }
    level.pop().unwrap_or_else(Hash::zero)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn attachment_hash_is_digest() {
        let a = Attachment(Bytes::from_static(b"hello"));
        assert_eq!(Hash::digest(b"hello"), a.content_hash());
    }

    #[test]
    fn single_component_id_is_its_digest() {
        let tx = Transaction::new(vec![Bytes::from_static(b"c")]).unwrap();
        assert_eq!(&Hash::digest(b"c"), tx.id());
    }

    #[test]
    fn three_components_are_padded() {
        let tx = Transaction::new(vec![
            Bytes::from_static(b"a"),
            Bytes::from_static(b"b"),
            Bytes::from_static(b"c"),
        ])
        .unwrap();

        let left = Hash::digest(b"a").concat(&Hash::digest(b"b"));
        let right = Hash::digest(b"c").concat(&Hash::zero());
        assert_eq!(&left.concat(&right), tx.id());
    }

    #[test]
    fn empty_transaction_is_rejected() {
        assert!(Transaction::new(vec![]).is_err());
    }

    #[test]
    fn transaction_codec_preserves_id() {
        let tx = Transaction::new(vec![
            Bytes::from_static(b"input"),
            Bytes::from_static(b"output"),
        ])
        .unwrap();
        let decoded = Transaction::decode(tx.encode()).unwrap();
        assert_eq!(tx, decoded);
        assert_eq!(tx.content_hash(), decoded.content_hash());

        assert!(matches!(
            Transaction::decode(Bytes::from_static(&[0xff, 0xff])),
            Err(VendError::ProtocolViolation { .. })
        ));
    }
}
