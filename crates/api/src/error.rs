//! Hashvend error types.

use crate::{Hash, PeerId};
use std::sync::Arc;

/// A clonable trait-object inner error.
#[derive(Clone, Default)]
pub struct DynInnerError(
    pub Option<Arc<dyn std::error::Error + 'static + Send + Sync>>,
);

impl std::fmt::Debug for DynInnerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::fmt::Display for DynInnerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.as_ref() {
            None => f.write_str("None"),
            Some(s) => s.fmt(f),
        }
    }
}

impl std::error::Error for DynInnerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.as_ref().map(|s| {
            let out: &(dyn std::error::Error + 'static) = &**s;
            out
        })
    }
}

impl DynInnerError {
    /// Construct a new DynInnerError from a source error.
    pub fn new<E: std::error::Error + 'static + Send + Sync>(e: E) -> Self {
        Self(Some(Arc::new(e)))
    }
}

/// The hashvend error type, used by the async result primitive and by
/// both roles of the fetch protocol.
///
/// This type is required to implement `Clone` because a single
/// [AsyncResult](crate::AsyncResult) hands its terminal state to every
/// consumer that observes it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum VendError {
    /// Generic internal error.
    #[error("{ctx} (src: {src})")]
    Other {
        /// Any context associated with this error.
        ctx: Arc<str>,

        /// The inner error (if any).
        #[source]
        src: DynInnerError,
    },

    /// The counterparty broke the fetch protocol, for example by sending an
    /// empty batch or an unknown message type.
    #[error("protocol violation: {ctx}")]
    ProtocolViolation {
        /// What was violated.
        ctx: Arc<str>,
    },

    /// A requested hash could not be resolved locally or remotely, or was
    /// withheld by the responder's access policy.
    #[error("hash not found: {hash}")]
    HashNotFound {
        /// The hash that could not be resolved.
        hash: Hash,
    },

    /// Delivered content does not digest to the hash it was requested
    /// under. Indicates a corrupted or malicious counterparty.
    #[error("downloaded data does not match requested hash {requested} (digest: {delivered})")]
    IntegrityMismatch {
        /// The hash the content was requested under.
        requested: Hash,

        /// The digest of the content that was actually delivered.
        delivered: Hash,
    },

    /// The channel to a peer failed, either by disconnecting or by timing
    /// out. This is the only kind of error that may be retried.
    #[error("channel failure with peer {peer}: {ctx}")]
    ChannelFailure {
        /// The peer the channel leads to.
        peer: PeerId,

        /// What happened to the channel.
        ctx: Arc<str>,
    },

    /// A blocking wait elapsed before the result was available.
    #[error("timed out: {ctx}")]
    Timeout {
        /// What was being waited for.
        ctx: Arc<str>,
    },

    /// The result was cancelled before it completed.
    #[error("cancelled")]
    Cancelled,

    /// Several concurrent operations failed. The first observed failure is
    /// the primary one, all others are kept as suppressed errors.
    #[error("{primary} (+{} suppressed)", .suppressed.len())]
    Aggregate {
        /// The first observed failure.
        primary: Box<VendError>,

        /// Failures observed after the primary one.
        suppressed: Vec<VendError>,
    },
}

impl VendError {
    /// Construct an "other" error with an inner source error.
    pub fn other_src<
        C: std::fmt::Display,
        S: std::error::Error + 'static + Send + Sync,
    >(
        ctx: C,
        src: S,
    ) -> Self {
        Self::Other {
            ctx: ctx.to_string().into_boxed_str().into(),
            src: DynInnerError::new(src),
        }
    }

    /// Construct an "other" error.
    pub fn other<C: std::fmt::Display>(ctx: C) -> Self {
        Self::Other {
            ctx: ctx.to_string().into_boxed_str().into(),
            src: DynInnerError::default(),
        }
    }

    /// Construct a protocol violation.
    pub fn protocol_violation(ctx: impl Into<Arc<str>>) -> Self {
        Self::ProtocolViolation { ctx: ctx.into() }
    }

    /// Construct a hash-not-found error.
    pub fn hash_not_found(hash: Hash) -> Self {
        Self::HashNotFound { hash }
    }

    /// Construct a channel failure for the given peer.
    pub fn channel_failure(peer: PeerId, ctx: impl Into<Arc<str>>) -> Self {
        Self::ChannelFailure {
            peer,
            ctx: ctx.into(),
        }
    }

    /// Construct a timeout error.
    pub fn timeout(ctx: impl Into<Arc<str>>) -> Self {
        Self::Timeout { ctx: ctx.into() }
    }

    /// Combine a primary failure with failures observed after it.
    ///
    /// With nothing to suppress the primary error is returned unchanged.
    pub fn aggregate(primary: VendError, suppressed: Vec<VendError>) -> Self {
        if suppressed.is_empty() {
            primary
        } else {
            Self::Aggregate {
                primary: Box::new(primary),
                suppressed,
            }
        }
    }

    /// The primary error. For anything but [VendError::Aggregate] this is
    /// the error itself.
    pub fn primary(&self) -> &VendError {
        match self {
            Self::Aggregate { primary, .. } => primary.primary(),
            other => other,
        }
    }

    /// Errors suppressed behind the primary one.
    pub fn suppressed(&self) -> &[VendError] {
        match self {
            Self::Aggregate { suppressed, .. } => suppressed,
            _ => &[],
        }
    }

    /// Whether this error marks a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether the failed operation may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self.primary(), Self::ChannelFailure { .. })
    }
}

/// The hashvend result type.
pub type VendResult<T> = Result<T, VendError>;

#[cfg(test)]
mod test {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn error_display() {
        assert_eq!(
            "bla (src: None)",
            VendError::other("bla").to_string().as_str(),
        );
        assert_eq!(
            "foo (src: bar)",
            VendError::other_src("foo", std::io::Error::other("bar"))
                .to_string()
                .as_str(),
        );
        assert_eq!(
            "protocol violation: empty hash list",
            VendError::protocol_violation("empty hash list")
                .to_string()
                .as_str(),
        );
    }

    #[test]
    fn error_debug() {
        assert_eq!(
            "Other { ctx: \"bla\", src: None }",
            format!("{:?}", VendError::other("bla")).as_str(),
        );
        assert_eq!("Cancelled", format!("{:?}", VendError::Cancelled));
    }

    #[test]
    fn aggregate_keeps_primary_and_suppressed() {
        let hash = Hash::digest(b"missing");
        let err = VendError::aggregate(
            VendError::hash_not_found(hash.clone()),
            vec![VendError::other("second"), VendError::Cancelled],
        );

        assert!(matches!(
            err.primary(),
            VendError::HashNotFound { hash: h } if *h == hash
        ));
        assert_eq!(2, err.suppressed().len());
        assert!(err.to_string().ends_with("(+2 suppressed)"));
    }

    #[test]
    fn aggregate_without_suppressed_is_unchanged() {
        let err = VendError::aggregate(VendError::other("only"), vec![]);
        assert!(matches!(err, VendError::Other { .. }));
        assert!(err.suppressed().is_empty());
    }

    #[test]
    fn only_channel_failures_are_retryable() {
        let peer = PeerId::from(Bytes::from_static(b"bob"));
        assert!(VendError::channel_failure(peer.clone(), "gone").is_retryable());
        assert!(VendError::aggregate(
            VendError::channel_failure(peer, "gone"),
            vec![VendError::other("also")],
        )
        .is_retryable());
        assert!(!VendError::protocol_violation("bad").is_retryable());
        assert!(!VendError::Cancelled.is_retryable());
    }

    #[test]
    fn ensure_vend_error_type_is_send_and_sync() {
        fn ensure<T: std::fmt::Display + Send + Sync>(_t: T) {}
        ensure(VendError::other("bla"));
    }
}
