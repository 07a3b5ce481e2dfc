//! Hashvend fetch types.
//!
//! An exchange is a sequence of turns between a requester and a responder
//! over a [PeerChannel]. The requester sends [FetchRequest]s, the responder
//! answers each with a [FetchResponse] whose items are positionally aligned
//! with the requested hashes, until the requester sends
//! [FetchRequest::End]. A responder that fails the exchange sends a
//! [Rejection] instead of a response.

use crate::*;
use bytes::Bytes;
use prost::Message;
use std::sync::Arc;
use vend_fetch_message::Ty;
use vend_rejection::Reason;

include!("../proto/gen/hashvend.fetch.rs");

/// A request for content, or the end of the exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchRequest {
    /// Request transactions by id.
    Transactions(Vec<Hash>),

    /// Request attachments by digest.
    Attachments(Vec<Hash>),

    /// End the exchange. This is the only clean way to terminate it.
    End,
}

impl FetchRequest {
    /// Construct a request for the given content kind.
    pub fn for_kind(kind: ContentKind, hashes: Vec<Hash>) -> Self {
        match kind {
            ContentKind::Transaction => Self::Transactions(hashes),
            ContentKind::Attachment => Self::Attachments(hashes),
        }
    }

    /// The requested content kind, `None` for [FetchRequest::End].
    pub fn kind(&self) -> Option<ContentKind> {
        match self {
            Self::Transactions(_) => Some(ContentKind::Transaction),
            Self::Attachments(_) => Some(ContentKind::Attachment),
            Self::End => None,
        }
    }

    /// The requested hashes.
    pub fn hashes(&self) -> &[Hash] {
        match self {
            Self::Transactions(hashes) | Self::Attachments(hashes) => hashes,
            Self::End => &[],
        }
    }
}

/// One item of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItem {
    /// The encoded content.
    Content(Bytes),

    /// The responder's access policy withholds this item.
    Denied,
}

/// The answer to a [FetchRequest], one item per requested hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// Items in request order.
    pub items: Vec<FetchItem>,
}

/// Why a responder failed an exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// An allowed hash is not held by the responder.
    HashNotFound(Hash),

    /// The request broke the protocol.
    ProtocolViolation(String),

    /// The responder failed for reasons of its own.
    Internal(String),
}

impl Rejection {
    /// The rejection to send for a failed exchange.
    pub fn from_error(err: &VendError) -> Self {
        match err.primary() {
            VendError::HashNotFound { hash } => Self::HashNotFound(hash.clone()),
            VendError::ProtocolViolation { ctx } => {
                Self::ProtocolViolation(ctx.to_string())
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<Rejection> for VendError {
    fn from(value: Rejection) -> Self {
        match value {
            Rejection::HashNotFound(hash) => VendError::hash_not_found(hash),
            Rejection::ProtocolViolation(ctx) => {
                VendError::protocol_violation(format!("rejected by responder: {ctx}"))
            }
            Rejection::Internal(ctx) => {
                VendError::other(format!("responder failed: {ctx}"))
            }
        }
    }
}

/// A message of the fetch protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchMessage {
    /// A request, sent by the requester.
    Request {
        /// Echoed by the matching response.
        request_id: u64,

        /// The request.
        request: FetchRequest,
    },

    /// A response, sent by the responder.
    Response {
        /// The id of the request this answers.
        request_id: u64,

        /// The response.
        response: FetchResponse,
    },

    /// The responder failed the exchange.
    Rejection {
        /// The id of the request that failed, 0 if none was decoded.
        request_id: u64,

        /// Why.
        rejection: Rejection,
    },

    /// An opening payload sent by a responder before the first request.
    Payload(Bytes),
}

fn unknown_type(ty: i32) -> VendError {
    VendError::protocol_violation(format!("unknown fetch message type: {ty}"))
}

fn decode_hashes(hashes: Vec<Bytes>) -> VendResult<Vec<Hash>> {
    hashes.into_iter().map(Hash::try_from).collect()
}

impl FetchMessage {
    /// Encode for the wire.
    pub fn encode(&self) -> Bytes {
        let mut msg = VendFetchMessage::default();
        match self {
            Self::Request {
                request_id,
                request,
            } => {
                msg.request_id = *request_id;
                msg.ty = match request {
                    FetchRequest::Transactions(_) => Ty::TransactionsRequest,
                    FetchRequest::Attachments(_) => Ty::AttachmentsRequest,
                    FetchRequest::End => Ty::EndRequest,
                }
                .into();
                msg.hashes =
                    request.hashes().iter().cloned().map(Into::into).collect();
            }
            Self::Response {
                request_id,
                response,
            } => {
                msg.ty = Ty::Response.into();
                msg.request_id = *request_id;
                msg.items = response
                    .items
                    .iter()
                    .map(|item| match item {
                        FetchItem::Content(content) => VendFetchItem {
                            denied: false,
                            content: content.clone(),
                        },
                        FetchItem::Denied => VendFetchItem {
                            denied: true,
                            content: Bytes::new(),
                        },
                    })
                    .collect();
            }
            Self::Rejection {
                request_id,
                rejection,
            } => {
                msg.ty = Ty::Rejection.into();
                msg.request_id = *request_id;
                let mut r = VendRejection::default();
                match rejection {
                    Rejection::HashNotFound(hash) => {
                        r.reason = Reason::HashNotFound.into();
                        r.hash = hash.clone().into();
                    }
                    Rejection::ProtocolViolation(ctx) => {
                        r.reason = Reason::ProtocolViolation.into();
                        r.context = ctx.clone();
                    }
                    Rejection::Internal(ctx) => {
                        r.reason = Reason::Internal.into();
                        r.context = ctx.clone();
                    }
                }
                msg.rejection = Some(r);
            }
            Self::Payload(payload) => {
                msg.ty = Ty::Payload.into();
                msg.payload = payload.clone();
            }
        }
        msg.encode_to_vec().into()
    }

    /// Decode from the wire.
    ///
    /// Unknown message types and malformed hashes are protocol violations.
    pub fn decode(data: Bytes) -> VendResult<Self> {
        let msg = VendFetchMessage::decode(data).map_err(|err| {
            VendError::protocol_violation(format!(
                "undecodable fetch message: {err}"
            ))
        })?;
        let request_id = msg.request_id;

        match Ty::try_from(msg.ty).map_err(|_| unknown_type(msg.ty))? {
            Ty::Unspecified => Err(unknown_type(msg.ty)),
            Ty::TransactionsRequest => Ok(Self::Request {
                request_id,
                request: FetchRequest::Transactions(decode_hashes(msg.hashes)?),
            }),
            Ty::AttachmentsRequest => Ok(Self::Request {
                request_id,
                request: FetchRequest::Attachments(decode_hashes(msg.hashes)?),
            }),
            Ty::EndRequest => Ok(Self::Request {
                request_id,
                request: FetchRequest::End,
            }),
            Ty::Response => Ok(Self::Response {
                request_id,
                response: FetchResponse {
                    items: msg
                        .items
                        .into_iter()
                        .map(|item| {
                            if item.denied {
                                FetchItem::Denied
                            } else {
                                FetchItem::Content(item.content)
                            }
                        })
                        .collect(),
                },
            }),
            Ty::Rejection => {
                let r = msg.rejection.ok_or_else(|| {
                    VendError::protocol_violation("rejection without a reason")
                })?;
                let rejection = match Reason::try_from(r.reason) {
                    Ok(Reason::HashNotFound) => {
                        Rejection::HashNotFound(Hash::try_from(r.hash)?)
                    }
                    Ok(Reason::ProtocolViolation) => {
                        Rejection::ProtocolViolation(r.context)
                    }
                    Ok(Reason::Internal) => Rejection::Internal(r.context),
                    Ok(Reason::Unspecified) | Err(_) => {
                        return Err(VendError::protocol_violation(format!(
                            "unknown rejection reason: {}",
                            r.reason
                        )));
                    }
                };
                Ok(Self::Rejection {
                    request_id,
                    rejection,
                })
            }
            Ty::Payload => Ok(Self::Payload(msg.payload)),
        }
    }
}

/// Trait for implementing a fetch module.
///
/// A fetch module holds exchanges with remote peers: as requester to
/// resolve hashes it does not hold locally, and as responder to vend
/// content it holds.
pub trait Fetch: 'static + Send + Sync + std::fmt::Debug {
    /// Resolve transactions by id, from the local store where possible and
    /// from `peer` otherwise. The exchange is ended afterwards.
    fn fetch_transactions(
        &self,
        peer: PeerId,
        hashes: Vec<Hash>,
    ) -> AsyncResult<Vec<Transaction>>;

    /// Resolve attachments by digest, from the local store where possible
    /// and from `peer` otherwise. The exchange is ended afterwards.
    fn fetch_attachments(
        &self,
        peer: PeerId,
        hashes: Vec<Hash>,
    ) -> AsyncResult<Vec<Attachment>>;

    /// Serve requests from `peer` until it ends the exchange.
    ///
    /// With an `opening` payload, it is sent to the peer before waiting
    /// for the first request.
    fn serve(
        &self,
        peer: PeerId,
        opening: Option<Bytes>,
        access: AccessPolicy,
    ) -> AsyncResult<()>;

    /// Like [Fetch::serve], then receive the next message `peer` sends
    /// once it has ended the exchange.
    fn serve_then_receive(
        &self,
        peer: PeerId,
        opening: Option<Bytes>,
        access: AccessPolicy,
    ) -> AsyncResult<Bytes>;
}

/// Trait object [Fetch].
pub type DynFetch = Arc<dyn Fetch>;

/// A factory for creating Fetch instances.
pub trait FetchFactory: 'static + Send + Sync + std::fmt::Debug {
    /// Help the builder construct a default config from the chosen
    /// module factories.
    fn default_config(&self, config: &config::Config) -> VendResult<()>;

    /// Construct a Fetch instance.
    fn create(
        &self,
        builder: Arc<builder::Builder>,
        store: DynContentStore,
        channel: DynPeerChannel,
    ) -> VendResult<DynFetch>;
}

/// Trait object [FetchFactory].
pub type DynFetchFactory = Arc<dyn FetchFactory>;
