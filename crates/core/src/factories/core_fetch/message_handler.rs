use bytes::Bytes;
use hashvend_api::{fetch::*, *};

/// What the responder answered to a request.
#[derive(Debug, Clone)]
pub(super) enum Turn {
    Response(FetchResponse),
    Rejected(Rejection),
}

/// Decode a message a responder received.
pub(super) fn decode_request(data: Bytes) -> VendResult<(u64, FetchRequest)> {
    match FetchMessage::decode(data)? {
        FetchMessage::Request {
            request_id,
            request,
        } => Ok((request_id, request)),
        _ => Err(VendError::protocol_violation("expected a request")),
    }
}

/// Decode a message a requester received while awaiting the reply to
/// `request_id`.
///
/// Replies to earlier requests are stale and yield `None`. A rejection
/// carrying id 0 was raised before the responder could decode a request,
/// and is accepted as the reply to any request.
pub(super) fn decode_reply(
    request_id: u64,
    data: Bytes,
) -> VendResult<Option<Turn>> {
    let (reply_id, turn) = match FetchMessage::decode(data)? {
        FetchMessage::Response {
            request_id,
            response,
        } => (request_id, Turn::Response(response)),
        FetchMessage::Rejection {
            request_id: 0,
            rejection,
        } => return Ok(Some(Turn::Rejected(rejection))),
        FetchMessage::Rejection {
            request_id,
            rejection,
        } => (request_id, Turn::Rejected(rejection)),
        FetchMessage::Request { .. } | FetchMessage::Payload(_) => {
            return Err(VendError::protocol_violation("expected a reply"));
        }
    };

    if reply_id == request_id {
        Ok(Some(turn))
    } else if reply_id < request_id {
        Ok(None)
    } else {
        Err(VendError::protocol_violation(format!(
            "reply to request {reply_id} while awaiting {request_id}"
        )))
    }
}
