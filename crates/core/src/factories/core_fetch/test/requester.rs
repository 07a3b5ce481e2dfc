use super::utils::test_config;
use crate::factories::{
    core_fetch::{CoreFetch, RequesterState},
    MemContentStore,
};
use bytes::Bytes;
use hashvend_api::{fetch::*, *};
use hashvend_test_utils::{
    content::{random_attachment, random_transaction},
    id::{random_hash, random_peer_id},
};
use std::sync::{Arc, Mutex};

fn response(request_id: u64, items: Vec<FetchItem>) -> Bytes {
    FetchMessage::Response {
        request_id,
        response: FetchResponse { items },
    }
    .encode()
}

fn request_id_of(data: Bytes) -> u64 {
    match FetchMessage::decode(data).unwrap() {
        FetchMessage::Request { request_id, .. } => request_id,
        other => panic!("expected a request, got {other:?}"),
    }
}

/// A channel answering every request with `reply(request_id)`, and
/// recording what else gets sent.
fn mock_channel(
    reply: impl Fn(u64) -> Bytes + 'static + Send,
    sent: Arc<Mutex<Vec<Bytes>>>,
) -> MockPeerChannel {
    let mut channel = MockPeerChannel::new();
    channel
        .expect_send_and_receive()
        .returning(move |_, data| AsyncResult::immediate(reply(request_id_of(data))));
    channel.expect_send().returning(move |_, data| {
        sent.lock().unwrap().push(data);
        AsyncResult::immediate(())
    });
    channel
}

fn fetch_module(channel: MockPeerChannel) -> CoreFetch {
    CoreFetch::new(test_config(), MemContentStore::create(), Arc::new(channel))
}

fn sent_end(sent: &Mutex<Vec<Bytes>>) -> bool {
    sent.lock().unwrap().iter().any(|data| {
        matches!(
            FetchMessage::decode(data.clone()),
            Ok(FetchMessage::Request {
                request: FetchRequest::End,
                ..
            })
        )
    })
}

#[tokio::test]
async fn extra_items_are_a_protocol_violation() {
    let att = random_attachment();
    let encoded = att.0.clone();
    let sent = Arc::new(Mutex::new(Vec::new()));
    let fetch = fetch_module(mock_channel(
        move |id| {
            response(
                id,
                vec![
                    FetchItem::Content(encoded.clone()),
                    FetchItem::Content(encoded.clone()),
                ],
            )
        },
        sent.clone(),
    ));

    let mut requester = fetch.requester(random_peer_id());
    let err = requester
        .fetch::<Attachment>(vec![att.content_hash()])
        .await
        .unwrap_err();

    assert!(matches!(err, VendError::ProtocolViolation { .. }));
    assert_eq!(RequesterState::Failed, requester.state());
    assert!(sent_end(&sent));
}

#[tokio::test]
async fn short_response_misses_first_unserved_hash() {
    let att = random_attachment();
    let encoded = att.0.clone();
    let missing = random_hash();
    let sent = Arc::new(Mutex::new(Vec::new()));
    let fetch = fetch_module(mock_channel(
        move |id| response(id, vec![FetchItem::Content(encoded.clone())]),
        sent.clone(),
    ));

    let mut requester = fetch.requester(random_peer_id());
    let err = requester
        .fetch::<Attachment>(vec![att.content_hash(), missing.clone()])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        VendError::HashNotFound { ref hash } if *hash == missing
    ));
    assert!(sent_end(&sent));
}

#[tokio::test]
async fn tampered_transaction_fails_integrity() {
    let tx = random_transaction(2);
    let encoded = tx.encode();

    for pos in 0..encoded.len() {
        let mut tampered = encoded.to_vec();
        tampered[pos] ^= 0xff;
        let tampered = Bytes::from(tampered);

        let sent = Arc::new(Mutex::new(Vec::new()));
        let fetch = fetch_module(mock_channel(
            move |id| response(id, vec![FetchItem::Content(tampered.clone())]),
            sent.clone(),
        ));

        let mut requester = fetch.requester(random_peer_id());
        let err = requester
            .fetch::<Transaction>(vec![tx.content_hash()])
            .await
            .unwrap_err();

        assert!(
            matches!(
                err,
                VendError::IntegrityMismatch { ref requested, .. }
                    if requested == tx.id()
            ),
            "byte {pos}: {err}"
        );
        assert!(sent_end(&sent));
    }
}

#[tokio::test]
async fn stale_reply_is_discarded() {
    let first = random_attachment();
    let second = random_attachment();

    let mut channel = MockPeerChannel::new();
    let stale = first.0.clone();
    channel.expect_send_and_receive().returning(move |_, _| {
        // every request is answered with the reply to the first
        AsyncResult::immediate(response(
            1,
            vec![FetchItem::Content(stale.clone())],
        ))
    });
    let late = second.0.clone();
    channel.expect_receive().times(1).returning(move |_| {
        AsyncResult::immediate(response(2, vec![FetchItem::Content(late.clone())]))
    });

    let fetch = fetch_module(channel);
    let mut requester = fetch.requester(random_peer_id());

    assert_eq!(
        vec![first.clone()],
        requester
            .fetch::<Attachment>(vec![first.content_hash()])
            .await
            .unwrap()
    );
    assert_eq!(
        vec![second.clone()],
        requester
            .fetch::<Attachment>(vec![second.content_hash()])
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn reply_to_unsent_request_is_a_protocol_violation() {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let fetch = fetch_module(mock_channel(
        |id| response(id + 1, vec![]),
        sent,
    ));

    let mut requester = fetch.requester(random_peer_id());
    let err = requester
        .fetch::<Attachment>(vec![random_hash()])
        .await
        .unwrap_err();
    assert!(matches!(err, VendError::ProtocolViolation { .. }));
}

#[tokio::test]
async fn rejection_fails_without_ending() {
    let wanted = random_hash();
    let rejected = wanted.clone();

    let mut channel = MockPeerChannel::new();
    channel.expect_send_and_receive().returning(move |_, data| {
        AsyncResult::immediate(
            FetchMessage::Rejection {
                request_id: request_id_of(data),
                rejection: Rejection::HashNotFound(rejected.clone()),
            }
            .encode(),
        )
    });
    // the responder is gone, nothing more is sent
    channel.expect_send().never();

    let fetch = fetch_module(channel);
    let mut requester = fetch.requester(random_peer_id());
    let err = requester
        .fetch::<Attachment>(vec![wanted.clone()])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        VendError::HashNotFound { ref hash } if *hash == wanted
    ));
    requester.end().await.unwrap();
}

#[tokio::test]
async fn rejection_naming_unrequested_hash_is_a_protocol_violation() {
    let mut channel = MockPeerChannel::new();
    channel.expect_send_and_receive().returning(|_, data| {
        AsyncResult::immediate(
            FetchMessage::Rejection {
                request_id: request_id_of(data),
                rejection: Rejection::HashNotFound(random_hash()),
            }
            .encode(),
        )
    });
    channel.expect_send().never();

    let fetch = fetch_module(channel);
    let mut requester = fetch.requester(random_peer_id());
    let err = requester
        .fetch::<Attachment>(vec![random_hash()])
        .await
        .unwrap_err();
    assert!(matches!(err, VendError::ProtocolViolation { .. }));
}

#[tokio::test]
async fn nothing_is_sent_for_an_empty_fetch() {
    let mut channel = MockPeerChannel::new();
    channel.expect_send_and_receive().never();

    let fetch = fetch_module(channel);
    let mut requester = fetch.requester(random_peer_id());
    assert!(requester
        .fetch::<Attachment>(vec![])
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test(start_paused = true)]
async fn dropping_a_fetch_cancels_the_pending_reply() {
    let pending = Arc::new(Mutex::new(Vec::new()));

    let mut channel = MockPeerChannel::new();
    let p = pending.clone();
    channel.expect_send_and_receive().returning(move |_, _| {
        let (completer, reply) = AsyncResult::<Bytes>::create();
        p.lock().unwrap().push((completer, reply.clone()));
        reply
    });

    let fetch = fetch_module(channel);
    let mut requester = fetch.requester(random_peer_id());
    {
        let fut = requester.fetch::<Attachment>(vec![random_hash()]);
        let _ = tokio::time::timeout(std::time::Duration::from_millis(50), fut)
            .await;
    }

    let pending = pending.lock().unwrap();
    assert_eq!(1, pending.len());
    assert!(pending[0].1.is_cancelled());
}
