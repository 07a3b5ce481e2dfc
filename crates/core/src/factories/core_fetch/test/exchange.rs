use super::utils::{setup, test_config};
use crate::factories::{
    core_fetch::{CoreFetchConfig, Opening, RequesterState, ResponderState},
    Fault,
};
use bytes::Bytes;
use hashvend_api::{
    fetch::{Fetch, FetchMessage, FetchRequest},
    *,
};
use hashvend_test_utils::{
    content::{create_attachment_list, random_attachment, random_transaction},
    enable_tracing,
};
use std::time::Duration;

#[tokio::test(flavor = "multi_thread")]
async fn integrity_round_trip() {
    enable_tracing();
    let t = setup(test_config());

    let attachments = create_attachment_list(3);
    let hashes = attachments
        .iter()
        .map(|a| t.responder.store.insert_attachment(a.clone()))
        .collect::<Vec<_>>();

    let serve = t.responder.fetch.serve(
        t.requester.peer.clone(),
        None,
        AccessPolicy::allow_all(),
    );
    let fetched = t
        .requester
        .fetch
        .fetch_attachments(t.responder.peer.clone(), hashes)
        .await
        .unwrap();

    assert_eq!(attachments, fetched);
    serve.await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn several_turns_in_one_exchange() {
    enable_tracing();
    let t = setup(test_config());

    let tx = random_transaction(5);
    let att = random_attachment();
    let tx_id = t.responder.store.insert_transaction(tx.clone());
    let att_id = t.responder.store.insert_attachment(att.clone());

    let mut responder = t.responder.fetch.responder(
        t.requester.peer.clone(),
        Opening::Receive,
        AccessPolicy::allow_all(),
    );
    let serve = tokio::spawn(async move {
        let result = responder.run().await;
        (result, responder.state())
    });

    let mut requester = t.requester.fetch.requester(t.responder.peer.clone());
    let txs = requester
        .fetch::<Transaction>(vec![tx_id])
        .await
        .unwrap();
    assert_eq!(vec![tx], txs);
    assert_eq!(RequesterState::BuildingRequest, requester.state());

    let atts = requester.fetch::<Attachment>(vec![att_id]).await.unwrap();
    assert_eq!(vec![att], atts);

    requester.end().await.unwrap();
    assert_eq!(RequesterState::Done, requester.state());

    let (result, state) = serve.await.unwrap();
    result.unwrap();
    assert_eq!(ResponderState::Terminated, state);
}

#[tokio::test(flavor = "multi_thread")]
async fn substituted_bytes_fail_integrity() {
    enable_tracing();
    let t = setup(test_config());

    let wanted = random_attachment();
    let h1 = wanted.content_hash();
    t.responder
        .store
        .insert_attachment_unchecked(h1.clone(), random_attachment());

    let serve = t.responder.fetch.serve(
        t.requester.peer.clone(),
        None,
        AccessPolicy::allow_all(),
    );
    let err = t
        .requester
        .fetch
        .fetch_attachments(t.responder.peer.clone(), vec![h1.clone()])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        VendError::IntegrityMismatch { ref requested, .. } if *requested == h1
    ));

    // the requester ended the exchange it failed
    serve.await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn denied_hash_is_not_found() {
    enable_tracing();
    let t = setup(test_config());

    let h1 = t.responder.store.insert_attachment(random_attachment());
    let h2 = t.responder.store.insert_attachment(random_attachment());

    let denied = h2.clone();
    let serve = t.responder.fetch.serve(
        t.requester.peer.clone(),
        None,
        AccessPolicy::allow_all().with_attachments(move |h| *h != denied),
    );
    let err = t
        .requester
        .fetch
        .fetch_attachments(t.responder.peer.clone(), vec![h1, h2.clone()])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        VendError::HashNotFound { ref hash } if *hash == h2
    ));
    serve.await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_hash_is_rejected() {
    enable_tracing();
    let t = setup(test_config());

    let h1 = t.responder.store.insert_attachment(random_attachment());
    let h2 = random_attachment().content_hash();

    let serve = t.responder.fetch.serve(
        t.requester.peer.clone(),
        None,
        AccessPolicy::allow_all(),
    );
    let err = t
        .requester
        .fetch
        .fetch_attachments(t.responder.peer.clone(), vec![h1, h2.clone()])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        VendError::HashNotFound { ref hash } if *hash == h2
    ));

    let err = serve.await.unwrap_err();
    assert!(matches!(
        err.primary(),
        VendError::HashNotFound { hash } if *hash == h2
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn local_hashes_are_never_requested() {
    enable_tracing();
    let t = setup(test_config());

    // only the requester holds `local`, the responder would reject it
    let local = random_attachment();
    let remote = random_attachment();
    let local_id = t.requester.store.insert_attachment(local.clone());
    let remote_id = t.responder.store.insert_attachment(remote.clone());

    let serve = t.responder.fetch.serve(
        t.requester.peer.clone(),
        None,
        AccessPolicy::allow_all(),
    );
    let fetched = t
        .requester
        .fetch
        .fetch_attachments(
            t.responder.peer.clone(),
            vec![remote_id, local_id.clone(), local_id],
        )
        .await
        .unwrap();

    assert_eq!(vec![remote, local.clone(), local], fetched);
    serve.await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn outstanding_hashes_are_batched() {
    enable_tracing();
    let t = setup(CoreFetchConfig {
        max_batch_size: 2,
        ..test_config()
    });

    let attachments = create_attachment_list(5);
    let hashes = attachments
        .iter()
        .map(|a| t.responder.store.insert_attachment(a.clone()))
        .collect::<Vec<_>>();

    // the responder rejects batches over 2, so this takes three turns
    let serve = t.responder.fetch.serve(
        t.requester.peer.clone(),
        None,
        AccessPolicy::allow_all(),
    );
    let fetched = t
        .requester
        .fetch
        .fetch_attachments(t.responder.peer.clone(), hashes)
        .await
        .unwrap();

    assert_eq!(attachments, fetched);
    serve.await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn opening_payload_precedes_requests() {
    enable_tracing();
    let t = setup(test_config());

    let att = random_attachment();
    let att_id = t.responder.store.insert_attachment(att.clone());

    let serve = t.responder.fetch.serve(
        t.requester.peer.clone(),
        Some(Bytes::from_static(b"manifest")),
        AccessPolicy::allow_all(),
    );

    let mut requester = t.requester.fetch.requester(t.responder.peer.clone());
    assert_eq!(
        Bytes::from_static(b"manifest"),
        requester.receive_opening().await.unwrap()
    );
    assert_eq!(
        vec![att],
        requester.fetch::<Attachment>(vec![att_id]).await.unwrap()
    );
    requester.end().await.unwrap();

    serve.await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn serve_then_receive_yields_the_message_after_the_exchange() {
    enable_tracing();
    let t = setup(test_config());

    let att = random_attachment();
    let att_id = t.responder.store.insert_attachment(att.clone());

    let serve = t.responder.fetch.serve_then_receive(
        t.requester.peer.clone(),
        None,
        AccessPolicy::allow_all(),
    );

    let mut requester = t.requester.fetch.requester(t.responder.peer.clone());
    assert_eq!(
        vec![att],
        requester.fetch::<Attachment>(vec![att_id]).await.unwrap()
    );
    requester.end().await.unwrap();
    t.requester
        .channel
        .send(t.responder.peer.clone(), Bytes::from_static(b"signature"))
        .await
        .unwrap();

    assert_eq!(Bytes::from_static(b"signature"), serve.await.unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn lost_messages_are_resent() {
    enable_tracing();
    let t = setup(test_config());

    let att = random_attachment();
    let att_id = t.responder.store.insert_attachment(att.clone());

    // the first request fails to send, the first response gets lost
    t.net
        .inject_fault(&t.requester.peer, &t.responder.peer, Fault::Disconnect);
    t.net
        .inject_fault(&t.responder.peer, &t.requester.peer, Fault::Drop);

    let serve = t.responder.fetch.serve(
        t.requester.peer.clone(),
        None,
        AccessPolicy::allow_all(),
    );
    let fetched = t
        .requester
        .fetch
        .fetch_attachments(t.responder.peer.clone(), vec![att_id])
        .await
        .unwrap();

    assert_eq!(vec![att], fetched);
    serve.await.unwrap();
    assert!(!t.requester.fetch.is_peer_on_back_off(&t.responder.peer));
}

#[tokio::test(start_paused = true)]
async fn unresponsive_peer_is_backed_off() {
    enable_tracing();
    let t = setup(test_config());
    let h = t.responder.store.insert_attachment(random_attachment());

    // nobody serves on the responder side
    let err = t
        .requester
        .fetch
        .fetch_attachments(t.responder.peer.clone(), vec![h.clone()])
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert!(t.requester.fetch.is_peer_on_back_off(&t.responder.peer));

    let err = t
        .requester
        .fetch
        .fetch_attachments(t.responder.peer.clone(), vec![h])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("backed off"));

    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert!(!t.requester.fetch.is_peer_on_back_off(&t.responder.peer));
}

#[tokio::test(flavor = "multi_thread")]
async fn ended_requester_refuses_to_fetch() {
    let t = setup(test_config());
    let h = t.requester.store.insert_attachment(random_attachment());

    let mut requester = t.requester.fetch.requester(t.responder.peer.clone());
    requester.end().await.unwrap();
    requester.end().await.unwrap();

    assert!(requester.fetch::<Attachment>(vec![h]).await.is_err());

    // exactly one end request went out
    let first = t
        .responder
        .channel
        .receive(t.requester.peer.clone())
        .await
        .unwrap();
    assert!(matches!(
        FetchMessage::decode(first).unwrap(),
        FetchMessage::Request {
            request: FetchRequest::End,
            ..
        }
    ));
    let second = t
        .responder
        .channel
        .receive(t.requester.peer.clone())
        .with_timeout(Duration::from_millis(50), || VendError::timeout("none"));
    assert!(matches!(second.await, Err(VendError::Timeout { .. })));
}
