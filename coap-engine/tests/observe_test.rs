// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The coap-engine Contributors, all rights reserved.
 * This file is part of the coap-engine project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * tests/observe_test.rs - Tests for resource observation.
 */

use std::time::Duration;

use coap_engine::{
    block::{BlockOptionValue, BlockSize},
    client::{CoapClientConnectOptionsBuilder, CoapObserveOptions, HandleResponseContext, HandlerError},
    message::{CoapMessageCommon, CoapOption},
    protocol::{CoapMessageCode, CoapMessageType, CoapOptionType, CoapRequestCode, CoapResponseCode},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

mod common;

fn forwarding_observe_options() -> (CoapObserveOptions, mpsc::UnboundedReceiver<HandleResponseContext>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let options = CoapObserveOptions::new(
        common::gen_test_request(),
        move |context: HandleResponseContext| -> Result<(), HandlerError> {
            sender.send(context)?;
            Ok(())
        },
    );
    (options, receiver)
}

async fn next_notification(receiver: &mut mpsc::UnboundedReceiver<HandleResponseContext>) -> HandleResponseContext {
    tokio::time::timeout(Duration::from_secs(5), receiver.recv())
        .await
        .expect("no notification delivered in time")
        .expect("notification handler was dropped")
}

#[tokio::test]
async fn observe_client_server_request() {
    let (client, mut peer) = common::connect_test_client(CoapClientConnectOptionsBuilder::new()).await;
    let (options, mut notifications) = forwarding_observe_options();
    let cancel = CancellationToken::new();

    let server = async {
        let request = common::next_request(&mut peer).await;
        assert_eq!(request.code(), CoapMessageCode::Request(CoapRequestCode::Get));
        assert_eq!(
            request.option(CoapOptionType::Observe as u16),
            Some(&CoapOption::Observe(0))
        );
        let mut response = common::piggybacked(&request, CoapResponseCode::Content);
        response.add_option(CoapOption::Observe(1));
        response.set_data("initial");
        peer.send(response).unwrap();
        request
    };
    let (observation, registration) = tokio::join!(client.observe(options, &cancel), server);
    let observation = observation.unwrap();
    assert!(observation.is_registered());
    assert_eq!(observation.token(), registration.token());
    assert_eq!(observation.response().payload().as_ref(), b"initial");
    assert_eq!(client.active_observations(), 1);

    let token = registration.token().to_vec();
    for (mid, sequence) in [(100, 5), (101, 3), (102, 7)] {
        peer.send(common::notification(
            CoapMessageType::Non,
            mid,
            &token,
            sequence,
            &format!("value {}", sequence),
        ))
        .unwrap();
    }
    let first = next_notification(&mut notifications).await;
    assert_eq!(first.sequence_number, Some(5));
    assert_eq!(first.response.payload().as_ref(), b"value 5");
    let second = next_notification(&mut notifications).await;
    assert_eq!(second.sequence_number, Some(7));

    // Confirmable notifications are acknowledged.
    peer.send(common::notification(CoapMessageType::Con, 103, &token, 8, "value 8"))
        .unwrap();
    let ack = common::next_request(&mut peer).await;
    assert_eq!(ack.type_(), CoapMessageType::Ack);
    assert_eq!(ack.code(), CoapMessageCode::Empty);
    assert_eq!(ack.mid(), 103);
    assert_eq!(next_notification(&mut notifications).await.sequence_number, Some(8));
    assert!(notifications.try_recv().is_err());

    let server = async {
        let request = common::next_request(&mut peer).await;
        assert_eq!(request.token(), token.as_slice());
        assert_eq!(
            request.option(CoapOptionType::Observe as u16),
            Some(&CoapOption::Observe(1))
        );
        peer.send(common::piggybacked(&request, CoapResponseCode::Content)).unwrap();
    };
    let (stopped, ()) = tokio::join!(client.stop_observation(&observation, &cancel), server);
    assert_eq!(stopped.unwrap().status(), CoapResponseCode::Content);
    assert_eq!(client.active_observations(), 0);

    // Notifications for a cancelled observation are rejected.
    peer.send(common::notification(CoapMessageType::Con, 104, &token, 9, "value 9"))
        .unwrap();
    let reset = common::next_request(&mut peer).await;
    assert_eq!(reset.type_(), CoapMessageType::Rst);
    assert_eq!(reset.mid(), 104);
    client.shutdown().await;
}

#[tokio::test]
async fn notifications_older_than_registration_are_discarded() {
    let (client, mut peer) = common::connect_test_client(CoapClientConnectOptionsBuilder::new()).await;
    let (options, mut notifications) = forwarding_observe_options();

    let server = async {
        let request = common::next_request(&mut peer).await;
        let mut response = common::piggybacked(&request, CoapResponseCode::Content);
        response.add_option(CoapOption::Observe(10));
        peer.send(response).unwrap();
        request
    };
    let cancel = CancellationToken::new();
    let (observation, registration) = tokio::join!(client.observe(options, &cancel), server);
    assert!(observation.unwrap().is_registered());

    let token = registration.token().to_vec();
    peer.send(common::notification(CoapMessageType::Non, 300, &token, 9, "older"))
        .unwrap();
    peer.send(common::notification(CoapMessageType::Non, 301, &token, 11, "newer"))
        .unwrap();

    let delivered = next_notification(&mut notifications).await;
    assert_eq!(delivered.sequence_number, Some(11));
    assert_eq!(delivered.response.payload().as_ref(), b"newer");
    assert!(notifications.try_recv().is_err());
}

#[tokio::test]
async fn rejected_observation_is_not_registered() {
    let (client, mut peer) = common::connect_test_client(CoapClientConnectOptionsBuilder::new()).await;
    let (options, _notifications) = forwarding_observe_options();

    let server = async {
        let request = common::next_request(&mut peer).await;
        // Plain response without an Observe option: the resource is not observable.
        let mut response = common::piggybacked(&request, CoapResponseCode::Content);
        response.set_data("snapshot");
        peer.send(response).unwrap();
    };
    let cancel = CancellationToken::new();
    let (observation, ()) = tokio::join!(client.observe(options, &cancel), server);

    let observation = observation.unwrap();
    assert!(!observation.is_registered());
    assert_eq!(observation.response().payload().as_ref(), b"snapshot");
    assert_eq!(client.active_observations(), 0);
}

#[tokio::test]
async fn block_wise_notifications_are_reassembled() {
    let (client, mut peer) = common::connect_test_client(CoapClientConnectOptionsBuilder::new()).await;
    let (options, mut notifications) = forwarding_observe_options();

    let server = async {
        let request = common::next_request(&mut peer).await;
        let mut response = common::piggybacked(&request, CoapResponseCode::Content);
        response.add_option(CoapOption::Observe(1));
        peer.send(response).unwrap();
        request
    };
    let cancel = CancellationToken::new();
    let (observation, registration) = tokio::join!(client.observe(options, &cancel), server);
    assert!(observation.unwrap().is_registered());

    let mut first_block = common::notification(CoapMessageType::Non, 200, registration.token(), 2, "");
    let block = BlockOptionValue::new(0, BlockSize::S16, true);
    first_block.add_option(CoapOption::Block2(block.encode().unwrap()));
    first_block.set_data(vec![b'a'; 16]);
    peer.send(first_block).unwrap();

    // The follow-up request carries the same token, the next block number and no Observe option.
    let follow_up = common::next_request(&mut peer).await;
    assert_eq!(follow_up.token(), registration.token());
    assert_eq!(follow_up.option(CoapOptionType::Observe as u16), None);
    let requested = BlockOptionValue::decode(follow_up.block2().unwrap()).unwrap();
    assert_eq!(requested.number, 1);
    let mut last_block = common::piggybacked(&follow_up, CoapResponseCode::Content);
    last_block.add_option(CoapOption::Block2(
        BlockOptionValue::new(1, BlockSize::S16, false).encode().unwrap(),
    ));
    last_block.set_data("bcd");
    peer.send(last_block).unwrap();

    let notification = next_notification(&mut notifications).await;
    assert_eq!(notification.sequence_number, Some(2));
    let mut expected = vec![b'a'; 16];
    expected.extend_from_slice(b"bcd");
    assert_eq!(notification.response.payload().to_vec(), expected);
}

#[tokio::test]
async fn shutdown_drops_observations() {
    let (client, mut peer) = common::connect_test_client(CoapClientConnectOptionsBuilder::new()).await;
    let (options, mut notifications) = forwarding_observe_options();

    let server = async {
        let request = common::next_request(&mut peer).await;
        let mut response = common::piggybacked(&request, CoapResponseCode::Content);
        response.add_option(CoapOption::Observe(1));
        peer.send(response).unwrap();
    };
    let cancel = CancellationToken::new();
    let (observation, ()) = tokio::join!(client.observe(options, &cancel), server);
    assert!(observation.unwrap().is_registered());

    client.shutdown().await;
    assert!(client.is_closed());
    assert_eq!(client.active_observations(), 0);
    let closed = tokio::time::timeout(Duration::from_secs(5), notifications.recv())
        .await
        .unwrap();
    assert!(closed.is_none());
}
