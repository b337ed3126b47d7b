// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The coap-engine Contributors, all rights reserved.
 * This file is part of the coap-engine project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * tests/common/mod.rs - Common code for integration tests.
 */

#![allow(dead_code)]

use std::time::Duration;

use coap_engine::{
    client::{CoapClient, CoapClientConnectOptionsBuilder},
    message::{CoapMessage, CoapMessageCommon, CoapRequest},
    protocol::{CoapMessageType, CoapRequestCode, CoapResponseCode},
    transport::{MemoryPeer, MemoryTransport, MemoryTransportFactory},
};
use tracing_subscriber::EnvFilter;

/// Installs a log subscriber honoring `RUST_LOG`, once per test binary.
pub(crate) fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Connects a client to an in-memory peer that plays the server.
///
/// Host and transport factory are set by this function, everything else is taken from `options`.
pub(crate) async fn connect_test_client(options: CoapClientConnectOptionsBuilder) -> (CoapClient, MemoryPeer) {
    init_logging();
    let (transport, peer) = MemoryTransport::pair();
    let options = options
        .with_host("coap.test")
        .with_transport_factory(MemoryTransportFactory::new(transport))
        .build()
        .expect("invalid test client options");
    let client = CoapClient::connect(options).await.expect("unable to connect test client");
    (client, peer)
}

pub(crate) fn gen_test_request() -> CoapRequest {
    let uri = "/test1".parse().expect("unable to parse request URI");
    CoapRequest::with_uri(CoapRequestCode::Get, uri)
}

/// Waits for the next message the client sends to the server.
pub(crate) async fn next_request(peer: &mut MemoryPeer) -> CoapMessage {
    tokio::time::timeout(Duration::from_secs(5), peer.receive())
        .await
        .expect("client did not send a message in time")
        .expect("client transport is closed")
}

/// Creates a piggybacked response to `request`.
pub(crate) fn piggybacked(request: &CoapMessage, code: CoapResponseCode) -> CoapMessage {
    let mut response = CoapMessage::new(CoapMessageType::Ack, code.into());
    response.set_mid(request.mid());
    response.set_token(request.token().to_vec());
    response
}

/// Creates a notification for an observation with the given token.
pub(crate) fn notification(
    type_: CoapMessageType,
    mid: u16,
    token: &[u8],
    sequence: u32,
    payload: &str,
) -> CoapMessage {
    let mut message = CoapMessage::new(type_, CoapResponseCode::Content.into());
    message.set_mid(mid);
    message.set_token(token.to_vec());
    message.add_option(coap_engine::message::CoapOption::Observe(sequence));
    message.set_data(payload.to_string());
    message
}
