// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The coap-engine Contributors, all rights reserved.
 * This file is part of the coap-engine project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * lib.rs - Main library entry point for the CoAP client engine.
 */

//! An asynchronous CoAP client engine.
//!
//! This crate implements the client side of the Constrained Application Protocol on top of an
//! arbitrary message-oriented transport.
//!
//! # Feature support
//! coap-engine currently supports the following feature set:
//! - [x] Request/response exchanges ([RFC 7252](https://datatracker.ietf.org/doc/html/rfc7252))
//!     - [x] Piggybacked responses
//!     - [ ] Separate responses
//!     - [ ] Retransmission of confirmable messages (left to the transport)
//! - [x] Blockwise Transfer ([RFC 7959](https://datatracker.ietf.org/doc/html/rfc7959))
//!     - [x] Sending large request payloads (Block1), including server-requested size reduction
//!     - [x] Receiving large responses (Block2)
//!     - [x] Progress reports for both directions
//! - [x] Resource observation ([RFC 7641](https://datatracker.ietf.org/doc/html/rfc7641))
//!     - [x] Observing resources as a client, including block-wise notifications
//!     - [x] Notification reordering detection
//! - [ ] Transports:
//!     - [x] In-memory transport for tests ([transport::memory])
//!     - [ ] UDP, TCP, (D)TLS: provided by implementing [transport::CoapTransport]
//!
//! # Using the client
//!
//! A [CoapClient](client::CoapClient) is created from [CoapClientConnectOptions](client::CoapClientConnectOptions),
//! which name the server and the [CoapTransportFactory](transport::CoapTransportFactory) used to
//! reach it.
//!
//! ```no_run
//! use coap_engine::{
//!     client::{CoapClient, CoapClientConnectOptionsBuilder},
//!     message::CoapRequest,
//!     protocol::CoapRequestCode,
//!     transport::{MemoryTransport, MemoryTransportFactory},
//!     types::CoapUri,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let (transport, _server) = MemoryTransport::pair();
//! let options = CoapClientConnectOptionsBuilder::new()
//!     .with_host("coap.example")
//!     .with_transport_factory(MemoryTransportFactory::new(transport))
//!     .build()?;
//! let client = CoapClient::connect(options).await?;
//!
//! let uri: CoapUri = "coap://coap.example/sensors/temperature".parse()?;
//! let request = CoapRequest::with_uri(CoapRequestCode::Get, uri);
//! let response = client.request(request, &CancellationToken::new()).await?;
//! println!("{}: {:?}", response.status(), response.payload());
//!
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Logging
//! All components log through the [tracing] facade. The crate never installs a subscriber itself.

pub use client::{CoapClient, CoapClientConnectOptions, CoapClientConnectOptionsBuilder};
pub use message::{CoapMessage, CoapMessageCommon, CoapOption, CoapRequest, CoapResponse};

pub mod block;
pub mod buffer;
pub mod client;
pub mod crypto;
pub mod error;
pub mod message;
pub mod protocol;
pub mod transport;
pub mod types;
