// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The coap-engine Contributors, all rights reserved.
 * This file is part of the coap-engine project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * transport.rs - Interfaces for message-oriented CoAP transports.
 */

//! Transports carry structured [CoapMessage]s between the client and a CoAP server.
//!
//! Encoding messages into octets, socket handling and (D)TLS are the responsibility of the
//! transport implementation. The client only requires that a transport can send a message and
//! hand out received messages one at a time.

use async_trait::async_trait;

pub use memory::{MemoryPeer, MemoryTransport, MemoryTransportFactory};

use crate::{crypto::ClientCredentials, error::TransportError, message::CoapMessage};

pub mod memory;

/// A bidirectional, message-oriented connection to a CoAP server.
///
/// `send()` may be called concurrently from multiple tasks while another task is waiting in
/// `receive()`.
#[async_trait]
pub trait CoapTransport: Send + Sync {
    /// Sends a message to the remote endpoint.
    async fn send(&self, message: &CoapMessage) -> Result<(), TransportError>;

    /// Waits for the next message from the remote endpoint.
    ///
    /// Returns `Ok(None)` once the connection has been closed.
    async fn receive(&self) -> Result<Option<CoapMessage>, TransportError>;

    /// Closes the connection. Calling this more than once has no effect.
    async fn close(&self);
}

/// Parameters for establishing a transport connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoapTransportOptions {
    pub host: String,
    pub port: u16,
    pub credentials: Option<ClientCredentials>,
}

/// Creates transport connections for a [CoapClient](crate::client::CoapClient).
#[async_trait]
pub trait CoapTransportFactory: Send + Sync {
    async fn connect(&self, options: &CoapTransportOptions) -> Result<Box<dyn CoapTransport>, TransportError>;
}
