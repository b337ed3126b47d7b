// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The coap-engine Contributors, all rights reserved.
 * This file is part of the coap-engine project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * transport/memory.rs - In-process transport backed by channels.
 */

//! A transport that connects a client to an in-process peer through channels.
//!
//! Useful for tests and demonstrations, where the [MemoryPeer] plays the role of the server.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;

use crate::{
    error::TransportError,
    message::CoapMessage,
    transport::{CoapTransport, CoapTransportFactory, CoapTransportOptions},
};

/// Client side of an in-memory connection.
#[derive(Debug)]
pub struct MemoryTransport {
    outgoing: mpsc::UnboundedSender<CoapMessage>,
    incoming: AsyncMutex<mpsc::UnboundedReceiver<CoapMessage>>,
    closed: CancellationToken,
}

/// Remote side of an in-memory connection.
///
/// Dropping the peer closes the connection for the client.
#[derive(Debug)]
pub struct MemoryPeer {
    outgoing: mpsc::UnboundedSender<CoapMessage>,
    incoming: mpsc::UnboundedReceiver<CoapMessage>,
}

impl MemoryTransport {
    /// Creates a connected pair of client transport and peer.
    pub fn pair() -> (MemoryTransport, MemoryPeer) {
        let (to_peer, from_client) = mpsc::unbounded_channel();
        let (to_client, from_peer) = mpsc::unbounded_channel();
        (
            MemoryTransport {
                outgoing: to_peer,
                incoming: AsyncMutex::new(from_peer),
                closed: CancellationToken::new(),
            },
            MemoryPeer {
                outgoing: to_client,
                incoming: from_client,
            },
        )
    }
}

#[async_trait]
impl CoapTransport for MemoryTransport {
    async fn send(&self, message: &CoapMessage) -> Result<(), TransportError> {
        if self.closed.is_cancelled() {
            return Err(TransportError::Closed);
        }
        self.outgoing.send(message.clone()).map_err(|_| TransportError::Closed)
    }

    async fn receive(&self) -> Result<Option<CoapMessage>, TransportError> {
        let mut incoming = self.incoming.lock().await;
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Ok(None),
            message = incoming.recv() => Ok(message),
        }
    }

    async fn close(&self) {
        self.closed.cancel();
    }
}

impl MemoryPeer {
    /// Sends a message to the client.
    pub fn send(&self, message: CoapMessage) -> Result<(), TransportError> {
        self.outgoing.send(message).map_err(|_| TransportError::Closed)
    }

    /// Waits for the next message sent by the client.
    ///
    /// Returns `None` once the client transport has been dropped.
    pub async fn receive(&mut self) -> Option<CoapMessage> {
        self.incoming.recv().await
    }

    /// Returns a message sent by the client if one is already queued.
    pub fn try_receive(&mut self) -> Option<CoapMessage> {
        self.incoming.try_recv().ok()
    }
}

/// Hands out a single prepared [MemoryTransport] on the first call to `connect()`.
#[derive(Debug)]
pub struct MemoryTransportFactory {
    transport: Mutex<Option<MemoryTransport>>,
    last_options: Mutex<Option<CoapTransportOptions>>,
}

impl MemoryTransportFactory {
    pub fn new(transport: MemoryTransport) -> MemoryTransportFactory {
        MemoryTransportFactory {
            transport: Mutex::new(Some(transport)),
            last_options: Mutex::new(None),
        }
    }

    /// Returns the options of the most recent connection attempt.
    pub fn last_options(&self) -> Option<CoapTransportOptions> {
        self.last_options.lock().ok().and_then(|options| options.clone())
    }
}

#[async_trait]
impl CoapTransportFactory for MemoryTransportFactory {
    async fn connect(&self, options: &CoapTransportOptions) -> Result<Box<dyn CoapTransport>, TransportError> {
        if let Ok(mut last_options) = self.last_options.lock() {
            *last_options = Some(options.clone());
        }
        let transport = self.transport.lock().ok().and_then(|mut transport| transport.take());
        match transport {
            Some(transport) => Ok(Box::new(transport)),
            None => Err(TransportError::ConnectFailed(format!("{}:{}", options.host, options.port))),
        }
    }
}
