// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The coap-engine Contributors, all rights reserved.
 * This file is part of the coap-engine project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * client.rs - CoAP client and its receive loop.
 */

//! The CoAP client engine.
//!
//! A [CoapClient] owns one transport connection and a background task (the receive loop) that
//! pulls messages from the transport and routes them:
//! - acknowledgements and resets are matched to outstanding exchanges by message id,
//! - confirmable and non-confirmable messages are matched to active observations by token.
//!
//! Messages matching neither are logged and dropped. Confirmable messages are acknowledged if they
//! belong to an observation and rejected with a reset otherwise.

use std::{
    fmt::Debug,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::{sync::broadcast, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

pub use block_receiver::{BlockTransferOutcome, BlockTransferReceiver};
pub use block_sender::BlockTransferSender;
pub use dispatch::{ExchangeDispatcher, ResponseWaiter};
pub use ids::{MessageIdProvider, TokenProvider};
pub use observe::{
    is_fresher, CoapObserveOptions, CoapObserveResponse, CoapResponseHandler, HandleResponseContext, HandlerError,
    ObservationManager,
};
pub use options::{CoapClientConnectOptions, CoapClientConnectOptionsBuilder, DEFAULT_COMMUNICATION_TIMEOUT};
pub use progress::{BlockTransferDirection, BlockTransferProgress};

use crate::{
    block::BlockSize,
    error::{CoapClientError, DuplicateMessageId},
    message::{CoapMessage, CoapMessageCommon, CoapOption, CoapRequest, CoapResponse},
    protocol::{CoapMessageCode, CoapMessageType, CoapOptionType, CoapRequestCode, OBSERVE_DEREGISTER, OBSERVE_REGISTER},
    transport::{CoapTransport, CoapTransportOptions},
};
use observe::SubscriptionContext;
use progress::ProgressReporter;

pub mod block_receiver;
pub mod block_sender;
pub mod dispatch;
pub mod ids;
pub mod observe;
pub mod options;
pub mod progress;

/// Number of message ids tried before giving up if all of them belong to outstanding exchanges.
const MAX_MESSAGE_ID_ATTEMPTS: usize = 64;

/// Performs single request/response exchanges.
///
/// Block-wise transfers and observation workers drive all their exchanges through this trait.
#[async_trait]
pub trait CoapExchanger: Send + Sync {
    /// Sends `request` and waits for the response matching it.
    ///
    /// The message id of `request` is assigned by the exchanger.
    async fn exchange(&self, request: CoapMessage, cancel: &CancellationToken) -> Result<CoapMessage, CoapClientError>;
}

/// State shared between the client handle, the receive loop and the observation workers.
struct ClientCore {
    transport: Arc<dyn CoapTransport>,
    dispatcher: ExchangeDispatcher,
    message_ids: MessageIdProvider,
    tokens: TokenProvider,
    timeout: Duration,
    closed: AtomicBool,
    shutdown: CancellationToken,
    progress: ProgressReporter,
    block_transfer: bool,
    block_size: BlockSize,
}

impl ClientCore {
    fn register_exchange(&self) -> Result<ResponseWaiter, CoapClientError> {
        for _ in 0..MAX_MESSAGE_ID_ATTEMPTS {
            match self.dispatcher.register(self.message_ids.next()) {
                Ok(waiter) => return Ok(waiter),
                Err(DuplicateMessageId(id)) => trace!(mid = id, "message id still in use, skipping"),
            }
        }
        Err(CoapClientError::NoMessageIdAvailable)
    }

    /// Marks the connection as closed and fails every outstanding exchange with `error`.
    fn fail(&self, error: CoapClientError) {
        self.closed.store(true, Ordering::SeqCst);
        self.dispatcher.broadcast_failure(&error);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Sends a request message and returns the complete response.
    ///
    /// Payloads larger than the block size are uploaded block-wise, segmented responses are
    /// reassembled using `follow_up` as the template for the requests for further blocks.
    async fn perform(
        &self,
        message: CoapMessage,
        follow_up: &CoapMessage,
        cancel: &CancellationToken,
    ) -> Result<CoapResponse, CoapClientError> {
        let response = if self.block_transfer && message.data().len() > self.block_size.size() {
            let payload = message.data().clone();
            let mut template = message;
            template.set_data(Bytes::new());
            BlockTransferSender::new(self, &self.progress, self.block_size)
                .send(&template, &payload, cancel)
                .await?
        } else {
            self.exchange(message, cancel).await?
        };

        if !(self.block_transfer && response.code().is_success() && response.block2().is_some()) {
            return into_response(response);
        }
        match BlockTransferReceiver::new(self, &self.progress)
            .receive(follow_up, &response, cancel)
            .await?
        {
            BlockTransferOutcome::Reassembled(payload) => Ok(into_response(response)?.with_payload(payload)),
            BlockTransferOutcome::Rejected(rejection) => into_response(rejection),
        }
    }

    /// Routes a message received by the receive loop.
    async fn route(&self, message: CoapMessage, observations: &ObservationManager) {
        let mid = message.mid();
        match message.type_() {
            CoapMessageType::Ack | CoapMessageType::Rst => {
                trace!(mid, code = %message.code(), "received response");
                if !self.dispatcher.complete(message) {
                    debug!(mid, "dropping response for unknown or finished exchange");
                }
            },
            CoapMessageType::Con | CoapMessageType::Non => {
                let confirmable = message.type_() == CoapMessageType::Con;
                let token = message.token().to_vec();
                let reply_type = if observations.try_handle(message) {
                    CoapMessageType::Ack
                } else {
                    warn!(mid, token = ?token, "dropping message that matches no exchange or observation");
                    CoapMessageType::Rst
                };
                if confirmable {
                    let mut reply = CoapMessage::new(reply_type, CoapMessageCode::Empty);
                    reply.set_mid(mid);
                    if let Err(e) = self.transport.send(&reply).await {
                        warn!(mid, error = %e, "unable to answer confirmable message");
                    }
                }
            },
        }
    }
}

#[async_trait]
impl CoapExchanger for ClientCore {
    async fn exchange(
        &self,
        mut request: CoapMessage,
        cancel: &CancellationToken,
    ) -> Result<CoapMessage, CoapClientError> {
        if cancel.is_cancelled() {
            return Err(CoapClientError::Cancelled);
        }
        request.validate()?;
        let waiter = self.register_exchange()?;
        // Checked after registering, so a concurrent failure broadcast cannot be missed.
        if self.is_closed() {
            return Err(CoapClientError::ConnectionClosed);
        }
        request.set_mid(waiter.id());
        trace!(
            mid = request.mid(),
            token = ?request.token(),
            code = %request.code(),
            "sending request"
        );
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CoapClientError::Cancelled),
            sent = self.transport.send(&request) => sent?,
        }
        let response = waiter.wait(self.timeout, cancel).await?;
        match (response.type_(), response.code()) {
            (_, CoapMessageCode::Response(_)) => Ok(response),
            (CoapMessageType::Rst, _) => Err(CoapClientError::ProtocolViolation(format!(
                "server reset message {}",
                response.mid()
            ))),
            (_, code) => Err(CoapClientError::ProtocolViolation(format!(
                "expected a piggybacked response, received {} (separate responses are not supported)",
                code
            ))),
        }
    }
}

async fn receive_loop(core: Arc<ClientCore>, observations: Arc<ObservationManager>) {
    debug!("receive loop started");
    loop {
        let received = tokio::select! {
            biased;
            _ = core.shutdown.cancelled() => {
                debug!("receive loop stopped by shutdown");
                core.fail(CoapClientError::ConnectionClosed);
                break;
            },
            received = core.transport.receive() => received,
        };
        match received {
            Ok(Some(message)) => core.route(message, &observations).await,
            Ok(None) => {
                debug!("transport closed by remote endpoint");
                core.fail(CoapClientError::ConnectionClosed);
                break;
            },
            Err(e) => {
                error!(error = %e, "receiving from transport failed, stopping receive loop");
                core.fail(CoapClientError::Communication(e));
                break;
            },
        }
    }
    observations.clear();
    core.transport.close().await;
}

/// Template for follow-up requests of a block-wise response: same method, token and options,
/// without payload and Block1 related options.
fn follow_up_template(message: &CoapMessage) -> CoapMessage {
    let mut template = message.clone();
    template.set_data(Bytes::new());
    template.remove_options(CoapOptionType::Block1 as u16);
    template.remove_options(CoapOptionType::Size1 as u16);
    template
}

fn into_response(message: CoapMessage) -> Result<CoapResponse, CoapClientError> {
    CoapResponse::from_message(message).map_err(|e| CoapClientError::ProtocolViolation(e.to_string()))
}

/// A CoAP client connected to a single server.
///
/// All operations may be used concurrently. Dropping the client stops its receive loop and all
/// observations.
pub struct CoapClient {
    core: Arc<ClientCore>,
    observations: Arc<ObservationManager>,
    receive_task: Mutex<Option<JoinHandle<()>>>,
}

impl CoapClient {
    /// Connects to the server described by `options` and starts the receive loop.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn connect(options: CoapClientConnectOptions) -> Result<CoapClient, CoapClientError> {
        let transport_options = CoapTransportOptions {
            host: options.host.clone(),
            port: options.port,
            credentials: options.credentials.clone(),
        };
        debug!(host = %options.host, port = options.port, "connecting CoAP client");
        let transport = options.transport_factory.connect(&transport_options).await?;
        Ok(CoapClient::start(Arc::from(transport), &options))
    }

    fn start(transport: Arc<dyn CoapTransport>, options: &CoapClientConnectOptions) -> CoapClient {
        let shutdown = CancellationToken::new();
        let core = Arc::new(ClientCore {
            transport,
            dispatcher: ExchangeDispatcher::new(),
            message_ids: MessageIdProvider::new(),
            tokens: TokenProvider::new(),
            timeout: options.communication_timeout,
            closed: AtomicBool::new(false),
            shutdown: shutdown.clone(),
            progress: ProgressReporter::new(),
            block_transfer: options.enable_block_transfer,
            block_size: options.preferred_block_size,
        });
        let observations = Arc::new(ObservationManager::new(shutdown));
        let receive_task = tokio::spawn(receive_loop(Arc::clone(&core), Arc::clone(&observations)));
        CoapClient {
            core,
            observations,
            receive_task: Mutex::new(Some(receive_task)),
        }
    }

    /// Sends a request and returns the response.
    ///
    /// If block-wise transfer is enabled, payloads larger than the block size are uploaded
    /// block-wise and segmented responses are reassembled before they are returned.
    ///
    /// Responses with an error code (4.xx, 5.xx) are returned as regular responses.
    pub async fn request(
        &self,
        request: CoapRequest,
        cancel: &CancellationToken,
    ) -> Result<CoapResponse, CoapClientError> {
        let mut message = request.into_message()?;
        message.set_token(self.core.tokens.next());
        let follow_up = follow_up_template(&message);
        self.core.perform(message, &follow_up, cancel).await
    }

    /// Starts observing the resource addressed by `options.request`.
    ///
    /// The request is sent as a GET with Observe set to register. Notifications are handed to
    /// `options.handler` until [stop_observation()](CoapClient::stop_observation()) is called or
    /// the client shuts down.
    pub async fn observe(
        &self,
        options: CoapObserveOptions,
        cancel: &CancellationToken,
    ) -> Result<CoapObserveResponse, CoapClientError> {
        let CoapObserveOptions { mut request, handler } = options;
        request.set_method(CoapRequestCode::Get);
        request.set_observe(Some(OBSERVE_REGISTER));
        let mut message = request.into_message()?;
        let token = self.core.tokens.next();
        message.set_token(token.clone());
        let mut follow_up = follow_up_template(&message);
        follow_up.remove_options(CoapOptionType::Observe as u16);

        self.observations.register(
            token.clone(),
            SubscriptionContext {
                template: follow_up.clone(),
                handler,
                exchanger: Arc::clone(&self.core) as Arc<dyn CoapExchanger>,
                progress: self.core.progress.clone(),
                block_transfer: self.core.block_transfer,
            },
        )?;
        let response = match self.core.perform(message, &follow_up, cancel).await {
            Ok(response) => response,
            Err(e) => {
                self.observations.deregister(&token);
                return Err(e);
            },
        };
        let registered = match response.observe() {
            Some(sequence) if response.is_success() => {
                self.observations.seed_sequence(&token, sequence);
                debug!(token = ?token, sequence, "observation established");
                true
            },
            _ => false,
        };
        if !registered {
            debug!(token = ?token, status = %response.status(), "server did not accept observation");
            self.observations.deregister(&token);
        }
        Ok(CoapObserveResponse::new(response, token, follow_up, registered))
    }

    /// Cancels an observation by sending a GET with Observe set to deregister.
    ///
    /// The subscription is removed once the exchange has finished, whether it succeeded or not.
    pub async fn stop_observation(
        &self,
        observation: &CoapObserveResponse,
        cancel: &CancellationToken,
    ) -> Result<CoapResponse, CoapClientError> {
        let follow_up = observation.request();
        let mut message = follow_up.clone();
        message.set_option(CoapOption::Observe(OBSERVE_DEREGISTER));
        let result = self.core.perform(message, follow_up, cancel).await;
        self.observations.deregister(observation.token());
        result
    }

    /// Returns a receiver for the progress of all block-wise transfers started after this call.
    pub fn subscribe_progress(&self) -> broadcast::Receiver<BlockTransferProgress> {
        self.core.progress.subscribe()
    }

    /// Returns whether the receive loop has stopped.
    pub fn is_closed(&self) -> bool {
        self.core.is_closed()
    }

    /// Returns the number of currently active observations.
    pub fn active_observations(&self) -> usize {
        self.observations.len()
    }

    /// Stops the receive loop, drops all observations and closes the transport.
    ///
    /// Outstanding exchanges fail with [CoapClientError::ConnectionClosed].
    pub async fn shutdown(&self) {
        self.core.shutdown.cancel();
        let receive_task = self.receive_task.lock().ok().and_then(|mut task| task.take());
        if let Some(receive_task) = receive_task {
            if let Err(e) = receive_task.await {
                warn!(error = %e, "receive loop terminated abnormally");
            }
        }
    }
}

impl Debug for CoapClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoapClient")
            .field("closed", &self.core.is_closed())
            .field("pending_exchanges", &self.core.dispatcher.len())
            .field("active_observations", &self.observations.len())
            .field("block_transfer", &self.core.block_transfer)
            .field("block_size", &self.core.block_size)
            .finish()
    }
}

impl Drop for CoapClient {
    fn drop(&mut self) {
        self.core.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follow_up_template_drops_upload_state() {
        let mut message = CoapMessage::new(CoapMessageType::Con, CoapRequestCode::Post.into());
        message.set_token(vec![1]);
        message.add_option(CoapOption::UriPath("upload".to_string()));
        message.add_option(CoapOption::Block1(0x0e));
        message.add_option(CoapOption::Size1(4096));
        message.set_data(vec![0u8; 16]);

        let template = follow_up_template(&message);
        assert!(template.data().is_empty());
        assert_eq!(template.block1(), None);
        assert_eq!(template.option(CoapOptionType::Size1 as u16), None);
        assert_eq!(template.token(), [1]);
        assert_eq!(template.code(), CoapRequestCode::Post.into());
        assert_eq!(
            template.option(CoapOptionType::UriPath as u16),
            Some(&CoapOption::UriPath("upload".to_string()))
        );
    }
}
