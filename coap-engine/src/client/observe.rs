// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The coap-engine Contributors, all rights reserved.
 * This file is part of the coap-engine project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * client/observe.rs - Resource observation and notification delivery.
 */

//! Resource observation as described in [RFC 7641](https://datatracker.ietf.org/doc/html/rfc7641).
//!
//! Every active subscription owns a worker task that receives the notifications accepted for it,
//! fetches the remaining blocks of block-wise notifications and finally calls the subscriber's
//! [CoapResponseHandler]. Notifications of one subscription are thus delivered in the order they
//! were accepted, and follow-up exchanges never block the receive loop.

use std::{fmt::Debug, panic::AssertUnwindSafe, sync::Arc};

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::{
    client::{
        block_receiver::{BlockTransferOutcome, BlockTransferReceiver},
        progress::ProgressReporter,
        CoapExchanger,
    },
    error::CoapClientError,
    message::{CoapMessage, CoapMessageCommon, CoapRequest, CoapResponse},
    protocol::{CoapToken, Observe},
};

/// Half of the 24 bit sequence number space used for notification reordering detection.
const SEQUENCE_HALF_RANGE: u32 = 1 << 23;

/// Error type returned by response handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// A notification handed to a [CoapResponseHandler].
#[derive(Debug, Clone)]
pub struct HandleResponseContext {
    /// Value of the Observe option of the notification, if present.
    pub sequence_number: Option<Observe>,
    /// The notification, with the payload reassembled if it was transferred block-wise.
    pub response: CoapResponse,
}

/// Receives the notifications of an observed resource.
///
/// Implemented for every `Fn(HandleResponseContext) -> Result<(), HandlerError>`.
#[async_trait]
pub trait CoapResponseHandler: Send + Sync {
    async fn handle_response(&self, context: HandleResponseContext) -> Result<(), HandlerError>;
}

#[async_trait]
impl<F> CoapResponseHandler for F
where
    F: Fn(HandleResponseContext) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    async fn handle_response(&self, context: HandleResponseContext) -> Result<(), HandlerError> {
        self(context)
    }
}

/// Parameters of an observation request.
#[derive(Clone)]
pub struct CoapObserveOptions {
    pub request: CoapRequest,
    pub handler: Arc<dyn CoapResponseHandler>,
}

impl CoapObserveOptions {
    pub fn new<H: CoapResponseHandler + 'static>(request: CoapRequest, handler: H) -> CoapObserveOptions {
        CoapObserveOptions {
            request,
            handler: Arc::new(handler),
        }
    }
}

impl Debug for CoapObserveOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoapObserveOptions")
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

/// Result of an observation request, needed to stop the observation later on.
#[derive(Debug, Clone)]
pub struct CoapObserveResponse {
    response: CoapResponse,
    token: CoapToken,
    request: CoapMessage,
    registered: bool,
}

impl CoapObserveResponse {
    pub(crate) fn new(
        response: CoapResponse,
        token: CoapToken,
        request: CoapMessage,
        registered: bool,
    ) -> CoapObserveResponse {
        CoapObserveResponse {
            response,
            token,
            request,
            registered,
        }
    }

    /// Returns the response to the registration request.
    pub fn response(&self) -> &CoapResponse {
        &self.response
    }

    /// Returns the token shared by the registration request and all notifications.
    pub fn token(&self) -> &[u8] {
        &self.token
    }

    /// Returns the registration request without its Observe option.
    pub(crate) fn request(&self) -> &CoapMessage {
        &self.request
    }

    /// Returns whether the server accepted the registration.
    ///
    /// The server may answer an observation request with a plain response (no Observe option) or
    /// an error, in which case no notifications will follow.
    pub fn is_registered(&self) -> bool {
        self.registered
    }
}

/// Returns whether a notification with sequence number `candidate` is newer than one with
/// `previous` ([RFC 7641, Section 3.4](https://datatracker.ietf.org/doc/html/rfc7641#section-3.4)).
pub fn is_fresher(previous: Observe, candidate: Observe) -> bool {
    (previous < candidate && candidate - previous < SEQUENCE_HALF_RANGE)
        || (previous > candidate && previous - candidate > SEQUENCE_HALF_RANGE)
}

/// Everything a subscription worker needs to deliver notifications.
pub(crate) struct SubscriptionContext {
    pub template: CoapMessage,
    pub handler: Arc<dyn CoapResponseHandler>,
    pub exchanger: Arc<dyn CoapExchanger>,
    pub progress: ProgressReporter,
    pub block_transfer: bool,
}

#[derive(Debug)]
struct Subscription {
    last_sequence: Option<Observe>,
    queue: mpsc::UnboundedSender<CoapMessage>,
    stop: CancellationToken,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

/// Table of active subscriptions, keyed by token.
#[derive(Debug)]
pub struct ObservationManager {
    subscriptions: DashMap<CoapToken, Subscription>,
    shutdown: CancellationToken,
}

impl ObservationManager {
    /// Creates an empty manager whose workers stop when `shutdown` is cancelled.
    pub fn new(shutdown: CancellationToken) -> ObservationManager {
        ObservationManager {
            subscriptions: DashMap::new(),
            shutdown,
        }
    }

    /// Registers a subscription for `token` and starts its worker.
    ///
    /// Fails if a subscription with the same token is already active.
    pub(crate) fn register(&self, token: CoapToken, context: SubscriptionContext) -> Result<(), CoapClientError> {
        match self.subscriptions.entry(token) {
            Entry::Occupied(entry) => Err(CoapClientError::InvalidArgument(format!(
                "an observation with token {:02x?} is already active",
                entry.key()
            ))),
            Entry::Vacant(entry) => {
                let (queue, notifications) = mpsc::unbounded_channel();
                let stop = self.shutdown.child_token();
                debug!(token = ?entry.key(), "registered observation");
                tokio::spawn(run_subscription(notifications, context, stop.clone()));
                entry.insert(Subscription {
                    last_sequence: None,
                    queue,
                    stop,
                });
                Ok(())
            },
        }
    }

    /// Removes the subscription for `token` and stops its worker.
    ///
    /// Returns `false` if no such subscription was active.
    pub fn deregister(&self, token: &[u8]) -> bool {
        let removed = self.subscriptions.remove(token).is_some();
        if removed {
            debug!(token = ?token, "deregistered observation");
        }
        removed
    }

    /// Hands a notification to the subscription with the same token.
    ///
    /// Returns `false` if no subscription matches. Notifications that are older than the newest
    /// one seen so far are discarded, but still count as handled.
    pub fn try_handle(&self, message: CoapMessage) -> bool {
        let Some(mut subscription) = self.subscriptions.get_mut(message.token()) else {
            return false;
        };
        if let Some(sequence) = message.observe() {
            let last_sequence = subscription.last_sequence;
            match last_sequence {
                Some(previous) if !is_fresher(previous, sequence) => {
                    debug!(
                        token = ?message.token(),
                        previous,
                        sequence,
                        "discarding stale notification"
                    );
                    return true;
                },
                _ => subscription.last_sequence = Some(sequence),
            }
        }
        trace!(token = ?message.token(), sequence = ?message.observe(), "accepted notification");
        if subscription.queue.send(message).is_err() {
            debug!("observation worker has already stopped, dropping notification");
        }
        true
    }

    /// Records `sequence`, taken from the response to the registration request, as seen.
    ///
    /// Notifications that already arrived with a fresher sequence number take precedence.
    pub fn seed_sequence(&self, token: &[u8], sequence: Observe) {
        if let Some(mut subscription) = self.subscriptions.get_mut(token) {
            let last_sequence = subscription.last_sequence;
            if last_sequence.map_or(true, |previous| is_fresher(previous, sequence)) {
                subscription.last_sequence = Some(sequence);
            }
        }
    }

    pub fn is_active(&self, token: &[u8]) -> bool {
        self.subscriptions.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Removes all subscriptions.
    pub fn clear(&self) {
        self.subscriptions.clear();
    }
}

async fn run_subscription(
    mut notifications: mpsc::UnboundedReceiver<CoapMessage>,
    context: SubscriptionContext,
    stop: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            message = notifications.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };
        deliver(&context, message, &stop).await;
    }
    trace!("observation worker stopped");
}

async fn deliver(context: &SubscriptionContext, message: CoapMessage, stop: &CancellationToken) {
    let sequence_number = message.observe();
    let (message, payload) = if context.block_transfer && message.block2().is_some() {
        let receiver = BlockTransferReceiver::new(context.exchanger.as_ref(), &context.progress);
        match receiver.receive(&context.template, &message, stop).await {
            Ok(BlockTransferOutcome::Reassembled(payload)) => (message, Some(payload)),
            // The handler sees the rejection in place of the notification.
            Ok(BlockTransferOutcome::Rejected(rejection)) => (rejection, None),
            Err(e) if e.is_cancelled() => {
                debug!("block-wise notification transfer cancelled");
                return;
            },
            Err(e) => {
                warn!(error = %e, "dropping notification, fetching its remaining blocks failed");
                return;
            },
        }
    } else {
        (message, None)
    };
    let response = match CoapResponse::from_message(message) {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "dropping notification that is not a response");
            return;
        },
    };
    let response = match payload {
        Some(payload) => response.with_payload(payload),
        None => response,
    };
    let handled = AssertUnwindSafe(context.handler.handle_response(HandleResponseContext {
        sequence_number,
        response,
    }))
    .catch_unwind()
    .await;
    match handled {
        Ok(Ok(())) => {},
        Ok(Err(e)) => warn!(error = %e, "notification handler failed"),
        Err(_) => warn!("notification handler panicked"),
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Mutex, time::Duration};

    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::{
        block::{BlockOptionValue, BlockSize},
        message::CoapOption,
        protocol::{CoapMessageType, CoapRequestCode, CoapResponseCode},
    };

    /// Exchanger that must never be used.
    struct NoExchanges;

    #[async_trait]
    impl CoapExchanger for NoExchanges {
        async fn exchange(
            &self,
            _request: CoapMessage,
            _cancel: &CancellationToken,
        ) -> Result<CoapMessage, CoapClientError> {
            Err(CoapClientError::ConnectionClosed)
        }
    }

    /// Answers every request with the second and last block of a 20 byte representation.
    struct SecondBlock;

    #[async_trait]
    impl CoapExchanger for SecondBlock {
        async fn exchange(
            &self,
            request: CoapMessage,
            _cancel: &CancellationToken,
        ) -> Result<CoapMessage, CoapClientError> {
            let mut response = CoapMessage::new(CoapMessageType::Ack, CoapResponseCode::Content.into());
            response.set_token(request.token().to_vec());
            let block = BlockOptionValue::new(1, BlockSize::S16, false);
            response.add_option(CoapOption::Block2(block.encode().unwrap()));
            response.set_data(vec![b'b'; 4]);
            Ok(response)
        }
    }

    fn forwarding_handler() -> (Arc<dyn CoapResponseHandler>, UnboundedReceiver<HandleResponseContext>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handler = move |context: HandleResponseContext| -> Result<(), HandlerError> {
            sender.send(context)?;
            Ok(())
        };
        (Arc::new(handler), receiver)
    }

    fn context(handler: Arc<dyn CoapResponseHandler>, exchanger: Arc<dyn CoapExchanger>) -> SubscriptionContext {
        SubscriptionContext {
            template: CoapMessage::new(CoapMessageType::Con, CoapRequestCode::Get.into()),
            handler,
            exchanger,
            progress: ProgressReporter::new(),
            block_transfer: true,
        }
    }

    fn notification(token: &[u8], sequence: Option<Observe>) -> CoapMessage {
        let mut message = CoapMessage::new(CoapMessageType::Non, CoapResponseCode::Content.into());
        message.set_token(token.to_vec());
        if let Some(sequence) = sequence {
            message.add_option(CoapOption::Observe(sequence));
        }
        message.set_data(format!("{:?}", sequence));
        message
    }

    async fn next(receiver: &mut UnboundedReceiver<HandleResponseContext>) -> HandleResponseContext {
        tokio::time::timeout(Duration::from_secs(5), receiver.recv())
            .await
            .expect("handler was not called")
            .expect("handler channel closed")
    }

    #[test]
    fn freshness_follows_serial_number_arithmetic() {
        assert!(is_fresher(5, 7));
        assert!(!is_fresher(5, 3));
        assert!(!is_fresher(5, 5));
        assert!(is_fresher((1 << 24) - 2, 1));
        assert!(!is_fresher(1, (1 << 24) - 2));
        assert!(!is_fresher(0, SEQUENCE_HALF_RANGE));
        assert!(is_fresher(0, SEQUENCE_HALF_RANGE - 1));
    }

    #[tokio::test]
    async fn stale_notifications_are_discarded() {
        let manager = ObservationManager::new(CancellationToken::new());
        let (handler, mut handled) = forwarding_handler();
        let token: CoapToken = Box::new([1, 2, 3]);
        manager.register(token.clone(), context(handler, Arc::new(NoExchanges))).unwrap();

        assert!(manager.try_handle(notification(&token, Some(5))));
        assert!(manager.try_handle(notification(&token, Some(3))));
        assert!(manager.try_handle(notification(&token, Some(7))));

        assert_eq!(next(&mut handled).await.sequence_number, Some(5));
        let second = next(&mut handled).await;
        assert_eq!(second.sequence_number, Some(7));
        assert_eq!(second.response.payload().as_ref(), b"Some(7)");
        assert!(handled.try_recv().is_err());
    }

    #[tokio::test]
    async fn first_notification_is_always_accepted() {
        let manager = ObservationManager::new(CancellationToken::new());
        let (handler, mut handled) = forwarding_handler();
        manager
            .register(Box::new([4]), context(handler, Arc::new(NoExchanges)))
            .unwrap();
        assert!(manager.try_handle(notification(&[4], Some(0xFF_FFFF))));
        assert_eq!(next(&mut handled).await.sequence_number, Some(0xFF_FFFF));
        assert!(manager.try_handle(notification(&[4], None)));
        assert_eq!(next(&mut handled).await.sequence_number, None);
    }

    #[tokio::test]
    async fn registration_sequence_is_seeded() {
        let manager = ObservationManager::new(CancellationToken::new());
        let (handler, mut handled) = forwarding_handler();
        manager
            .register(Box::new([3]), context(handler, Arc::new(NoExchanges)))
            .unwrap();
        manager.seed_sequence(&[3], 10);

        assert!(manager.try_handle(notification(&[3], Some(9))));
        assert!(manager.try_handle(notification(&[3], Some(12))));
        assert_eq!(next(&mut handled).await.sequence_number, Some(12));

        // A notification that overtook the registration response is not undone.
        manager.seed_sequence(&[3], 11);
        assert!(manager.try_handle(notification(&[3], Some(11))));
        assert!(manager.try_handle(notification(&[3], Some(13))));
        assert_eq!(next(&mut handled).await.sequence_number, Some(13));
        assert!(handled.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_tokens_are_not_handled() {
        let manager = ObservationManager::new(CancellationToken::new());
        assert!(!manager.try_handle(notification(&[1], Some(1))));

        let (handler, _handled) = forwarding_handler();
        manager
            .register(Box::new([1]), context(handler, Arc::new(NoExchanges)))
            .unwrap();
        assert!(manager.is_active(&[1]));
        assert!(manager.deregister(&[1]));
        assert!(!manager.deregister(&[1]));
        assert!(!manager.try_handle(notification(&[1], Some(2))));
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn duplicate_tokens_are_rejected() {
        let manager = ObservationManager::new(CancellationToken::new());
        let (handler, _handled) = forwarding_handler();
        manager
            .register(Box::new([8]), context(Arc::clone(&handler), Arc::new(NoExchanges)))
            .unwrap();
        let result = manager.register(Box::new([8]), context(handler, Arc::new(NoExchanges)));
        assert!(matches!(result, Err(CoapClientError::InvalidArgument(_))));
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test]
    async fn failing_handlers_do_not_stop_delivery() {
        let manager = ObservationManager::new(CancellationToken::new());
        let calls = Arc::new(Mutex::new(Vec::new()));
        let (done, mut finished) = mpsc::unbounded_channel();
        let recorded = Arc::clone(&calls);
        let handler = move |context: HandleResponseContext| -> Result<(), HandlerError> {
            let sequence = context.sequence_number.unwrap_or_default();
            recorded.lock().unwrap().push(sequence);
            done.send(()).unwrap();
            match sequence {
                1 => panic!("handler panic"),
                2 => Err("handler failure".into()),
                _ => Ok(()),
            }
        };
        manager
            .register(Box::new([5]), context(Arc::new(handler), Arc::new(NoExchanges)))
            .unwrap();
        for sequence in 1..=3 {
            assert!(manager.try_handle(notification(&[5], Some(sequence))));
        }
        for _ in 0..3 {
            tokio::time::timeout(Duration::from_secs(5), finished.recv())
                .await
                .unwrap()
                .unwrap();
        }
        assert_eq!(*calls.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn block_wise_notifications_are_reassembled() {
        let manager = ObservationManager::new(CancellationToken::new());
        let (handler, mut handled) = forwarding_handler();
        manager
            .register(Box::new([6]), context(handler, Arc::new(SecondBlock)))
            .unwrap();

        let mut message = notification(&[6], Some(10));
        let block = BlockOptionValue::new(0, BlockSize::S16, true);
        message.add_option(CoapOption::Block2(block.encode().unwrap()));
        message.set_data(vec![b'a'; 16]);
        assert!(manager.try_handle(message));

        let context = next(&mut handled).await;
        assert_eq!(context.sequence_number, Some(10));
        let mut expected = vec![b'a'; 16];
        expected.extend_from_slice(b"bbbb");
        assert_eq!(context.response.payload().to_vec(), expected);
    }

    /// Rejects every request for a further block.
    struct RejectBlocks;

    #[async_trait]
    impl CoapExchanger for RejectBlocks {
        async fn exchange(
            &self,
            request: CoapMessage,
            _cancel: &CancellationToken,
        ) -> Result<CoapMessage, CoapClientError> {
            let mut response = CoapMessage::new(CoapMessageType::Ack, CoapResponseCode::Incomplete.into());
            response.set_token(request.token().to_vec());
            Ok(response)
        }
    }

    #[tokio::test]
    async fn rejected_block_requests_are_delivered() {
        let manager = ObservationManager::new(CancellationToken::new());
        let (handler, mut handled) = forwarding_handler();
        manager
            .register(Box::new([9]), context(handler, Arc::new(RejectBlocks)))
            .unwrap();

        let mut message = notification(&[9], Some(4));
        let block = BlockOptionValue::new(0, BlockSize::S16, true);
        message.add_option(CoapOption::Block2(block.encode().unwrap()));
        message.set_data(vec![b'a'; 16]);
        assert!(manager.try_handle(message));

        let context = next(&mut handled).await;
        assert_eq!(context.sequence_number, Some(4));
        assert_eq!(context.response.status(), CoapResponseCode::Incomplete);
        assert!(context.response.payload().is_empty());
    }

    #[tokio::test]
    async fn shutdown_stops_workers() {
        let shutdown = CancellationToken::new();
        let manager = ObservationManager::new(shutdown.clone());
        let (handler, mut handled) = forwarding_handler();
        manager
            .register(Box::new([7]), context(handler, Arc::new(NoExchanges)))
            .unwrap();
        shutdown.cancel();
        manager.clear();
        // The worker owns the handler, so the channel closes once the worker is gone.
        let closed = tokio::time::timeout(Duration::from_secs(5), handled.recv()).await.unwrap();
        assert!(closed.is_none());
    }
}
