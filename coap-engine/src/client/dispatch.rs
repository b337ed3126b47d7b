// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The coap-engine Contributors, all rights reserved.
 * This file is part of the coap-engine project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * client/dispatch.rs - Matching of responses to outstanding exchanges.
 */

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use dashmap::{mapref::entry::Entry, DashMap};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{CoapClientError, DuplicateMessageId},
    message::{CoapMessage, CoapMessageCommon},
    types::CoapMessageId,
};

type ExchangeResult = Result<CoapMessage, CoapClientError>;

/// Result slot of an outstanding exchange.
///
/// The ticket distinguishes registrations that reuse the same message id, so that a finished
/// waiter never removes the entry of a later exchange.
#[derive(Debug)]
struct PendingExchange {
    ticket: u64,
    sender: oneshot::Sender<ExchangeResult>,
}

type PendingTable = DashMap<CoapMessageId, PendingExchange>;

/// Table of outstanding exchanges, keyed by message id.
///
/// Every entry is completed at most once: whoever removes the entry from the table (a delivered
/// response, a failure broadcast, a cancellation or the waiter giving up) decides the outcome.
#[derive(Debug, Default)]
pub struct ExchangeDispatcher {
    pending: Arc<PendingTable>,
    next_ticket: AtomicU64,
}

impl ExchangeDispatcher {
    pub fn new() -> ExchangeDispatcher {
        ExchangeDispatcher::default()
    }

    /// Registers an outstanding exchange for the given message id.
    pub fn register(&self, id: CoapMessageId) -> Result<ResponseWaiter, DuplicateMessageId> {
        match self.pending.entry(id) {
            Entry::Occupied(_) => Err(DuplicateMessageId(id)),
            Entry::Vacant(slot) => {
                let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
                let (sender, receiver) = oneshot::channel();
                slot.insert(PendingExchange { ticket, sender });
                Ok(ResponseWaiter {
                    id,
                    ticket,
                    receiver,
                    pending: Arc::clone(&self.pending),
                })
            },
        }
    }

    /// Delivers a received message to the exchange with the same message id.
    ///
    /// Returns `true` if such an exchange was outstanding.
    pub fn complete(&self, message: CoapMessage) -> bool {
        match self.pending.remove(&message.mid()) {
            Some((_, exchange)) => {
                // The waiter may have been dropped in the meantime, the message is discarded then.
                let _ = exchange.sender.send(Ok(message));
                true
            },
            None => false,
        }
    }

    /// Completes the exchange with the given message id with [CoapClientError::Cancelled].
    pub fn cancel(&self, id: CoapMessageId) -> bool {
        match self.pending.remove(&id) {
            Some((_, exchange)) => {
                let _ = exchange.sender.send(Err(CoapClientError::Cancelled));
                true
            },
            None => false,
        }
    }

    /// Completes every outstanding exchange with the given error.
    pub fn broadcast_failure(&self, error: &CoapClientError) {
        let ids: Vec<CoapMessageId> = self.pending.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            if let Some((_, exchange)) = self.pending.remove(&id) {
                let _ = exchange.sender.send(Err(error.clone()));
            }
        }
    }

    pub fn is_pending(&self, id: CoapMessageId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Receiving end of an outstanding exchange.
///
/// Dropping the waiter removes the exchange from the dispatcher.
#[derive(Debug)]
pub struct ResponseWaiter {
    id: CoapMessageId,
    ticket: u64,
    receiver: oneshot::Receiver<ExchangeResult>,
    pending: Arc<PendingTable>,
}

impl ResponseWaiter {
    pub fn id(&self) -> CoapMessageId {
        self.id
    }

    /// Waits until the exchange is completed, the timeout elapses or `cancel` fires.
    ///
    /// If a response is delivered at the same moment the timeout elapses or the cancellation
    /// fires, the response is returned.
    pub async fn wait(mut self, timeout: Duration, cancel: &CancellationToken) -> ExchangeResult {
        let give_up_with = tokio::select! {
            biased;
            result = &mut self.receiver => return Self::flatten(result),
            _ = cancel.cancelled() => CoapClientError::Cancelled,
            _ = tokio::time::sleep(timeout) => CoapClientError::CommunicationTimedOut,
        };
        if self.remove_own_entry() {
            return Err(give_up_with);
        }
        // Someone else took the entry and is about to fill the slot.
        let result = (&mut self.receiver).await;
        Self::flatten(result)
    }

    fn flatten(result: Result<ExchangeResult, oneshot::error::RecvError>) -> ExchangeResult {
        // A dropped sender means the dispatcher itself is gone.
        result.unwrap_or(Err(CoapClientError::ConnectionClosed))
    }

    fn remove_own_entry(&self) -> bool {
        self.pending
            .remove_if(&self.id, |_, exchange| exchange.ticket == self.ticket)
            .is_some()
    }
}

impl Drop for ResponseWaiter {
    fn drop(&mut self) {
        self.remove_own_entry();
    }
}
